use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::call::{CallResult, Fault, FaultKind};
use crate::error::TransportError;
use crate::transport::ObjectDirectory;
use crate::transport::wire::{Frame, Request, decode_line, encode_line, read_frame};

/// Handles one TCP connection.
///
/// - Reads one `Request` per line.
/// - Dispatches it into the directory.
/// - Writes the `CallResult` back as one line.
///
/// Frames are read with the cap applied, so an oversized frame is never
/// held in memory. Malformed or oversized frames are answered with a fault
/// and the connection stays open.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    directory: Arc<ObjectDirectory>,
    max_frame_length: usize,
) -> Result<(), TransportError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let result: CallResult = match read_frame(&mut reader, max_frame_length).await? {
            Frame::Closed => {
                info!("Connection closed by {}", peer);
                return Ok(());
            }
            Frame::TooLong(len) => {
                warn!("Dropped oversized frame of {} bytes from {}", len, peer);
                Err(Fault::new(
                    FaultKind::InvalidArgument,
                    TransportError::FrameTooLong(len).to_string(),
                ))
            }
            Frame::Line(line) => match decode_line::<Request>(&line) {
                Ok(request) => {
                    debug!("{} -> {} {}", peer, request.path, request.call.method);
                    directory.dispatch(&request.path, request.call).await
                }
                Err(e) => Err(Fault::new(
                    FaultKind::InvalidArgument,
                    format!("Malformed frame: {}", e),
                )),
            },
        };

        let frame = encode_line(&result)?;
        write_half.write_all(frame.as_bytes()).await?;
        write_half.flush().await?;
    }
}
