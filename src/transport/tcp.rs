//! Module `tcp`
//!
//! Client side of the TCP channel. Each sink keeps one connection to its
//! host, opened on first use and reused for every later call. Calls on one
//! sink are serialized over that connection.

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::call::{CallEnvelope, CallResult, Fault};
use crate::error::TransportError;
use crate::transport::address::Address;
use crate::transport::channel_registry::ChannelBinding;
use crate::transport::directory::CallSink;
use crate::transport::wire::{Frame, Request, decode_line, encode_line, read_frame};

pub const TCP_SCHEME: &str = "tcp";

pub struct TcpBinding {
    max_frame_length: usize,
}

impl TcpBinding {
    /// Replies longer than `max_frame_length` fail the call with a transport fault.
    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self { max_frame_length }
    }
}

impl ChannelBinding for TcpBinding {
    fn scheme(&self) -> &str {
        TCP_SCHEME
    }

    fn create_sink(&self, address: &Address) -> Option<Arc<dyn CallSink>> {
        if address.authority().is_empty() {
            return None;
        }
        Some(Arc::new(TcpSink {
            host: address.authority().to_string(),
            path: address.path().to_string(),
            max_frame_length: self.max_frame_length,
            connection: Mutex::new(None),
        }))
    }
}

struct TcpSink {
    host: String,
    path: String,
    max_frame_length: usize,
    connection: Mutex<Option<BufReader<TcpStream>>>,
}

impl TcpSink {
    async fn round_trip(
        &self,
        connection: &mut Option<BufReader<TcpStream>>,
        request: &Request,
    ) -> Result<CallResult, TransportError> {
        if connection.is_none() {
            let stream = TcpStream::connect(&self.host).await?;
            debug!("Connected to {}", self.host);
            *connection = Some(BufReader::new(stream));
        }
        let Some(reader) = connection.as_mut() else {
            return Err(TransportError::ConnectionClosed(self.host.clone()));
        };

        let frame = encode_line(request)?;
        reader.get_mut().write_all(frame.as_bytes()).await?;
        reader.get_mut().flush().await?;

        match read_frame(reader, self.max_frame_length).await? {
            Frame::Line(line) => decode_line(&line),
            Frame::TooLong(len) => Err(TransportError::FrameTooLong(len)),
            Frame::Closed => Err(TransportError::ConnectionClosed(self.host.clone())),
        }
    }
}

#[async_trait]
impl CallSink for TcpSink {
    async fn process(&self, call: CallEnvelope) -> CallResult {
        let request = Request {
            path: self.path.clone(),
            call,
        };

        let mut connection = self.connection.lock().await;
        match self.round_trip(&mut connection, &request).await {
            Ok(result) => result,
            Err(e) => {
                // The stream may be mid-frame; start over on the next call.
                *connection = None;
                warn!("Call to {}{} failed: {}", self.host, self.path, e);
                Err(Fault::transport(e.to_string()))
            }
        }
    }
}
