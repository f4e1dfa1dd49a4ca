//! Module `wire`
//!
//! Frames used by the TCP channel: one JSON document per line in each
//! direction, a `Request` from the client and a `CallResult` back.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::call::CallEnvelope;
use crate::error::TransportError;

/// Default cap on a single frame, in bytes.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Chunk size used while skipping the rest of an oversized frame.
const DISCARD_CHUNK: u64 = 8 * 1024;

/// One frame read off a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// The frame exceeded the cap and was skipped up to its newline; holds
    /// how many bytes were dropped.
    TooLong(usize),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Object path on the receiving host.
    pub path: String,
    pub call: CallEnvelope,
}

/// Serializes `value` as a newline-terminated JSON line.
pub fn encode_line<T: Serialize>(value: &T) -> Result<String, TransportError> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, TransportError> {
    Ok(serde_json::from_str(line.trim_end_matches(['\r', '\n']))?)
}

/// Reads one newline-terminated frame of at most `max_frame_length` bytes
/// (newline excluded).
///
/// Never buffers more than the cap. An oversized frame is consumed and
/// dropped so the stream stays aligned on the next frame.
pub async fn read_frame<R>(reader: &mut R, max_frame_length: usize) -> Result<Frame, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let limit = max_frame_length as u64 + 1;
    let mut buf = Vec::new();
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(Frame::Closed);
    }
    if buf.last() == Some(&b'\n') || (n as u64) < limit {
        return Ok(Frame::Line(String::from_utf8_lossy(&buf).into_owned()));
    }

    let mut dropped = n;
    loop {
        buf.clear();
        let n = (&mut *reader)
            .take(DISCARD_CHUNK)
            .read_until(b'\n', &mut buf)
            .await?;
        dropped += n;
        if n == 0 || buf.last() == Some(&b'\n') {
            return Ok(Frame::TooLong(dropped));
        }
    }
}
