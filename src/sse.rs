//! Server-Sent Events (SSE) line framing.
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```

use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use std::time::Duration;

use crate::client::ClientError;
use crate::http::ByteStream;

/// A decoded event-stream line.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamLine {
    /// JSON payload of a `data:` line.
    Data(Value),
    /// The terminal `[DONE]` marker.
    Done,
}

/// Split a byte stream into trimmed, non-empty lines.
///
/// Bytes are buffered until a newline arrives so multi-byte characters split
/// across network chunks survive intact. A final line without a trailing
/// newline is still emitted. Each read waits at most `read_timeout`; a stalled
/// stream ends with a [`ClientError::Transport`].
pub fn lines(
    bytes: ByteStream,
    capacity: usize,
    read_timeout: Duration,
) -> impl Stream<Item = Result<String, ClientError>> + Send {
    stream::unfold(
        (bytes, Vec::with_capacity(capacity), false),
        move |(mut bytes, mut buffer, mut stream_ended)| async move {
            loop {
                // Emit any complete line already buffered
                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&raw).trim().to_string();
                    if !line.is_empty() {
                        return Some((Ok(line), (bytes, buffer, stream_ended)));
                    }
                }

                if stream_ended {
                    let line = String::from_utf8_lossy(&buffer).trim().to_string();
                    buffer.clear();
                    if line.is_empty() {
                        return None;
                    }
                    return Some((Ok(line), (bytes, buffer, stream_ended)));
                }

                let next = match tokio::time::timeout(read_timeout, bytes.next()).await {
                    Ok(next) => next,
                    Err(_) => Some(Err(ClientError::transport(
                        format!("stream read timed out after {:?}", read_timeout),
                        None,
                    ))),
                };

                match next {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        stream_ended = true;
                        buffer.clear();
                        return Some((Err(e), (bytes, buffer, stream_ended)));
                    }
                    None => stream_ended = true,
                }
            }
        },
    )
}

/// Strip an SSE `data:` prefix, if present.
///
/// # Example
/// ```
/// use chatwire::sse::strip_data_prefix;
///
/// assert_eq!(strip_data_prefix("data: {\"key\": 1}"), "{\"key\": 1}");
/// assert_eq!(strip_data_prefix("{\"key\": 1}"), "{\"key\": 1}");
/// ```
pub fn strip_data_prefix(line: &str) -> &str {
    let line = line.trim();
    line.strip_prefix("data:").map(str::trim).unwrap_or(line)
}

/// Check if an SSE data line indicates the stream is done.
///
/// # Example
/// ```
/// use chatwire::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}

/// Decode one raw line.
///
/// Returns `None` for anything that is not JSON (keep-alive comments, event
/// names, partial lines); those are dropped rather than failing the stream.
pub fn parse_stream_chunk(line: &str) -> Option<StreamLine> {
    let data = strip_data_prefix(line);
    if is_done_marker(data) {
        return Some(StreamLine::Done);
    }
    serde_json::from_str(data).ok().map(StreamLine::Data)
}
