//! Delivery of streamed chunks to caller callbacks.

use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

use crate::client::ClientError;
use crate::http::ByteStream;
use crate::response::{self, FromEnvelope};
use crate::result::{ChatMessage, Completion, FinishReason};
use crate::sse::{self, StreamLine};

/// A decoded chunk that contributes text to the streamed reply.
pub trait StreamPiece: FromEnvelope {
    fn piece_text(&self) -> Option<String>;

    fn piece_finish(&self) -> Option<FinishReason>;
}

impl StreamPiece for ChatMessage {
    fn piece_text(&self) -> Option<String> {
        self.stream_content()
            .map(str::to_string)
            .or_else(|| self.content())
    }

    fn piece_finish(&self) -> Option<FinishReason> {
        self.finish_reason()
    }
}

impl StreamPiece for Completion {
    fn piece_text(&self) -> Option<String> {
        self.text()
    }

    fn piece_finish(&self) -> Option<FinishReason> {
        self.finish_reason()
    }
}

/// What a finished stream produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    /// Number of chunks handed to the callback.
    pub chunks: usize,
    /// Concatenated text of all chunks.
    pub content: String,
    /// Last finish reason reported.
    pub finish_reason: Option<FinishReason>,
}

/// Read `bytes` to the end, calling `callback` once per decoded chunk.
///
/// Each chunk is delivered before the next read, so callbacks run in wire
/// order and never overlap. Undecodable lines and chunks without `choices`
/// are skipped; an `error` object on the stream ends it with an API error.
/// A read that waits longer than `read_timeout` fails the stream.
pub async fn deliver<T, F>(
    bytes: ByteStream,
    buffer_size: usize,
    read_timeout: Duration,
    mut callback: F,
) -> Result<StreamSummary, ClientError>
where
    T: StreamPiece,
    F: FnMut(T),
{
    let mut summary = StreamSummary::default();
    let mut lines = Box::pin(sse::lines(bytes, buffer_size, read_timeout));

    while let Some(line) = lines.next().await {
        let line = line?;
        let value = match sse::parse_stream_chunk(&line) {
            Some(StreamLine::Done) => break,
            Some(StreamLine::Data(value)) => value,
            None => {
                debug!(line = %line, "dropping undecodable stream line");
                continue;
            }
        };

        if let Some(err) = response::api_error(&value, None) {
            return Err(err);
        }

        let piece = match T::from_envelope(value) {
            Ok(piece) => piece,
            Err(e) => {
                debug!(error = %e, "skipping stream chunk without choices");
                continue;
            }
        };

        if let Some(text) = piece.piece_text() {
            summary.content.push_str(&text);
        }
        if let Some(reason) = piece.piece_finish() {
            summary.finish_reason = Some(reason);
        }
        summary.chunks += 1;
        callback(piece);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    const WAIT: Duration = Duration::from_secs(5);

    fn body(text: &'static str) -> ByteStream {
        Box::pin(stream::iter(vec![Ok(Bytes::from_static(text.as_bytes()))]))
    }

    #[tokio::test]
    async fn test_two_chunks_then_done() {
        let bytes = body(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ));
        let mut seen = Vec::new();
        let summary = deliver::<ChatMessage, _>(bytes, 64, WAIT, |chunk| {
            seen.push(chunk.stream_content().unwrap_or_default().to_string())
        })
        .await
        .unwrap();

        assert_eq!(seen, vec!["Hel", "lo"]);
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.content, "Hello");
        assert_eq!(summary.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_keep_alive_and_partial_lines_are_dropped() {
        let bytes = body(concat!(
            ": keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {\"usage\":{\"total_tokens\":3}}\n\n",
            "data: {\"choices\":[{\"delta\":\n",
        ));
        let mut count = 0;
        let summary = deliver::<ChatMessage, _>(bytes, 64, WAIT, |_| count += 1)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(summary.content, "a");
    }

    #[tokio::test]
    async fn test_error_event_fails_the_stream() {
        let bytes = body("data: {\"error\":{\"message\":\"overloaded\",\"type\":\"server_error\"}}\n\n");
        let err = deliver::<ChatMessage, _>(bytes, 64, WAIT, |_| {}).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { .. }));
        assert_eq!(err.message(), "overloaded");
    }

    #[tokio::test]
    async fn test_completion_chunks() {
        let bytes = body(concat!(
            "data: {\"choices\":[{\"text\":\"Once\"}]}\n\n",
            "data: {\"choices\":[{\"text\":\" upon\",\"finish_reason\":\"length\"}]}\n\n",
            "data: [DONE]\n\n",
        ));
        let summary = deliver::<Completion, _>(bytes, 64, WAIT, |_| {}).await.unwrap();
        assert_eq!(summary.content, "Once upon");
        assert_eq!(summary.finish_reason, Some(FinishReason::Length));
    }
}
