//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module handles parsing of the SSE stream returned by the chat
//! completion endpoint, converting raw byte streams into structured
//! [`ChatCompletionChunk`] objects.  The stream ends at the `[DONE]` marker or
//! when the underlying connection closes.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::types::ChatCompletionChunk;
use crate::{Error, Result};

/// Marker the server sends as the data of its final event.
const DONE_MARKER: &str = "[DONE]";

/// Process a stream of bytes into a stream of completion chunks.
///
/// Events are buffered as bytes so multi-byte characters split across network
/// reads are decoded intact.  Comment lines and events without data are
/// skipped.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let state = SseState {
        stream,
        buffer: Vec::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            if let Some(event) = take_event(&mut state.buffer) {
                match parse_event(&event) {
                    Some(Ok(Frame::Chunk(chunk))) => return Some((Ok(chunk), state)),
                    Some(Ok(Frame::Done)) => {
                        state.done = true;
                        return None;
                    }
                    Some(Err(e)) => return Some((Err(e), state)),
                    None => continue,
                }
            }

            match state.stream.next().await {
                Some(Ok(bytes)) => append_normalized(&mut state.buffer, &bytes),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    // A trailing event without its blank-line terminator.
                    if state.buffer.iter().all(u8::is_ascii_whitespace) {
                        return None;
                    }
                    let event = std::mem::take(&mut state.buffer);
                    return match parse_event(&event) {
                        Some(Ok(Frame::Chunk(chunk))) => Some((Ok(chunk), state)),
                        Some(Err(e)) => Some((Err(e), state)),
                        Some(Ok(Frame::Done)) | None => None,
                    };
                }
            }
        }
    })
}

struct SseState<S> {
    stream: S,
    buffer: Vec<u8>,
    done: bool,
}

enum Frame {
    Chunk(ChatCompletionChunk),
    Done,
}

/// Appends bytes to the buffer, dropping carriage returns so `\r\n\r\n`
/// delimits events the same way `\n\n` does.
fn append_normalized(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
}

/// Removes and returns the first complete event in the buffer.
fn take_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer.windows(2).position(|window| window == b"\n\n")?;
    let mut event: Vec<u8> = buffer.drain(..end + 2).collect();
    event.truncate(end);
    Some(event)
}

/// Parse one event.  Returns `None` for events that carry no data.
fn parse_event(event: &[u8]) -> Option<Result<Frame>> {
    let text = match std::str::from_utf8(event) {
        Ok(text) => text,
        Err(e) => return Some(Err(e.into())),
    };

    let mut data = String::new();
    for line in text.lines() {
        // Lines beginning with a colon are comments (keep-alives).
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data.is_empty() {
        return None;
    }
    if data.trim() == DONE_MARKER {
        return Some(Ok(Frame::Done));
    }
    if let Some(err) = stream_error(&data) {
        return Some(Err(err));
    }
    Some(
        serde_json::from_str::<ChatCompletionChunk>(&data)
            .map(Frame::Chunk)
            .map_err(|e| {
                Error::decode(
                    format!("Failed to parse event JSON: {e}"),
                    Some(Box::new(e)),
                )
            }),
    )
}

/// Errors reported in-band after the response headers were already sent.
fn stream_error(data: &str) -> Option<Error> {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
        param: Option<String>,
    }

    let envelope = serde_json::from_str::<ErrorEnvelope>(data).ok()?;
    let message = envelope
        .error
        .message
        .unwrap_or_else(|| "stream reported an error".to_string());
    match envelope.error.error_type.as_deref() {
        Some("invalid_request_error") => Some(Error::bad_request(message, envelope.error.param)),
        error_type => Some(Error::api(
            500,
            Some(error_type.unwrap_or("stream_error").to_string()),
            message,
            None,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunk_event(content: &str) -> String {
        format!(
            "data: {{\"id\":\"chatcmpl-1\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}}}}]}}\n\n",
            serde_json::to_string(content).unwrap()
        )
    }

    fn bytes_stream(
        parts: Vec<Vec<u8>>,
    ) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + Unpin + 'static {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from(p))))
    }

    async fn collect_contents(parts: Vec<Vec<u8>>) -> Vec<Result<Option<String>>> {
        let sse = Box::pin(process_sse(bytes_stream(parts)));
        sse.map(|r| r.map(|chunk| chunk.content().map(str::to_string)))
            .collect()
            .await
    }

    #[tokio::test]
    async fn parse_single_chunk() {
        let events = collect_contents(vec![chunk_event("Hello").into_bytes()]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn stops_at_done_marker() {
        let data = format!(
            "{}{}data: [DONE]\n\n{}",
            chunk_event("a"),
            chunk_event("b"),
            chunk_event("ignored")
        );
        let events = collect_contents(vec![data.into_bytes()]).await;
        let contents: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(contents, vec![Some("a".to_string()), Some("b".to_string())]);
    }

    #[tokio::test]
    async fn handle_split_event() {
        let event = chunk_event("split").into_bytes();
        let (first, second) = event.split_at(17);
        let events = collect_contents(vec![first.to_vec(), second.to_vec()]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().as_deref(), Some("split"));
    }

    #[tokio::test]
    async fn handle_split_multibyte_character() {
        let event = chunk_event("héllo").into_bytes();
        let e_acute = event.iter().position(|b| *b == 0xc3).unwrap();
        let (first, second) = event.split_at(e_acute + 1);
        let events = collect_contents(vec![first.to_vec(), second.to_vec()]).await;
        assert_eq!(events[0].as_ref().unwrap().as_deref(), Some("héllo"));
    }

    #[tokio::test]
    async fn handle_crlf_delimiters() {
        let data = chunk_event("crlf").replace('\n', "\r\n");
        let events = collect_contents(vec![data.into_bytes()]).await;
        assert_eq!(events[0].as_ref().unwrap().as_deref(), Some("crlf"));
    }

    #[tokio::test]
    async fn skips_comments() {
        let data = format!(": keep-alive\n\n{}", chunk_event("after"));
        let events = collect_contents(vec![data.into_bytes()]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn handle_malformed_event() {
        let events = collect_contents(vec![b"data: {not json}\n\n".to_vec()]).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
    }

    #[tokio::test]
    async fn in_band_error_is_bad_request() {
        let data = br#"data: {"error":{"type":"invalid_request_error","message":"too long","param":"messages"}}

"#;
        let events = collect_contents(vec![data.to_vec()]).await;
        let err = events[0].as_ref().unwrap_err();
        assert!(err.is_bad_request());
        assert!(err.to_string().contains("too long"));
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let parts: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from(chunk_event("partial"))),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            )),
            Ok(Bytes::from(chunk_event("never"))),
        ];
        let sse = Box::pin(process_sse(stream::iter(parts)));
        let events: Vec<_> = sse.collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(Error::Streaming { .. })));
    }

    #[tokio::test]
    async fn trailing_event_without_terminator() {
        let data = chunk_event("tail");
        let data = data.trim_end().to_string();
        let events = collect_contents(vec![data.into_bytes()]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().as_deref(), Some("tail"));
    }
}
