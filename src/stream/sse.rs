//! Incremental decoder for `text/event-stream` bodies.
//!
//! Events are separated by a blank line; every `data:` line of an event is
//! part of its payload. `event:`, `id:` and `retry:` fields and `:` comments
//! carry nothing the run stream needs and are skipped.

use std::collections::VecDeque;

use futures::{Stream, StreamExt};

use crate::{FlowdeckError, stream::FrameStream};

/// Turns arbitrary byte chunks into complete event payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the payloads of all events it completed.
    pub fn feed(
        &mut self,
        chunk: &[u8],
    ) -> Vec<String> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            // a chunk may split a multi-byte character, so decode whole events only
            if let Some(data) = event_data(&String::from_utf8_lossy(&block[..pos])) {
                events.push(data);
            }
        }
        events
    }

    /// Payload of a trailing event the server closed without a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let block = std::mem::take(&mut self.buffer);
        event_data(&String::from_utf8_lossy(&block))
    }
}

fn event_data(block: &str) -> Option<String> {
    let lines: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}

/// Decodes a byte stream into a stream of event payloads.
///
/// A byte-level error is yielded once and ends the stream.
pub fn decode_events<S, B, E>(bytes: S) -> FrameStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<FlowdeckError> + Send + 'static,
{
    let state = (Box::pin(bytes), SseDecoder::new(), VecDeque::new(), false);
    let events = futures::stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut done)| async move {
        loop {
            if let Some(event) = pending.pop_front() {
                return Some((Ok(event), (bytes, decoder, pending, done)));
            }
            if done {
                return None;
            }
            match bytes.next().await {
                Some(Ok(chunk)) => pending.extend(decoder.feed(chunk.as_ref())),
                Some(Err(err)) => {
                    done = true;
                    return Some((Err(err.into()), (bytes, decoder, pending, done)));
                }
                None => {
                    done = true;
                    pending.extend(decoder.finish());
                }
            }
        }
    });
    Box::pin(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":").is_empty());
        assert_eq!(decoder.feed(b"\"ping\"}\n\ndata: next\n"), vec![r#"{"type":"ping"}"#.to_string()]);
        assert_eq!(decoder.feed(b"\n"), vec!["next".to_string()]);
    }

    #[test]
    fn test_crlf_comments_and_multiline() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\r\n\r\nevent: message\r\ndata: line one\r\ndata:line two\r\n\r\n");
        assert_eq!(events, vec!["line one\nline two".to_string()]);
    }

    #[test]
    fn test_multibyte_split() {
        let text = "data: héllo\n\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(&text[..split]).is_empty());
        assert_eq!(decoder.feed(&text[split..]), vec!["héllo".to_string()]);
    }

    #[tokio::test]
    async fn test_decode_events() {
        let chunks: Vec<Result<Vec<u8>, FlowdeckError>> = vec![
            Ok(b"data: one\n\nda".to_vec()),
            Ok(b"ta: two\n\ndata: three".to_vec()),
            Err(FlowdeckError::Transport("reset".to_string())),
        ];
        let events: Vec<_> = decode_events(futures::stream::iter(chunks)).collect().await;
        assert_eq!(
            events,
            vec![Ok("one".to_string()), Ok("two".to_string()), Err(FlowdeckError::Transport("reset".to_string()))]
        );

        let chunks: Vec<Result<&'static [u8], FlowdeckError>> = vec![Ok(b"data: tail".as_slice())];
        let events: Vec<_> = decode_events(futures::stream::iter(chunks)).collect().await;
        assert_eq!(events, vec![Ok("tail".to_string())]);
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"data: tail");
        assert_eq!(decoder.finish(), Some("tail".to_string()));
        assert_eq!(decoder.finish(), None);
    }
}
