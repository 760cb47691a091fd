pub mod sse;

pub use sse::{is_done, FrameParser, SseItem};

use std::collections::VecDeque;
use std::io;

use bytes::Bytes;
use serde_json::Value;

use crate::error::AgentError;

enum FrameOutcome {
    Skip,
    Done,
    Json(Value),
}

fn decode_frame(data: &str) -> Result<FrameOutcome, AgentError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(FrameOutcome::Skip);
    }
    if is_done(data) {
        return Ok(FrameOutcome::Done);
    }
    serde_json::from_str(data)
        .map(FrameOutcome::Json)
        .map_err(|err| AgentError::protocol(format!("malformed frame body: {err}"), data))
}

/// Lazy, single-pass decoder from a body of byte chunks to one JSON value
/// per SSE frame.
///
/// Empty and comment-only frames are skipped. A body with no event-stream
/// fields at all is decoded as a single JSON value, so a plain envelope sent
/// in place of a stream still reaches envelope validation. A malformed frame,
/// a stray line among frames, invalid UTF-8 or a read failure yields one
/// error and ends the sequence; the byte source is dropped at that point so
/// the connection is released.
pub struct StreamDecoder<I> {
    source: Option<I>,
    parser: FrameParser,
    ready: VecDeque<SseItem>,
    bare_body: String,
    framed: bool,
}

impl<I> StreamDecoder<I>
where
    I: Iterator<Item = io::Result<Bytes>>,
{
    #[must_use]
    pub fn new(source: I) -> Self {
        Self {
            source: Some(source),
            parser: FrameParser::new(),
            ready: VecDeque::with_capacity(4),
            bare_body: String::new(),
            framed: false,
        }
    }

    /// Whether the byte source is still attached.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    fn close(&mut self) {
        self.source = None;
        self.ready.clear();
        self.bare_body.clear();
    }

    fn fail(&mut self, err: AgentError) -> Option<Result<Value, AgentError>> {
        self.close();
        Some(Err(err))
    }

    /// Called once the source is exhausted and every item was handed out.
    fn take_bare_body(&mut self) -> Option<Result<Value, AgentError>> {
        if self.bare_body.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.bare_body);
        Some(serde_json::from_str(&raw).map_err(|err| {
            AgentError::protocol(format!("body is neither event frames nor JSON: {err}"), raw)
        }))
    }
}

impl<I> Iterator for StreamDecoder<I>
where
    I: Iterator<Item = io::Result<Bytes>>,
{
    type Item = Result<Value, AgentError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.ready.pop_front() {
                Some(SseItem::Data(data)) => {
                    if !self.bare_body.is_empty() {
                        let raw = std::mem::take(&mut self.bare_body);
                        return self.fail(AgentError::protocol("non-event line before frame", raw));
                    }
                    self.framed = true;
                    match decode_frame(&data) {
                        Ok(FrameOutcome::Skip) => continue,
                        Ok(FrameOutcome::Done) => {
                            self.close();
                            return None;
                        }
                        Ok(FrameOutcome::Json(value)) => return Some(Ok(value)),
                        Err(err) => return self.fail(err),
                    }
                }
                Some(SseItem::Bare(line)) => {
                    if self.framed {
                        return self.fail(AgentError::protocol("non-event line in stream", line));
                    }
                    if !self.bare_body.is_empty() {
                        self.bare_body.push('\n');
                    }
                    self.bare_body.push_str(&line);
                    continue;
                }
                None => {}
            }

            let Some(source) = self.source.as_mut() else {
                return self.take_bare_body();
            };
            let step = match source.next() {
                Some(Ok(bytes)) => self.parser.push(&bytes, &mut self.ready),
                Some(Err(err)) => return self.fail(AgentError::StreamRead(err.to_string())),
                None => {
                    self.source = None;
                    self.parser.finish(&mut self.ready)
                }
            };
            if let Err(err) = step {
                return self.fail(err);
            }
        }
    }
}

impl<I> std::iter::FusedIterator for StreamDecoder<I> where I: Iterator<Item = io::Result<Bytes>> {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunks(parts: &[&str]) -> impl Iterator<Item = io::Result<Bytes>> {
        parts
            .iter()
            .map(|part| Ok(Bytes::copy_from_slice(part.as_bytes())))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_decodes_frames_across_chunk_boundaries() {
        let decoder = StreamDecoder::new(chunks(&[
            "data: {\"a\":",
            "1}\n\n: keep-alive\n\ndata: ",
            "{\"a\":2}\n\n",
        ]));
        let values: Vec<_> = decoder.map(Result::unwrap).collect();
        assert_eq!(values, vec![json!({ "a": 1 }), json!({ "a": 2 })]);
    }

    #[test]
    fn test_skips_empty_frames_and_stops_at_done() {
        let decoder = StreamDecoder::new(chunks(&[
            "data:\n\ndata: {\"n\":1}\n\ndata: [DONE]\n\ndata: {\"n\":2}\n\n",
        ]));
        let values: Vec<_> = decoder.map(Result::unwrap).collect();
        assert_eq!(values, vec![json!({ "n": 1 })]);
    }

    #[test]
    fn test_malformed_frame_ends_stream_with_raw_text() {
        let mut decoder = StreamDecoder::new(chunks(&[
            "data: {\"ok\":true}\n\ndata: {broken\n\ndata: {\"late\":1}\n\n",
        ]));
        assert_eq!(decoder.next().unwrap().unwrap(), json!({ "ok": true }));
        match decoder.next().unwrap().unwrap_err() {
            AgentError::ProtocolDecode { raw, .. } => assert_eq!(raw, "{broken"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(decoder.next().is_none());
        assert!(!decoder.is_open());
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let text = "data: {\"answer\":\"秦\"}\n\n".as_bytes();
        let split = text.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let source = vec![
            Ok(Bytes::copy_from_slice(&text[..split])),
            Ok(Bytes::copy_from_slice(&text[split..])),
        ];
        let decoder = StreamDecoder::new(source.into_iter());
        let values: Vec<_> = decoder.map(Result::unwrap).collect();
        assert_eq!(values, vec![json!({ "answer": "秦" })]);
    }

    #[test]
    fn test_unterminated_last_frame_is_flushed() {
        let decoder = StreamDecoder::new(chunks(&["data: {\"last\":true}"]));
        let values: Vec<_> = decoder.map(Result::unwrap).collect();
        assert_eq!(values, vec![json!({ "last": true })]);
    }

    #[test]
    fn test_read_error_surfaces_as_stream_read() {
        let source = vec![
            Ok(Bytes::from_static(b"data: {\"a\":1}\n\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ]
        .into_iter();
        let mut decoder = StreamDecoder::new(source);
        assert!(decoder.next().unwrap().is_ok());
        assert!(matches!(
            decoder.next().unwrap(),
            Err(AgentError::StreamRead(_))
        ));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_second_pass_yields_nothing() {
        let mut decoder = StreamDecoder::new(chunks(&["data: {\"a\":1}\n\n"]));
        assert_eq!(decoder.by_ref().count(), 1);
        assert_eq!(decoder.by_ref().count(), 0);
    }

    #[test]
    fn test_body_without_fields_is_one_json_value() {
        let decoder = StreamDecoder::new(chunks(&[
            "{\"code\":17,\n",
            "\"message\":\"quota exceeded\"}",
        ]));
        let values: Vec<_> = decoder.map(Result::unwrap).collect();
        assert_eq!(values, vec![json!({ "code": 17, "message": "quota exceeded" })]);
    }

    #[test]
    fn test_body_without_fields_must_be_json() {
        let mut decoder = StreamDecoder::new(chunks(&["<html>busy</html>\n"]));
        match decoder.next().unwrap().unwrap_err() {
            AgentError::ProtocolDecode { raw, .. } => assert_eq!(raw, "<html>busy</html>"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_stray_line_after_frame_is_an_error() {
        let mut decoder = StreamDecoder::new(chunks(&[
            "data: {\"a\":1}\n\noops\n\ndata: {\"a\":2}\n\n",
        ]));
        assert_eq!(decoder.next().unwrap().unwrap(), json!({ "a": 1 }));
        match decoder.next().unwrap().unwrap_err() {
            AgentError::ProtocolDecode { raw, .. } => assert_eq!(raw, "oops"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(decoder.next().is_none());
    }

    #[test]
    fn test_stray_line_before_frame_is_an_error() {
        let mut decoder = StreamDecoder::new(chunks(&["garbage\ndata: {\"a\":1}\n\n"]));
        assert!(matches!(
            decoder.next().unwrap(),
            Err(AgentError::ProtocolDecode { .. })
        ));
        assert!(decoder.next().is_none());
    }
}
