//! Line framing for the integrated endpoint's event stream.
//!
//! Bytes are split on `\n` before UTF-8 validation, so a multibyte character
//! cut by a chunk boundary is rejoined with the rest of its line. Only
//! `data:` carries payload; `event:`, `id:` and `retry:` are accepted and
//! ignored, comments are skipped. Any other non-empty line is reported as
//! [`SseItem::Bare`] so the decoder can decide what it means.

use std::collections::VecDeque;

use memchr::memchr_iter;

use crate::error::AgentError;

const IGNORED_FIELDS: [&str; 3] = ["event", "id", "retry"];

/// One unit recognised by [`FrameParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    /// `data:` lines of one frame, joined with `\n`.
    Data(String),
    /// A line that is not an event-stream field.
    Bare(String),
}

/// Incremental line parser over raw body bytes.
#[derive(Debug, Default)]
pub struct FrameParser {
    partial_line: Vec<u8>,
    data: Option<String>,
}

impl FrameParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one body chunk, appending every completed item to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ProtocolDecode`] for a line that is not UTF-8.
    pub fn push(&mut self, chunk: &[u8], out: &mut VecDeque<SseItem>) -> Result<(), AgentError> {
        let mut start = 0;
        for end in memchr_iter(b'\n', chunk) {
            if self.partial_line.is_empty() {
                self.line(&chunk[start..end], out)?;
            } else {
                self.partial_line.extend_from_slice(&chunk[start..end]);
                let line = std::mem::take(&mut self.partial_line);
                self.line(&line, out)?;
            }
            start = end + 1;
        }
        self.partial_line.extend_from_slice(&chunk[start..]);
        Ok(())
    }

    /// End of body: a trailing line without `\n` and a frame without its
    /// blank terminator are still emitted.
    ///
    /// # Errors
    ///
    /// See [`FrameParser::push`].
    pub fn finish(&mut self, out: &mut VecDeque<SseItem>) -> Result<(), AgentError> {
        if !self.partial_line.is_empty() {
            let line = std::mem::take(&mut self.partial_line);
            self.line(&line, out)?;
        }
        self.dispatch(out);
        Ok(())
    }

    fn line(&mut self, raw: &[u8], out: &mut VecDeque<SseItem>) -> Result<(), AgentError> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = std::str::from_utf8(raw).map_err(|err| {
            AgentError::protocol(
                format!("stream line is not valid UTF-8: {err}"),
                String::from_utf8_lossy(raw),
            )
        })?;

        if line.is_empty() {
            self.dispatch(out);
        } else if line.starts_with(':') {
            // comment / keep-alive
        } else if let Some(value) = field_value(line, "data") {
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        } else if !IGNORED_FIELDS
            .iter()
            .any(|name| field_value(line, name).is_some())
        {
            out.push_back(SseItem::Bare(line.to_string()));
        }
        Ok(())
    }

    fn dispatch(&mut self, out: &mut VecDeque<SseItem>) {
        if let Some(data) = self.data.take() {
            out.push_back(SseItem::Data(data));
        }
    }
}

/// Value of `name:` with one leading space stripped.
fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

/// Whether a frame payload is the terminal `[DONE]` marker.
#[must_use]
pub fn is_done(data: &str) -> bool {
    data.trim() == "[DONE]"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(chunks: &[&[u8]]) -> Vec<SseItem> {
        let mut parser = FrameParser::new();
        let mut out = VecDeque::new();
        for chunk in chunks {
            parser.push(chunk, &mut out).unwrap();
        }
        parser.finish(&mut out).unwrap();
        out.into()
    }

    fn data(text: &str) -> SseItem {
        SseItem::Data(text.to_string())
    }

    #[test]
    fn test_data_lines_join_into_one_frame() {
        let items = parse(&[b"data: line1\ndata:line2\n\ndata: next\n\n"]);
        assert_eq!(items, vec![data("line1\nline2"), data("next")]);
    }

    #[test]
    fn test_comments_crlf_and_ignored_fields() {
        let items = parse(&[
            b": ping\r\n\r\n",
            b"event: message\r\nid: 7\r\nretry: 50\r\ndata: hi\r\n\r\n",
        ]);
        assert_eq!(items, vec![data("hi")]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let text = "data: 秦始皇\n\n".as_bytes();
        let items = parse(&[&text[..7], &text[7..9], &text[9..]]);
        assert_eq!(items, vec![data("秦始皇")]);
    }

    #[test]
    fn test_non_field_lines_are_reported() {
        let items = parse(&[b"{\"code\":17,\n\"message\":\"quota\"}"]);
        assert_eq!(
            items,
            vec![
                SseItem::Bare("{\"code\":17,".to_string()),
                SseItem::Bare("\"message\":\"quota\"}".to_string()),
            ]
        );
    }

    #[test]
    fn test_finish_flushes_unterminated_frame_once() {
        let mut parser = FrameParser::new();
        let mut out = VecDeque::new();
        parser.push(b"data: tail", &mut out).unwrap();
        assert!(out.is_empty());
        parser.finish(&mut out).unwrap();
        assert_eq!(out.pop_front(), Some(data("tail")));
        parser.finish(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_invalid_utf8_line_is_rejected() {
        let mut parser = FrameParser::new();
        let mut out = VecDeque::new();
        let err = parser.push(b"data: \xff\xfe\n", &mut out).unwrap_err();
        assert!(matches!(err, AgentError::ProtocolDecode { .. }));
    }

    #[test]
    fn test_done_marker() {
        assert!(is_done(" [DONE] "));
        assert!(!is_done("{\"done\":true}"));
    }
}
