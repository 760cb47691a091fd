//! Folding decoded records and frames into a [`Message`].

use serde_json::Value;

use crate::error::AgentError;
use crate::message::{Message, StreamChunk};
use crate::protocol::envelope::envelope_from_value;
use crate::protocol::{Event, EventRecord};

/// Decode wire records into events, preserving arrival order.
///
/// # Errors
///
/// Returns the first record that fails to decode.
pub fn decode_events(records: Vec<EventRecord>) -> Result<Vec<Event>, AgentError> {
    records.into_iter().map(Event::from_record).collect()
}

/// Build a resolved message from a blocking result.
///
/// # Errors
///
/// Returns [`AgentError::ProtocolDecode`] when an event record is malformed.
pub fn reduce(
    identifier: impl Into<String>,
    conversation_id: impl Into<String>,
    answer: impl Into<String>,
    records: Vec<EventRecord>,
) -> Result<Message, AgentError> {
    let events = decode_events(records)?;
    let mut message = Message::resolved(identifier, answer, conversation_id);
    message.push_events(events);
    Ok(message)
}

/// Build a pending message whose content is pulled from decoded SSE frames.
///
/// Every frame is validated as an envelope at the point it is pulled, so an
/// error frame surfaces from [`Message::fragments`] rather than here.
#[must_use]
pub fn reduce_stream<I>(identifier: impl Into<String>, frames: I) -> Message
where
    I: Iterator<Item = Result<Value, AgentError>> + Send + 'static,
{
    Message::pending(identifier, Box::new(FrameChunks::new(frames)))
}

/// Adapter from JSON frames to validated [`StreamChunk`]s.
///
/// Fused after the first error.
pub struct FrameChunks<I> {
    frames: Option<I>,
}

impl<I> FrameChunks<I>
where
    I: Iterator<Item = Result<Value, AgentError>>,
{
    #[must_use]
    pub fn new(frames: I) -> Self {
        Self {
            frames: Some(frames),
        }
    }
}

fn frame_to_chunk(frame: Value) -> Result<Option<StreamChunk>, AgentError> {
    let raw = frame.to_string();
    let envelope = envelope_from_value(frame, &raw)?;
    let Some(result) = envelope.result else {
        tracing::debug!(frame = %raw, "frame without result skipped");
        return Ok(None);
    };
    let events = decode_events(result.content.unwrap_or_default())?;
    Ok(Some(StreamChunk {
        id: envelope.id,
        answer: result.answer.filter(|answer| !answer.is_empty()),
        conversation_id: result.conversation_id,
        events,
    }))
}

impl<I> Iterator for FrameChunks<I>
where
    I: Iterator<Item = Result<Value, AgentError>>,
{
    type Item = Result<StreamChunk, AgentError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frames = self.frames.as_mut()?;
            let outcome = match frames.next() {
                Some(Ok(frame)) => frame_to_chunk(frame),
                Some(Err(err)) => Err(err),
                None => {
                    self.frames = None;
                    return None;
                }
            };
            match outcome {
                Ok(Some(chunk)) => return Some(Ok(chunk)),
                Ok(None) => continue,
                Err(err) => {
                    self.frames = None;
                    return Some(Err(err));
                }
            }
        }
    }
}
