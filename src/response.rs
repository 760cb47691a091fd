//! Turning one HTTP response into a [`Message`].
//!
//! Validation order is fixed: the HTTP status first, then the envelope error
//! shapes, then the `result` object. Streaming responses run the same
//! envelope checks, per frame, as the caller pulls fragments.

use crate::error::AgentError;
use crate::message::Message;
use crate::protocol::parse_envelope;
use crate::reduce::{reduce, reduce_stream};
use crate::stream::StreamDecoder;
use crate::transport::HttpResponse;
use crate::util::new_id;

/// Decode a response into a message.
///
/// With `streaming`, an event-stream body becomes a pending message and no
/// body bytes are read here. A JSON body is always decoded eagerly, so an
/// error envelope sent instead of a stream is still reported.
///
/// # Errors
///
/// - [`AgentError::Transport`] for any non-2xx status, before the body is parsed
/// - [`AgentError::Application`] for an error envelope
/// - [`AgentError::ProtocolDecode`] for a body that is not a valid envelope
/// - [`AgentError::StreamRead`] when the blocking body cannot be read
pub fn decode(response: HttpResponse, streaming: bool) -> Result<Message, AgentError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_else(|err| err.to_string());
        tracing::warn!(status = status.as_u16(), "non-success response status");
        return Err(AgentError::Transport {
            status: status.as_u16(),
            body,
        });
    }

    if streaming && !response.is_json() {
        let frames = StreamDecoder::new(response.into_body());
        return Ok(reduce_stream(new_id(), frames));
    }
    decode_blocking(response)
}

fn decode_blocking(response: HttpResponse) -> Result<Message, AgentError> {
    let raw = response.text()?;
    let envelope = parse_envelope(&raw)?;
    let Some(result) = envelope.result else {
        return Err(AgentError::protocol("envelope has no result", raw));
    };
    reduce(
        envelope.id.unwrap_or_else(new_id),
        result.conversation_id.unwrap_or_default(),
        result.answer.unwrap_or_default(),
        result.content.unwrap_or_default(),
    )
}
