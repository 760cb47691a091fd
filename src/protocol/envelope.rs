//! Response envelope shared by blocking bodies and streaming frames.
//!
//! The backend reports logical failures inside 2xx responses using three
//! independent shapes; [`check_envelope`] rejects any of them before the
//! `result` object is looked at.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AgentError, ErrorCode};

use super::event::EventRecord;

/// The `result` object of a successful envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultBody {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub content: Option<Vec<EventRecord>>,
}

/// A validated envelope.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub id: Option<String>,
    pub result: Option<ResultBody>,
}

/// Reject envelopes that encode an application error.
///
/// Shapes, each fatal on its own:
/// 1. `code` present and not the integer `0`
/// 2. `code`, `message` and `requestId` all present
/// 3. `code`, `message` and `status` all present
///
/// # Errors
///
/// Returns [`AgentError::Application`] with the code and message as sent.
pub fn check_envelope(object: &Map<String, Value>) -> Result<(), AgentError> {
    let Some(code) = object.get("code").filter(|code| !code.is_null()) else {
        return Ok(());
    };
    let code = ErrorCode::from_json(code);
    let has_message = object.contains_key("message");

    let nonzero_code = !code.is_zero();
    let request_id_shape = has_message && object.contains_key("requestId");
    let status_shape = has_message && object.contains_key("status");

    if nonzero_code || request_id_shape || status_shape {
        let message = object
            .get("message")
            .map(|message| match message {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        tracing::warn!(code = %code, message = %message, "backend reported application error");
        return Err(AgentError::Application { code, message });
    }
    Ok(())
}

/// Parse raw body text into a validated [`Envelope`].
///
/// # Errors
///
/// Returns [`AgentError::ProtocolDecode`] when the text is not a JSON object
/// or the `result` object is malformed, and [`AgentError::Application`] when
/// [`check_envelope`] rejects it.
pub fn parse_envelope(raw: &str) -> Result<Envelope, AgentError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| AgentError::protocol(format!("body is not JSON: {err}"), raw))?;
    envelope_from_value(value, raw)
}

/// Validate an already-decoded JSON value as an [`Envelope`].
///
/// # Errors
///
/// See [`parse_envelope`].
pub fn envelope_from_value(value: Value, raw: &str) -> Result<Envelope, AgentError> {
    let Value::Object(mut object) = value else {
        return Err(AgentError::protocol("envelope is not a JSON object", raw));
    };
    check_envelope(&object)?;

    let id = match object.remove("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };
    let result = match object.remove("result") {
        None | Some(Value::Null) => None,
        Some(result) => Some(
            serde_json::from_value::<ResultBody>(result)
                .map_err(|err| AgentError::protocol(format!("malformed result: {err}"), raw))?,
        ),
    };
    Ok(Envelope { id, result })
}
