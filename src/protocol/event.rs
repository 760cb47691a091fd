use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;

/// How an event's payload must be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Text,
    FunctionCall,
    Code,
    Files,
    Urls,
    References,
    Image,
    Audio,
    Video,
    Json,
    Status,
}

impl EventKind {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "text" => EventKind::Text,
            "function_call" => EventKind::FunctionCall,
            "code" => EventKind::Code,
            "files" => EventKind::Files,
            "urls" => EventKind::Urls,
            "references" => EventKind::References,
            "image" => EventKind::Image,
            "audio" => EventKind::Audio,
            "video" => EventKind::Video,
            "json" => EventKind::Json,
            "status" => EventKind::Status,
            _ => return None,
        })
    }
}

/// Lifecycle of a single event, independent of its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Running,
    Done,
    Preparing,
    Error,
    Success,
}

impl EventStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "running" => EventStatus::Running,
            "done" => EventStatus::Done,
            "preparing" => EventStatus::Preparing,
            "error" => EventStatus::Error,
            "success" => EventStatus::Success,
            _ => return None,
        })
    }
}

/// Function-call phase reported in the record's `event` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventOrigin {
    LocalFunctionCall,
    LocalFunctionCallResults,
    /// Remote invocation and remote result share one wire name.
    RemoteFunctionCall,
    FunctionCallCompleted,
    Unspecified,
    Other(String),
}

impl EventOrigin {
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => EventOrigin::Unspecified,
            Some("local_function_call") => EventOrigin::LocalFunctionCall,
            Some("local_function_call_results") => EventOrigin::LocalFunctionCallResults,
            Some("remote_function_call") => EventOrigin::RemoteFunctionCall,
            Some("function_call_completed") => EventOrigin::FunctionCallCompleted,
            Some(other) => EventOrigin::Other(other.to_string()),
        }
    }
}

/// A tool invocation requested by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Decoded payload, shaped by [`EventKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// text, code and status events.
    Text(String),
    FunctionCall(FunctionCall),
    /// files and urls events.
    Urls(Vec<String>),
    /// Citation objects, each carrying a `source` key.
    References(Vec<Value>),
    /// image, audio and video events.
    Url(String),
    Json(Value),
}

/// One event record as it appears in `result.content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub text: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_status: Option<String>,
    #[serde(default)]
    pub event_id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_message: Option<String>,
}

/// One server-reported happening within an assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    status: EventStatus,
    event_group_id: String,
    origin: EventOrigin,
    message: Option<String>,
    payload: EventPayload,
}

impl Event {
    #[must_use]
    pub fn new(
        kind: EventKind,
        status: EventStatus,
        event_group_id: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            kind,
            status,
            event_group_id: event_group_id.into(),
            origin: EventOrigin::Unspecified,
            message: None,
            payload,
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Build an event from its wire record.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ProtocolDecode`] when the kind or status is not
    /// recognised or the payload does not fit the kind.
    pub fn from_record(record: EventRecord) -> Result<Self, AgentError> {
        let kind = match record.event_type.as_deref() {
            None | Some("") => EventKind::Text,
            Some(raw) => EventKind::parse(raw)
                .ok_or_else(|| record_error(&record, format!("unknown event_type '{raw}'")))?,
        };
        let status = match record.event_status.as_deref() {
            None | Some("") => EventStatus::Done,
            Some(raw) => EventStatus::parse(raw)
                .ok_or_else(|| record_error(&record, format!("unknown event_status '{raw}'")))?,
        };
        let payload = decode_payload(kind, &record.text)
            .map_err(|reason| record_error(&record, reason))?;

        Ok(Self {
            kind,
            status,
            event_group_id: opaque_id(&record.event_id),
            origin: EventOrigin::parse(record.event.as_deref()),
            message: record.event_message.filter(|m| !m.is_empty()),
            payload,
        })
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[must_use]
    pub fn status(&self) -> EventStatus {
        self.status
    }

    #[must_use]
    pub fn event_group_id(&self) -> &str {
        &self.event_group_id
    }

    #[must_use]
    pub fn origin(&self) -> &EventOrigin {
        &self.origin
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Citation objects carried by a `references` event.
    #[must_use]
    pub fn citations(&self) -> &[Value] {
        match &self.payload {
            EventPayload::References(items) => items,
            _ => &[],
        }
    }

    /// Payload rendered back to JSON, used when echoing remote tool usage.
    #[must_use]
    pub fn payload_json(&self) -> Value {
        match &self.payload {
            EventPayload::Text(text) | EventPayload::Url(text) => Value::String(text.clone()),
            EventPayload::FunctionCall(call) => {
                serde_json::json!({ "name": call.name, "arguments": call.arguments })
            }
            EventPayload::Urls(urls) => {
                Value::Array(urls.iter().cloned().map(Value::String).collect())
            }
            EventPayload::References(items) => Value::Array(items.clone()),
            EventPayload::Json(value) => value.clone(),
        }
    }
}

/// Key used to group a citation object in [`crate::message::Citations`].
#[must_use]
pub fn citation_source(citation: &Value) -> &str {
    citation
        .get("source")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn record_error(record: &EventRecord, reason: String) -> AgentError {
    let raw = serde_json::to_string(record).unwrap_or_default();
    AgentError::protocol(reason, raw)
}

fn opaque_id(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decode_payload(kind: EventKind, text: &Value) -> Result<EventPayload, String> {
    match kind {
        EventKind::Text | EventKind::Code | EventKind::Status => {
            Ok(EventPayload::Text(coerce_text(text)))
        }
        EventKind::FunctionCall => decode_function_call(text).map(EventPayload::FunctionCall),
        EventKind::Files | EventKind::Urls => decode_urls(text).map(EventPayload::Urls),
        EventKind::References => decode_references(text).map(EventPayload::References),
        EventKind::Image | EventKind::Audio | EventKind::Video => match text {
            Value::String(url) => Ok(EventPayload::Url(url.clone())),
            Value::Object(map) => map
                .get("url")
                .and_then(Value::as_str)
                .map(|url| EventPayload::Url(url.to_string()))
                .ok_or_else(|| "media payload has no url".to_string()),
            _ => Err(format!("{kind:?} payload must be a URL string")),
        },
        EventKind::Json => Ok(EventPayload::Json(text.clone())),
    }
}

fn coerce_text(text: &Value) -> String {
    match text {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decode_function_call(text: &Value) -> Result<FunctionCall, String> {
    let parsed;
    let object = match text {
        Value::Object(map) => map,
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw)
                .map_err(|err| format!("function_call payload is not JSON: {err}"))?;
            parsed
                .as_object()
                .ok_or_else(|| "function_call payload must be an object".to_string())?
        }
        _ => return Err("function_call payload must be an object".to_string()),
    };

    let name = object
        .get("name")
        .or_else(|| object.get("func"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| "function_call payload has no name".to_string())?;

    let arguments = match object.get("arguments") {
        // Some backends double-encode arguments as a JSON string.
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        Some(value) => value.clone(),
        None => Value::Object(serde_json::Map::new()),
    };

    Ok(FunctionCall {
        name: name.to_string(),
        arguments,
    })
}

fn decode_urls(text: &Value) -> Result<Vec<String>, String> {
    match text {
        Value::Null => Ok(Vec::new()),
        Value::String(url) => Ok(vec![url.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "url list must contain strings".to_string())
            })
            .collect(),
        _ => Err("url payload must be a string or list of strings".to_string()),
    }
}

fn decode_references(text: &Value) -> Result<Vec<Value>, String> {
    match text {
        Value::Null => Ok(Vec::new()),
        Value::Object(_) => Ok(vec![text.clone()]),
        Value::Array(items) => {
            if items.iter().all(Value::is_object) {
                Ok(items.clone())
            } else {
                Err("references must be citation objects".to_string())
            }
        }
        Value::String(raw) => {
            let parsed: Value = serde_json::from_str(raw)
                .map_err(|err| format!("references payload is not JSON: {err}"))?;
            if parsed.is_string() {
                return Err("references payload must be an object or list".to_string());
            }
            decode_references(&parsed)
        }
        _ => Err("references payload must be an object or list".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> EventRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_record_defaults() {
        let event = Event::from_record(record(json!({ "text": "hello" }))).unwrap();
        assert_eq!(event.kind(), EventKind::Text);
        assert_eq!(event.status(), EventStatus::Done);
        assert_eq!(event.event_group_id(), "");
        assert_eq!(event.origin(), &EventOrigin::Unspecified);
        assert_eq!(event.payload(), &EventPayload::Text("hello".to_string()));
    }

    #[test]
    fn test_integer_event_id_is_opaque_string() {
        let event = Event::from_record(record(json!({
            "event_type": "code",
            "event_status": "running",
            "event_id": 3,
            "text": "print(1)"
        })))
        .unwrap();
        assert_eq!(event.event_group_id(), "3");
        assert_eq!(event.status(), EventStatus::Running);
    }

    #[test]
    fn test_function_call_object_and_func_alias() {
        let event = Event::from_record(record(json!({
            "event": "local_function_call",
            "event_type": "function_call",
            "text": { "func": "get_weather", "arguments": { "city": "SF" } }
        })))
        .unwrap();
        assert_eq!(event.origin(), &EventOrigin::LocalFunctionCall);
        let EventPayload::FunctionCall(call) = event.payload() else {
            panic!("expected function call payload");
        };
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.arguments, json!({ "city": "SF" }));
    }

    #[test]
    fn test_function_call_string_payload_with_string_arguments() {
        let event = Event::from_record(record(json!({
            "event_type": "function_call",
            "text": "{\"name\":\"add\",\"arguments\":\"{\\\"a\\\":1}\"}"
        })))
        .unwrap();
        let EventPayload::FunctionCall(call) = event.payload() else {
            panic!("expected function call payload");
        };
        assert_eq!(call.name, "add");
        assert_eq!(call.arguments, json!({ "a": 1 }));
    }

    #[test]
    fn test_function_call_without_name_is_error() {
        let err = Event::from_record(record(json!({
            "event_type": "function_call",
            "text": { "arguments": {} }
        })))
        .unwrap_err();
        match err {
            AgentError::ProtocolDecode { reason, raw } => {
                assert!(reason.contains("no name"));
                assert!(raw.contains("function_call"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_is_error() {
        let err = Event::from_record(record(json!({ "event_type": "hologram" }))).unwrap_err();
        assert!(matches!(err, AgentError::ProtocolDecode { .. }));
    }

    #[test]
    fn test_references_single_object_and_list() {
        let single = Event::from_record(record(json!({
            "event_type": "references",
            "text": { "source": "web", "title": "a" }
        })))
        .unwrap();
        assert_eq!(single.citations().len(), 1);

        let list = Event::from_record(record(json!({
            "event_type": "references",
            "text": [{ "source": "web" }, { "source": "kb" }]
        })))
        .unwrap();
        let sources: Vec<_> = list.citations().iter().map(citation_source).collect();
        assert_eq!(sources, vec!["web", "kb"]);
    }

    #[test]
    fn test_references_reject_scalars() {
        let err = Event::from_record(record(json!({
            "event_type": "references",
            "text": [1, 2]
        })))
        .unwrap_err();
        assert!(matches!(err, AgentError::ProtocolDecode { .. }));
    }

    #[test]
    fn test_urls_and_media() {
        let files = Event::from_record(record(json!({
            "event_type": "files",
            "text": ["http://a/1.pdf", "http://a/2.pdf"]
        })))
        .unwrap();
        assert_eq!(
            files.payload(),
            &EventPayload::Urls(vec!["http://a/1.pdf".into(), "http://a/2.pdf".into()])
        );

        let image = Event::from_record(record(json!({
            "event_type": "image",
            "text": "http://a/cat.png"
        })))
        .unwrap();
        assert_eq!(image.payload(), &EventPayload::Url("http://a/cat.png".into()));
    }

    #[test]
    fn test_citation_source_missing_is_empty_key() {
        assert_eq!(citation_source(&json!({ "title": "x" })), "");
        assert_eq!(citation_source(&json!({ "source": "kb" })), "kb");
    }
}
