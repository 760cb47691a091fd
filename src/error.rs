use std::fmt;

use serde::{Deserialize, Serialize};

/// Boxed error returned by local tool implementations.
pub type ToolError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Application-level error code as reported inside a successful HTTP response.
///
/// The backend sends either numeric or symbolic codes; both are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Int(i64),
    Text(String),
}

impl ErrorCode {
    /// Build a code from an arbitrary JSON value. Non-integer numbers and
    /// other shapes fall back to their JSON text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| ErrorCode::Text(n.to_string()), ErrorCode::Int),
            serde_json::Value::String(s) => ErrorCode::Text(s.clone()),
            other => ErrorCode::Text(other.to_string()),
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        matches!(self, ErrorCode::Int(0))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Int(code) => write!(f, "{code}"),
            ErrorCode::Text(code) => f.write_str(code),
        }
    }
}

/// Error type shared by the decoder, reducer, transport and dispatch loop.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Transport error: status={status}, body={body}")]
    Transport { status: u16, body: String },
    #[error("Application error: code={code}, message={message}")]
    Application { code: ErrorCode, message: String },
    #[error("Protocol decode error: {reason} (raw: {raw})")]
    ProtocolDecode { reason: String, raw: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Stream read error: {0}")]
    StreamRead(String),
    #[error("Content stream was aborted after {partial_len} bytes")]
    StreamAborted { partial_len: usize },
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),
    #[error("Tool '{name}' failed: {source}")]
    Tool {
        name: String,
        #[source]
        source: ToolError,
    },
    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    pub(crate) fn protocol(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        AgentError::ProtocolDecode {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Whether the failure was reported by the backend inside a 2xx response.
    #[must_use]
    pub fn is_application(&self) -> bool {
        matches!(self, AgentError::Application { .. })
    }

    /// HTTP status carried by a transport failure, if any.
    #[must_use]
    pub fn transport_status(&self) -> Option<u16> {
        match self {
            AgentError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_code_from_json() {
        assert_eq!(ErrorCode::from_json(&json!(0)), ErrorCode::Int(0));
        assert_eq!(ErrorCode::from_json(&json!(-7)), ErrorCode::Int(-7));
        assert_eq!(
            ErrorCode::from_json(&json!("InvalidParam")),
            ErrorCode::Text("InvalidParam".to_string())
        );
        assert_eq!(
            ErrorCode::from_json(&json!(1.5)),
            ErrorCode::Text("1.5".to_string())
        );
    }

    #[test]
    fn test_error_code_zero_is_numeric_only() {
        assert!(ErrorCode::Int(0).is_zero());
        assert!(!ErrorCode::Text("0".to_string()).is_zero());
    }

    #[test]
    fn test_display_keeps_original_code_and_message() {
        let err = AgentError::Application {
            code: ErrorCode::Int(110),
            message: "Access token invalid".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Application error: code=110, message=Access token invalid"
        );
        assert!(err.is_application());
        assert_eq!(err.transport_status(), None);
    }

    #[test]
    fn test_display_transport() {
        let err = AgentError::Transport {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Transport error: status=502, body=bad gateway");
        assert_eq!(err.transport_status(), Some(502));
    }
}
