use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;

/// A backend-executed tool enabled for the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinTool {
    pub agent_name: String,
    #[serde(default)]
    pub agent_config: Map<String, Value>,
}

impl BuiltinTool {
    #[must_use]
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            agent_config: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Streaming,
    Blocking,
}

impl ResponseMode {
    #[must_use]
    pub fn from_stream(stream: bool) -> Self {
        if stream {
            ResponseMode::Streaming
        } else {
            ResponseMode::Blocking
        }
    }
}

/// Result of one locally executed tool, echoed on the follow-up request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResultInput {
    pub name: String,
    pub arguments: Value,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestInputs {
    #[serde(rename = "function_call.user_instruction")]
    pub user_instruction: String,
    #[serde(rename = "function_call.builtin_tool_list")]
    pub builtin_tool_list: Vec<BuiltinTool>,
    #[serde(
        rename = "function_call.tool_results",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_results: Vec<ToolResultInput>,
    #[serde(
        rename = "function_call.used_tools",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub used_tools: Vec<Value>,
}

/// Body posted to the integrated function-call endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionCallRequest {
    pub query: String,
    pub response_mode: ResponseMode,
    pub conversation_id: String,
    pub user: String,
    pub inputs: RequestInputs,
    pub model_configs: Map<String, Value>,
}

impl FunctionCallRequest {
    /// Serialize to the JSON wire body.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ProtocolDecode`] if serialization fails.
    pub fn encode(&self) -> Result<Bytes, AgentError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|err| AgentError::protocol(format!("failed to encode request: {err}"), ""))
    }
}
