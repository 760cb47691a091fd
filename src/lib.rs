pub mod agent;
pub mod auth;
pub mod config;
pub mod error;
pub mod message;
pub mod observability;
pub mod protocol;
pub mod reduce;
pub mod response;
pub mod stream;
pub mod transport;

mod util;

pub use agent::{
    ChatOutcome, ChatRequest, FunctionCallAgent, LocalTool, ToolRegistry, TurnObserver, TurnStop,
};
pub use error::{AgentError, ErrorCode, ToolError};
pub use message::{Citations, Message, MessageContent, ToolCallRecord};
