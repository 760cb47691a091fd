pub mod envelope;
pub mod event;
pub mod request;

pub use envelope::{check_envelope, parse_envelope, Envelope, ResultBody};
pub use event::{
    citation_source, Event, EventKind, EventOrigin, EventPayload, EventRecord, EventStatus,
    FunctionCall,
};
pub use request::{BuiltinTool, FunctionCallRequest, RequestInputs, ResponseMode, ToolResultInput};
