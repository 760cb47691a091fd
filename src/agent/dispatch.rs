//! Scanning a reduced turn's events and running local tools.

use serde_json::Value;

use crate::error::AgentError;
use crate::message::ToolCallRecord;
use crate::protocol::{Event, EventOrigin, EventPayload, FunctionCall, ToolResultInput};

use super::observer::TurnObserver;
use super::registry::ToolRegistry;

/// What the loop does with one event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventRole<'a> {
    /// Run the named tool here.
    LocalCall(&'a FunctionCall),
    /// A tool the backend already ran; recorded as used.
    RemoteResult,
    /// Shown to the user, nothing else.
    Visible,
}

#[must_use]
pub fn classify(event: &Event) -> EventRole<'_> {
    match (event.origin(), event.payload()) {
        (EventOrigin::LocalFunctionCall, EventPayload::FunctionCall(call)) => {
            EventRole::LocalCall(call)
        }
        (EventOrigin::LocalFunctionCall, _) => {
            tracing::warn!(
                kind = ?event.kind(),
                "local function call event without a function_call payload"
            );
            EventRole::Visible
        }
        (EventOrigin::RemoteFunctionCall, _) => EventRole::RemoteResult,
        _ => EventRole::Visible,
    }
}

/// Everything one dispatching pass produced.
#[derive(Debug, Default, Clone)]
pub struct RoundDispatch {
    pub tool_calls: Vec<ToolCallRecord>,
    pub remote_events: Vec<Event>,
    pub visible_events: Vec<Event>,
}

impl RoundDispatch {
    /// Whether any local or remote tool was used, i.e. whether to continue.
    #[must_use]
    pub fn used_tools(&self) -> bool {
        !self.tool_calls.is_empty() || !self.remote_events.is_empty()
    }

    /// Local results in the follow-up request's shape.
    #[must_use]
    pub fn tool_results(&self) -> Vec<ToolResultInput> {
        self.tool_calls
            .iter()
            .filter_map(|record| {
                record.result.as_ref().map(|result| ToolResultInput {
                    name: record.name.clone(),
                    arguments: record.arguments.clone(),
                    result: result.clone(),
                })
            })
            .collect()
    }

    /// Remote tool payloads for the follow-up request.
    #[must_use]
    pub fn used_tools_payload(&self) -> Vec<Value> {
        self.remote_events.iter().map(Event::payload_json).collect()
    }
}

/// Walk `events` in order, running local tool calls synchronously.
///
/// # Errors
///
/// Stops at the first unknown tool ([`AgentError::UnknownTool`]) or failing
/// tool ([`AgentError::Tool`]); later events are not looked at.
pub fn dispatch_events(
    events: &[Event],
    registry: &ToolRegistry,
    observer: &mut dyn TurnObserver,
) -> Result<RoundDispatch, AgentError> {
    let mut round = RoundDispatch::default();
    for event in events {
        match classify(event) {
            EventRole::LocalCall(call) => {
                let record = execute(call, registry)?;
                observer.on_tool_call(&record);
                round.tool_calls.push(record);
            }
            EventRole::RemoteResult => round.remote_events.push(event.clone()),
            EventRole::Visible => {
                observer.on_event(event);
                round.visible_events.push(event.clone());
            }
        }
    }
    Ok(round)
}

fn execute(call: &FunctionCall, registry: &ToolRegistry) -> Result<ToolCallRecord, AgentError> {
    let tool = registry.get(&call.name).inspect_err(|_| {
        tracing::warn!(tool = %call.name, known = ?registry.names(), "unknown local tool");
    })?;
    tracing::debug!(tool = %call.name, "executing local tool");
    let result = tool.call(&call.arguments).map_err(|source| AgentError::Tool {
        name: call.name.clone(),
        source,
    })?;
    Ok(ToolCallRecord {
        name: call.name.clone(),
        arguments: call.arguments.clone(),
        result: Some(result),
    })
}
