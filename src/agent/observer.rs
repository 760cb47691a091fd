use crate::message::ToolCallRecord;
use crate::protocol::Event;

use super::TurnState;

/// Real-time hooks into a running turn. Every method defaults to a no-op.
pub trait TurnObserver {
    /// An answer fragment pulled from a streaming response.
    fn on_fragment(&mut self, _fragment: &str) {}

    /// A user-visible event, in arrival order.
    fn on_event(&mut self, _event: &Event) {}

    /// A local tool finished.
    fn on_tool_call(&mut self, _record: &ToolCallRecord) {}

    fn on_state(&mut self, _state: &TurnState) {}
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

/// Forwards every hook to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TurnObserver for TracingObserver {
    fn on_fragment(&mut self, fragment: &str) {
        tracing::debug!(len = fragment.len(), "answer fragment");
    }

    fn on_event(&mut self, event: &Event) {
        tracing::debug!(
            kind = ?event.kind(),
            status = ?event.status(),
            group = event.event_group_id(),
            "visible event"
        );
    }

    fn on_tool_call(&mut self, record: &ToolCallRecord) {
        tracing::debug!(tool = %record.name, "local tool finished");
    }

    fn on_state(&mut self, state: &TurnState) {
        tracing::debug!(state = ?state, "turn state");
    }
}
