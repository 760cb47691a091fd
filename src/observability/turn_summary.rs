use std::time::Duration;

use tracing::info;

/// Counters for one completed chat turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnSummary {
    pub conversation_id: String,
    pub rounds: usize,
    pub local_calls: usize,
    pub remote_calls: usize,
    pub visible_events: usize,
    pub answer_bytes: usize,
    pub hit_round_limit: bool,
}

impl TurnSummary {
    /// Tools used in any round.
    #[must_use]
    pub fn tool_calls(&self) -> usize {
        self.local_calls + self.remote_calls
    }
}

/// Log a completed turn at INFO level.
pub fn log_turn_summary(summary: &TurnSummary, duration: Duration) {
    info!(
        conversation_id = %summary.conversation_id,
        rounds = summary.rounds,
        local_calls = summary.local_calls,
        remote_calls = summary.remote_calls,
        tool_calls = summary.tool_calls(),
        visible_events = summary.visible_events,
        answer_bytes = summary.answer_bytes,
        round_limit = summary.hit_round_limit,
        duration_seconds = duration.as_secs_f64(),
        "turn completed"
    );
}
