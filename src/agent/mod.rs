//! The function-call chat loop.
//!
//! One [`FunctionCallAgent::chat`] call is one turn: it posts the query, reduces
//! the answer, runs any local tools the backend asked for and re-posts with
//! their results until a round uses no tools or the round limit is hit.

pub mod context;
pub mod dispatch;
pub mod observer;
pub mod registry;

pub use context::{ContextInitializer, NoopContext};
pub use dispatch::{classify, dispatch_events, EventRole, RoundDispatch};
pub use observer::{NoopObserver, TracingObserver, TurnObserver};
pub use registry::{LocalTool, ToolRegistry};

use std::time::Instant;

use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::error::AgentError;
use crate::message::{Message, ToolCallRecord};
use crate::observability::{log_turn_complete, TurnSummary};
use crate::protocol::{
    BuiltinTool, Event, FunctionCallRequest, RequestInputs, ResponseMode, ToolResultInput,
};
use crate::response::decode;
use crate::transport::Transport;
use crate::util::new_id;

/// Why a turn stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStop {
    /// The last round used no tools.
    Completed,
    /// Tools were still being used when `max_rounds` ran out.
    RoundLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Requesting,
    AwaitingResponse,
    Reducing,
    Dispatching,
    Completed(TurnStop),
}

/// Per-agent defaults applied to every turn.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub user_id: String,
    pub instruction: String,
    pub builtin_tools: Vec<BuiltinTool>,
    pub model_configs: Map<String, Value>,
    pub max_rounds: usize,
    pub integrated_path: String,
}

impl AgentSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            user_id: config.agent.user_id.clone(),
            instruction: config.agent.instruction.clone(),
            builtin_tools: config.agent.builtin_tools.clone(),
            model_configs: config.agent.model_configs.clone(),
            max_rounds: config.agent.max_rounds,
            integrated_path: config.client.integrated_path.clone(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// One user query.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub query: String,
    pub instruction: Option<String>,
    pub tools: Option<Vec<BuiltinTool>>,
    pub conversation_id: Option<String>,
    pub stream: bool,
}

impl ChatRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    #[must_use]
    pub fn tools(mut self, tools: Vec<BuiltinTool>) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    #[must_use]
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Result of a finished turn.
#[derive(Debug)]
pub struct ChatOutcome {
    /// The last round's message, always resolved.
    pub message: Message,
    pub conversation_id: String,
    pub rounds: usize,
    pub tool_calls: Vec<ToolCallRecord>,
    pub remote_events: Vec<Event>,
    pub visible_events: Vec<Event>,
    pub stop: TurnStop,
}

impl ChatOutcome {
    #[must_use]
    pub fn answer(&self) -> &str {
        self.message.partial_text()
    }
}

/// Drives turns against the integrated function-call endpoint.
pub struct FunctionCallAgent<T, C = NoopContext> {
    transport: T,
    context: C,
    settings: AgentSettings,
}

impl<T: Transport> FunctionCallAgent<T> {
    #[must_use]
    pub fn new(transport: T, settings: AgentSettings) -> Self {
        Self {
            transport,
            context: NoopContext,
            settings,
        }
    }
}

impl<T: Transport, C: ContextInitializer> FunctionCallAgent<T, C> {
    /// Replace the context initializer.
    #[must_use]
    pub fn with_context<C2: ContextInitializer>(self, context: C2) -> FunctionCallAgent<T, C2> {
        FunctionCallAgent {
            transport: self.transport,
            context,
            settings: self.settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one turn.
    ///
    /// Streaming fragments and visible events reach `observer` as they are
    /// pulled. Without a conversation id on `request` a fresh one is minted
    /// and used for every round.
    ///
    /// # Errors
    ///
    /// Any decode, transport or tool error ends the turn immediately; no
    /// further request is sent.
    pub fn chat(
        &self,
        request: ChatRequest,
        registry: &ToolRegistry,
        observer: &mut dyn TurnObserver,
    ) -> Result<ChatOutcome, AgentError> {
        let started = Instant::now();
        let conversation_id = request
            .conversation_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_id);
        let url = self.transport.service_url(&self.settings.integrated_path);
        let headers = self.transport.auth_header();
        let max_rounds = self.settings.max_rounds.max(1);

        let mut state = TurnState::Requesting;
        let mut tool_calls = Vec::new();
        let mut remote_events = Vec::new();
        let mut visible_events = Vec::new();
        let mut tool_results: Vec<ToolResultInput> = Vec::new();
        let mut used_tools: Vec<Value> = Vec::new();
        let mut rounds = 0;

        loop {
            rounds += 1;
            let request_id = new_id();
            self.context.init_context(&conversation_id, &request_id);
            tracing::info!(
                conversation_id = %conversation_id,
                request_id = %request_id,
                round = rounds,
                "sending function call request"
            );

            let body = self
                .build_request(
                    &request,
                    &conversation_id,
                    std::mem::take(&mut tool_results),
                    std::mem::take(&mut used_tools),
                )
                .encode()?;

            advance(&mut state, TurnState::AwaitingResponse, observer);
            let response = self.transport.post(&url, &headers, body)?;

            advance(&mut state, TurnState::Reducing, observer);
            let mut message = decode(response, request.stream)?;
            for fragment in message.fragments() {
                observer.on_fragment(&fragment?);
            }
            message.finalize()?;
            if message.conversation_id.is_empty() {
                message.conversation_id.clone_from(&conversation_id);
            }

            advance(&mut state, TurnState::Dispatching, observer);
            let round = dispatch_events(&message.events, registry, observer)?;
            let continue_turn = round.used_tools();
            if continue_turn {
                tool_results = round.tool_results();
                used_tools = round.used_tools_payload();
            }
            tool_calls.extend(round.tool_calls);
            remote_events.extend(round.remote_events);
            visible_events.extend(round.visible_events);

            let stop = if !continue_turn {
                Some(TurnStop::Completed)
            } else if rounds >= max_rounds {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    max_rounds,
                    "round limit reached while tools were still in use"
                );
                Some(TurnStop::RoundLimit)
            } else {
                None
            };

            if let Some(stop) = stop {
                advance(&mut state, TurnState::Completed(stop), observer);
                let outcome = ChatOutcome {
                    message,
                    conversation_id,
                    rounds,
                    tool_calls,
                    remote_events,
                    visible_events,
                    stop,
                };
                log_turn_complete(&summarize(&outcome), started);
                return Ok(outcome);
            }
            advance(&mut state, TurnState::Requesting, observer);
        }
    }

    fn build_request(
        &self,
        request: &ChatRequest,
        conversation_id: &str,
        tool_results: Vec<ToolResultInput>,
        used_tools: Vec<Value>,
    ) -> FunctionCallRequest {
        FunctionCallRequest {
            query: request.query.clone(),
            response_mode: ResponseMode::from_stream(request.stream),
            conversation_id: conversation_id.to_string(),
            user: self.settings.user_id.clone(),
            inputs: RequestInputs {
                user_instruction: request
                    .instruction
                    .clone()
                    .unwrap_or_else(|| self.settings.instruction.clone()),
                builtin_tool_list: request
                    .tools
                    .clone()
                    .unwrap_or_else(|| self.settings.builtin_tools.clone()),
                tool_results,
                used_tools,
            },
            model_configs: self.settings.model_configs.clone(),
        }
    }
}

fn advance(state: &mut TurnState, next: TurnState, observer: &mut dyn TurnObserver) {
    tracing::debug!(from = ?state, to = ?next, "turn state transition");
    *state = next;
    observer.on_state(state);
}

fn summarize(outcome: &ChatOutcome) -> TurnSummary {
    TurnSummary {
        conversation_id: outcome.conversation_id.clone(),
        rounds: outcome.rounds,
        local_calls: outcome.tool_calls.len(),
        remote_calls: outcome.remote_events.len(),
        visible_events: outcome.visible_events.len(),
        answer_bytes: outcome.answer().len(),
        hit_round_limit: outcome.stop == TurnStop::RoundLimit,
    }
}
