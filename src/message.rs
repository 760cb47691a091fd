use std::fmt;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::AgentError;
use crate::protocol::{citation_source, Event, EventKind};

/// Citations grouped by their `source` key, sources kept in the order they
/// first arrived.
///
/// Merging is additive: existing entries are never dropped and duplicate
/// citations under one key all accumulate in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Citations {
    groups: Vec<(String, Vec<Value>)>,
    slots: FxHashMap<String, usize>,
}

impl Citations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, citation: Value) {
        let source = citation_source(&citation);
        if source.is_empty() {
            tracing::warn!("citation without source key grouped under empty key");
        }
        let slot = match self.slots.get(source) {
            Some(&slot) => slot,
            None => {
                let slot = self.groups.len();
                self.slots.insert(source.to_string(), slot);
                self.groups.push((source.to_string(), Vec::new()));
                slot
            }
        };
        self.groups[slot].1.push(citation);
    }

    pub fn merge_all(&mut self, citations: impl IntoIterator<Item = Value>) {
        for citation in citations {
            self.merge(citation);
        }
    }

    #[must_use]
    pub fn get(&self, source: &str) -> Option<&[Value]> {
        self.slots
            .get(source)
            .map(|&slot| self.groups[slot].1.as_slice())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Source keys in arrival order.
    #[must_use]
    pub fn sources(&self) -> Vec<&str> {
        self.groups.iter().map(|(source, _)| source.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.groups
            .iter()
            .map(|(source, items)| (source.as_str(), items.as_slice()))
    }
}

/// One decoded streaming frame, already validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub id: Option<String>,
    /// Incremental answer text; `None` when the frame carried none.
    pub answer: Option<String>,
    pub conversation_id: Option<String>,
    pub events: Vec<Event>,
}

/// Upstream of a pending message: single-consumer, single-pass.
pub type ChunkStream = Box<dyn Iterator<Item = Result<StreamChunk, AgentError>> + Send>;

/// Content still being received.
pub struct PendingContent {
    upstream: Option<ChunkStream>,
    consumed: String,
    identified: bool,
}

impl PendingContent {
    #[must_use]
    pub fn new(upstream: ChunkStream) -> Self {
        Self {
            upstream: Some(upstream),
            consumed: String::new(),
            identified: false,
        }
    }

    /// Text received so far.
    #[must_use]
    pub fn consumed(&self) -> &str {
        &self.consumed
    }

    /// `false` once a mid-stream error detached the upstream.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.upstream.is_some()
    }
}

impl fmt::Debug for PendingContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingContent")
            .field("live", &self.upstream.is_some())
            .field("consumed", &self.consumed)
            .finish()
    }
}

/// Answer text of a message: either still streaming or final.
#[derive(Debug)]
pub enum MessageContent {
    Pending(PendingContent),
    Resolved(String),
}

/// Result of one local tool invocation within a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: Value,
    pub result: Option<Value>,
}

/// An assistant turn result.
#[derive(Debug)]
pub struct Message {
    pub identifier: String,
    pub content: MessageContent,
    pub conversation_id: String,
    pub extra: Citations,
    pub events: Vec<Event>,
}

impl Message {
    /// A message whose content is already final.
    #[must_use]
    pub fn resolved(
        identifier: impl Into<String>,
        content: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            content: MessageContent::Resolved(content.into()),
            conversation_id: conversation_id.into(),
            extra: Citations::new(),
            events: Vec::new(),
        }
    }

    /// A message whose content will be pulled from `upstream`.
    ///
    /// `identifier` is provisional: the first frame carrying an `id`
    /// replaces it.
    #[must_use]
    pub fn pending(identifier: impl Into<String>, upstream: ChunkStream) -> Self {
        Self {
            identifier: identifier.into(),
            content: MessageContent::Pending(PendingContent::new(upstream)),
            conversation_id: String::new(),
            extra: Citations::new(),
            events: Vec::new(),
        }
    }

    /// Append events in arrival order, merging `references` citations into
    /// [`Message::extra`].
    pub fn push_events(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            if event.kind() == EventKind::References {
                self.extra.merge_all(event.citations().iter().cloned());
            }
            self.events.push(event);
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.content, MessageContent::Resolved(_))
    }

    /// Final text, or `None` while content is pending.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Resolved(text) => Some(text),
            MessageContent::Pending(_) => None,
        }
    }

    /// Text available right now: final text, or what has been consumed so far.
    #[must_use]
    pub fn partial_text(&self) -> &str {
        match &self.content {
            MessageContent::Resolved(text) => text,
            MessageContent::Pending(pending) => pending.consumed(),
        }
    }

    /// Pull answer fragments from a pending message.
    ///
    /// Each fragment's frame is merged into this message (events, citations,
    /// conversation id) before the fragment is returned. On exhaustion the
    /// content becomes [`MessageContent::Resolved`]. Yields nothing for a
    /// resolved message.
    pub fn fragments(&mut self) -> Fragments<'_> {
        Fragments { message: self }
    }

    /// Drain whatever is left and return the final text.
    ///
    /// # Errors
    ///
    /// Returns the first mid-stream error, or [`AgentError::StreamAborted`]
    /// if an earlier error already detached the stream.
    pub fn finalize(&mut self) -> Result<&str, AgentError> {
        for fragment in self.fragments() {
            fragment?;
        }
        match &self.content {
            MessageContent::Resolved(text) => Ok(text),
            MessageContent::Pending(pending) => Err(AgentError::StreamAborted {
                partial_len: pending.consumed().len(),
            }),
        }
    }

    fn absorb(&mut self, chunk: StreamChunk, adopt_id: bool) {
        if let Some(conversation_id) = chunk.conversation_id.filter(|id| !id.is_empty()) {
            self.conversation_id = conversation_id;
        }
        if let Some(id) = chunk.id.filter(|_| adopt_id) {
            self.identifier = id;
        }
        self.push_events(chunk.events);
    }
}

/// Borrowing iterator over a pending message's answer fragments.
pub struct Fragments<'a> {
    message: &'a mut Message,
}

impl Iterator for Fragments<'_> {
    type Item = Result<String, AgentError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let MessageContent::Pending(pending) = &mut self.message.content else {
                return None;
            };
            let upstream = pending.upstream.as_mut()?;
            match upstream.next() {
                Some(Ok(mut chunk)) => {
                    let answer = chunk.answer.take();
                    if let Some(answer) = answer.as_deref() {
                        pending.consumed.push_str(answer);
                    }
                    let adopt_id = !pending.identified && chunk.id.is_some();
                    pending.identified |= adopt_id;
                    self.message.absorb(chunk, adopt_id);
                    if let Some(answer) = answer {
                        return Some(Ok(answer));
                    }
                }
                Some(Err(err)) => {
                    pending.upstream = None;
                    return Some(Err(err));
                }
                None => {
                    let text = std::mem::take(&mut pending.consumed);
                    self.message.content = MessageContent::Resolved(text);
                    return None;
                }
            }
        }
    }
}
