//! Conversation history and the windower
//!
//! [`window`] bounds what is sent to the model on each turn. Plain tail
//! truncation could keep a tool return while dropping the call it answers,
//! which model backends reject; the windower pulls such calls back in, so
//! `limit` is a floor on recency rather than an exact size.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::message::Message;

/// Windowing parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    /// Number of most recent non-system messages to keep. `None` or 0 keeps everything.
    pub limit: Option<usize>,

    /// Keep messages carrying tool calls or tool returns
    pub include_tool_messages: bool,

    /// Strict upper bound on non-system messages, applied after pairing repair.
    /// Oldest messages go first; returns whose call went with them are dropped too.
    pub hard_cap: Option<usize>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            limit: Some(8),
            include_tool_messages: true,
            hard_cap: None,
        }
    }
}

impl WindowConfig {
    pub const fn unbounded() -> Self {
        Self {
            limit: None,
            include_tool_messages: true,
            hard_cap: None,
        }
    }
}

/// Produce a bounded copy of `history` that keeps the system message first
/// and never contains a tool return without its call.
pub fn window(history: &[Message], config: &WindowConfig) -> Vec<Message> {
    let mut system: Option<&Message> = None;
    let mut rest: Vec<&Message> = Vec::with_capacity(history.len());

    for msg in history {
        if msg.is_system() {
            // A second system message would break the single-system invariant.
            if system.is_none() {
                system = Some(msg);
            }
            continue;
        }
        if !config.include_tool_messages && msg.has_tool_parts() {
            continue;
        }
        rest.push(msg);
    }

    let mut selected: Vec<usize> = match config.limit.filter(|&limit| limit > 0) {
        Some(limit) if rest.len() > limit => select_recent_with_pairs(&rest, limit),
        _ => (0..rest.len()).collect(),
    };
    drop_orphan_returns(&rest, &mut selected);

    if let Some(cap) = config.hard_cap {
        if selected.len() > cap {
            let excess = selected.len() - cap;
            selected.drain(..excess);
            drop_orphan_returns(&rest, &mut selected);
        }
    }

    tracing::trace!(
        input = history.len(),
        kept = selected.len(),
        system = system.is_some(),
        "windowed history"
    );

    system
        .into_iter()
        .chain(selected.into_iter().map(|idx| rest[idx]))
        .cloned()
        .collect()
}

/// Indices of the last `limit` messages plus the earlier call messages their
/// returns need. Pulled-back messages may carry returns of their own, so the
/// repair repeats until nothing new is added.
fn select_recent_with_pairs(rest: &[&Message], limit: usize) -> Vec<usize> {
    let start = rest.len() - limit;
    let needs = call_dependencies(rest);

    let mut included: BTreeSet<usize> = (start..rest.len()).collect();
    let mut frontier: Vec<usize> = included.iter().copied().collect();
    while let Some(idx) = frontier.pop() {
        for &call_idx in &needs[idx] {
            if included.insert(call_idx) {
                frontier.push(call_idx);
            }
        }
    }

    included.into_iter().collect()
}

/// For each message, the indices of the messages holding the calls its
/// returns answer. A call counts when it sits at or before the return,
/// including in the same message; the latest such call wins.
fn call_dependencies(rest: &[&Message]) -> Vec<Vec<usize>> {
    let mut last_call: HashMap<&str, usize> = HashMap::new();
    rest.iter()
        .enumerate()
        .map(|(idx, msg)| {
            for id in msg.tool_call_ids() {
                last_call.insert(id, idx);
            }
            msg.tool_return_ids()
                .filter_map(|id| last_call.get(id).copied())
                .filter(|&call_idx| call_idx != idx)
                .collect()
        })
        .collect()
}

/// Remove selected messages whose returns have no call at or before them in the selection.
fn drop_orphan_returns(rest: &[&Message], selected: &mut Vec<usize>) {
    let mut seen_calls: HashSet<&str> = HashSet::new();
    selected.retain(|&idx| {
        let msg = rest[idx];
        let own_calls: HashSet<&str> = msg.tool_call_ids().collect();
        let paired = msg
            .tool_return_ids()
            .all(|id| seen_calls.contains(id) || own_calls.contains(id));
        if paired {
            seen_calls.extend(own_calls);
        } else {
            tracing::debug!(index = idx, "dropping tool return without its call");
        }
        paired
    });
}

/// Conversation history carried between turns.
///
/// There is no public way to append: new entries arrive only through a
/// committed turn, and trimming only through [`History::windowed`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// Rebuild from stored messages, restoring the invariants on the way in
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: window(&messages, &WindowConfig::unbounded()),
        }
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn system_message(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.is_system())
    }

    /// Bounded copy for the next request
    #[must_use]
    pub fn windowed(&self, config: &WindowConfig) -> Self {
        Self {
            messages: window(&self.messages, config),
        }
    }

    /// Put a system message first if there is none yet
    pub(crate) fn ensure_system_prompt(&mut self, prompt: &str) {
        if self.system_message().is_none() {
            self.messages.insert(0, Message::system(prompt));
        }
    }

    /// Append the messages of a finalized turn
    pub(crate) fn commit(&mut self, turn: Vec<Message>) {
        self.messages.extend(turn);
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
