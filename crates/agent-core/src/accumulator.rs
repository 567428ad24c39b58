//! Per-turn state
//!
//! Created when a turn starts, owned by that turn alone, and consumed by
//! [`TurnAccumulator::finalize`] when the end node arrives.

use serde_json::Value;

use crate::message::{Arguments, Message};

#[derive(Clone, Debug)]
struct PendingCall {
    id: String,
    name: String,
    args: Arguments,
    result: Option<Value>,
}

#[derive(Debug, Default)]
pub struct TurnAccumulator {
    text: Vec<String>,
    /// Calls in the order the model issued them, each holding its result once deposited.
    /// Backends may reuse an id within a turn, so results are matched by position.
    calls: Vec<PendingCall>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text(&mut self, fragment: impl Into<String>) {
        self.text.push(fragment.into());
    }

    /// Record a call and return the slot its result goes into
    pub fn add_tool_call(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        args: Arguments,
    ) -> usize {
        self.calls.push(PendingCall {
            id: id.into(),
            name: name.into(),
            args,
            result: None,
        });
        self.calls.len() - 1
    }

    pub fn add_tool_result(&mut self, slot: usize, value: Value) {
        if let Some(call) = self.calls.get_mut(slot) {
            call.result = Some(value);
        } else {
            tracing::warn!(slot, "tool result for unknown call slot");
        }
    }

    /// Text emitted so far
    pub fn output(&self) -> String {
        self.text.concat()
    }

    /// Calls still waiting for a result
    pub fn pending(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| c.result.is_none())
            .count()
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Turn the accumulated state into history entries: the user prompt, one
    /// assistant text message, then each call followed by its return, in call order.
    ///
    /// A call without a deposited result gets an error payload so the pairing
    /// stays complete.
    pub fn finalize(self, user_prompt: &str) -> (String, Vec<Message>) {
        let output = self.text.concat();

        let mut messages = Vec::with_capacity(2 + self.calls.len() * 2);
        messages.push(Message::user(user_prompt));
        messages.push(Message::assistant(output.clone()));

        for call in self.calls {
            let value = call
                .result
                .unwrap_or_else(|| serde_json::json!({"error": "tool call did not complete"}));
            messages.push(Message::tool_call(&call.id, &call.name, call.args));
            messages.push(Message::tool_return(call.id, call.name, value));
        }

        (output, messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessagePart, Role};
    use serde_json::json;

    #[test]
    fn test_finalize_orders_calls_and_returns() {
        let mut acc = TurnAccumulator::new();
        acc.add_text("Looking. ");
        let a = acc.add_tool_call("a", "list_files", Arguments::new());
        let b = acc.add_tool_call("b", "read_file", Arguments::new());
        // Results may land in any order; history follows call order.
        acc.add_tool_result(b, json!({"content": "hi"}));
        acc.add_tool_result(a, json!({"files": []}));
        acc.add_text("Done.");
        assert_eq!(acc.pending(), 0);

        let (output, messages) = acc.finalize("what is here?");
        assert_eq!(output, "Looking. Done.");
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].text(), "Looking. Done.");
        assert_eq!(messages[2].tool_call_ids().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(messages[3].tool_return_ids().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(messages[4].tool_call_ids().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(messages[5].tool_return_ids().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_finalize_without_result_still_pairs() {
        let mut acc = TurnAccumulator::new();
        acc.add_tool_call("a", "read_file", Arguments::new());
        assert_eq!(acc.pending(), 1);

        let (output, messages) = acc.finalize("q");
        assert!(output.is_empty());
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].text(), "");
        match &messages[3].parts[0] {
            MessagePart::ToolReturn { content, .. } => assert!(content.get("error").is_some()),
            other => panic!("expected tool return, got {other:?}"),
        }
    }

    #[test]
    fn test_reused_call_id_keeps_each_result() {
        let mut acc = TurnAccumulator::new();
        let first = acc.add_tool_call("dup", "read_file", Arguments::new());
        acc.add_tool_result(first, json!({"content": "one"}));
        let second = acc.add_tool_call("dup", "read_file", Arguments::new());
        acc.add_tool_result(second, json!({"content": "two"}));
        assert_eq!(acc.pending(), 0);

        let (_, messages) = acc.finalize("q");
        let contents: Vec<&Value> = messages
            .iter()
            .flat_map(|m| &m.parts)
            .filter_map(|p| match p {
                MessagePart::ToolReturn { content, .. } => Some(content),
                _ => None,
            })
            .collect();
        assert_eq!(
            contents,
            vec![&json!({"content": "one"}), &json!({"content": "two"})]
        );
    }

    #[test]
    fn test_finalize_plain_answer() {
        let (_, messages) = TurnAccumulator::new().finalize("hi");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
    }
}
