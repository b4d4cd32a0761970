//! Linear conversation history.

use serde::Serialize;

use crate::types::{Message, Role};

/// An ordered sequence of messages exchanged in one chat session.
///
/// The history is append-only apart from [`Conversation::pop_message`], which exists so a caller
/// can withdraw the user message of a turn the server never acknowledged.  Role ordering is not
/// validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Creates an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a conversation that opens with a system message.
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.add_message(Message::system(prompt));
        conversation
    }

    /// Appends a message to the end of the history.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns the full history, oldest first.
    pub fn get_messages(&self) -> &[Message] {
        &self.messages
    }

    /// Removes and returns the most recent message.
    pub fn pop_message(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    /// Returns the most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns the number of messages in the history.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true when the history holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drops every message after the leading system message.
    ///
    /// A conversation that does not open with a system message is emptied.
    pub fn reset(&mut self) {
        let keep = match self.messages.first() {
            Some(first) if first.role() == Role::System => 1,
            _ => 0,
        };
        self.messages.truncate(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_come_back_in_call_order() {
        let sequence = vec![
            Message::system("Be brief."),
            Message::user("one"),
            Message::user("two"),
            Message::ai("three"),
            Message::system("late system"),
            Message::ai(""),
        ];
        let mut conversation = Conversation::new();
        for message in sequence.iter().cloned() {
            conversation.add_message(message);
        }
        assert_eq!(conversation.get_messages(), sequence.as_slice());
        assert_eq!(conversation.len(), sequence.len());
    }

    #[test]
    fn pop_removes_only_the_last_message() {
        let mut conversation = Conversation::with_system_prompt("sys");
        conversation.add_message(Message::user("question"));

        assert_eq!(conversation.pop_message(), Some(Message::user("question")));
        assert_eq!(conversation.get_messages(), &[Message::system("sys")]);
        assert_eq!(conversation.last(), Some(&Message::system("sys")));
    }

    #[test]
    fn pop_on_empty_is_none() {
        let mut conversation = Conversation::new();
        assert!(conversation.is_empty());
        assert_eq!(conversation.pop_message(), None);
    }

    #[test]
    fn reset_keeps_leading_system_message() {
        let mut conversation = Conversation::with_system_prompt("sys");
        conversation.add_message(Message::user("q"));
        conversation.add_message(Message::ai("a"));
        conversation.reset();
        assert_eq!(conversation.get_messages(), &[Message::system("sys")]);

        let mut conversation = Conversation::new();
        conversation.add_message(Message::user("q"));
        conversation.reset();
        assert!(conversation.is_empty());
    }

    #[test]
    fn serializes_as_message_array() {
        let mut conversation = Conversation::with_system_prompt("sys");
        conversation.add_message(Message::user("hi"));
        assert_eq!(
            serde_json::to_value(&conversation).unwrap(),
            serde_json::json!({
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ]
            })
        );
    }
}
