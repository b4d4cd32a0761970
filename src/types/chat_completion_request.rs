use serde::Serialize;

use crate::types::Message;

/// Body of a chat completion request.
///
/// Borrows the conversation for the duration of the call; the request never owns the history.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    /// The full conversation, oldest message first.
    pub messages: &'a [Message],

    /// Ask the server for a server-sent-event stream instead of a single body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl<'a> ChatCompletionRequest<'a> {
    /// Create a non-streaming request.
    pub fn new(messages: &'a [Message]) -> Self {
        Self {
            messages,
            stream: None,
        }
    }

    /// Create a streaming request.
    pub fn new_streaming(messages: &'a [Message]) -> Self {
        Self {
            messages,
            stream: Some(true),
        }
    }
}
