use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Role;

/// A single chat turn.
///
/// Messages are immutable once constructed; the fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    /// Create a new `Message` with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new system `Message`.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user `Message`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new AI `Message`.
    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(Role::Ai, content)
    }

    /// The speaker of this message.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The text of this message.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consume the message, returning its text.
    pub fn into_content(self) -> String {
        self.content
    }

    /// The `{"role": ..., "content": ...}` mapping sent to the completion endpoint.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "role": self.role.as_str(),
            "content": self.content,
        })
    }
}
