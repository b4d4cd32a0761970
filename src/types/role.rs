use serde::{Deserialize, Serialize};

/// The speaker of a chat turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the whole conversation.
    System,

    /// Input typed by the person at the console.
    User,

    /// A reply produced by the model.
    #[serde(rename = "assistant", alias = "ai")]
    Ai,
}

impl Role {
    /// The tag used for this role on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Ai => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" | "ai" => Ok(Role::Ai),
            _ => Err(format!(
                "Invalid role: {s}. Valid options: system, user, assistant"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn role_serialization() {
        assert_eq!(to_value(Role::System).unwrap(), json!("system"));
        assert_eq!(to_value(Role::User).unwrap(), json!("user"));
        assert_eq!(to_value(Role::Ai).unwrap(), json!("assistant"));
    }

    #[test]
    fn role_deserialization_accepts_ai_alias() {
        let role: Role = serde_json::from_value(json!("ai")).unwrap();
        assert_eq!(role, Role::Ai);
        let role: Role = serde_json::from_value(json!("assistant")).unwrap();
        assert_eq!(role, Role::Ai);
    }

    #[test]
    fn from_str() {
        assert_eq!("SYSTEM".parse::<Role>().unwrap(), Role::System);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("AI".parse::<Role>().unwrap(), Role::Ai);
        assert!("narrator".parse::<Role>().is_err());
    }

    #[test]
    fn display_matches_wire_tag() {
        for role in [Role::System, Role::User, Role::Ai] {
            assert_eq!(to_value(role).unwrap(), json!(role.to_string()));
        }
    }
}
