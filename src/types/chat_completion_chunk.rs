use serde::{Deserialize, Serialize};

/// One `data:` frame of a streaming chat completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Candidate deltas; the first one is used.
    #[serde(default)]
    pub choices: Option<Vec<ChunkChoice>>,
}

/// One candidate delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// The incremental change to the reply.
    #[serde(default)]
    pub delta: Option<Delta>,
}

/// The incremental content carried by a [`ChunkChoice`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// The text fragment.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// Returns `choices[0].delta.content` when it is present and non-empty.
    pub fn fragment(&self) -> Option<&str> {
        self.choices
            .as_ref()?
            .first()?
            .delta
            .as_ref()?
            .content
            .as_deref()
            .filter(|content| !content.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ChatCompletionChunk {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn fragment_of_first_choice() {
        let chunk = parse(r#"{"choices":[{"delta":{"content":"Hel"}},{"delta":{"content":"x"}}]}"#);
        assert_eq!(chunk.fragment(), Some("Hel"));
    }

    #[test]
    fn role_only_delta_has_no_fragment() {
        let chunk = parse(r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#);
        assert_eq!(chunk.fragment(), None);
    }

    #[test]
    fn missing_or_empty_pieces_have_no_fragment() {
        assert_eq!(parse(r#"{}"#).fragment(), None);
        assert_eq!(parse(r#"{"choices":[]}"#).fragment(), None);
        assert_eq!(parse(r#"{"choices":[{}]}"#).fragment(), None);
        assert_eq!(parse(r#"{"choices":[{"delta":{"content":""}}]}"#).fragment(), None);
        assert_eq!(parse(r#"{"choices":[{"delta":{"content":null}}]}"#).fragment(), None);
        assert_eq!(parse(r#"{"choices":null}"#).fragment(), None);
    }
}
