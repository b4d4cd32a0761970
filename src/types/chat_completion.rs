use serde::{Deserialize, Serialize};

/// A non-streaming chat completion response.
///
/// Only the fields needed to recover the reply text are modelled; everything else the server
/// sends is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Candidate replies; the first one is used.
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
}

/// One candidate reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// The reply message.
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

/// The message inside a [`Choice`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    /// The reply text.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Returns `choices[0].message.content`, or `None` when any step of that path is absent.
    pub fn into_content(self) -> Option<String> {
        self.choices?.into_iter().next()?.message?.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ChatCompletion {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn content_of_first_choice() {
        let completion = parse(json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Hi there"}},
                {"index": 1, "message": {"role": "assistant", "content": "Hello"}}
            ]
        }));
        assert_eq!(completion.into_content().as_deref(), Some("Hi there"));
    }

    #[test]
    fn missing_pieces_yield_none() {
        assert_eq!(parse(json!({})).into_content(), None);
        assert_eq!(parse(json!({"choices": []})).into_content(), None);
        assert_eq!(parse(json!({"choices": [{}]})).into_content(), None);
        assert_eq!(parse(json!({"choices": [{"message": {}}]})).into_content(), None);
        assert_eq!(
            parse(json!({"choices": [{"message": {"content": null}}]})).into_content(),
            None
        );
    }

    #[test]
    fn empty_content_is_still_content() {
        let completion = parse(json!({"choices": [{"message": {"content": ""}}]}));
        assert_eq!(completion.into_content().as_deref(), Some(""));
    }
}
