use serde::Deserialize;

/// One frame of a streamed chat completion.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatCompletionChunk {
    /// Identifier shared by every chunk of one completion.
    #[serde(default)]
    pub id: String,

    /// The choices carried by this chunk; the session requests exactly one.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A single choice within a [`ChatCompletionChunk`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChunkChoice {
    /// Index of the choice.
    #[serde(default)]
    pub index: u32,

    /// The incremental content of this choice.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Set on the final chunk of the choice.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The incremental part of a choice.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ChunkDelta {
    /// Role announcement; present only on the first chunk.
    #[serde(default)]
    pub role: Option<String>,

    /// A fragment of generated text.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    /// Returns the content fragment of the first choice, if the chunk carries one.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_from_first_choice() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.content(), Some("Hello"));
    }

    #[test]
    fn role_only_chunk_has_no_content() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.content(), None);
        assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("assistant"));
    }

    #[test]
    fn finish_chunk_has_empty_delta() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.content(), None);
        assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("stop"));
    }
}
