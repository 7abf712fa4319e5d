use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default maximum tokens per response.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Caller-supplied generation parameters for the chat completion API.
///
/// These are the fields a caller may configure.  The message list, the
/// streaming flag, and the choice count are owned by the session and live on
/// [`ChatCompletionRequest`](crate::types::ChatCompletionRequest) instead.
///
/// See <https://platform.openai.com/docs/api-reference/chat> for details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParameters {
    /// The model to use for generating responses.
    pub model: String,

    /// Maximum tokens per response.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus sampling probability mass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Penalty for tokens already present in the text so far.
    pub presence_penalty: f32,

    /// Penalty proportional to how often a token already appeared.
    pub frequency_penalty: f32,

    /// Per-token bias added to the logits before sampling.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub logit_bias: BTreeMap<String, f32>,

    /// Identifier for the end user.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
}

impl GenerationParameters {
    /// Creates parameters with the defaults.
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: None,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            logit_bias: BTreeMap::new(),
            user: String::new(),
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the top-p value.
    pub fn with_top_p(mut self, top_p: Option<f32>) -> Self {
        self.top_p = top_p;
        self
    }

    /// Sets the presence penalty.
    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = penalty;
        self
    }

    /// Sets the frequency penalty.
    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = penalty;
        self
    }

    /// Adds a logit bias for a token.
    pub fn with_logit_bias(mut self, token: impl Into<String>, bias: f32) -> Self {
        self.logit_bias.insert(token.into(), bias);
        self
    }

    /// Sets the end-user identifier.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn defaults() {
        let params = GenerationParameters::default();
        assert_eq!(params.model, "gpt-3.5-turbo");
        assert_eq!(params.max_tokens, 1000);
        assert_eq!(params.temperature, 1.0);
        assert!(params.top_p.is_none());
        assert!(params.logit_bias.is_empty());
        assert!(params.user.is_empty());
    }

    #[test]
    fn optional_fields_are_omitted() {
        let json = to_value(GenerationParameters::default()).unwrap();
        assert_eq!(
            json,
            json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 1000,
                "temperature": 1.0,
                "presence_penalty": 0.0,
                "frequency_penalty": 0.0
            })
        );
    }

    #[test]
    fn builder_pattern() {
        let params = GenerationParameters::new()
            .with_model("gpt-4o")
            .with_max_tokens(256)
            .with_temperature(0.5)
            .with_top_p(Some(0.75))
            .with_presence_penalty(0.25)
            .with_frequency_penalty(0.5)
            .with_logit_bias("50256", -100.0)
            .with_user("alice");
        let json = to_value(&params).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["max_tokens"], 256);
        assert_eq!(json["top_p"], 0.75);
        assert_eq!(json["logit_bias"]["50256"], -100.0);
        assert_eq!(json["user"], "alice");
    }
}
