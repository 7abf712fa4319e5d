use serde::Serialize;

use crate::types::{GenerationParameters, Message};

/// The body of a chat completion request.
///
/// The caller-configurable fields come from [`GenerationParameters`]; the
/// fields below them are controlled by the session for every call and cannot
/// be overridden by configuration.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatCompletionRequest {
    /// Caller-supplied generation parameters.
    #[serde(flatten)]
    pub params: GenerationParameters,

    /// The assembled prompt, in conversation order.
    pub messages: Vec<Message>,

    /// Always true: responses are streamed fragment by fragment.
    pub stream: bool,

    /// Always one: the session consumes a single choice.
    pub n: u32,
}

impl ChatCompletionRequest {
    /// Creates a streaming, single-choice request for the given messages.
    pub fn streaming(params: &GenerationParameters, messages: Vec<Message>) -> Self {
        Self {
            params: params.clone(),
            messages,
            stream: true,
            n: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn driver_controlled_fields_are_forced() {
        let params = GenerationParameters::new().with_model("gpt-4o");
        let request = ChatCompletionRequest::streaming(&params, vec![Message::user("Hi")]);
        assert!(request.stream);
        assert_eq!(request.n, 1);
        assert_eq!(request.params, params);
    }

    #[test]
    fn serializes_flat() {
        let params = GenerationParameters::new().with_temperature(0.5);
        let request = ChatCompletionRequest::streaming(
            &params,
            vec![Message::system("Be brief."), Message::user("Hi")],
        );
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 1000,
                "temperature": 0.5,
                "presence_penalty": 0.0,
                "frequency_penalty": 0.0,
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hi"}
                ],
                "stream": true,
                "n": 1
            })
        );
    }
}
