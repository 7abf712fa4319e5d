use std::env;
use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUESTS, CLIENT_REQUEST_ERRORS, STREAM_CHUNKS};
use crate::provider::{CompletionProvider, FragmentStream};
use crate::sse::process_sse;
use crate::types::{ChatCompletionChunk, ChatCompletionRequest};

/// Environment variable holding the API key.
pub const API_KEY_VARIABLE: &str = "OPENAI_API_KEY";

/// Environment variable that overrides the API base URL.
pub const BASE_URL_VARIABLE: &str = "OPENAI_BASE_URL";

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const COMPLETIONS_PATH: &str = "chat/completions";

/// A stream of decoded completion chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk>> + Send>>;

/// Client for the OpenAI chat completion API.
#[derive(Debug, Clone)]
pub struct OpenAI {
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
}

impl OpenAI {
    /// Create a new OpenAI client.
    ///
    /// The API key can be provided directly or read from the OPENAI_API_KEY
    /// environment variable.  OPENAI_BASE_URL, when set, replaces the default
    /// endpoint.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let base_url = env::var(BASE_URL_VARIABLE).ok().filter(|url| !url.is_empty());
        Self::with_options(api_key, base_url, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_VARIABLE)
                .ok()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| Error::missing_credential(API_KEY_VARIABLE))?,
        };
        let endpoint = completions_endpoint(base_url.as_deref().unwrap_or(DEFAULT_API_URL))?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);

        let client = ReqwestClient::builder()
            .default_headers(default_headers(&api_key)?)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::connection(format!("failed to build HTTP client: {e}"), Some(Box::new(e)))
            })?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// The URL requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send a chat completion request and get the raw chunk stream.
    pub async fn stream_chunks(&self, request: &ChatCompletionRequest) -> Result<ChunkStream> {
        CLIENT_REQUESTS.click();
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %request.params.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("no response from {}", self.endpoint),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else {
                    Error::connection(format!("request failed: {e}"), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = error_from_response(response).await;
            tracing::warn!(error = %err, "chat completion request rejected");
            return Err(err);
        }

        Ok(Box::pin(process_sse(response.bytes_stream())))
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAI {
    async fn stream_completion(&self, request: ChatCompletionRequest) -> Result<FragmentStream> {
        let chunks = self.stream_chunks(&request).await?;
        let fragments = chunks.filter_map(|chunk| async move {
            STREAM_CHUNKS.click();
            match chunk {
                Ok(chunk) => chunk.content().map(|content| Ok(content.to_string())),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::pin(fragments))
    }
}

/// Resolves the completions URL under `base_url`.
fn completions_endpoint(base_url: &str) -> Result<Url> {
    let mut base = base_url.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(Url::parse(&base)?.join(COMPLETIONS_PATH)?)
}

/// Headers sent with every request.
fn default_headers(api_key: &str) -> Result<HeaderMap> {
    let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
        Error::config(
            "API key contains characters not allowed in a header",
            Some(API_KEY_VARIABLE.to_string()),
        )
    })?;
    bearer.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, bearer);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/event-stream"),
    );
    Ok(headers)
}

/// Reads an error response and converts it to our Error type.
async fn error_from_response(response: Response) -> Error {
    let status = response.status();
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|val| val.to_str().ok())
            .map(String::from)
    };
    let request_id = header("x-request-id");
    let retry_after = header("retry-after").and_then(|val| val.parse::<u64>().ok());

    match response.text().await {
        Ok(body) => status_error(status, &body, request_id, retry_after),
        Err(e) => Error::connection(
            format!("failed to read error response ({status}): {e}"),
            Some(Box::new(e)),
        ),
    }
}

/// Maps an error status and body to an Error.
///
/// The body is the provider's `{"error": {...}}` envelope when it parses;
/// otherwise the raw text becomes the message.
fn status_error(
    status: StatusCode,
    body: &str,
    request_id: Option<String>,
    retry_after: Option<u64>,
) -> Error {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }

    #[derive(Deserialize)]
    struct Detail {
        #[serde(rename = "type")]
        error_type: Option<String>,
        message: Option<String>,
        param: Option<String>,
    }

    let detail = serde_json::from_str::<Envelope>(body).ok().map(|e| e.error);
    let (error_type, message, param) = match detail {
        Some(detail) => (
            detail.error_type,
            detail.message.unwrap_or_else(|| body.to_string()),
            detail.param,
        ),
        None => (None, body.trim().to_string(), None),
    };

    match status.as_u16() {
        400 => Error::bad_request(message, param),
        401 | 403 => Error::authentication(message),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        code @ (500 | 502..=504) => Error::unavailable(code, message, retry_after),
        code => Error::api(code, error_type, message, request_id),
    }
}
