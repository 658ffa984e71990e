
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::ProviderConfig;
use crate::{Result, ScriptSearchError};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

/// One embedded text: the vector, the provider-billed token count, and the
/// model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub embedding: Vec<f32>,
    pub tokens: u32,
    pub model: String,
}

/// Seam between the HTTP provider and its consumers, so search and seeding
/// are testable without a network.
pub trait EmbeddingGenerator {
    fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult>;
    fn generate_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>>;
}

/// HTTP client for an OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    endpoint: Url,
    api_key: String,
    model: String,
    dimensions: Option<u32>,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: EmbedInput<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbedInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
    usage: Usage,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Outcome of a single request attempt, before retry policy is applied.
enum RequestFailure {
    Retryable(String),
    Fatal(String),
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let endpoint = config
            .endpoint()
            .map_err(|e| ScriptSearchError::Config(e.to_string()))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    fn embed(&self, input: EmbedInput<'_>, expected: usize) -> Result<Vec<EmbeddingResult>> {
        let request = EmbedRequest {
            model: &self.model,
            input,
            dimensions: self.dimensions,
        };

        let request_json = serde_json::to_string(&request)
            .map_err(|e| ScriptSearchError::Provider(format!("failed to encode request: {e}")))?;

        let response_text = self.post_with_retry(&request_json)?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| ScriptSearchError::Provider(format!("failed to parse response: {e}")))?;

        if response.data.len() != expected {
            return Err(ScriptSearchError::Provider(format!(
                "mismatch between request and response counts: {} vs {}",
                expected,
                response.data.len()
            )));
        }

        if let Some(dimensions) = self.dimensions {
            for data in &response.data {
                if data.embedding.len() != dimensions as usize {
                    return Err(ScriptSearchError::Provider(format!(
                        "expected {} dimensions, provider returned {}",
                        dimensions,
                        data.embedding.len()
                    )));
                }
            }
        }

        let model = response.model.unwrap_or_else(|| self.model.clone());

        // Usage is billed per request, not per input; split it across the
        // inputs, putting the remainder on the first.
        let total_tokens = response.usage.total_tokens;
        let per_input = total_tokens / expected as u32;
        let remainder = total_tokens % expected as u32;

        let results = response
            .data
            .into_iter()
            .enumerate()
            .map(|(i, data)| EmbeddingResult {
                embedding: data.embedding,
                tokens: if i == 0 { per_input + remainder } else { per_input },
                model: model.clone(),
            })
            .collect();

        Ok(results)
    }

    fn post_with_retry(&self, payload: &str) -> Result<String> {
        let mut delay = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("Embedding request attempt {}/{}", attempt, self.retry_attempts);

            match self.post_once(payload) {
                Ok(body) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(body);
                }
                Err(RequestFailure::Fatal(message)) => {
                    warn!("Non-retryable provider error: {}", message);
                    return Err(ScriptSearchError::Provider(message));
                }
                Err(RequestFailure::Retryable(message)) => {
                    warn!(
                        "Retryable provider error (attempt {}/{}): {}",
                        attempt, self.retry_attempts, message
                    );
                    last_error = Some(message);

                    if attempt < self.retry_attempts {
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                        delay *= 2;
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.endpoint);

        Err(ScriptSearchError::Provider(
            last_error.unwrap_or_else(|| "request failed after retries".to_string()),
        ))
    }

    fn post_once(&self, payload: &str) -> std::result::Result<String, RequestFailure> {
        let response = self
            .agent
            .post(self.endpoint.as_str())
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(payload);

        match response {
            Ok(mut response) => {
                let status = response.status().as_u16();
                let body = response.body_mut().read_to_string().map_err(|e| {
                    RequestFailure::Retryable(format!("failed to read response body: {e}"))
                })?;

                if (200..300).contains(&status) {
                    return Ok(body);
                }

                // Deserialize the provider's error envelope right here at the
                // HTTP boundary; raw JSON never travels further.
                let message = serde_json::from_str::<ErrorEnvelope>(&body)
                    .map(|envelope| envelope.error.message)
                    .unwrap_or_else(|_| format!("HTTP {status}"));
                let message = format!("HTTP {status}: {message}");

                if status == 429 || status >= 500 {
                    Err(RequestFailure::Retryable(message))
                } else {
                    Err(RequestFailure::Fatal(message))
                }
            }
            Err(error) => {
                let retryable = matches!(
                    error,
                    ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_)
                );

                if retryable {
                    Err(RequestFailure::Retryable(format!("transport error: {error}")))
                } else {
                    Err(RequestFailure::Fatal(format!("request error: {error}")))
                }
            }
        }
    }
}

impl EmbeddingGenerator for EmbeddingClient {
    /// Embed a single text. One outbound HTTP call, retried per policy.
    #[inline]
    fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult> {
        if text.trim().is_empty() {
            return Err(ScriptSearchError::EmptyInput);
        }

        debug!("Generating embedding for text (length: {})", text.len());

        let mut results = self.embed(EmbedInput::Single(text), 1)?;
        Ok(results.remove(0))
    }

    /// Embed a batch of texts in one request; results come back in input
    /// order. An empty batch returns without any network call.
    #[inline]
    fn generate_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(ScriptSearchError::EmptyInput);
        }

        debug!("Generating embeddings for {} texts", texts.len());

        self.embed(EmbedInput::Batch(texts), texts.len())
    }
}
