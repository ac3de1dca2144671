//! Remote embedding provider client.
//!
//! Turns query text into a vector by calling the Generative Language
//! `embedContent` endpoint:
//! - One POST per text, no retries, no caching
//! - A response without `embedding.values` is reported as [`Embedding::Absent`]
//! - Transport failures and non-2xx statuses are errors

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::config::EmbeddingConfig;

/// Outcome of an embedding request that reached the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    /// Non-empty vector produced by the model
    Produced(Vec<f32>),
    /// Provider answered but the response carried no usable vector
    Absent,
}

impl Embedding {
    fn from_values(values: Vec<f32>) -> Self {
        if values.is_empty() {
            Embedding::Absent
        } else {
            Embedding::Produced(values)
        }
    }
}

/// Error type for embedding requests
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Stored without its URL, which carries the API key.
    #[error("embedding request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("embedding provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl EmbeddingError {
    /// Rate limiting and provider-side failures may succeed if the caller
    /// tries again later; everything else points at the request itself.
    pub fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Transport(err) => err.is_timeout() || err.is_connect(),
            EmbeddingError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
        }
    }
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single non-empty text.
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Get the model name for logging
    fn model(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

/// Embedding provider backed by the Generative Language API.
pub struct GeminiEmbeddings {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiEmbeddings {
    pub fn new(config: &EmbeddingConfig, client: reqwest::Client) -> Self {
        let model = config
            .model
            .strip_prefix("models/")
            .unwrap_or(&config.model)
            .to_string();
        let base_url = config
            .base_url
            .strip_suffix('/')
            .unwrap_or(&config.base_url)
            .to_string();

        Self {
            client,
            api_key: config.api_key.clone(),
            model,
            base_url,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:embedContent", self.base_url, self.model)
    }

    /// Extract the vector from a 2xx body. Anything that does not carry
    /// `embedding.values` counts as absent.
    fn parse_response(body: &[u8]) -> Embedding {
        match serde_json::from_slice::<EmbedContentResponse>(body) {
            Ok(EmbedContentResponse {
                embedding: Some(embedding),
            }) => Embedding::from_values(embedding.values),
            Ok(EmbedContentResponse { embedding: None }) => Embedding::Absent,
            Err(err) => {
                log::warn!("embedding response could not be parsed: {err}");
                Embedding::Absent
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        log::debug!("embedding {} chars with {}", text.chars().count(), self.model);

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", &self.api_key)])
            .json(&json!({
                "model": format!("models/{}", self.model),
                "content": { "parts": [{ "text": text }] },
            }))
            .send()
            .await
            .map_err(|err| EmbeddingError::Transport(err.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status { status, body });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| EmbeddingError::Transport(err.without_url()))?;
        Ok(Self::parse_response(&body))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
