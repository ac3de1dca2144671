//! Client for the remote similarity-search procedure.
//!
//! The store ranks, filters and limits matches itself; results are passed
//! through in the order received.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::StoreConfig;

/// Named parameters of the similarity-search procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityRequest {
    pub query_embedding: Vec<f32>,
    pub limite: u32,
    pub threshold: f64,
}

/// Product row returned by the store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductMatch {
    pub ean: String,
    pub nome: String,
    #[serde(default)]
    pub preco: Option<f64>,
    #[serde(default)]
    pub unidade: Option<String>,
    #[serde(default)]
    pub categoria: Option<String>,
    /// Similarity in [0.0, 1.0]; a null or missing score reads as 0.0
    #[serde(default, deserialize_with = "null_as_zero")]
    pub similaridade: f64,
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The procedure reported an error; `message` is the store's own text.
    #[error("{message}")]
    Rpc { status: StatusCode, message: String },

    #[error("{0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn search_similar(
        &self,
        request: SimilarityRequest,
    ) -> Result<Vec<ProductMatch>, StoreError>;
}

/// Error body of the REST gateway in front of the store.
#[derive(Deserialize)]
struct RpcErrorBody {
    message: Option<String>,
}

/// Calls the procedure through the store's REST RPC gateway
/// (`POST {url}/rest/v1/rpc/{function}`).
pub struct RestRpcStore {
    client: reqwest::Client,
    endpoint: String,
    service_key: String,
}

impl RestRpcStore {
    pub fn new(config: &StoreConfig, client: reqwest::Client) -> Self {
        let base = config.url.strip_suffix('/').unwrap_or(&config.url);

        Self {
            client,
            endpoint: format!("{base}/rest/v1/rpc/{}", config.function),
            service_key: config.service_key.clone(),
        }
    }

    fn error_message(status: StatusCode, body: &str) -> String {
        if let Ok(RpcErrorBody {
            message: Some(message),
        }) = serde_json::from_str::<RpcErrorBody>(body)
        {
            return message;
        }

        if body.trim().is_empty() {
            status.to_string()
        } else {
            body.to_string()
        }
    }
}

#[async_trait]
impl SimilaritySearch for RestRpcStore {
    async fn search_similar(
        &self,
        request: SimilarityRequest,
    ) -> Result<Vec<ProductMatch>, StoreError> {
        log::debug!(
            "rpc {} limite={} threshold={} dims={}",
            self.endpoint,
            request.limite,
            request.threshold,
            request.query_embedding.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(StoreError::Rpc {
                status,
                message: Self::error_message(status, &text),
            });
        }

        // `null` means the procedure returned no rows.
        let matches: Option<Vec<ProductMatch>> = serde_json::from_str(&text).map_err(|err| {
            log::error!("{err}. tried to parse: {text:?}");
            err
        })?;

        Ok(matches.unwrap_or_default())
    }
}
