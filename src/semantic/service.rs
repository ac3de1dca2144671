//! Product search service.
//!
//! Runs one search request end to end:
//! - Validates the JSON payload and applies default parameters
//! - Embeds the query text
//! - Calls the similarity-search procedure
//! - Shapes the response, converting similarity to a percentage

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::{Config, SearchConfig};
use crate::semantic::embeddings::{Embedding, EmbeddingError, EmbeddingProvider, GeminiEmbeddings};
use crate::semantic::store::{
    ProductMatch, RestRpcStore, SimilarityRequest, SimilaritySearch, StoreError,
};

/// Errors that end a search request.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Query é obrigatória")]
    MissingQuery,

    #[error("{0}")]
    InvalidParameter(&'static str),

    #[error("Falha ao gerar embedding")]
    EmbeddingAbsent,

    #[error("Falha ao gerar embedding")]
    Embedding(#[source] EmbeddingError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Payload(#[from] serde_json::Error),
}

/// Validated search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub limit: u32,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductHit {
    pub ean: String,
    pub nome: String,
    pub preco: Option<f64>,
    pub unidade: Option<String>,
    pub categoria: Option<String>,
    /// Similarity as a rounded percentage
    pub similaridade: i64,
}

impl From<ProductMatch> for ProductHit {
    fn from(product: ProductMatch) -> Self {
        Self {
            similaridade: similarity_percent(product.similaridade),
            ean: product.ean,
            nome: product.nome,
            preco: product.preco,
            unidade: product.unidade,
            categoria: product.categoria,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub produtos: Vec<ProductHit>,
}

impl SearchResponse {
    fn new(query: String, matches: Vec<ProductMatch>) -> Self {
        let produtos: Vec<ProductHit> = matches.into_iter().map(Into::into).collect();
        Self {
            query,
            total: produtos.len(),
            produtos,
        }
    }
}

/// `round(similarity * 100)`; values outside [0, 1] are not clamped.
pub fn similarity_percent(similarity: f64) -> i64 {
    (similarity * 100.0).round() as i64
}

/// Stateless across requests; share it behind an `Arc`.
pub struct ProductSearchService {
    embeddings: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn SimilaritySearch>,
    defaults: SearchConfig,
}

impl ProductSearchService {
    pub fn new(
        embeddings: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn SimilaritySearch>,
        defaults: SearchConfig,
    ) -> Self {
        Self {
            embeddings,
            store,
            defaults,
        }
    }

    /// Build the service with the remote collaborators described by `config`.
    /// Both share one HTTP client.
    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::new();

        Self::new(
            Arc::new(GeminiEmbeddings::new(&config.embedding, client.clone())),
            Arc::new(RestRpcStore::new(&config.store, client)),
            config.search.clone(),
        )
    }

    /// Parse a raw request body into a [`SearchQuery`].
    ///
    /// The query text is checked before any other field, so a missing query
    /// is reported even when `limite` or `threshold` are invalid too.
    pub fn parse_request(&self, body: &[u8]) -> Result<SearchQuery, SearchError> {
        let payload: Value = serde_json::from_slice(body)?;

        let text = match payload.get("query") {
            Some(Value::String(text)) if !text.is_empty() => text.clone(),
            _ => return Err(SearchError::MissingQuery),
        };

        let limit = match payload.get("limite") {
            None | Some(Value::Null) => self.defaults.default_limit,
            Some(value) => value
                .as_u64()
                .filter(|limit| *limit > 0)
                .and_then(|limit| u32::try_from(limit).ok())
                .ok_or(SearchError::InvalidParameter(
                    "limite deve ser um inteiro positivo",
                ))?,
        };

        let threshold = match payload.get("threshold") {
            None | Some(Value::Null) => self.defaults.default_threshold,
            Some(value) => value
                .as_f64()
                .filter(|threshold| (0.0..=1.0).contains(threshold))
                .ok_or(SearchError::InvalidParameter(
                    "threshold deve estar entre 0 e 1",
                ))?,
        };

        Ok(SearchQuery {
            text,
            limit,
            threshold,
        })
    }

    /// Embed the query, run the similarity search and shape the response.
    pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse, SearchError> {
        log::info!("generating embedding for {:?}", query.text);

        let query_embedding = match self.embeddings.embed(&query.text).await {
            Ok(Embedding::Produced(vector)) => vector,
            Ok(Embedding::Absent) => {
                log::error!(
                    "embedding provider ({}) returned no vector",
                    self.embeddings.model()
                );
                return Err(SearchError::EmbeddingAbsent);
            }
            Err(err) => {
                log::error!("{err} (transient: {})", err.is_transient());
                return Err(SearchError::Embedding(err));
            }
        };

        let matches = self
            .store
            .search_similar(SimilarityRequest {
                query_embedding,
                limite: query.limit,
                threshold: query.threshold,
            })
            .await
            .map_err(|err| {
                log::error!("similarity search failed: {err:?}");
                err
            })?;

        let response = SearchResponse::new(query.text, matches);
        log::info!("found {} products for {:?}", response.total, response.query);

        Ok(response)
    }

    /// Full pipeline for one raw request body.
    pub async fn handle(&self, body: &[u8]) -> Result<SearchResponse, SearchError> {
        let query = self.parse_request(body)?;
        self.search(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(similaridade: f64) -> ProductMatch {
        ProductMatch {
            ean: "7891000100103".to_string(),
            nome: "Arroz Branco 5kg".to_string(),
            preco: Some(27.9),
            unidade: Some("UN".to_string()),
            categoria: Some("Mercearia".to_string()),
            similaridade,
        }
    }

    #[test]
    fn test_similarity_percent() {
        assert_eq!(similarity_percent(0.873), 87);
        assert_eq!(similarity_percent(0.875), 88);
        assert_eq!(similarity_percent(0.0), 0);
        assert_eq!(similarity_percent(1.0), 100);
        assert_eq!(similarity_percent(0.4), 40);
    }

    #[test]
    fn test_product_hit_keeps_fields() {
        let hit = ProductHit::from(product(0.61));
        assert_eq!(hit.ean, "7891000100103");
        assert_eq!(hit.nome, "Arroz Branco 5kg");
        assert_eq!(hit.preco, Some(27.9));
        assert_eq!(hit.unidade.as_deref(), Some("UN"));
        assert_eq!(hit.categoria.as_deref(), Some("Mercearia"));
        assert_eq!(hit.similaridade, 61);
    }

    #[test]
    fn test_response_total_matches_products() {
        let response = SearchResponse::new(
            "arroz".to_string(),
            vec![product(0.9), product(0.8), product(0.7)],
        );
        assert_eq!(response.total, 3);
        assert_eq!(response.produtos.len(), 3);
        assert_eq!(
            response
                .produtos
                .iter()
                .map(|p| p.similaridade)
                .collect::<Vec<_>>(),
            vec![90, 80, 70]
        );

        let empty = SearchResponse::new("arroz".to_string(), vec![]);
        assert_eq!(empty.total, 0);
        assert!(empty.produtos.is_empty());
    }

    #[test]
    fn test_response_serialization_order() {
        let response = SearchResponse::new("arroz".to_string(), vec![product(0.873)]);
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"query":"arroz","total":1,"produtos":[{"ean":"7891000100103","nome":"Arroz Branco 5kg","preco":27.9,"unidade":"UN","categoria":"Mercearia","similaridade":87}]}"#
        );
    }
}
