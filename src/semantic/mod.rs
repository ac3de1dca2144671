//! Semantic product search.
//!
//! # Architecture
//!
//! - `embeddings`: Remote embedding provider client
//! - `store`: Client for the similarity-search procedure of the product store
//! - `service`: Request validation, orchestration and response shaping

pub mod embeddings;
pub mod service;
pub mod store;

pub use embeddings::{Embedding, EmbeddingError, EmbeddingProvider};
pub use service::{ProductSearchService, SearchError, SearchQuery, SearchResponse};
pub use store::{ProductMatch, SimilarityRequest, SimilaritySearch, StoreError};
