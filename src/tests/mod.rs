
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::SearchConfig;
use crate::semantic::{
    Embedding, EmbeddingError, EmbeddingProvider, ProductMatch, ProductSearchService,
    SimilarityRequest, SimilaritySearch, StoreError,
};

/// What the fake embedding provider answers with.
#[derive(Clone)]
pub enum FakeEmbedding {
    Vector(Vec<f32>),
    Absent,
    Status(u16),
    Panic,
}

pub struct FakeEmbeddings {
    answer: FakeEmbedding,
    calls: AtomicUsize,
}

impl FakeEmbeddings {
    pub fn new(answer: FakeEmbedding) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddings {
    async fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            FakeEmbedding::Vector(values) => Ok(Embedding::Produced(values.clone())),
            FakeEmbedding::Absent => Ok(Embedding::Absent),
            FakeEmbedding::Status(code) => Err(EmbeddingError::Status {
                status: StatusCode::from_u16(*code).unwrap(),
                body: "provider error".to_string(),
            }),
            FakeEmbedding::Panic => panic!("embedding provider exploded"),
        }
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

pub struct FakeStore {
    answer: Result<Vec<ProductMatch>, String>,
    requests: Mutex<Vec<SimilarityRequest>>,
}

impl FakeStore {
    pub fn returning(products: Vec<ProductMatch>) -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(products),
            requests: Mutex::new(vec![]),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Err(message.to_string()),
            requests: Mutex::new(vec![]),
        })
    }

    pub fn requests(&self) -> Vec<SimilarityRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SimilaritySearch for FakeStore {
    async fn search_similar(
        &self,
        request: SimilarityRequest,
    ) -> Result<Vec<ProductMatch>, StoreError> {
        self.requests.lock().unwrap().push(request);
        match &self.answer {
            Ok(products) => Ok(products.clone()),
            Err(message) => Err(StoreError::Rpc {
                status: StatusCode::BAD_REQUEST,
                message: message.clone(),
            }),
        }
    }
}

pub fn product(ean: &str, nome: &str, similaridade: f64) -> ProductMatch {
    ProductMatch {
        ean: ean.to_string(),
        nome: nome.to_string(),
        preco: Some(9.99),
        unidade: Some("UN".to_string()),
        categoria: Some("Mercearia".to_string()),
        similaridade,
    }
}

pub fn sample_products() -> Vec<ProductMatch> {
    vec![
        product("7891000100103", "Arroz Branco 5kg", 0.873),
        product("7896005800010", "Arroz Integral 1kg", 0.61),
        product("7893500020134", "Farinha de Arroz 500g", 0.4),
    ]
}

pub fn create_service(
    embeddings: Arc<FakeEmbeddings>,
    store: Arc<FakeStore>,
) -> ProductSearchService {
    ProductSearchService::new(embeddings, store, SearchConfig::default())
}
