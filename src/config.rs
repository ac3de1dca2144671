use serde::Deserialize;
use std::path::Path;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Remote procedure ranking products by embedding similarity
const DEFAULT_STORE_FUNCTION: &str = "buscar_produtos_similares";

/// Default embedding model (768 dimensions, matches the product index)
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_EMBEDDING_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default number of products returned per search
const DEFAULT_LIMIT: u32 = 5;
/// Default minimum similarity for a product to be returned
const DEFAULT_THRESHOLD: f64 = 0.4;

const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting `{key}` (set {env} or add it to config.yaml)")]
    Missing { key: &'static str, env: &'static str },

    #[error("invalid setting `{key}`: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),
}

/// Vector store holding the product index
#[derive(Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub service_key: String,

    /// Name of the similarity-search procedure
    #[serde(default = "default_store_function")]
    pub function: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            function: DEFAULT_STORE_FUNCTION.to_string(),
        }
    }
}

/// Remote embedding provider
#[derive(Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
        }
    }
}

/// Defaults applied when a request omits `limite` or `threshold`
#[derive(Clone, Debug, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Similarity threshold [0.0, 1.0]
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            default_threshold: DEFAULT_THRESHOLD,
        }
    }
}

fn default_store_function() -> String {
    DEFAULT_STORE_FUNCTION.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_base_url() -> String {
    DEFAULT_EMBEDDING_BASE_URL.to_string()
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

// Secrets stay out of Debug output so the config can be logged at startup.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config {{ listen_addr: {:?}, store.url: {:?}, store.service_key: [REDUCTED], store.function: {:?}, embedding.api_key: [REDUCTED], embedding.model: {:?}, embedding.base_url: {:?}, search: {:?} }}", self.listen_addr, self.store.url, self.store.function, self.embedding.model, self.embedding.base_url, self.search)
    }
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.url.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "store.url",
                env: "SUPABASE_URL",
            });
        }
        if self.store.service_key.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "store.service_key",
                env: "SUPABASE_SERVICE_ROLE_KEY",
            });
        }
        if self.embedding.api_key.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "embedding.api_key",
                env: "GOOGLE_API_KEY",
            });
        }

        url::Url::parse(&self.store.url).map_err(|err| ConfigError::Invalid {
            key: "store.url",
            message: err.to_string(),
        })?;
        url::Url::parse(&self.embedding.base_url).map_err(|err| ConfigError::Invalid {
            key: "embedding.base_url",
            message: err.to_string(),
        })?;

        if self.store.function.is_empty() {
            return Err(ConfigError::Invalid {
                key: "store.function",
                message: "must not be empty".to_string(),
            });
        }

        if self.search.default_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "search.default_limit",
                message: "must be greater than 0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.search.default_threshold) {
            return Err(ConfigError::Invalid {
                key: "search.default_threshold",
                message: format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.search.default_threshold
                ),
            });
        }

        Ok(())
    }

    /// Overlay environment variables on top of the file settings.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SUPABASE_URL") {
            self.store.url = url;
        }
        if let Some(key) = lookup("SUPABASE_SERVICE_ROLE_KEY") {
            self.store.service_key = key;
        }
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.embedding.api_key = key;
        }
        if let Some(addr) = lookup("BUSCA_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
    }

    /// Load `config.yaml` from `BUSCA_BASE_PATH` (or the working directory)
    /// and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let base_path = std::env::var("BUSCA_BASE_PATH").unwrap_or_else(|_| ".".to_string());
        Self::load_with(Path::new(&base_path), |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(base_path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = base_path.join(CONFIG_FILE);

        let mut config: Self = if path.exists() {
            let config_str = std::fs::read_to_string(&path)?;
            serde_yml::from_str(&config_str)?
        } else {
            log::debug!("{} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env(lookup);
        config.validate()?;

        Ok(config)
    }
}
