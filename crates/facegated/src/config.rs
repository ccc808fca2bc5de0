use facegate_backends::PineconeConfig;
use facegate_core::store::DEFAULT_COLLECTION;
use facegate_core::{DEFAULT_TOP_K, MATCH_THRESHOLD};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("PINECONE_API_KEY must be set when FACEGATE_STORE=pinecone")]
    MissingApiKey,
    #[error("unknown FACEGATE_STORE backend: {0} (expected `pinecone` or `memory`)")]
    UnknownStore(String),
}

/// Where signatures are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Pinecone,
    /// Process-local, lost on restart. Development only.
    Memory,
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 0.0.0.0:5000).
    pub bind_addr: String,
    pub store: StoreBackend,
    pub pinecone_api_key: Option<String>,
    /// Collection / index holding the signatures.
    pub index_name: String,
    pub pinecone_url: String,
    pub pinecone_cloud: String,
    pub pinecone_region: String,
    pub namespace: Option<String>,
    /// External program that prints face encodings for an image path.
    pub extractor_program: String,
    pub extractor_args: Vec<String>,
    /// Parent directory for per-request temp dirs.
    pub temp_dir: Option<PathBuf>,
    pub extract_timeout_secs: u64,
    pub store_timeout_secs: u64,
    /// Cosine similarity the best candidate must strictly exceed.
    pub match_threshold: f64,
    pub default_top_k: usize,
    pub max_upload_bytes: usize,
    /// Allowed CORS origins; empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = match var("FACEGATE_STORE").as_deref() {
            None | Some("pinecone") => StoreBackend::Pinecone,
            Some("memory") => StoreBackend::Memory,
            Some(other) => return Err(ConfigError::UnknownStore(other.to_string())),
        };

        let pinecone_api_key = var("PINECONE_API_KEY").filter(|k| !k.is_empty());
        if store == StoreBackend::Pinecone && pinecone_api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(Self {
            bind_addr: var("FACEGATE_BIND").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            store,
            pinecone_api_key,
            index_name: var("FACEGATE_INDEX_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            pinecone_url: var("FACEGATE_PINECONE_URL")
                .unwrap_or_else(|| facegate_backends::pinecone::DEFAULT_CONTROL_PLANE_URL.to_string()),
            pinecone_cloud: var("FACEGATE_PINECONE_CLOUD").unwrap_or_else(|| "aws".to_string()),
            pinecone_region: var("FACEGATE_PINECONE_REGION")
                .unwrap_or_else(|| "us-west-2".to_string()),
            namespace: var("FACEGATE_NAMESPACE").filter(|n| !n.is_empty()),
            extractor_program: var("FACEGATE_EXTRACTOR_CMD")
                .unwrap_or_else(|| "face-encodings".to_string()),
            extractor_args: var("FACEGATE_EXTRACTOR_ARGS")
                .map(|a| a.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            temp_dir: var("FACEGATE_TEMP_DIR").map(PathBuf::from),
            extract_timeout_secs: parsed(&var, "FACEGATE_EXTRACT_TIMEOUT_SECS", 30),
            store_timeout_secs: parsed(&var, "FACEGATE_STORE_TIMEOUT_SECS", 10),
            match_threshold: parsed(&var, "FACEGATE_MATCH_THRESHOLD", MATCH_THRESHOLD),
            default_top_k: parsed(&var, "FACEGATE_DEFAULT_TOP_K", DEFAULT_TOP_K).max(1),
            max_upload_bytes: parsed(&var, "FACEGATE_MAX_UPLOAD_BYTES", 16 * 1024 * 1024),
            cors_origins: var("FACEGATE_CORS_ORIGINS")
                .map(|o| {
                    o.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }

    /// Pinecone client settings. Only meaningful for the Pinecone backend.
    pub fn pinecone(&self) -> Result<PineconeConfig, ConfigError> {
        let api_key = self
            .pinecone_api_key
            .clone()
            .ok_or(ConfigError::MissingApiKey)?;
        let mut config = PineconeConfig::new(api_key, self.index_name.clone());
        config.control_plane_url = self.pinecone_url.clone();
        config.cloud = self.pinecone_cloud.clone();
        config.region = self.pinecone_region.clone();
        config.namespace = self.namespace.clone();
        config.timeout = Duration::from_secs(self.store_timeout_secs);
        Ok(config)
    }
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
