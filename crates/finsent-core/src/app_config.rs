use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which inference backend the scorer talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// In-process classifier loaded at startup.
    Local,
    /// Hosted inference endpoint reached over HTTP.
    Remote,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Local => write!(f, "local"),
            ProviderKind::Remote => write!(f, "remote"),
        }
    }
}

/// Settings needed to build an inference provider.
#[derive(Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model_id: String,
    pub model_revision: String,
    /// When set, model files are read from this directory instead of the hub.
    pub model_dir: Option<PathBuf>,
    pub max_sequence_length: usize,
    pub inference_url: String,
    pub inference_timeout_secs: u64,
    pub huggingface_api_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model_id", &self.model_id)
            .field("model_revision", &self.model_revision)
            .field("model_dir", &self.model_dir)
            .field("max_sequence_length", &self.max_sequence_length)
            .field("inference_url", &self.inference_url)
            .field("inference_timeout_secs", &self.inference_timeout_secs)
            .field(
                "huggingface_api_key",
                &self.huggingface_api_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub provider: ProviderConfig,
}

impl AppConfig {
    /// The provider-related subset of the configuration.
    #[must_use]
    pub fn provider_config(&self) -> &ProviderConfig {
        &self.provider
    }
}
