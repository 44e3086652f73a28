use thiserror::Error;

/// Errors raised by an inference provider.
///
/// [`ProviderError::Unavailable`] is reported once, when the provider is
/// built. Every other variant describes a single failed call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider could not be initialized (model load, bad configuration).
    #[error("inference provider unavailable: {0}")]
    Unavailable(String),

    /// Network, TLS or timeout failure from the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The inference endpoint answered with a non-success status.
    #[error("inference endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    /// The provider returned something that is not a usable set of class scores.
    #[error("malformed inference response: {0}")]
    Malformed(String),

    /// Tokenization or the model forward pass failed.
    #[error("model inference failed: {0}")]
    Inference(String),

    /// The blocking inference task panicked or was cancelled.
    #[error("inference task failed: {0}")]
    Join(String),
}

impl ProviderError {
    /// `true` for initialization failures, `false` for per-call failures.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<tokio::task::JoinError> for ProviderError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}
