//! Inference providers: the capability that turns text into class probabilities.

#[cfg(feature = "local-model")]
mod local;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use finsent_core::{ProviderConfig, ProviderKind};

use crate::error::ProviderError;
use crate::types::ClassProbabilities;

#[cfg(feature = "local-model")]
pub use local::LocalModelProvider;
pub use remote::RemoteProvider;

/// Maps text to positive/negative/neutral probabilities.
///
/// Implementations must be safe to share between concurrent requests and must
/// not mutate their loaded state while serving a call.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Which realization this is.
    fn kind(&self) -> ProviderKind;

    /// Classify `text`.
    ///
    /// # Errors
    ///
    /// Returns a per-call [`ProviderError`] on transport, parsing or model failure.
    async fn infer(&self, text: &str) -> Result<ClassProbabilities, ProviderError>;
}

/// Process-wide inference handle, built once at startup.
///
/// A provider that failed to initialize stays [`ProviderState::Unavailable`]
/// for the rest of the process; it is never retried.
#[derive(Clone)]
pub enum ProviderState {
    Ready(Arc<dyn InferenceProvider>),
    Unavailable { kind: ProviderKind, reason: Arc<str> },
}

impl ProviderState {
    #[must_use]
    pub fn ready(provider: impl InferenceProvider + 'static) -> Self {
        Self::Ready(Arc::new(provider))
    }

    #[must_use]
    pub fn unavailable(kind: ProviderKind, reason: impl Into<Arc<str>>) -> Self {
        Self::Unavailable {
            kind,
            reason: reason.into(),
        }
    }

    /// The configured realization, whether or not it initialized.
    #[must_use]
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Ready(provider) => provider.kind(),
            Self::Unavailable { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl std::fmt::Debug for ProviderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(provider) => f
                .debug_tuple("Ready")
                .field(&provider.kind())
                .finish(),
            Self::Unavailable { kind, reason } => f
                .debug_struct("Unavailable")
                .field("kind", kind)
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Build the configured provider.
///
/// Never fails: an initialization error is logged and recorded as
/// [`ProviderState::Unavailable`]. Loading the local model reads weights from
/// disk (and possibly the network), so call this from a blocking context.
#[must_use]
pub fn init_provider(config: &ProviderConfig) -> ProviderState {
    tracing::info!(provider = %config.kind, "initializing inference provider");

    let built = match config.kind {
        ProviderKind::Remote => RemoteProvider::from_config(config).map(ProviderState::ready),
        ProviderKind::Local => build_local(config),
    };

    match built {
        Ok(state) => {
            tracing::info!(provider = %config.kind, "inference provider ready");
            state
        }
        Err(e) => {
            tracing::error!(
                provider = %config.kind,
                error = %e,
                "inference provider failed to initialize; scoring will fall back to neutral"
            );
            ProviderState::unavailable(config.kind, e.to_string())
        }
    }
}

#[cfg(feature = "local-model")]
fn build_local(config: &ProviderConfig) -> Result<ProviderState, ProviderError> {
    LocalModelProvider::load(config).map(ProviderState::ready)
}

#[cfg(not(feature = "local-model"))]
fn build_local(_config: &ProviderConfig) -> Result<ProviderState, ProviderError> {
    Err(ProviderError::Unavailable(
        "local model support was not compiled in (enable the `local-model` feature)".to_string(),
    ))
}
