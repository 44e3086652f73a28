//! Financial-text sentiment scoring for finsent.
//!
//! An [`InferenceProvider`] turns text into positive/negative/neutral class
//! probabilities, either with an in-process BERT classifier or through a hosted
//! inference endpoint. [`SentimentScorer`] collapses those probabilities into a
//! single score in `[-1.0, 1.0]` and falls back to a neutral `0.0` whenever the
//! provider is unavailable or a call fails, so callers always get a result.

pub mod error;
pub mod provider;
pub mod scorer;
pub mod types;

pub use error::ProviderError;
pub use provider::{init_provider, InferenceProvider, ProviderState, RemoteProvider};
pub use scorer::{
    classify, SentimentScorer, NEGATIVE_THRESHOLD, NEUTRAL_SCORE, POSITIVE_THRESHOLD,
};
pub use types::{ClassProbabilities, SentimentLabel, SentimentRequest, SentimentResult};

#[cfg(feature = "local-model")]
pub use provider::LocalModelProvider;
