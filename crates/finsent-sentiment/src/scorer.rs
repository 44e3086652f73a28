//! Collapses class probabilities into a bounded score and a label.

use crate::provider::ProviderState;
use crate::types::{SentimentLabel, SentimentResult};

/// Scores strictly above this are positive.
pub const POSITIVE_THRESHOLD: f64 = 0.1;
/// Scores strictly below this are negative.
pub const NEGATIVE_THRESHOLD: f64 = -0.1;
/// Returned whenever the provider cannot produce a usable answer.
pub const NEUTRAL_SCORE: f64 = 0.0;

/// Classify a score. `±0.1` themselves are neutral, as is `NaN`.
#[must_use]
pub fn classify(score: f64) -> SentimentLabel {
    if score > POSITIVE_THRESHOLD {
        SentimentLabel::Positive
    } else if score < NEGATIVE_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// Sentiment scorer over an injected provider handle.
///
/// Scoring never fails: an unavailable provider, a failed call or a malformed
/// answer all produce [`NEUTRAL_SCORE`]. Cloning is cheap and clones share the
/// same provider.
#[derive(Debug, Clone)]
pub struct SentimentScorer {
    state: ProviderState,
}

impl SentimentScorer {
    #[must_use]
    pub fn new(state: ProviderState) -> Self {
        Self { state }
    }

    #[must_use]
    pub fn provider_state(&self) -> &ProviderState {
        &self.state
    }

    /// Net polarity `positive - negative` for `text`, in `[-1.0, 1.0]`.
    pub async fn score(&self, text: &str) -> f64 {
        let provider = match &self.state {
            ProviderState::Ready(provider) => provider,
            ProviderState::Unavailable { kind, reason } => {
                tracing::warn!(
                    provider = %kind,
                    reason = %reason,
                    "inference provider unavailable; returning neutral score"
                );
                return NEUTRAL_SCORE;
            }
        };

        match provider.infer(text).await {
            Ok(probs) => match probs.polarity() {
                Some(score) => score,
                None => {
                    tracing::warn!(
                        provider = %provider.kind(),
                        positive = probs.positive,
                        negative = probs.negative,
                        neutral = probs.neutral,
                        "provider returned probabilities outside [0, 1]; returning neutral score"
                    );
                    NEUTRAL_SCORE
                }
            },
            Err(e) => {
                tracing::error!(
                    provider = %provider.kind(),
                    error = %e,
                    "sentiment inference failed; returning neutral score"
                );
                NEUTRAL_SCORE
            }
        }
    }

    /// Score and classify `text`.
    pub async fn analyze(&self, text: &str) -> SentimentResult {
        let score = self.score(text).await;
        SentimentResult {
            score,
            label: classify(score),
        }
    }
}
