use serde::{Deserialize, Serialize};

/// Text submitted for scoring.
///
/// Empty text is accepted; the provider decides what it makes of it.
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentRequest {
    pub text: String,
}

/// Class probabilities produced by an inference provider for one input.
///
/// Each component is expected in `[0.0, 1.0]`. The three are not required to
/// sum to one; the scorer trusts the provider's normalization.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassProbabilities {
    pub positive: f64,
    pub negative: f64,
    /// Not used by the score. The remote provider leaves it at `0.0`.
    pub neutral: f64,
}

impl ClassProbabilities {
    #[must_use]
    pub fn new(positive: f64, negative: f64, neutral: f64) -> Self {
        Self {
            positive,
            negative,
            neutral,
        }
    }

    /// Net polarity `positive - negative`, or `None` when any component is
    /// non-finite or outside `[0.0, 1.0]`.
    #[must_use]
    pub fn polarity(&self) -> Option<f64> {
        let in_range = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        if in_range(self.positive) && in_range(self.negative) && in_range(self.neutral) {
            Some(self.positive - self.negative)
        } else {
            None
        }
    }
}

/// Categorical sentiment derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored sentiment for one input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentResult {
    /// Net polarity in `[-1.0, 1.0]`.
    pub score: f64,
    pub label: SentimentLabel,
}
