//! Hosted inference endpoint (Hugging Face Inference API compatible).

use std::time::Duration;

use async_trait::async_trait;
use finsent_core::{ProviderConfig, ProviderKind};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::InferenceProvider;
use crate::error::ProviderError;
use crate::types::ClassProbabilities;

/// Inference over HTTP: one `POST {"inputs": text}` per call.
///
/// The client is built once with a fixed request timeout. There is no retry;
/// a timed-out call is a failed call.
pub struct RemoteProvider {
    client: Client,
    url: Url,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Text-classification endpoints answer either with a flat list of label
/// scores or with that list wrapped in a one-element batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationPayload {
    Flat(Vec<LabelScore>),
    Batched(Vec<Vec<LabelScore>>),
}

impl RemoteProvider {
    /// Build from the `FINSENT_INFERENCE_*` / `HUGGINGFACE_API_KEY` settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the URL or credential is
    /// invalid or the HTTP client cannot be constructed.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::new(
            &config.inference_url,
            config.huggingface_api_key.as_deref(),
            Duration::from_secs(config.inference_timeout_secs),
        )
    }

    /// Creates a provider posting to `url`, sending `Authorization: Bearer <api_key>`
    /// when a key is given.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] if the URL or credential is
    /// invalid or the HTTP client cannot be constructed.
    pub fn new(url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, ProviderError> {
        let url = Url::parse(url).map_err(|e| {
            ProviderError::Unavailable(format!("invalid inference URL '{url}': {e}"))
        })?;

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                ProviderError::Unavailable(
                    "API key contains characters not allowed in a header".to_string(),
                )
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .user_agent("finsent/0.1 (sentiment-service)")
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("HTTP client build failed: {e}")))?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl InferenceProvider for RemoteProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Remote
    }

    async fn infer(&self, text: &str) -> Result<ClassProbabilities, ProviderError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&InferenceRequest { inputs: text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status));
        }

        let body = response.bytes().await?;
        parse_class_scores(&body)
    }
}

/// Extract positive/negative scores from a label-score list.
///
/// Labels are matched case-insensitively by substring. Anything that is
/// neither positive nor negative, neutral included, is ignored.
fn parse_class_scores(body: &[u8]) -> Result<ClassProbabilities, ProviderError> {
    let payload: ClassificationPayload = serde_json::from_slice(body)
        .map_err(|e| ProviderError::Malformed(format!("expected a list of label scores: {e}")))?;

    let scores = match payload {
        ClassificationPayload::Flat(scores) => scores,
        ClassificationPayload::Batched(batch) => batch.into_iter().next().unwrap_or_default(),
    };

    if scores.is_empty() {
        return Err(ProviderError::Malformed(
            "empty label score list".to_string(),
        ));
    }

    let mut probs = ClassProbabilities::default();
    for LabelScore { label, score } in scores {
        let label = label.to_lowercase();
        if label.contains("positive") {
            probs.positive = score;
        } else if label.contains("negative") {
            probs.negative = score;
        }
    }

    Ok(probs)
}
