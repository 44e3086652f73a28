use axum::{extract::State, Extension, Json};
use finsent_sentiment::{SentimentRequest, SentimentResult};

use crate::middleware::RequestId;

use super::AppState;

/// `POST /sentiment`. Always answers 200; scoring failures come back as a
/// neutral result.
pub(super) async fn analyze_sentiment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<SentimentRequest>,
) -> Json<SentimentResult> {
    let result = state.scorer.analyze(&request.text).await;

    tracing::debug!(
        request_id = %req_id.0,
        text_len = request.text.len(),
        score = result.score,
        label = %result.label,
        "scored sentiment request"
    );

    Json(result)
}
