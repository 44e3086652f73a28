mod sentiment;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use finsent_core::ProviderKind;
use finsent_sentiment::SentimentScorer;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::request_id;

const SERVICE_MESSAGE: &str = "Sentiment Analysis Service";
const MODEL_NAME: &str = "FinBERT";
const REMOTE_MODEL_TYPE: &str = "huggingface_inference_api";

#[derive(Clone)]
pub struct AppState {
    pub scorer: SentimentScorer,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct RootData {
    message: &'static str,
    model: &'static str,
}

/// Health payload; its shape depends on the configured provider.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
enum HealthData {
    Local {
        status: &'static str,
        model_loaded: bool,
    },
    Remote {
        status: &'static str,
        model_type: &'static str,
    },
}

/// Any origin, method and header. Credentials are not allowed with wildcards.
fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/sentiment", post(sentiment::analyze_sentiment))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn root() -> Json<RootData> {
    Json(RootData {
        message: SERVICE_MESSAGE,
        model: MODEL_NAME,
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthData> {
    let provider = state.scorer.provider_state();
    let data = match provider.kind() {
        ProviderKind::Local => HealthData::Local {
            status: "healthy",
            model_loaded: provider.is_ready(),
        },
        ProviderKind::Remote => HealthData::Remote {
            status: "healthy",
            model_type: REMOTE_MODEL_TYPE,
        },
    };
    Json(data)
}
