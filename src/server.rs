//! HTTP serving routes for online feature retrieval.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::warn;

use crate::online::OnlineStoreError;
use crate::retrieval::{FeatureStore, OnlineRequest, RetrievalError};

pub fn feature_server_router(store: Arc<FeatureStore>) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/get-online-features", post(post_online_features))
        .with_state(store)
}

async fn get_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn post_online_features(
    State(store): State<Arc<FeatureStore>>,
    Json(request): Json<OnlineRequest>,
) -> impl IntoResponse {
    let joined = tokio::task::spawn_blocking(move || store.get_online_features(&request)).await;

    let result = match joined {
        Ok(result) => result,
        Err(join_err) => {
            warn!(
                component = "feature_server",
                event = "retrieval.worker_failed",
                error = %join_err
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "retrieval worker failed" })),
            )
                .into_response();
        }
    };

    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            let status = error_status(&err);
            warn!(
                component = "feature_server",
                event = "retrieval.failed",
                status = %status,
                error = %err
            );
            (status, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

fn error_status(err: &RetrievalError) -> StatusCode {
    match err {
        RetrievalError::UnknownFeature(_)
        | RetrievalError::UnknownEntity(_)
        | RetrievalError::MissingColumn(_)
        | RetrievalError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        RetrievalError::Online(OnlineStoreError::Unavailable { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
