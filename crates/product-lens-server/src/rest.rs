//! HTTP JSON API.
//!
//! `POST /api` (and `POST /api/v1/extract`) takes `{ "link": "..." }` and
//! answers with `{ title, image, price }`. Any other method on those paths
//! is a 405.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use product_lens::ExtractError;

use crate::service::ProductService;

#[derive(Debug, Deserialize)]
pub struct ExtractBody {
    #[serde(default)]
    pub link: Option<String>,
}

/// Build the axum Router with all endpoints.
pub fn router(service: Arc<ProductService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api", post(handle_extract).fallback(method_not_allowed))
        .route(
            "/api/v1/extract",
            post(handle_extract).fallback(method_not_allowed),
        )
        .layer(cors)
        .with_state(service)
}

/// Serve the API until the listener fails.
pub async fn start(addr: &str, service: Arc<ProductService>) -> anyhow::Result<()> {
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Product Lens listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// HTTP status for each failure kind.
pub fn status_for(err: &ExtractError) -> StatusCode {
    match err {
        ExtractError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ExtractError::NotFound { .. } => StatusCode::NOT_FOUND,
        ExtractError::ChallengeSuspected { .. } | ExtractError::Upstream(_) => StatusCode::BAD_GATEWAY,
        ExtractError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ExtractError::Rules(_) | ExtractError::Io(_) | ExtractError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────

async fn health(State(service): State<Arc<ProductService>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "browser": service.browser().is_running().await,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_extract(
    State(service): State<Arc<ProductService>>,
    body: Result<Json<ExtractBody>, JsonRejection>,
) -> Response {
    let link = match body {
        Ok(Json(ExtractBody { link: Some(link) })) if !link.trim().is_empty() => link,
        Ok(_) => return link_required(),
        Err(rejection) => {
            tracing::debug!("Rejected request body: {rejection}");
            return link_required();
        }
    };

    match service.extract_product(&link).await {
        Ok(result) => {
            let summary = result.summary(service.config().diagnostics);
            (StatusCode::OK, Json(summary)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "message": "Method Not Allowed" })),
    )
        .into_response()
}

fn link_required() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "message": "Link is required" })),
    )
        .into_response()
}

fn error_response(err: &ExtractError) -> Response {
    let message = match err {
        ExtractError::InvalidInput(_) => "Invalid link",
        ExtractError::NotFound { .. } => "Product data not found",
        _ => "Error fetching product data",
    };
    (
        status_for(err),
        Json(json!({
            "message": message,
            "error": err.to_string(),
            "kind": err.kind(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&ExtractError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ExtractError::ChallengeSuspected { url: "u".into() }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&ExtractError::UpstreamTimeout { timeout_ms: 1 }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&ExtractError::Upstream("closed".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&ExtractError::Rules("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
