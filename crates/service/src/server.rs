//! axum routes for the search API.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use protocol::{ErrorResponse, SearchRequest};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::search_handler::{SearchError, SearchHandler};

pub type SharedHandler = Arc<dyn SearchHandler>;

pub fn router(handler: SharedHandler, cors_origins: &[String]) -> Router {
    let app = Router::new()
        .route("/api/search", get(search))
        .route("/api/status", get(status))
        .with_state(handler);
    match cors_layer(cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(%origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods([Method::GET])
            .allow_headers(Any),
    )
}

async fn search(
    State(handler): State<SharedHandler>,
    Query(req): Query<SearchRequest>,
) -> Response {
    // Encoding and scoring are CPU-bound and the HTTP provider blocks.
    let outcome = tokio::task::spawn_blocking(move || handler.search(req)).await;
    match outcome {
        Ok(Ok(resp)) => Json(resp).into_response(),
        Ok(Err(err @ SearchError::BadRequest(_))) => error(StatusCode::BAD_REQUEST, &err),
        Ok(Err(err @ SearchError::Internal(_))) => {
            tracing::error!(error = %err, "search failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, &err)
        }
        Err(join) => {
            tracing::error!(error = %join, "search task aborted");
            error(StatusCode::INTERNAL_SERVER_ERROR, &join)
        }
    }
}

async fn status(State(handler): State<SharedHandler>) -> Response {
    Json(handler.status()).into_response()
}

fn error(code: StatusCode, err: &dyn std::fmt::Display) -> Response {
    (code, Json(ErrorResponse::new(err.to_string()))).into_response()
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    let addr = listener.local_addr().context("read listener address")?;
    tracing::info!(%addr, "search API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
        })
        .await
        .context("serve HTTP")
}
