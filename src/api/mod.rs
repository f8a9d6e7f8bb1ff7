//! API layer - HTTP handlers and routing
//!
//! - Session API endpoints under `/api/v1/sessions`
//! - Table and duration lookups at `/api/v1/tables` and `/api/v1/durations`
//! - Health check at `/api/v1/health`

pub mod middleware;
pub mod sessions;

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, RequestStats};

/// Build the API router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/sessions", sessions::router())
        .merge(sessions::catalog_router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .nest("/api/v1", build_api_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: bool,
    uptime_seconds: u64,
    total_requests: u64,
    avg_response_time_us: f64,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check ping failed: {:#}", e);
            false
        }
    };

    Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        uptime_seconds: state.request_stats.uptime_seconds(),
        total_requests: state.request_stats.total_requests(),
        avg_response_time_us: state.request_stats.avg_response_time_us(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::test_support::service;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_reports_database() {
        let ts = service().await;
        let state = AppState {
            pool: ts.fx.pool.clone(),
            session_service: ts.service.clone(),
            request_stats: Arc::new(RequestStats::new()),
        };
        let app = build_router(state, "http://localhost:3000").unwrap();

        let response = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], true);
    }

    #[tokio::test]
    async fn test_invalid_cors_origin_is_an_error() {
        let ts = service().await;
        let state = AppState {
            pool: ts.fx.pool.clone(),
            session_service: ts.service.clone(),
            request_stats: Arc::new(RequestStats::new()),
        };
        tokio_test::assert_err!(build_router(state, "bad\norigin"));
    }
}
