//! Session API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateSessionInput, Duration, SessionView, TableNumber, UpdateStatusInput};
use crate::services::SessionFilter;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(filter_sessions))
        .route("/", post(create_session))
        .route("/active", get(list_active))
        .route("/completed", get(list_completed))
        .route("/summary", get(summary))
        .route("/refresh", post(refresh))
        .route("/{id}/status", put(set_status))
}

/// Lookups the storefront needs to open a session
pub fn catalog_router() -> Router<AppState> {
    Router::new()
        .route("/tables", get(list_tables))
        .route("/durations", get(list_durations))
}

#[derive(Serialize)]
struct TablesResponse {
    tables: Vec<TableNumber>,
}

#[derive(Serialize)]
struct DurationsResponse {
    durations: Vec<Duration>,
}

#[derive(Serialize)]
struct SessionsResponse {
    sessions: Vec<SessionView>,
}

#[derive(Serialize)]
struct SessionResponse {
    session: SessionView,
}

#[derive(Serialize)]
struct RefreshResponse {
    active: Vec<SessionView>,
    completed: Vec<SessionView>,
}

#[derive(Deserialize)]
struct FilterQuery {
    filter: Option<String>,
}

async fn list_tables(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tables = state.session_service.list_tables().await?;
    Ok(Json(TablesResponse { tables }))
}

async fn list_durations(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let durations = state.session_service.list_durations().await?;
    Ok(Json(DurationsResponse { durations }))
}

async fn list_active(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.session_service.list_active().await;
    Json(SessionsResponse { sessions })
}

async fn list_completed(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.session_service.list_completed().await;
    Json(SessionsResponse { sessions })
}

/// `GET /sessions?filter=critical`; no filter means open sessions
async fn filter_sessions(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let criterion = match query.filter.as_deref() {
        None | Some("") => SessionFilter::Active,
        Some(raw) => raw
            .parse::<SessionFilter>()
            .map_err(|e| ApiError::validation_error(e.to_string()))?,
    };
    let sessions = state.session_service.filter(criterion).await;
    Ok(Json(SessionsResponse { sessions }))
}

async fn summary(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session_service.summary().await)
}

async fn refresh(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let sets = state.session_service.refresh().await?;
    Ok(Json(RefreshResponse {
        active: sets.active,
        completed: sets.completed,
    }))
}

async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateStatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session_service.set_status(id, input.status).await?;
    Ok(Json(SessionResponse { session }))
}

async fn create_session(
    State(state): State<AppState>,
    Json(input): Json<CreateSessionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session_service.create_session(input).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse { session })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{build_router, RequestStats};
    use crate::services::session::test_support::{service, t0, TestService};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use chrono::Duration;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(ts: &TestService) -> Router {
        let state = AppState {
            pool: ts.fx.pool.clone(),
            session_service: ts.service.clone(),
            request_stats: Arc::new(RequestStats::new()),
        };
        build_router(state, "http://localhost:3000").expect("Failed to build router")
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(b) => Body::from(b.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_create_then_list_active() {
        let ts = service().await;
        let app = app(&ts);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/sessions",
            Some(json!({
                "table_id": ts.fx.table.id,
                "duration_id": ts.fx.duration.id,
                "user_id": ts.fx.user.id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["session"]["status"], "active");
        assert_eq!(body["session"]["table_label"], "A1");
        assert_eq!(body["session"]["user"]["name"], "Ada Angler");

        let (status, body) = call(&app, Method::GET, "/api/v1/sessions/active", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_with_unknown_table_is_bad_request() {
        let ts = service().await;
        let app = app(&ts);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/sessions",
            Some(json!({
                "table_id": 999,
                "duration_id": ts.fx.duration.id,
                "user_id": ts.fx.user.id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_status_changes_over_http() {
        let ts = service().await;
        let app = app(&ts);
        let view = ts.service.create_session(ts.input()).await.unwrap();
        let uri = format!("/api/v1/sessions/{}/status", view.id());

        let (status, body) =
            call(&app, Method::PUT, &uri, Some(json!({ "status": "completed" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["status"], "completed");
        let completed_at = body["session"]["completed_at"].clone();

        // Second completion is a no-op success
        ts.clock.advance(Duration::minutes(1));
        let (status, body) =
            call(&app, Method::PUT, &uri, Some(json!({ "status": "completed" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["completed_at"], completed_at);

        let (status, body) =
            call(&app, Method::PUT, &uri, Some(json!({ "status": "active" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
        assert_eq!(body["error"]["details"]["from"], "completed");

        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/v1/sessions/9999/status",
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_summary_filter_and_refresh() {
        let ts = service().await;
        let app = app(&ts);
        ts.service.create_session(ts.input()).await.unwrap();
        let mut input = ts.input();
        input.start_time = Some(t0() - Duration::minutes(58));
        let critical = ts.service.create_session(input).await.unwrap();

        let (status, body) = call(&app, Method::GET, "/api/v1/sessions/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "total": 2, "active": 2, "completed": 0, "critical": 1 }));

        let (_, body) = call(&app, Method::GET, "/api/v1/sessions?filter=critical", None).await;
        let sessions = body["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["id"], critical.id());

        let (status, _) = call(&app, Method::GET, "/api/v1/sessions?filter=expired", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        ts.clock.advance(Duration::minutes(2));
        ts.service.monitor().tick().await;
        let (status, body) = call(&app, Method::POST, "/api/v1/sessions/refresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active"].as_array().unwrap().len(), 1);
        assert_eq!(body["completed"][0]["id"], critical.id());
    }

    #[tokio::test]
    async fn test_catalog_endpoints() {
        let ts = service().await;
        let app = app(&ts);

        let (status, body) = call(&app, Method::GET, "/api/v1/tables", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tables"][0]["label"], "A1");

        let (status, body) = call(&app, Method::GET, "/api/v1/durations", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["durations"][0]["name"], "1 hour");
        assert_eq!(body["durations"][0]["length_in_seconds"], 3600);
    }

    #[tokio::test]
    async fn test_store_outage_is_service_unavailable() {
        let ts = service().await;
        let app = app(&ts);
        ts.fx.pool.close().await;

        let (status, body) = call(&app, Method::POST, "/api/v1/sessions/refresh", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
    }
}
