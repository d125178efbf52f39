use crate::store::{BranchStore, StoreError};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use crash::BranchId;
use log::warn;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct AppState {
    store: Arc<BranchStore>,
    token: Option<Arc<str>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerBody {
    intensity_percent: u32,
    duration_minutes: u32,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        let status = match error {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::AlreadyActive(_) | StoreError::NotActive(_) => StatusCode::CONFLICT,
            StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Builds the REST surface over `store`.
///
/// When `token` is set every `/api` route requires `Authorization: Bearer <token>`.
pub fn router(store: Arc<BranchStore>, token: Option<String>) -> Router {
    let state = AppState {
        store,
        token: token.map(Arc::from),
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/branches", get(list_branches))
        .route("/api/branches/:branch_id", get(get_branch))
        .route("/api/branches/:branch_id/crash", post(trigger_crash))
        .route("/api/branches/:branch_id/crash/end", post(end_crash))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(token) = &state.token else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented == Some(&token[..]) {
        Ok(())
    } else {
        warn!("Rejected request with missing or wrong bearer token");
        Err(ApiError {
            status: StatusCode::UNAUTHORIZED,
            message: "Unauthorized".to_string(),
        })
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn list_branches(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    authorize(&state, &headers)?;
    let branches = state.store.list(Utc::now());
    Ok(Json(json!({ "data": branches })))
}

async fn get_branch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(branch_id): Path<String>,
) -> ApiResult {
    authorize(&state, &headers)?;
    let branch = state.store.get(&BranchId::new(branch_id), Utc::now())?;
    Ok(Json(json!({ "data": branch })))
}

async fn trigger_crash(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(branch_id): Path<String>,
    Json(body): Json<TriggerBody>,
) -> ApiResult {
    authorize(&state, &headers)?;
    let branch = state.store.trigger(
        &BranchId::new(branch_id),
        body.intensity_percent,
        body.duration_minutes,
        Utc::now(),
    )?;
    Ok(Json(json!({
        "message": format!(
            "Market crash triggered for {} ({}% for {} min)",
            branch.label(),
            body.intensity_percent,
            body.duration_minutes
        ),
        "data": branch,
    })))
}

async fn end_crash(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(branch_id): Path<String>,
) -> ApiResult {
    authorize(&state, &headers)?;
    let id = BranchId::new(branch_id);
    let reset_count = state.store.end(&id, Utc::now())?;
    Ok(Json(json!({
        "message": format!("Market crash ended for {}", id),
        "data": { "resetCount": reset_count },
    })))
}
