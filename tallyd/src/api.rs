//! HTTP API for the tally daemon.
//!
//! Thin host adapter over the [`Controller`]. Handlers translate requests
//! into controller operations and return owned snapshots:
//! - Health check
//! - Session view, loading and filters
//! - Count entry (keypad)
//! - Apply-all
//! - Add position

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use tally_domain::{Location, LocationId, PositionId, Product, ProductId};
use tally_engine::KeyOutcome;
use tally_store::StatusFilter;

use crate::controller::{Controller, CountReport, LoadOutcome};
use crate::error::{ControllerError, ErrorKind, ValidationError};
use crate::notify::Notification;
use crate::session::{ActiveCount, SessionSnapshot};

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    pub controller: Arc<Controller>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Load response.
#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub outcome: LoadOutcome,
    pub session: SessionSnapshot,
}

/// Request to scope the session to a location.
#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    #[serde(default)]
    pub location_id: Option<LocationId>,
}

/// Request to set the free-text search.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// Request to set the status partition.
#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    pub status: String,
}

/// One keypad keystroke.
#[derive(Debug, Deserialize)]
pub struct KeyRequest {
    pub key: String,
}

/// Key response.
#[derive(Debug, Serialize)]
pub struct KeyResponse {
    pub outcome: KeyOutcome,
    pub active_count: ActiveCount,
}

/// Quick-set request.
#[derive(Debug, Deserialize)]
pub struct QuickSetRequest {
    pub value: String,
}

/// Confirm request. Without a quantity the keypad buffer is used.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub quantity: Option<Decimal>,
}

/// Product search query string.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    #[serde(default)]
    pub q: String,
}

/// Request to add a product at a location.
#[derive(Debug, Deserialize)]
pub struct AddPositionRequest {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    pub quantity: Decimal,
}

/// Add position response.
#[derive(Debug, Serialize)]
pub struct AddPositionResponse {
    pub position_id: PositionId,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/session", get(session_handler))
        .route("/session/load", post(load_handler))
        .route("/session/load-more", post(load_more_handler))
        .route("/session/refresh", post(refresh_handler))
        .route("/session/location", post(location_handler))
        .route("/session/search", post(search_handler))
        .route("/session/filter", post(filter_handler))
        .route("/session/apply-all", post(apply_all_handler))
        .route("/locations", get(locations_handler))
        .route("/count/:id/open", post(open_count_handler))
        .route("/count/key", post(key_handler))
        .route("/count/backspace", post(backspace_handler))
        .route("/count/quick-set", post(quick_set_handler))
        .route("/count/confirm", post(confirm_handler))
        .route("/count/skip", post(skip_handler))
        .route("/count/close", post(close_handler))
        .route("/positions", post(add_position_handler))
        .route("/positions/:id/match", post(match_handler))
        .route("/products", get(products_handler))
        .route("/notification", get(notification_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn session_handler(State(state): State<Arc<ApiState>>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot().await)
}

async fn load_handler(State(state): State<Arc<ApiState>>) -> ApiResult<Json<LoadResponse>> {
    let outcome = state.controller.load_all().await.map_err(to_error_response)?;
    Ok(load_response(&state, outcome).await)
}

async fn load_more_handler(State(state): State<Arc<ApiState>>) -> ApiResult<Json<LoadResponse>> {
    let outcome = state.controller.load_more().await.map_err(to_error_response)?;
    Ok(load_response(&state, outcome).await)
}

async fn refresh_handler(State(state): State<Arc<ApiState>>) -> ApiResult<Json<LoadResponse>> {
    let outcome = state.controller.refresh().await.map_err(to_error_response)?;
    Ok(load_response(&state, outcome).await)
}

async fn location_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<LocationRequest>,
) -> ApiResult<Json<LoadResponse>> {
    let outcome = state
        .controller
        .set_location(req.location_id)
        .await
        .map_err(to_error_response)?;
    Ok(load_response(&state, outcome).await)
}

async fn search_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SearchRequest>,
) -> Json<SessionSnapshot> {
    state.controller.search(&req.query).await;
    Json(state.controller.snapshot().await)
}

async fn filter_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<FilterRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    let status = StatusFilter::from_str(&req.status)
        .map_err(|e| to_error_response(ControllerError::from(e)))?;
    state.controller.set_filter(status).await;
    Ok(Json(state.controller.snapshot().await))
}

async fn apply_all_handler(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Json<SessionSnapshot>> {
    state.controller.apply_all().await.map_err(to_error_response)?;
    Ok(Json(state.controller.snapshot().await))
}

async fn locations_handler(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Vec<Location>>> {
    let locations = state
        .controller
        .load_locations()
        .await
        .map_err(to_error_response)?;
    Ok(Json(locations))
}

async fn open_count_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<PositionId>,
) -> ApiResult<Json<ActiveCount>> {
    let active = state.controller.open_count(id).await.map_err(to_error_response)?;
    Ok(Json(active))
}

async fn key_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<KeyRequest>,
) -> ApiResult<Json<KeyResponse>> {
    let mut chars = req.key.chars();
    let ch = match (chars.next(), chars.next()) {
        (Some(ch), None) => ch,
        _ => {
            return Err(to_error_response(
                ValidationError::Invalid(format!("Expected a single key, got: {:?}", req.key))
                    .into(),
            ))
        },
    };

    let outcome = state.controller.key(ch).await.map_err(to_error_response)?;
    let active_count = state
        .controller
        .active_count()
        .await
        .map_err(to_error_response)?;
    Ok(Json(KeyResponse {
        outcome,
        active_count,
    }))
}

async fn backspace_handler(State(state): State<Arc<ApiState>>) -> ApiResult<Json<ActiveCount>> {
    state.controller.backspace().await.map_err(to_error_response)?;
    let active = state
        .controller
        .active_count()
        .await
        .map_err(to_error_response)?;
    Ok(Json(active))
}

async fn quick_set_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<QuickSetRequest>,
) -> ApiResult<Json<ActiveCount>> {
    state
        .controller
        .quick_set(&req.value)
        .await
        .map_err(to_error_response)?;
    let active = state
        .controller
        .active_count()
        .await
        .map_err(to_error_response)?;
    Ok(Json(active))
}

async fn confirm_handler(
    State(state): State<Arc<ApiState>>,
    body: Option<Json<ConfirmRequest>>,
) -> ApiResult<Json<CountReport>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let report = match req.quantity {
        Some(quantity) => state.controller.confirm_count(quantity).await,
        None => state.controller.confirm_active().await,
    }
    .map_err(to_error_response)?;
    Ok(Json(report))
}

async fn skip_handler(State(state): State<Arc<ApiState>>) -> ApiResult<StatusCode> {
    state.controller.skip().await.map_err(to_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn close_handler(State(state): State<Arc<ApiState>>) -> StatusCode {
    state.controller.close_count().await;
    StatusCode::NO_CONTENT
}

async fn match_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<PositionId>,
) -> ApiResult<Json<CountReport>> {
    let report = state.controller.set_match(id).await.map_err(to_error_response)?;
    Ok(Json(report))
}

/// Product search. Waits out the debounce gap before answering.
async fn products_handler(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ProductQuery>,
) -> Json<Vec<Product>> {
    if let Some(handle) = state.controller.lookup_products(&query.q).await {
        // A superseded search still answers with the current suggestions
        let _ = handle.await;
    }
    Json(state.controller.snapshot().await.product_suggestions)
}

async fn add_position_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<AddPositionRequest>,
) -> ApiResult<(StatusCode, Json<AddPositionResponse>)> {
    let position_id = state
        .controller
        .add_position(req.product_id, req.location_id, req.quantity)
        .await
        .map_err(to_error_response)?;
    Ok((StatusCode::CREATED, Json(AddPositionResponse { position_id })))
}

async fn notification_handler(State(state): State<Arc<ApiState>>) -> Json<Option<Notification>> {
    Json(state.controller.notifier().current())
}

// =============================================================================
// Helpers
// =============================================================================

async fn load_response(state: &ApiState, outcome: LoadOutcome) -> Json<LoadResponse> {
    Json(LoadResponse {
        outcome,
        session: state.controller.snapshot().await,
    })
}

fn to_error_response(error: ControllerError) -> (StatusCode, Json<ErrorResponse>) {
    let kind = error.kind();
    let status = match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Remote => StatusCode::BAD_GATEWAY,
        ErrorKind::Config | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            kind,
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tally_ledger::{InMemoryLedger, LedgerOp};
    use tower::ServiceExt;

    use crate::config::SessionConfig;
    use crate::notify::Notifier;

    fn create_test_app() -> (Router, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::demo());
        let controller = Controller::new(ledger.clone(), Notifier::default(), SessionConfig::default());
        let state = Arc::new(ApiState {
            controller: Arc::new(controller),
        });
        (create_router(state), ledger)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = create_test_app();
        let (status, body) = send(&app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_load_and_count_flow() {
        let (app, ledger) = create_test_app();

        let (status, body) = send(&app, "POST", "/session/load", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["status"], "loaded");
        assert_eq!(body["session"]["phase"], "ready");
        assert_eq!(body["session"]["progress"]["total"], 4);

        let (status, body) = send(&app, "POST", "/count/2/open", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["buffer"], "");

        send(&app, "POST", "/count/key", Some(json!({ "key": "7" }))).await;
        let (status, report) = send(&app, "POST", "/count/confirm", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["outcome"]["state"], "over");
        assert_eq!(ledger.calls(LedgerOp::SetCount), 1);

        let (_, session) = send(&app, "GET", "/session", None).await;
        assert_eq!(session["progress"]["counted"], 1);
        assert!(session["active_count"].is_null());
    }

    #[tokio::test]
    async fn test_confirm_without_active_count_is_bad_request() {
        let (app, ledger) = create_test_app();
        send(&app, "POST", "/session/load", None).await;

        let (status, body) = send(&app, "POST", "/count/confirm", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
        assert_eq!(ledger.calls(LedgerOp::SetCount), 0);
    }

    #[tokio::test]
    async fn test_unknown_position_is_not_found() {
        let (app, _) = create_test_app();
        send(&app, "POST", "/session/load", None).await;

        let (status, body) = send(&app, "POST", "/count/99/open", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_remote_failure_is_bad_gateway() {
        let (app, ledger) = create_test_app();
        ledger.fail_next(LedgerOp::ListPositions, "Session expired");

        let (status, body) = send(&app, "POST", "/session/load", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "remote");

        let (_, notification) = send(&app, "GET", "/notification", None).await;
        assert_eq!(notification["message"], "Failed to load inventory data");
        assert_eq!(notification["severity"], "error");
    }

    #[tokio::test]
    async fn test_filter_rejects_unknown_status() {
        let (app, _) = create_test_app();
        send(&app, "POST", "/session/load", None).await;

        let (status, _) = send(&app, "POST", "/session/filter", Some(json!({ "status": "later" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "POST", "/session/filter", Some(json!({ "status": "todo" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status_filter"], "todo");
    }

    #[tokio::test]
    async fn test_key_requires_single_character() {
        let (app, _) = create_test_app();
        send(&app, "POST", "/session/load", None).await;
        send(&app, "POST", "/count/1/open", None).await;

        let (status, _) = send(&app, "POST", "/count/key", Some(json!({ "key": "12" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_add_position_requires_location() {
        let (app, ledger) = create_test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/positions",
            Some(json!({ "product_id": 101, "quantity": "3" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation error: Please select a location");
        assert_eq!(ledger.calls(LedgerOp::CreatePosition), 0);
    }
}
