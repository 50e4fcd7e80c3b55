// 🌐 REST API for the defaults lifecycle (feature "server")
//
//   POST /api/defaults/seed      fill in missing defaults
//   POST /api/defaults/rebuild   wipe and re-seed, body {"confirm":"REBUILD"}
//   GET  /api/defaults/status    read-only lifecycle summary
//   GET  /api/chart              chart of accounts
//   POST /api/business/select    switch the active business, body {"business_id":N}
//   GET  /api/health
//
// The caller is identified by the X-User-Id header set by the upstream auth
// layer.

use std::sync::{Arc, Mutex};

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::entities::{Business, CategoryWithSubs};
use crate::error::DefaultsError;
use crate::rebuilder::RebuildResult;
use crate::service::{DefaultsService, DefaultsStatus, SeedOutcome};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against a service bound to the shared connection.
    fn with_service<T>(
        &self,
        f: impl FnOnce(&mut DefaultsService<'_>) -> Result<T, DefaultsError>,
    ) -> Result<T, ApiError> {
        let mut conn = self.db.lock().map_err(|_| ApiError::Poisoned)?;
        let mut service = DefaultsService::new(&mut conn);
        f(&mut service).map_err(ApiError::Defaults)
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Outcome of POST /api/defaults/rebuild.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RebuildResponse {
    Completed(RebuildResult),
    Blocked { message: String },
}

#[derive(Debug, Default, Deserialize)]
pub struct RebuildRequest {
    #[serde(default)]
    pub confirm: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectBusinessRequest {
    pub business_id: i64,
}

// ============================================================================
// Caller identity
// ============================================================================

/// Authenticated user id taken from the `X-User-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .map(CurrentUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    Poisoned,
    Defaults(DefaultsError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid X-User-Id header".to_string(),
            ),
            ApiError::Poisoned => {
                error!("database mutex poisoned");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            ApiError::Defaults(err) => {
                let status = match &err {
                    DefaultsError::GuardViolation { .. } => StatusCode::CONFLICT,
                    DefaultsError::Authorization { .. } => StatusCode::FORBIDDEN,
                    DefaultsError::ConfirmationRequired => StatusCode::BAD_REQUEST,
                    DefaultsError::TenantMismatch(_) => StatusCode::FORBIDDEN,
                    DefaultsError::Import(_) => StatusCode::BAD_REQUEST,
                    DefaultsError::Storage(_) | DefaultsError::Catalog(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if err.is_user_facing() {
                    (status, err.to_string())
                } else {
                    // Details stay in the log
                    error!(error = %err, "defaults request failed");
                    (status, "internal error".to_string())
                }
            }
        };

        (status, Json(ApiResponse::<()>::err(message))).into_response()
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/defaults/seed
async fn seed_defaults(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<SeedOutcome>>, ApiError> {
    let outcome = state.with_service(|service| service.seed_defaults(user_id))?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// POST /api/defaults/rebuild
async fn rebuild_defaults(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    body: Option<Json<RebuildRequest>>,
) -> Response {
    let confirm = body
        .and_then(|Json(request)| request.confirm)
        .unwrap_or_default();

    match state.with_service(|service| service.rebuild_defaults(user_id, &confirm)) {
        Ok(result) => (StatusCode::OK, Json(RebuildResponse::Completed(result))).into_response(),
        Err(ApiError::Defaults(err @ DefaultsError::GuardViolation { .. })) => (
            StatusCode::CONFLICT,
            Json(RebuildResponse::Blocked {
                message: err.to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// GET /api/defaults/status
async fn defaults_status(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<DefaultsStatus>>, ApiError> {
    let status = state.with_service(|service| service.defaults_status(user_id))?;
    Ok(Json(ApiResponse::ok(status)))
}

/// GET /api/chart
async fn get_chart(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ApiResponse<Vec<CategoryWithSubs>>>, ApiError> {
    let chart = state.with_service(|service| service.chart(user_id))?;
    Ok(Json(ApiResponse::ok(chart)))
}

/// POST /api/business/select
async fn select_business(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<SelectBusinessRequest>,
) -> Result<Json<ApiResponse<Business>>, ApiError> {
    let business =
        state.with_service(|service| service.select_business(user_id, request.business_id))?;
    Ok(Json(ApiResponse::ok(business)))
}

/// Routes under /api with request tracing.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/defaults/seed", post(seed_defaults))
        .route("/defaults/rebuild", post(rebuild_defaults))
        .route("/defaults/status", get(defaults_status))
        .route("/chart", get(get_chart))
        .route("/business/select", post(select_business))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
}
