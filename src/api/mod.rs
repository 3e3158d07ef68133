//! Loopback HTTP surface for account linking.
//!
//! The flow per platform:
//! 1. GET /link/:platform → redirect to the provider's login page
//! 2. User authorizes on the provider's site
//! 3. The redirect lands on GET /link/callback
//! 4. Code exchange + identity discovery file the session; the outcome is
//!    returned as JSON
//!
//! The shared-expense service signs in via POST /link/wbw instead of a
//! browser flow. /accounts lists and unlinks linked accounts.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::link::{self, AttemptTracker, LinkOutcome};
use crate::oauth::AuthorizationCallback;
use crate::platform::Platform;
use crate::session::SessionRegistry;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types for linking endpoints
enum AppError {
    BadRequest(String),
    NotFound(String),
    ServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

/// Shared application state for the linking API
#[derive(Clone)]
pub struct LinkAppState {
    pub registry: Arc<SessionRegistry>,
    pub attempts: AttemptTracker,
    pub http: reqwest::Client,
}

/// One linked account, as listed by GET /accounts
#[derive(Serialize)]
struct AccountSummary {
    platform: Platform,
    account_id: i64,
    authorized: bool,
}

#[derive(Serialize)]
struct AccountsResponse {
    accounts: Vec<AccountSummary>,
}

#[derive(Deserialize)]
struct WbwSignIn {
    email: String,
    password: String,
}

/// Create the linking API router
pub fn create_link_router(state: LinkAppState) -> Router {
    Router::new()
        .route("/link/:platform", get(link_start))
        .route("/link/callback", get(link_callback))
        // The static `/link/wbw` node takes matchit priority over the
        // `/link/:platform` param route, so GET requests land here too; route
        // them through the same `link_start` logic (with the platform fixed to
        // wbw) so password platforms still get their 400, while POST drives the
        // password sign-in.
        .route(
            "/link/wbw",
            get(|state: State<Arc<LinkAppState>>| async move {
                link_start(state, Path("wbw".to_string())).await
            })
            .post(wbw_sign_in),
        )
        .route("/accounts", get(list_accounts))
        .route("/accounts/:platform/:account_id", delete(unlink_account))
        .with_state(Arc::new(state))
}

/// GET /link/:platform
///
/// Starts the browser login: persists the placeholder record, registers
/// the attempt, and redirects to the provider's authorization page.
async fn link_start(
    State(state): State<Arc<LinkAppState>>,
    Path(platform): Path<String>,
) -> Result<Redirect, AppError> {
    let platform = parse_platform(&platform)?;
    if platform.login_config().is_none() {
        return Err(AppError::BadRequest(format!(
            "{} signs in with a password, use POST /link/wbw",
            platform
        )));
    }

    let handoff = link::begin_login(&state.registry, &state.attempts, platform)
        .await
        .map_err(|e| {
            error!(platform = %platform, error = %e, "failed to start login");
            AppError::ServerError(format!("failed to start login: {}", e))
        })?;

    debug!(platform = %platform, "redirecting to provider");
    Ok(Redirect::temporary(&handoff.auth_url))
}

/// GET /link/callback
///
/// The provider redirect lands here; the outcome is JSON either way, since
/// the UI layer renders the status string.
async fn link_callback(
    State(state): State<Arc<LinkAppState>>,
    Query(callback): Query<AuthorizationCallback>,
) -> Json<LinkOutcome> {
    let outcome =
        link::handle_callback(&state.registry, &state.attempts, &state.http, &callback).await;
    Json(outcome)
}

/// POST /link/wbw
async fn wbw_sign_in(
    State(state): State<Arc<LinkAppState>>,
    Json(body): Json<WbwSignIn>,
) -> Json<LinkOutcome> {
    let outcome = link::wbw::sign_in(&state.registry, &body.email, &body.password).await;
    Json(outcome)
}

/// GET /accounts
///
/// Lists every stored record across all platforms.
async fn list_accounts(
    State(state): State<Arc<LinkAppState>>,
) -> Result<Json<AccountsResponse>, AppError> {
    let records = state
        .registry
        .linked_accounts()
        .map_err(|e| AppError::ServerError(format!("failed to list accounts: {}", e)))?;

    let mut accounts = Vec::with_capacity(records.len());
    for record in records {
        let handle = state.registry.handle(record.platform, record.account_id);
        accounts.push(AccountSummary {
            platform: record.platform,
            account_id: record.account_id,
            authorized: handle.current().await.is_authorized(),
        });
    }
    Ok(Json(AccountsResponse { accounts }))
}

/// DELETE /accounts/:platform/:account_id
async fn unlink_account(
    State(state): State<Arc<LinkAppState>>,
    Path((platform, account_id)): Path<(String, i64)>,
) -> Result<StatusCode, AppError> {
    let platform = parse_platform(&platform)?;
    state
        .registry
        .unlink(platform, account_id)
        .await
        .map_err(|e| AppError::ServerError(format!("failed to unlink: {}", e)))?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_platform(tag: &str) -> Result<Platform, AppError> {
    Platform::parse(tag)
        .ok_or_else(|| AppError::NotFound(format!("unknown platform '{}'", tag)))
}
