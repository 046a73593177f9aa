//! # REST API
//!
//! Builds the axum router that exposes the onboarding ledger's HTTP
//! interface. All endpoints share application state through axum's
//! `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                            | Description                               |
//! |--------|---------------------------------|-------------------------------------------|
//! | GET    | `/health`                       | Liveness probe                            |
//! | GET    | `/status`                       | Ledger status summary                     |
//! | POST   | `/orks`                         | Register/update an oracle assignment      |
//! | GET    | `/orks`                         | List oracle assignments                   |
//! | GET    | `/orks/:username`               | Assignment for one username               |
//! | POST   | `/users`                        | Initialize (or refresh) a pending user    |
//! | POST   | `/users/:username/confirm`      | Confirm a pending user                    |
//! | GET    | `/users`                        | List user records                         |
//! | GET    | `/users/:username`              | One user record                           |
//! | POST   | `/fragments`                    | Post a key fragment                       |
//! | GET    | `/fragments/:account`           | List one oracle's fragment namespace      |
//! | GET    | `/fragments/:account/:username` | Fragment in one oracle namespace          |
//!
//! ## Caller Authentication
//!
//! Write requests carry a `caller` account field. This node trusts the
//! deployment's ingress to have authenticated that account (mTLS, signed
//! requests, or an upstream chain runtime validating transaction
//! signatures) before traffic reaches the ledger — the API maps the
//! claimed account straight onto the ledger's capability boundary and the
//! contracts enforce authorization from there.

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tessera_contracts::{
    AccountId, FragmentPayload, FragmentRecord, OrkRecord, UserRecord, Username, VendorId,
};
use tessera_protocol::{Ledger, LedgerError};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The onboarding ledger.
    pub ledger: Arc<Ledger>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured API port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/orks", post(register_ork_handler).get(list_orks_handler))
        .route("/orks/:username", get(get_ork_handler))
        .route("/users", post(initialize_user_handler).get(list_users_handler))
        .route("/users/:username", get(get_user_handler))
        .route("/users/:username/confirm", post(confirm_user_handler))
        .route("/fragments", post(post_fragment_handler))
        .route("/fragments/:account", get(list_fragments_handler))
        .route("/fragments/:account/:username", get(get_fragment_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body of `POST /orks`.
#[derive(Debug, Deserialize)]
pub struct RegisterOrkRequest {
    /// Authenticated oracle-node account claiming the assignment.
    pub caller: String,
    /// Username to serve.
    pub username: Username,
    /// The node's advertised public key.
    pub public_key: String,
    /// The node's service endpoint.
    pub url: String,
}

/// Body of `POST /users`.
#[derive(Debug, Deserialize)]
pub struct InitializeUserRequest {
    /// Authenticated vendor account sponsoring the user.
    pub caller: String,
    /// Username to initialize.
    pub username: Username,
    /// Pending expiry as a unix timestamp. Must be nonzero.
    pub timeout: u64,
}

/// Body of `POST /users/:username/confirm`.
#[derive(Debug, Deserialize)]
pub struct ConfirmUserRequest {
    /// Authenticated vendor account confirming the user.
    pub caller: String,
}

/// Body of `POST /fragments`.
#[derive(Debug, Deserialize)]
pub struct PostFragmentRequest {
    /// Authenticated oracle-node account posting the fragment.
    pub caller: String,
    /// Username carried in the submission for audit purposes.
    pub ork_username: Username,
    /// Username whose fragment is being stored.
    pub username: Username,
    /// Vendor handle associated with this submission.
    pub vendor: VendorId,
    /// The encrypted private-key fragment.
    pub private_key_frag: String,
    /// Public half of the fragment keypair.
    pub public_key: String,
    /// Hash of the user's passphrase material.
    pub pass_hash: String,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Number of registered users.
    pub users: u64,
    /// Number of users awaiting confirmation.
    pub pending_users: u64,
    /// Number of assigned usernames.
    pub orks: u64,
    /// Number of stored fragments across all namespaces.
    pub fragments: u64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// An oracle assignment as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrkResponse {
    /// The username this assignment serves.
    pub username: Username,
    /// The owning oracle-node account.
    pub account: String,
    /// The node's advertised public key.
    pub public_key: String,
    /// The node's service endpoint.
    pub url: String,
}

impl OrkResponse {
    fn new(username: Username, record: OrkRecord) -> Self {
        Self {
            username,
            account: record.account.to_string(),
            public_key: record.public_key,
            url: record.url,
        }
    }
}

/// A user record as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    /// The username this record tracks.
    pub username: Username,
    /// Pending expiry timestamp; 0 once confirmed.
    pub timeout: u64,
    /// Derived lifecycle phase: "pending", "expired", or "confirmed".
    pub phase: String,
    /// The vendor account that first initialized this user.
    pub onboard_vendor: String,
    /// Serviced-by list entries (one per oracle namespace holding a fragment).
    pub orks: Vec<Username>,
}

impl UserResponse {
    fn new(username: Username, record: UserRecord) -> Self {
        let phase = user_phase(&record).to_string();
        Self {
            username,
            timeout: record.timeout,
            phase,
            onboard_vendor: record.onboard_vendor.to_string(),
            orks: record.orks,
        }
    }
}

/// A fragment record as returned by the API. The payload strings are the
/// opaque encrypted values exactly as posted.
#[derive(Debug, Serialize, Deserialize)]
pub struct FragmentResponse {
    /// The username this fragment belongs to.
    pub username: Username,
    /// The oracle-node account whose namespace holds the fragment.
    pub scope: String,
    /// Vendor handle recorded with the first submission.
    pub vendor: VendorId,
    /// Public half of the fragment keypair.
    pub public_key: String,
    /// The encrypted private-key fragment.
    pub private_key_frag: String,
    /// Hash of the user's passphrase material.
    pub pass_hash: String,
}

impl FragmentResponse {
    fn new(username: Username, scope: &AccountId, record: FragmentRecord) -> Self {
        Self {
            username,
            scope: scope.to_string(),
            vendor: record.vendor,
            public_key: record.public_key,
            private_key_frag: record.private_key_frag,
            pass_hash: record.pass_hash,
        }
    }
}

/// Response payload for `POST /fragments`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostFragmentResponse {
    /// "created" on a first post, "overwritten" on a re-post.
    pub outcome: String,
    /// The username whose fragment was stored.
    pub username: Username,
    /// The oracle namespace that was written.
    pub scope: String,
    /// The user's serviced-by list after the post.
    pub serviced_by: Vec<Username>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Derived lifecycle phase of a user record at the current wall clock.
fn user_phase(record: &UserRecord) -> &'static str {
    if record.is_confirmed() {
        "confirmed"
    } else {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        if record.is_expired(now) {
            "expired"
        } else {
            "pending"
        }
    }
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Maps a ledger failure onto an HTTP response, recording rejection
/// metrics along the way.
fn reject(state: &AppState, err: LedgerError) -> Response {
    use tessera_contracts::OnboardError;

    let status = match &err {
        LedgerError::Contract(OnboardError::Unauthorized { .. }) => StatusCode::FORBIDDEN,
        LedgerError::Contract(OnboardError::NotFound { .. }) => StatusCode::NOT_FOUND,
        LedgerError::Contract(OnboardError::InvalidArgument { .. }) => StatusCode::BAD_REQUEST,
        LedgerError::Contract(OnboardError::InvalidState { .. }) => StatusCode::CONFLICT,
        LedgerError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("operation failed: {}", err);
    } else {
        state.metrics.operations_rejected_total.inc();
        tracing::warn!("operation rejected: {}", err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// This is the liveness probe for orchestrators (k8s, systemd, etc.).
/// It intentionally does not check storage health — that belongs in
/// `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns ledger record counts.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let resp = StatusResponse {
        version: state.version.clone(),
        users: state.ledger.user_count() as u64,
        pending_users: state.ledger.pending_user_count() as u64,
        orks: state.ledger.ork_count() as u64,
        fragments: state.ledger.fragment_count() as u64,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `POST /orks` — registers or updates an oracle assignment.
async fn register_ork_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterOrkRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let caller = state.ledger.authenticate(req.caller.as_str());

    match state
        .ledger
        .register_ork(&caller, req.username, req.public_key, req.url)
    {
        Ok(record) => {
            state.metrics.orks_registered_total.inc();
            (StatusCode::OK, Json(OrkResponse::new(req.username, record))).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `GET /orks` — lists all oracle assignments in username order.
async fn list_orks_handler(State(state): State<AppState>) -> impl IntoResponse {
    let orks: Vec<OrkResponse> = state
        .ledger
        .orks()
        .into_iter()
        .map(|(username, record)| OrkResponse::new(username, record))
        .collect();
    Json(orks)
}

/// `GET /orks/:username` — the assignment for one username.
async fn get_ork_handler(
    Path(username): Path<Username>,
    State(state): State<AppState>,
) -> Response {
    match state.ledger.ork(username) {
        Some(record) => (StatusCode::OK, Json(OrkResponse::new(username, record))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("ork record not found for username {username}"),
            }),
        )
            .into_response(),
    }
}

/// `POST /users` — initializes (or refreshes) a pending user.
async fn initialize_user_handler(
    State(state): State<AppState>,
    Json(req): Json<InitializeUserRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let caller = state.ledger.authenticate(req.caller.as_str());

    match state
        .ledger
        .initialize_user(&caller, req.username, req.timeout)
    {
        Ok(record) => {
            state.metrics.users_initialized_total.inc();
            state
                .metrics
                .pending_users
                .set(state.ledger.pending_user_count() as i64);
            (StatusCode::OK, Json(UserResponse::new(req.username, record))).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `POST /users/:username/confirm` — confirms a pending user.
async fn confirm_user_handler(
    Path(username): Path<Username>,
    State(state): State<AppState>,
    Json(req): Json<ConfirmUserRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let caller = state.ledger.authenticate(req.caller.as_str());

    match state.ledger.confirm_user(&caller, username) {
        Ok(record) => {
            state.metrics.users_confirmed_total.inc();
            state
                .metrics
                .pending_users
                .set(state.ledger.pending_user_count() as i64);
            (StatusCode::OK, Json(UserResponse::new(username, record))).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `GET /users` — lists all user records in username order.
async fn list_users_handler(State(state): State<AppState>) -> impl IntoResponse {
    let users: Vec<UserResponse> = state
        .ledger
        .users()
        .into_iter()
        .map(|(username, record)| UserResponse::new(username, record))
        .collect();
    Json(users)
}

/// `GET /users/:username` — one user record.
async fn get_user_handler(
    Path(username): Path<Username>,
    State(state): State<AppState>,
) -> Response {
    match state.ledger.user(username) {
        Some(record) => {
            (StatusCode::OK, Json(UserResponse::new(username, record))).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("user record not found for username {username}"),
            }),
        )
            .into_response(),
    }
}

/// `POST /fragments` — posts a key fragment into the assigned oracle's
/// namespace.
async fn post_fragment_handler(
    State(state): State<AppState>,
    Json(req): Json<PostFragmentRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let caller = state.ledger.authenticate(req.caller.as_str());

    let payload = FragmentPayload {
        vendor: req.vendor,
        public_key: req.public_key,
        private_key_frag: req.private_key_frag,
        pass_hash: req.pass_hash,
    };

    match state
        .ledger
        .post_fragment(&caller, req.ork_username, req.username, payload)
    {
        Ok(receipt) => {
            state.metrics.fragments_posted_total.inc();
            let resp = PostFragmentResponse {
                outcome: receipt.outcome.to_string(),
                username: req.username,
                scope: receipt.scope.to_string(),
                serviced_by: receipt.user.orks,
            };
            (StatusCode::OK, Json(resp)).into_response()
        }
        Err(err) => reject(&state, err),
    }
}

/// `GET /fragments/:account` — all fragments in one oracle's namespace,
/// in username order.
async fn list_fragments_handler(
    Path(account): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let owner = AccountId::from(account.as_str());
    let fragments: Vec<FragmentResponse> = state
        .ledger
        .fragments_of(&owner)
        .into_iter()
        .map(|(username, record)| FragmentResponse::new(username, &owner, record))
        .collect();
    Json(fragments)
}

/// `GET /fragments/:account/:username` — the fragment one oracle holds
/// for a username.
async fn get_fragment_handler(
    Path((account, username)): Path<(String, Username)>,
    State(state): State<AppState>,
) -> Response {
    let owner = AccountId::from(account.as_str());
    match state.ledger.fragment(&owner, username) {
        Some(record) => (
            StatusCode::OK,
            Json(FragmentResponse::new(username, &owner, record)),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!(
                    "fragment record not found for username {username} in namespace {account}"
                ),
            }),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
