//! HTTP surface.
//!
//! Handlers parse requests, call into `service` and shape JSON responses.
//! Admin routes take an [`Admin`] extractor, which runs the configured
//! authenticators before the handler body.

pub mod allocations;
pub mod claim_list;
pub mod error;
pub mod health;
pub mod tokens;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{delete, get, post},
    Router,
};

use crate::app_state::AppState;
use crate::auth::AdminIdentity;
pub use error::ApiError;

/// Proof that the request passed admin authorization.
pub struct Admin(pub AdminIdentity);

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let identity = state.auth.authenticate(&parts.headers)?;
        Ok(Admin(identity))
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .route("/api/allocations", get(allocations::list))
        .route("/api/allocations/set", post(allocations::set))
        .route("/api/allocations/check", get(allocations::check))
        .route("/api/allocations/:address", delete(allocations::clear))
        .route("/api/tokens/claim", post(tokens::claim))
        .route("/api/balance/:address", get(tokens::balance))
        .route("/api/token/info", get(tokens::info))
        .route("/api/claim-list/set", post(claim_list::set))
        .route("/api/claim-list/status", get(claim_list::status))
        .route("/api/claim-list/claimable/:address", get(claim_list::claimable))
        .route("/api/claim-list/fund", post(claim_list::fund))
        .route("/api/claim-list/balance", get(claim_list::balance))
        .route("/api/claim-list/info", get(claim_list::info))
        .with_state(state)
}
