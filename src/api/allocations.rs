//! Allocation routes
//!
//! - POST /api/allocations/set (admin) - distribute an amount to wallets
//! - GET /api/allocations/check?address= - pending allocation for one wallet
//! - GET /api/allocations (admin) - every pending allocation
//! - DELETE /api/allocations/:address (admin) - drop an allocation

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Admin, ApiError};
use crate::app_state::AppState;
use crate::service::{self, claim::NO_ALLOCATION, DistributeOutcome, DistributeRequest, ServiceError};

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub address: Option<String>,
}

pub async fn set(
    State(state): State<AppState>,
    Admin(admin): Admin,
    payload: Result<Json<DistributeRequest>, JsonRejection>,
) -> Result<Json<DistributeOutcome>, ApiError> {
    let Json(req) = payload.map_err(|e| {
        tracing::debug!(error = %e, "unreadable distribution body");
        ApiError::bad_request("Invalid wallets or amount")
    })?;
    tracing::info!(admin = %admin.label(), wallets = req.wallets.len(), transfer = req.transfer, "distribution requested");
    Ok(Json(service::distribute(&state, &req).await?))
}

pub async fn check(
    State(state): State<AppState>,
    Query(q): Query<CheckQuery>,
) -> Result<Json<Value>, ApiError> {
    let raw = q.address.unwrap_or_default();
    let amount = state
        .store
        .get_allocation(&raw)
        .map_err(ServiceError::from)?
        .ok_or_else(|| ServiceError::NotFound(NO_ALLOCATION.into()))?;
    Ok(Json(json!({
        "address": raw.to_ascii_lowercase(),
        "amount": amount,
    })))
}

pub async fn list(State(state): State<AppState>, Admin(_): Admin) -> Result<Json<Value>, ApiError> {
    let allocations = state.store.list_allocations().map_err(ServiceError::from)?;
    Ok(Json(json!({
        "count": allocations.len(),
        "allocations": allocations,
    })))
}

pub async fn clear(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(address): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .store
        .clear_allocation(&address)
        .map_err(ServiceError::from)?;
    state.store.flush().map_err(ServiceError::from)?;
    tracing::info!(admin = %admin.label(), address = %address, "allocation cleared");
    Ok(Json(json!({
        "address": address.to_ascii_lowercase(),
        "cleared": true,
    })))
}
