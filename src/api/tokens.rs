//! Token routes: self-service claim and read-only token queries.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::{json, Value};

use super::ApiError;
use crate::address::WalletAddress;
use crate::amount::format_units;
use crate::app_state::{AppState, ClaimMode};
use crate::auth::unix_now;
use crate::chain::TokenInfo;
use crate::service::{self, ClaimRequest, ServiceError};

pub async fn claim(
    State(state): State<AppState>,
    payload: Result<Json<ClaimRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::bad_request("Invalid wallet address"))?;
    let receipt = service::claim_tokens(&state, &req, unix_now()).await?;
    let message = match state.settings.mode {
        ClaimMode::Transfer if receipt.pending => "Tokens sent, confirmation pending",
        ClaimMode::Transfer => "Tokens claimed successfully",
        ClaimMode::Ledger => "Claim recorded",
    };
    Ok(Json(json!({
        "success": true,
        "transaction": receipt.transaction,
        "pending": receipt.pending,
        "message": message,
        "amount": receipt.amount,
    })))
}

pub async fn balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let owner = WalletAddress::parse(&address).map_err(ServiceError::from)?;
    let units = state.gateway.balance_of(&owner).await?;
    Ok(Json(json!({
        "address": owner,
        "balance": format_units(units, state.gateway.decimals()),
    })))
}

pub async fn info(State(state): State<AppState>) -> Result<Json<TokenInfo>, ApiError> {
    Ok(Json(state.gateway.token_info().await?))
}
