//! Claim-list contract routes.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{Admin, ApiError};
use crate::app_state::AppState;
use crate::service::claim_list::{self, ClaimableView, ContractInfo};

#[derive(Debug, Deserialize)]
pub struct SetClaimListBody {
    #[serde(default)]
    pub wallets: Vec<String>,
    #[serde(default)]
    pub amounts: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FundBody {
    #[serde(default)]
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub addresses: String,
}

fn bad_body(e: JsonRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid request body: {}", e.body_text()))
}

pub async fn set(
    State(state): State<AppState>,
    Admin(admin): Admin,
    payload: Result<Json<SetClaimListBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload.map_err(bad_body)?;
    tracing::info!(admin = %admin.label(), entries = body.wallets.len(), "claim list update requested");
    let tx = claim_list::set_claim_list(&state, &body.wallets, &body.amounts).await?;
    Ok(Json(json!({ "success": true, "transaction": tx })))
}

pub async fn status(
    State(state): State<AppState>,
    Query(q): Query<StatusQuery>,
) -> Result<Json<Value>, ApiError> {
    let addresses: Vec<String> = q
        .addresses
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if addresses.is_empty() {
        return Err(ApiError::bad_request("No addresses provided"));
    }
    let mut statuses = Map::new();
    for (address, label) in claim_list::statuses(&state, &addresses).await? {
        statuses.insert(address, Value::String(label));
    }
    Ok(Json(json!({ "statuses": statuses })))
}

pub async fn claimable(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ClaimableView>, ApiError> {
    Ok(Json(claim_list::claimable(&state, &address).await?))
}

pub async fn fund(
    State(state): State<AppState>,
    Admin(admin): Admin,
    payload: Result<Json<FundBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload.map_err(bad_body)?;
    tracing::info!(admin = %admin.label(), amount = %body.amount, "claim contract funding requested");
    let tx = claim_list::fund(&state, &body.amount).await?;
    Ok(Json(json!({ "success": true, "transaction": tx })))
}

pub async fn balance(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let balance = claim_list::contract_balance(&state).await?;
    Ok(Json(json!({
        "contract": state.gateway.claim_contract_address(),
        "balance": balance,
    })))
}

pub async fn info(State(state): State<AppState>) -> Result<Json<ContractInfo>, ApiError> {
    Ok(Json(claim_list::contract_info(&state).await?))
}
