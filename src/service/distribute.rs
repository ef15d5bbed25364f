// Admin distribution: record the same allocation for a batch of wallets and,
// when asked, push the tokens out immediately from the admin wallet.
//
// Input is validated before anything is written. After that each wallet is
// handled on its own; a failed transfer does not undo earlier ones.
//
// A transfer takes the wallet's allocation first, exactly like a claim, so a
// claim racing the distribution cannot be paid for the same allocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ServiceError;
use crate::address::WalletAddress;
use crate::amount::TokenAmount;
use crate::app_state::AppState;
use crate::chain::{ChainError, TxHash};

pub const ALREADY_CLAIMED: &str = "Allocation already claimed";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistributeRequest {
    #[serde(default)]
    pub wallets: Vec<String>,
    /// Decimal string; plain JSON numbers are accepted too.
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub transfer: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub address: WalletAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl TransferResult {
    fn failed(address: &WalletAddress, error: impl Into<String>) -> Self {
        Self {
            address: address.clone(),
            transaction: None,
            error: Some(error.into()),
            pending: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributeOutcome {
    pub message: String,
    pub allocations: usize,
    pub rejected: Vec<String>,
    pub transfers: Vec<TransferResult>,
}

fn amount_of(raw: Option<&Value>) -> Option<TokenAmount> {
    let text = match raw? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    TokenAmount::parse(&text).ok()
}

pub async fn distribute(
    state: &AppState,
    req: &DistributeRequest,
) -> Result<DistributeOutcome, ServiceError> {
    let amount = match amount_of(req.amount.as_ref()) {
        Some(a) if !req.wallets.is_empty() => a,
        _ => return Err(ServiceError::Validation("Invalid wallets or amount".into())),
    };

    let mut valid: Vec<WalletAddress> = Vec::with_capacity(req.wallets.len());
    let mut rejected = Vec::new();
    for raw in &req.wallets {
        match WalletAddress::parse(raw) {
            Ok(a) => valid.push(a),
            Err(_) => rejected.push(raw.clone()),
        }
    }
    if valid.is_empty() {
        return Err(ServiceError::Validation(
            "No valid wallet addresses provided".into(),
        ));
    }
    if !rejected.is_empty() {
        tracing::warn!(rejected = ?rejected, "skipping malformed wallet addresses");
    }

    if req.transfer {
        if !state.gateway.can_sign() {
            return Err(ChainError::SignerMissing.into());
        }
        amount.to_base_units(state.gateway.decimals())?;
    }

    for address in &valid {
        state.store.put(address, &amount)?;
        state.metrics.allocations_set.inc();
    }
    state.store.flush()?;
    tracing::info!(count = valid.len(), amount = %amount, "allocations set");

    let mut transfers = Vec::new();
    if req.transfer {
        for address in &valid {
            transfers.push(pay_out(state, address).await);
        }
    }

    Ok(DistributeOutcome {
        message: format!(
            "Allocated {} tokens to {} wallet(s)",
            amount,
            valid.len()
        ),
        allocations: valid.len(),
        rejected,
        transfers,
    })
}

/// Send one wallet its allocation. The allocation is taken before the
/// transfer and restored only when the transfer definitely failed.
async fn pay_out(state: &AppState, address: &WalletAddress) -> TransferResult {
    let amount = match state.store.take_allocation(address) {
        Ok(Some(amount)) => amount,
        Ok(None) => {
            tracing::info!(address = %address, "allocation claimed before distribution transfer");
            return TransferResult::failed(address, ALREADY_CLAIMED);
        }
        Err(e) => {
            tracing::error!(address = %address, error = %e, "failed to take allocation for transfer");
            return TransferResult::failed(address, "Allocation storage error");
        }
    };
    let units = match amount.to_base_units(state.gateway.decimals()) {
        Ok(units) => units,
        Err(e) => {
            restore(state, address, &amount);
            return TransferResult::failed(address, format!("Invalid amount: {e}"));
        }
    };

    let result = state.gateway.transfer(address, units).await;
    state.metrics.transfer(&result);
    match result {
        Ok(hash) => {
            tracing::info!(address = %address, tx = %hash, "distribution transfer sent");
            TransferResult {
                address: address.clone(),
                transaction: Some(hash),
                error: None,
                pending: false,
            }
        }
        Err(ChainError::Unconfirmed { hash, reason }) => {
            tracing::warn!(address = %address, tx = %hash, reason = %reason, "distribution transfer unconfirmed");
            TransferResult {
                address: address.clone(),
                transaction: Some(hash),
                error: None,
                pending: true,
            }
        }
        Err(e) => {
            tracing::warn!(address = %address, error = %e, "distribution transfer failed");
            restore(state, address, &amount);
            TransferResult::failed(address, e.friendly())
        }
    }
}

fn restore(state: &AppState, address: &WalletAddress, amount: &TokenAmount) {
    match state.store.restore_allocation(address, amount) {
        Ok(true) => {}
        Ok(false) => tracing::warn!(address = %address, "allocation replaced during transfer, not restoring"),
        Err(e) => tracing::error!(address = %address, amount = %amount, error = %e, "failed to restore allocation"),
    }
}
