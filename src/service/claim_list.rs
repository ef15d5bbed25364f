// Claim-list contract operations with request validation.

use alloy_primitives::U256;
use serde::Serialize;

use super::ServiceError;
use crate::address::WalletAddress;
use crate::amount::{format_units, TokenAmount};
use crate::app_state::AppState;
use crate::chain::TxHash;

#[derive(Debug, Clone, Serialize)]
pub struct ClaimableView {
    pub address: WalletAddress,
    pub claimable: String,
    pub claimed: bool,
}

/// Publish `(wallet, amount)` pairs to the contract in one transaction.
pub async fn set_claim_list(
    state: &AppState,
    wallets: &[String],
    amounts: &[String],
) -> Result<TxHash, ServiceError> {
    if wallets.is_empty() || wallets.len() != amounts.len() {
        return Err(ServiceError::Validation(
            "Wallets and amounts must be non-empty lists of equal length".into(),
        ));
    }
    let decimals = state.gateway.decimals();
    let mut users = Vec::with_capacity(wallets.len());
    let mut units = Vec::with_capacity(amounts.len());
    for (wallet, amount) in wallets.iter().zip(amounts) {
        let address = WalletAddress::parse(wallet)
            .map_err(|_| ServiceError::Validation(format!("Invalid wallet address: {wallet}")))?;
        let amount = TokenAmount::parse(amount)?;
        users.push(address);
        units.push(amount.to_base_units(decimals)?);
    }

    let hash = state.gateway.set_claim_list(&users, &units).await?;
    tracing::info!(entries = users.len(), tx = %hash, "claim list updated");
    Ok(hash)
}

pub async fn claimable(state: &AppState, address: &str) -> Result<ClaimableView, ServiceError> {
    let address = WalletAddress::parse(address)?;
    let status = state.gateway.claim_status(&address).await?;
    let claimable = if status.claimed {
        U256::ZERO
    } else {
        status.claimable
    };
    Ok(ClaimableView {
        address,
        claimable: format_units(claimable, state.gateway.decimals()),
        claimed: status.claimed,
    })
}

/// Human-readable status per address: the claimable amount, `"Claimed"`,
/// or `"Invalid address"`. A lookup failure for one address does not fail the batch.
pub async fn statuses(
    state: &AppState,
    addresses: &[String],
) -> Result<Vec<(String, String)>, ServiceError> {
    let mut out = Vec::with_capacity(addresses.len());
    for raw in addresses {
        let label = match WalletAddress::parse(raw) {
            Err(_) => "Invalid address".to_string(),
            Ok(address) => match state.gateway.claim_status(&address).await {
                Ok(s) if s.claimed => "Claimed".to_string(),
                Ok(s) => format_units(s.claimable, state.gateway.decimals()),
                Err(e @ crate::chain::ChainError::NotConfigured(_)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "claim status lookup failed");
                    "Error".to_string()
                }
            },
        };
        out.push((raw.clone(), label));
    }
    Ok(out)
}

pub async fn fund(state: &AppState, amount: &str) -> Result<TxHash, ServiceError> {
    let amount = TokenAmount::parse(amount)?;
    if amount.is_zero() {
        return Err(ServiceError::Validation("Amount must be greater than zero".into()));
    }
    let units = amount.to_base_units(state.gateway.decimals())?;
    let hash = state.gateway.fund_claim_contract(units).await?;
    tracing::info!(amount = %amount, tx = %hash, "claim contract funded");
    Ok(hash)
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractInfo {
    pub contract: Option<WalletAddress>,
    pub admin: WalletAddress,
    pub token: WalletAddress,
}

pub async fn contract_info(state: &AppState) -> Result<ContractInfo, ServiceError> {
    let admin = state.gateway.claim_contract_admin().await?;
    let token = state.gateway.claim_contract_token().await?;
    Ok(ContractInfo {
        contract: state.gateway.claim_contract_address(),
        admin,
        token,
    })
}

pub async fn contract_balance(state: &AppState) -> Result<String, ServiceError> {
    let balance = state.gateway.claim_contract_balance().await?;
    Ok(format_units(balance, state.gateway.decimals()))
}
