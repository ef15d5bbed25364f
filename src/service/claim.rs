// Self-service claim: take the wallet's allocation and settle it.
//
// The allocation is removed atomically before any transfer so concurrent
// claims cannot both pay out. A transfer that definitely failed puts it back;
// one that may have been broadcast leaves it removed.

use serde::{Deserialize, Serialize};

use super::ServiceError;
use crate::address::WalletAddress;
use crate::amount::TokenAmount;
use crate::app_state::{AppState, ClaimMode};
use crate::auth::verify_claim_proof;
use crate::chain::{ChainError, TxHash};

pub const NO_ALLOCATION: &str = "No token allocation found for this wallet";

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRequest {
    pub address: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimReceipt {
    pub address: WalletAddress,
    pub amount: TokenAmount,
    pub transaction: Option<TxHash>,
    /// Sent but not yet confirmed.
    pub pending: bool,
}

fn check_proof(
    state: &AppState,
    address: &WalletAddress,
    req: &ClaimRequest,
    now: u64,
) -> Result<(), ServiceError> {
    let settings = &state.settings;
    match (&req.signature, req.timestamp) {
        (Some(sig), Some(ts)) => verify_claim_proof(address, sig, ts, now, settings.max_skew_secs)
            .map_err(|e| {
                tracing::warn!(address = %address, error = %e, "claim proof rejected");
                ServiceError::Unauthorized("Invalid wallet signature".into())
            }),
        _ if settings.require_wallet_signature => Err(ServiceError::Unauthorized(
            "Wallet signature required".into(),
        )),
        _ => Ok(()),
    }
}

pub async fn claim_tokens(
    state: &AppState,
    req: &ClaimRequest,
    now: u64,
) -> Result<ClaimReceipt, ServiceError> {
    let address = WalletAddress::parse(&req.address)?;
    check_proof(state, &address, req, now)?;

    let Some(amount) = state.store.take_allocation(&address)? else {
        state.metrics.claim("not_found");
        return Err(ServiceError::NotFound(NO_ALLOCATION.into()));
    };

    let (transaction, pending) = match state.settings.mode {
        ClaimMode::Ledger => (None, false),
        ClaimMode::Transfer => match settle(state, &address, &amount).await {
            Ok(hash) => (Some(hash), false),
            Err(ServiceError::Chain(ChainError::Unconfirmed { hash, reason })) => {
                tracing::warn!(
                    address = %address,
                    amount = %amount,
                    tx = %hash,
                    reason = %reason,
                    "claim transfer unconfirmed, allocation stays claimed"
                );
                (Some(hash), true)
            }
            Err(e) => {
                state.metrics.claim("failed");
                match state.store.restore_allocation(&address, &amount) {
                    Ok(true) => tracing::info!(address = %address, amount = %amount, "allocation restored after failed claim"),
                    Ok(false) => tracing::warn!(address = %address, "allocation replaced during failed claim, not restoring"),
                    Err(re) => tracing::error!(address = %address, amount = %amount, error = %re, "failed to restore allocation"),
                }
                return Err(e);
            }
        },
    };

    if let Err(e) = state.store.flush() {
        tracing::error!(address = %address, error = %e, "failed to flush store after claim");
    }
    state.metrics.claim(if pending { "pending" } else { "succeeded" });
    tracing::info!(
        address = %address,
        amount = %amount,
        tx = transaction.as_deref().unwrap_or("-"),
        pending,
        mode = state.settings.mode.as_str(),
        "tokens claimed"
    );
    Ok(ClaimReceipt {
        address,
        amount,
        transaction,
        pending,
    })
}

async fn settle(
    state: &AppState,
    address: &WalletAddress,
    amount: &TokenAmount,
) -> Result<TxHash, ServiceError> {
    let units = amount.to_base_units(state.gateway.decimals())?;
    let result = state.gateway.transfer(address, units).await;
    state.metrics.transfer(&result);
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use crate::app_state::ClaimSettings;
    use crate::auth::{claim_message, AuthChain};
    use crate::chain::mock::MockGateway;
    use crate::chain::AdminSigner;
    use crate::store::{AllocationStore, MemoryStore};

    const ADDR: &str = "0xAbC0000000000000000000000000000000000dEf";

    fn state(gateway: MockGateway, mode: ClaimMode, require_sig: bool) -> (AppState, Arc<MockGateway>) {
        let gateway = Arc::new(gateway);
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            gateway.clone(),
            Arc::new(AuthChain::new()),
            ClaimSettings {
                mode,
                require_wallet_signature: require_sig,
                max_skew_secs: 300,
            },
        )
        .unwrap();
        (state, gateway)
    }

    fn req(address: &str) -> ClaimRequest {
        ClaimRequest {
            address: address.into(),
            signature: None,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn ledger_claim_is_single_use() {
        let (state, _) = state(MockGateway::ledger(), ClaimMode::Ledger, false);
        state.store.set_allocation(ADDR, "100").unwrap();

        let receipt = claim_tokens(&state, &req(ADDR), 0).await.unwrap();
        assert_eq!(receipt.amount.as_str(), "100");
        assert!(receipt.transaction.is_none());
        assert!(state.store.get_allocation(ADDR).unwrap().is_none());

        let err = claim_tokens(&state, &req(ADDR), 0).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == NO_ALLOCATION));
    }

    #[tokio::test]
    async fn missing_allocation_leaves_store_unchanged() {
        let (state, _) = state(MockGateway::ledger(), ClaimMode::Ledger, false);
        state
            .store
            .set_allocation("0x1111111111111111111111111111111111111111", "7")
            .unwrap();
        assert!(matches!(
            claim_tokens(&state, &req(ADDR), 0).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(state.store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn malformed_address_is_a_validation_error() {
        let (state, _) = state(MockGateway::ledger(), ClaimMode::Ledger, false);
        let err = claim_tokens(&state, &req("0x123"), 0).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid wallet address");
    }

    #[tokio::test]
    async fn transfer_mode_sends_base_units() {
        let (state, gw) = state(MockGateway::signing(), ClaimMode::Transfer, false);
        state.store.set_allocation(ADDR, "1.5").unwrap();
        let receipt = claim_tokens(&state, &req(ADDR), 0).await.unwrap();
        assert!(receipt.transaction.is_some());
        let sent = gw.transfers.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1,
            alloy_primitives::U256::from(1_500_000_000_000_000_000u128)
        );
    }

    #[tokio::test]
    async fn failed_transfer_restores_allocation() {
        let (state, gw) = state(MockGateway::signing(), ClaimMode::Transfer, false);
        gw.fail_transfers.store(true, Ordering::SeqCst);
        state.store.set_allocation(ADDR, "100").unwrap();

        let err = claim_tokens(&state, &req(ADDR), 0).await.unwrap_err();
        assert!(err.public_message().starts_with("Insufficient funds for gas"));
        assert_eq!(
            state.store.get_allocation(ADDR).unwrap().unwrap().as_str(),
            "100"
        );

        gw.fail_transfers.store(false, Ordering::SeqCst);
        assert!(claim_tokens(&state, &req(ADDR), 0).await.is_ok());
    }

    #[tokio::test]
    async fn wallet_signature_when_required() {
        let (state, _) = state(MockGateway::ledger(), ClaimMode::Ledger, true);
        let wallet = AdminSigner::from_hex(
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap();
        let address = wallet.address().clone();
        state.store.set_allocation(address.as_str(), "3").unwrap();

        let err = claim_tokens(&state, &req(address.as_str()), 1_000).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert!(state.store.get_allocation(address.as_str()).unwrap().is_some());

        let sig = wallet.sign_message(&claim_message(&address, 1_000)).unwrap();
        let signed = ClaimRequest {
            address: address.to_checksum(),
            signature: Some(format!("0x{}", hex::encode(sig))),
            timestamp: Some(1_000),
        };
        assert!(claim_tokens(&state, &signed, 1_010).await.is_ok());
    }

    #[tokio::test]
    async fn unconfirmed_transfer_is_not_paid_twice() {
        use crate::chain::mock::{FakeNode, ReceiptReply};
        use crate::chain::{EvmTokenGateway, RpcClient};
        use crate::config::{ChainConfig, RpcConfig};

        let (node, url) = FakeNode::spawn(ReceiptReply::RpcError).await;
        let rpc = RpcClient::from_config(&RpcConfig {
            url,
            fallback_urls: vec![],
            timeout_ms: 2_000,
        })
        .unwrap();
        let cfg = ChainConfig {
            receipt_timeout_secs: 0,
            ..ChainConfig::default()
        };
        let signer = AdminSigner::from_hex(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318",
        )
        .unwrap();
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(EvmTokenGateway::new(rpc, Some(signer), cfg).unwrap()),
            Arc::new(AuthChain::new()),
            ClaimSettings {
                mode: ClaimMode::Transfer,
                require_wallet_signature: false,
                max_skew_secs: 300,
            },
        )
        .unwrap();
        state.store.set_allocation(ADDR, "100").unwrap();

        let receipt = claim_tokens(&state, &req(ADDR), 0).await.unwrap();
        assert!(receipt.pending);
        assert!(receipt.transaction.is_some());
        assert!(state.store.get_allocation(ADDR).unwrap().is_none());

        let err = claim_tokens(&state, &req(ADDR), 0).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(node.broadcasts.load(Ordering::SeqCst), 1);
        assert!(state
            .metrics
            .render()
            .contains("claim_claims_total{outcome=\"pending\"} 1"));
    }

    #[tokio::test]
    async fn unsigned_claim_for_another_wallet_is_refused() {
        let (state, _) = state(MockGateway::ledger(), ClaimMode::Ledger, true);
        state.store.set_allocation(ADDR, "100").unwrap();
        let err = claim_tokens(&state, &req(ADDR), 0).await.unwrap_err();
        assert_eq!(err.to_string(), "Wallet signature required");

        // signed by a different wallet
        let intruder = AdminSigner::from_hex(
            "0x0000000000000000000000000000000000000000000000000000000000000002",
        )
        .unwrap();
        let victim = WalletAddress::parse(ADDR).unwrap();
        let sig = intruder.sign_message(&claim_message(&victim, 50)).unwrap();
        let forged = ClaimRequest {
            address: ADDR.into(),
            signature: Some(hex::encode(sig)),
            timestamp: Some(50),
        };
        let err = claim_tokens(&state, &forged, 50).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert_eq!(state.store.get_allocation(ADDR).unwrap().unwrap().as_str(), "100");
    }

    #[tokio::test]
    async fn concurrent_claims_pay_once() {
        let (state, gw) = state(MockGateway::signing(), ClaimMode::Transfer, false);
        state.store.set_allocation(ADDR, "10").unwrap();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                claim_tokens(&state, &req(ADDR), 0).await.is_ok()
            }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(gw.transfers.lock().len(), 1);
    }
}
