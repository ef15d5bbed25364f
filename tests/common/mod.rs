#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::U256;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use tower::ServiceExt;

use web3d_claim::auth::{
    claim_message, unix_now, AdminAuthenticator, AuthChain, BearerTokenAuth, SignedMessageAuth,
};
use web3d_claim::chain::{AdminSigner, ChainError, ClaimStatus, TokenGateway, TokenInfo, TxHash};
use web3d_claim::store::AllocationStore;
use web3d_claim::{build_router, AppState, ClaimMode, ClaimSettings, WalletAddress};

pub const ADMIN_TOKEN: &str = "integration-token";
pub const ADMIN_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
/// Claimer wallet; its checksummed address is [`WALLET`].
pub const WALLET_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
pub const WALLET: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

/// Records transfers instead of sending them.
#[derive(Default)]
pub struct RecordingGateway {
    pub signer: bool,
    pub fail: AtomicBool,
    pub sent: Mutex<Vec<(WalletAddress, U256)>>,
}

impl RecordingGateway {
    pub fn fail_transfers(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenGateway for RecordingGateway {
    fn decimals(&self) -> u8 {
        18
    }

    fn can_sign(&self) -> bool {
        self.signer
    }

    fn claim_contract_address(&self) -> Option<WalletAddress> {
        None
    }

    async fn token_info(&self) -> Result<TokenInfo, ChainError> {
        Err(ChainError::Transport("offline".into()))
    }

    async fn balance_of(&self, _owner: &WalletAddress) -> Result<U256, ChainError> {
        Ok(U256::ZERO)
    }

    async fn transfer(&self, to: &WalletAddress, amount: U256) -> Result<TxHash, ChainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc {
                code: -32000,
                message: "nonce too low".into(),
            });
        }
        let mut sent = self.sent.lock();
        sent.push((to.clone(), amount));
        Ok(format!("0x{:064x}", sent.len()))
    }

    async fn set_claim_list(
        &self,
        _users: &[WalletAddress],
        _amounts: &[U256],
    ) -> Result<TxHash, ChainError> {
        Err(ChainError::NotConfigured("claim contract address"))
    }

    async fn claim_status(&self, _user: &WalletAddress) -> Result<ClaimStatus, ChainError> {
        Err(ChainError::NotConfigured("claim contract address"))
    }

    async fn claim_contract_admin(&self) -> Result<WalletAddress, ChainError> {
        Err(ChainError::NotConfigured("claim contract address"))
    }

    async fn claim_contract_token(&self) -> Result<WalletAddress, ChainError> {
        Err(ChainError::NotConfigured("claim contract address"))
    }

    async fn fund_claim_contract(&self, _amount: U256) -> Result<TxHash, ChainError> {
        Err(ChainError::NotConfigured("claim contract address"))
    }

    async fn claim_contract_balance(&self) -> Result<U256, ChainError> {
        Err(ChainError::NotConfigured("claim contract address"))
    }
}

pub fn admin_auth() -> Arc<dyn AdminAuthenticator> {
    let admin = AdminSigner::from_hex(ADMIN_KEY)
        .unwrap()
        .address()
        .clone();
    Arc::new(
        AuthChain::new()
            .with(SignedMessageAuth::new(admin, 300))
            .with(BearerTokenAuth::new(ADMIN_TOKEN)),
    )
}

pub fn app(
    store: Arc<dyn AllocationStore>,
    gateway: Arc<RecordingGateway>,
    mode: ClaimMode,
) -> (Router, AppState) {
    let state = AppState::new(
        store,
        gateway,
        admin_auth(),
        ClaimSettings {
            mode,
            require_wallet_signature: true,
            max_skew_secs: 300,
        },
    )
    .unwrap();
    (build_router(state.clone()), state)
}

/// Claim body signed by the wallet behind `key`, as a browser wallet would.
pub fn signed_claim(key: &str) -> Value {
    let wallet = AdminSigner::from_hex(key).unwrap();
    let ts = unix_now();
    let sig = wallet
        .sign_message(&claim_message(wallet.address(), ts))
        .unwrap();
    serde_json::json!({
        "address": wallet.address().to_checksum(),
        "signature": format!("0x{}", hex::encode(sig)),
        "timestamp": ts,
    })
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub fn admin_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn public_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}
