// Test doubles: an in-memory gateway and a scripted JSON-RPC node.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{ChainError, ClaimStatus, TokenGateway, TokenInfo, TxHash};
use crate::address::WalletAddress;

#[derive(Default)]
pub struct MockGateway {
    pub signer: bool,
    pub claim_contract: bool,
    pub fail_transfers: AtomicBool,
    pub transfers: Mutex<Vec<(WalletAddress, U256)>>,
    pub claim_list: Mutex<HashMap<WalletAddress, ClaimStatus>>,
    pub funded: Mutex<U256>,
    pub admin_balance: Mutex<U256>,
    /// Milliseconds each transfer takes.
    pub transfer_delay_ms: AtomicU64,
    seq: AtomicU64,
}

impl MockGateway {
    pub fn ledger() -> Self {
        Self::default()
    }

    pub fn signing() -> Self {
        Self {
            signer: true,
            claim_contract: true,
            admin_balance: Mutex::new(U256::MAX),
            ..Self::default()
        }
    }

    fn next_hash(&self) -> TxHash {
        format!("0x{:064x}", self.seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn contract(&self) -> Result<(), ChainError> {
        if self.claim_contract {
            Ok(())
        } else {
            Err(ChainError::NotConfigured("claim contract address"))
        }
    }
}

#[async_trait]
impl TokenGateway for MockGateway {
    fn decimals(&self) -> u8 {
        18
    }

    fn can_sign(&self) -> bool {
        self.signer
    }

    fn claim_contract_address(&self) -> Option<WalletAddress> {
        self.claim_contract
            .then(|| WalletAddress::from_bytes([0x5c; 20]))
    }

    async fn token_info(&self) -> Result<TokenInfo, ChainError> {
        Ok(TokenInfo {
            address: WalletAddress::parse(crate::config::DEFAULT_TOKEN_ADDRESS)
                .map_err(|e| ChainError::Decode(e.to_string()))?,
            name: "Web3D Token".into(),
            symbol: "W3D".into(),
            decimals: 18,
        })
    }

    async fn balance_of(&self, owner: &WalletAddress) -> Result<U256, ChainError> {
        Ok(self
            .transfers
            .lock()
            .iter()
            .filter(|(to, _)| to == owner)
            .fold(U256::ZERO, |acc, (_, v)| acc + *v))
    }

    async fn transfer(&self, to: &WalletAddress, amount: U256) -> Result<TxHash, ChainError> {
        if !self.signer {
            return Err(ChainError::SignerMissing);
        }
        let delay = self.transfer_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc {
                code: -32000,
                message: "insufficient funds for gas * price + value".into(),
            });
        }
        self.transfers.lock().push((to.clone(), amount));
        Ok(self.next_hash())
    }

    async fn set_claim_list(
        &self,
        users: &[WalletAddress],
        amounts: &[U256],
    ) -> Result<TxHash, ChainError> {
        self.contract()?;
        if !self.signer {
            return Err(ChainError::SignerMissing);
        }
        let mut list = self.claim_list.lock();
        for (user, amount) in users.iter().zip(amounts) {
            list.insert(
                user.clone(),
                ClaimStatus {
                    claimable: *amount,
                    claimed: false,
                },
            );
        }
        Ok(self.next_hash())
    }

    async fn claim_status(&self, user: &WalletAddress) -> Result<ClaimStatus, ChainError> {
        self.contract()?;
        Ok(self.claim_list.lock().get(user).cloned().unwrap_or(ClaimStatus {
            claimable: U256::ZERO,
            claimed: false,
        }))
    }

    async fn claim_contract_admin(&self) -> Result<WalletAddress, ChainError> {
        self.contract()?;
        Ok(WalletAddress::from_bytes([0xad; 20]))
    }

    async fn claim_contract_token(&self) -> Result<WalletAddress, ChainError> {
        self.contract()?;
        WalletAddress::parse(crate::config::DEFAULT_TOKEN_ADDRESS)
            .map_err(|e| ChainError::Decode(e.to_string()))
    }

    async fn fund_claim_contract(&self, amount: U256) -> Result<TxHash, ChainError> {
        self.contract()?;
        if !self.signer {
            return Err(ChainError::SignerMissing);
        }
        let mut balance = self.admin_balance.lock();
        if *balance < amount {
            return Err(ChainError::Rejected("Insufficient token balance".into()));
        }
        *balance -= amount;
        *self.funded.lock() += amount;
        Ok(self.next_hash())
    }

    async fn claim_contract_balance(&self) -> Result<U256, ChainError> {
        self.contract()?;
        Ok(*self.funded.lock())
    }
}

/// How the scripted node answers `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptReply {
    Confirmed,
    Reverted,
    Pending,
    RpcError,
}

/// Minimal JSON-RPC node that accepts admin transactions and answers
/// receipt lookups as scripted.
pub struct FakeNode {
    pub receipt: Mutex<ReceiptReply>,
    pub estimate_reverts: AtomicBool,
    pub send_fails_http: AtomicBool,
    pub broadcasts: AtomicUsize,
    pub estimates: AtomicUsize,
}

impl FakeNode {
    /// Serve on an ephemeral local port; returns the node and its URL.
    pub async fn spawn(receipt: ReceiptReply) -> (Arc<FakeNode>, String) {
        let node = Arc::new(FakeNode {
            receipt: Mutex::new(receipt),
            estimate_reverts: AtomicBool::new(false),
            send_fails_http: AtomicBool::new(false),
            broadcasts: AtomicUsize::new(0),
            estimates: AtomicUsize::new(0),
        });
        let app = Router::new()
            .route("/", post(rpc))
            .with_state(node.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (node, url)
    }
}

async fn rpc(
    State(node): State<Arc<FakeNode>>,
    Json(req): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    let id = req["id"].clone();
    let ok = |result: Value| Json(json!({"jsonrpc": "2.0", "id": id, "result": result}));
    let err = |code: i64, message: &str| {
        Json(json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}))
    };
    let reply = match req["method"].as_str().unwrap_or_default() {
        "eth_estimateGas" => {
            node.estimates.fetch_add(1, Ordering::SeqCst);
            if node.estimate_reverts.load(Ordering::SeqCst) {
                err(3, "execution reverted: BEP20: transfer amount exceeds balance")
            } else {
                ok(json!("0x5208"))
            }
        }
        "eth_gasPrice" => ok(json!("0x3b9aca00")),
        "eth_getTransactionCount" => ok(json!("0x7")),
        "eth_sendRawTransaction" => {
            node.broadcasts.fetch_add(1, Ordering::SeqCst);
            if node.send_fails_http.load(Ordering::SeqCst) {
                return Err(StatusCode::BAD_GATEWAY);
            }
            ok(json!(format!("0x{}", "ab".repeat(32))))
        }
        "eth_getTransactionReceipt" => match *node.receipt.lock() {
            ReceiptReply::Confirmed => ok(json!({"status": "0x1"})),
            ReceiptReply::Reverted => ok(json!({"status": "0x0"})),
            ReceiptReply::Pending => ok(Value::Null),
            ReceiptReply::RpcError => err(-32603, "header not found"),
        },
        other => err(-32601, &format!("method {other} not found")),
    };
    Ok(reply)
}
