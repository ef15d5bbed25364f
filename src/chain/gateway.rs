//! Token and claim-list contract operations behind one trait, so the services
//! and HTTP layer can be exercised without a live node.

use std::time::Duration;

use alloy_primitives::{keccak256, U256};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use super::abi;
use super::rpc::RpcClient;
use super::signer::{AdminSigner, LegacyTx};
use super::ChainError;
use crate::address::WalletAddress;
use crate::config::ChainConfig;

pub type TxHash = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub address: WalletAddress,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Per-wallet state held by the claim-list contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimStatus {
    pub claimable: U256,
    pub claimed: bool,
}

#[async_trait]
pub trait TokenGateway: Send + Sync {
    /// Decimal places of the token, used for base-unit conversion.
    fn decimals(&self) -> u8;

    /// Whether an admin key is loaded, i.e. transfers can be signed.
    fn can_sign(&self) -> bool;

    fn claim_contract_address(&self) -> Option<WalletAddress>;

    async fn token_info(&self) -> Result<TokenInfo, ChainError>;

    async fn balance_of(&self, owner: &WalletAddress) -> Result<U256, ChainError>;

    /// Admin-signed ERC20 `transfer(to, amount)`.
    async fn transfer(&self, to: &WalletAddress, amount: U256) -> Result<TxHash, ChainError>;

    /// Admin-signed `setClaimList(users, amounts)` on the claim-list contract.
    async fn set_claim_list(
        &self,
        users: &[WalletAddress],
        amounts: &[U256],
    ) -> Result<TxHash, ChainError>;

    async fn claim_status(&self, user: &WalletAddress) -> Result<ClaimStatus, ChainError>;

    /// Admin address recorded in the claim-list contract.
    async fn claim_contract_admin(&self) -> Result<WalletAddress, ChainError>;

    /// Token the claim-list contract pays out.
    async fn claim_contract_token(&self) -> Result<WalletAddress, ChainError>;

    /// Move `amount` of the claim contract's token from the admin wallet into
    /// the claim contract.
    async fn fund_claim_contract(&self, amount: U256) -> Result<TxHash, ChainError>;

    async fn claim_contract_balance(&self) -> Result<U256, ChainError>;
}

const TRANSFER_GAS_FALLBACK: u64 = 200_000;
const CLAIM_LIST_GAS_LIMIT: u64 = 5_000_000;

/// Gateway backed by a JSON-RPC node.
pub struct EvmTokenGateway {
    rpc: RpcClient,
    signer: Option<AdminSigner>,
    token: WalletAddress,
    claim_contract: Option<WalletAddress>,
    cfg: ChainConfig,
    // held from nonce lookup through submission so admin txs never share a nonce
    tx_lock: Mutex<()>,
}

impl EvmTokenGateway {
    pub fn new(
        rpc: RpcClient,
        signer: Option<AdminSigner>,
        cfg: ChainConfig,
    ) -> Result<Self, ChainError> {
        let token = WalletAddress::parse(&cfg.token_address)
            .map_err(|_| ChainError::NotConfigured("token contract address"))?;
        let claim_contract = match cfg.claim_contract_address.as_deref() {
            Some(raw) => Some(
                WalletAddress::parse(raw)
                    .map_err(|_| ChainError::NotConfigured("claim contract address"))?,
            ),
            None => None,
        };
        Ok(Self {
            rpc,
            signer,
            token,
            claim_contract,
            cfg,
            tx_lock: Mutex::new(()),
        })
    }

    fn signer(&self) -> Result<&AdminSigner, ChainError> {
        self.signer.as_ref().ok_or(ChainError::SignerMissing)
    }

    fn claim_contract(&self) -> Result<&WalletAddress, ChainError> {
        match &self.claim_contract {
            Some(a) if !a.is_zero() => Ok(a),
            _ => Err(ChainError::NotConfigured("claim contract address")),
        }
    }

    async fn call(&self, to: &WalletAddress, data: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        self.rpc.eth_call(to.as_str(), &data).await
    }

    async fn read_string(&self, to: &WalletAddress, signature: &str) -> Result<String, ChainError> {
        let out = self.call(to, abi::encode_call0(signature)).await?;
        abi::decode_string(&out)
    }

    async fn erc20_balance(
        &self,
        token: &WalletAddress,
        owner: &WalletAddress,
    ) -> Result<U256, ChainError> {
        let out = self
            .call(token, abi::encode_call_address("balanceOf(address)", owner))
            .await?;
        abi::decode_uint(&out)
    }

    async fn boosted_gas_price(&self) -> Result<U256, ChainError> {
        let base = self.rpc.gas_price().await?;
        let pct = U256::from(100u64 + self.cfg.gas_price_boost_pct as u64);
        Ok(base * pct / U256::from(100u64))
    }

    /// Build, sign and submit a contract call from the admin wallet.
    /// `gas_limit: None` estimates with a 20% margin. The fixed fallback limit
    /// is used only when no node answered; an estimation error is returned.
    async fn send_admin_tx(
        &self,
        to: &WalletAddress,
        data: Vec<u8>,
        gas_limit: Option<u64>,
    ) -> Result<TxHash, ChainError> {
        let signer = self.signer()?;
        let from = signer.address().as_str().to_string();

        let gas_limit = match gas_limit {
            Some(limit) => limit,
            None => match self.rpc.estimate_gas(&from, to.as_str(), &data).await {
                Ok(estimate) => estimate.saturating_mul(12) / 10,
                Err(e @ ChainError::Rpc { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, fallback = TRANSFER_GAS_FALLBACK, "gas estimation failed, using fixed limit");
                    TRANSFER_GAS_FALLBACK
                }
            },
        };
        let gas_price = self.boosted_gas_price().await?;

        let hash = {
            let _guard = self.tx_lock.lock().await;
            let nonce = self.rpc.transaction_count(&from).await?;
            let tx = LegacyTx {
                nonce,
                gas_price,
                gas_limit,
                to: to.clone(),
                value: U256::ZERO,
                data,
                chain_id: self.cfg.chain_id,
            };
            let raw = signer.sign_transaction(&tx)?;
            tracing::info!(
                from = %signer.address().to_checksum(),
                to = %to.to_checksum(),
                nonce,
                gas_limit,
                gas_price = %gas_price,
                "submitting admin transaction"
            );
            match self.rpc.send_raw_transaction(&raw).await {
                Ok(hash) => hash,
                // the request may have reached the node before the connection failed
                Err(ChainError::Transport(reason)) => {
                    let hash = format!("0x{}", hex::encode(keccak256(&raw)));
                    tracing::warn!(tx = %hash, error = %reason, "transaction submission outcome unknown");
                    return Err(ChainError::Unconfirmed { hash, reason });
                }
                Err(e) => return Err(e),
            }
        };

        if self.cfg.wait_for_receipt {
            self.wait_for_receipt(&hash).await?;
        }
        Ok(hash)
    }

    /// Poll for the receipt until the deadline. Lookup errors are retried;
    /// once the deadline passes the transaction is reported as unconfirmed.
    async fn wait_for_receipt(&self, hash: &str) -> Result<(), ChainError> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.cfg.receipt_timeout_secs);
        let mut last_error = None;
        loop {
            match self.rpc.transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    let status = receipt.get("status").and_then(|s| s.as_str()).unwrap_or("0x1");
                    if status == "0x0" {
                        return Err(ChainError::Reverted(hash.to_string()));
                    }
                    tracing::info!(tx = %hash, "transaction confirmed");
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(tx = %hash, error = %e, "receipt lookup failed, retrying");
                    last_error = Some(e.to_string());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                let reason = last_error.unwrap_or_else(|| "no receipt before timeout".into());
                tracing::warn!(tx = %hash, reason = %reason, "transaction not confirmed in time");
                return Err(ChainError::Unconfirmed {
                    hash: hash.to_string(),
                    reason,
                });
            }
            tokio::time::sleep(Duration::from_millis(self.cfg.receipt_poll_ms)).await;
        }
    }

    async fn read_claim_token(&self) -> Result<WalletAddress, ChainError> {
        let contract = self.claim_contract()?;
        let out = self.call(contract, abi::encode_call0("web3dToken()")).await?;
        let token = abi::decode_address(&out)?;
        if token.is_zero() {
            return Err(ChainError::Rejected(
                "Invalid token address returned from contract".into(),
            ));
        }
        Ok(token)
    }
}

#[async_trait]
impl TokenGateway for EvmTokenGateway {
    fn decimals(&self) -> u8 {
        self.cfg.token_decimals
    }

    fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    fn claim_contract_address(&self) -> Option<WalletAddress> {
        self.claim_contract().ok().cloned()
    }

    async fn token_info(&self) -> Result<TokenInfo, ChainError> {
        let name = match self.read_string(&self.token, "name()").await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "token name() failed, using configured default");
                self.cfg.token_name.clone()
            }
        };
        let symbol = match self.read_string(&self.token, "symbol()").await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "token symbol() failed, using configured default");
                self.cfg.token_symbol.clone()
            }
        };
        Ok(TokenInfo {
            address: self.token.clone(),
            name,
            symbol,
            decimals: self.cfg.token_decimals,
        })
    }

    async fn balance_of(&self, owner: &WalletAddress) -> Result<U256, ChainError> {
        self.erc20_balance(&self.token, owner).await
    }

    async fn transfer(&self, to: &WalletAddress, amount: U256) -> Result<TxHash, ChainError> {
        let data = abi::encode_call_address_uint("transfer(address,uint256)", to, amount);
        self.send_admin_tx(&self.token, data, None).await
    }

    async fn set_claim_list(
        &self,
        users: &[WalletAddress],
        amounts: &[U256],
    ) -> Result<TxHash, ChainError> {
        let contract = self.claim_contract()?.clone();
        let data = abi::encode_call_address_array_uint_array(
            "setClaimList(address[],uint256[])",
            users,
            amounts,
        );
        self.send_admin_tx(&contract, data, Some(CLAIM_LIST_GAS_LIMIT))
            .await
    }

    async fn claim_status(&self, user: &WalletAddress) -> Result<ClaimStatus, ChainError> {
        let contract = self.claim_contract()?;
        let claimable = abi::decode_uint(
            &self
                .call(contract, abi::encode_call_address("claimableAmount(address)", user))
                .await?,
        )?;
        let claimed = abi::decode_bool(
            &self
                .call(contract, abi::encode_call_address("claimed(address)", user))
                .await?,
        )?;
        Ok(ClaimStatus { claimable, claimed })
    }

    async fn claim_contract_admin(&self) -> Result<WalletAddress, ChainError> {
        let contract = self.claim_contract()?;
        let out = self.call(contract, abi::encode_call0("admin()")).await?;
        abi::decode_address(&out)
    }

    async fn claim_contract_token(&self) -> Result<WalletAddress, ChainError> {
        self.read_claim_token().await
    }

    async fn fund_claim_contract(&self, amount: U256) -> Result<TxHash, ChainError> {
        let contract = self.claim_contract()?.clone();
        let token = self.read_claim_token().await?;
        let admin = self.signer()?.address().clone();

        let balance = self.erc20_balance(&token, &admin).await?;
        if balance < amount {
            return Err(ChainError::Rejected("Insufficient token balance".into()));
        }

        let data = abi::encode_call_address_uint("transfer(address,uint256)", &contract, amount);
        self.send_admin_tx(&token, data, None).await
    }

    async fn claim_contract_balance(&self) -> Result<U256, ChainError> {
        let contract = self.claim_contract()?.clone();
        let token = self.read_claim_token().await?;
        self.erc20_balance(&token, &contract).await
    }
}
