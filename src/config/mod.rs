//! Service configuration
//!
//! Layered as: built-in defaults, then an optional TOML file, then `CLAIM_*`
//! environment variables, then command-line flags (applied by `main`).
//! The admin private key is only ever read from the environment.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::address::is_valid_address;
use crate::chain::AdminSigner;

pub const DEFAULT_TOKEN_ADDRESS: &str = "0x7eD9054C48088bb8Cfc5C5fbC32775b9455A13f7";
pub const DEFAULT_ADMIN_ADDRESS: &str = "0x4A58ad9EdaC24762D3eA8eB76ab1E2C114cBB4d4";
pub const DEFAULT_RPC_URL: &str = "https://bsc-dataseed.binance.org/";
pub const BSC_CHAIN_ID: u64 = 56;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Sled,
    Json,
}

impl std::str::FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreKind::Memory),
            "sled" | "db" => Ok(StoreKind::Sled),
            "json" | "file" => Ok(StoreKind::Json),
            other => Err(anyhow!("unknown store kind {other:?} (memory|sled|json)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    pub fallback_urls: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_string(),
            fallback_urls: Vec::new(),
            timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub token_address: String,
    /// Optional claim-list contract; absent or zero disables those endpoints.
    pub claim_contract_address: Option<String>,
    pub token_decimals: u8,
    /// Reported when the token's `name()` / `symbol()` calls fail.
    pub token_name: String,
    pub token_symbol: String,
    pub gas_price_boost_pct: u32,
    pub wait_for_receipt: bool,
    pub receipt_timeout_secs: u64,
    pub receipt_poll_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: BSC_CHAIN_ID,
            token_address: DEFAULT_TOKEN_ADDRESS.to_string(),
            claim_contract_address: None,
            token_decimals: 18,
            token_name: "Web3D Token".to_string(),
            token_symbol: "W3D".to_string(),
            gas_price_boost_pct: 20,
            wait_for_receipt: true,
            receipt_timeout_secs: 120,
            receipt_poll_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind: String,
    pub port: u16,
    pub store: StoreKind,
    pub data_dir: PathBuf,
    pub admin_address: String,
    /// Shared secret accepted as `Authorization: Bearer <token>`.
    pub admin_token: Option<String>,
    /// Require proof that the claimer owns the wallet. On unless an operator
    /// fronts claims with its own wallet check.
    pub require_wallet_signature: bool,
    pub auth_max_skew_secs: u64,
    pub cors_origins: Vec<String>,
    /// Permissive CORS for local development.
    pub dev: bool,
    pub max_body_bytes: usize,
    pub rpc: RpcConfig,
    pub chain: ChainConfig,
    #[serde(skip)]
    pub admin_private_key: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3001,
            store: StoreKind::Sled,
            data_dir: PathBuf::from("claim-data"),
            admin_address: DEFAULT_ADMIN_ADDRESS.to_string(),
            admin_token: None,
            require_wallet_signature: true,
            auth_max_skew_secs: 300,
            cors_origins: Vec::new(),
            dev: false,
            max_body_bytes: 256 * 1024,
            rpc: RpcConfig::default(),
            chain: ChainConfig::default(),
            admin_private_key: None,
        }
    }
}

fn env_flag(val: &str) -> bool {
    matches!(val.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn env_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = env::var(key) {
        match val.trim().parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => tracing::warn!(key, value = %val, "ignoring unparsable environment value"),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ServiceConfig {
    /// Defaults, then the TOML file (if given), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env(&mut self) {
        if let Some(v) = env_string("CLAIM_BIND") {
            self.bind = v;
        }
        env_parse("CLAIM_PORT", &mut self.port);
        env_parse("CLAIM_STORE", &mut self.store);
        if let Some(v) = env_string("CLAIM_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("CLAIM_ADMIN_ADDRESS") {
            self.admin_address = v;
        }
        if let Some(v) = env_string("CLAIM_ADMIN_TOKEN") {
            self.admin_token = Some(v);
        }
        if let Ok(v) = env::var("CLAIM_REQUIRE_WALLET_SIGNATURE") {
            self.require_wallet_signature = env_flag(&v);
        }
        env_parse("CLAIM_AUTH_MAX_SKEW_SECS", &mut self.auth_max_skew_secs);
        if let Ok(v) = env::var("CLAIM_CORS_ORIGINS") {
            self.cors_origins = env_list(&v);
        }
        if let Ok(v) = env::var("CLAIM_DEV") {
            self.dev = env_flag(&v);
        }
        env_parse("CLAIM_MAX_BODY_BYTES", &mut self.max_body_bytes);

        if let Some(v) = env_string("CLAIM_RPC_URL").or_else(|| env_string("BSC_RPC_URL")) {
            self.rpc.url = v;
        }
        if let Ok(v) = env::var("CLAIM_RPC_FALLBACK_URLS") {
            self.rpc.fallback_urls = env_list(&v);
        }
        env_parse("CLAIM_RPC_TIMEOUT_MS", &mut self.rpc.timeout_ms);

        env_parse("CLAIM_CHAIN_ID", &mut self.chain.chain_id);
        if let Some(v) = env_string("CLAIM_TOKEN_ADDRESS") {
            self.chain.token_address = v;
        }
        if let Some(v) = env_string("CLAIM_CONTRACT_ADDRESS") {
            self.chain.claim_contract_address = Some(v);
        }
        env_parse("CLAIM_TOKEN_DECIMALS", &mut self.chain.token_decimals);
        env_parse("CLAIM_GAS_PRICE_BOOST_PCT", &mut self.chain.gas_price_boost_pct);
        if let Ok(v) = env::var("CLAIM_WAIT_RECEIPT") {
            self.chain.wait_for_receipt = env_flag(&v);
        }
        env_parse("CLAIM_RECEIPT_TIMEOUT_SECS", &mut self.chain.receipt_timeout_secs);

        self.admin_private_key = env_string("ADMIN_PRIVATE_KEY");
    }

    /// Reject malformed addresses and a key that does not belong to the admin.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_address(&self.admin_address) {
            return Err(anyhow!("admin_address is not a valid address: {}", self.admin_address));
        }
        if !is_valid_address(&self.chain.token_address) {
            return Err(anyhow!(
                "token_address is not a valid address: {}",
                self.chain.token_address
            ));
        }
        if let Some(claim) = &self.chain.claim_contract_address {
            if !is_valid_address(claim) {
                return Err(anyhow!("claim_contract_address is not a valid address: {claim}"));
            }
        }
        if self.chain.token_decimals > 77 {
            return Err(anyhow!("token_decimals must be at most 77"));
        }
        if self.rpc.url.trim().is_empty() {
            return Err(anyhow!("rpc.url must be set"));
        }
        if let Some(key) = &self.admin_private_key {
            let signer = AdminSigner::from_hex(key).map_err(|e| anyhow!("ADMIN_PRIVATE_KEY: {e}"))?;
            if !signer
                .address()
                .as_str()
                .eq_ignore_ascii_case(&self.admin_address)
            {
                return Err(anyhow!(
                    "ADMIN_PRIVATE_KEY belongs to {}, not the configured admin {}",
                    signer.address().to_checksum(),
                    self.admin_address
                ));
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Where the selected store keeps its data.
    pub fn store_path(&self) -> PathBuf {
        match self.store {
            StoreKind::Json => self.data_dir.join("tokenAllocations.json"),
            _ => self.data_dir.join("allocations.db"),
        }
    }
}
