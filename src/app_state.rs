use std::sync::Arc;

use anyhow::{Context, Result};

use crate::address::WalletAddress;
use crate::auth::{AdminAuthenticator, AuthChain, BearerTokenAuth, SignedMessageAuth};
use crate::chain::{AdminSigner, EvmTokenGateway, RpcClient, TokenGateway};
use crate::config::{ServiceConfig, StoreKind};
use crate::metrics::Metrics;
use crate::store::{AllocationStore, JsonFileStore, MemoryStore, SledStore};

/// How a successful claim is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimMode {
    /// Admin wallet sends an ERC20 transfer to the claimant.
    Transfer,
    /// Bookkeeping only; removing the allocation is the claim.
    Ledger,
}

impl ClaimMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimMode::Transfer => "transfer",
            ClaimMode::Ledger => "ledger",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClaimSettings {
    pub mode: ClaimMode,
    pub require_wallet_signature: bool,
    pub max_skew_secs: u64,
}

/// Shared handles passed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AllocationStore>,
    pub gateway: Arc<dyn TokenGateway>,
    pub auth: Arc<dyn AdminAuthenticator>,
    pub metrics: Arc<Metrics>,
    pub settings: Arc<ClaimSettings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AllocationStore>,
        gateway: Arc<dyn TokenGateway>,
        auth: Arc<dyn AdminAuthenticator>,
        settings: ClaimSettings,
    ) -> Result<Self> {
        Ok(Self {
            store,
            gateway,
            auth,
            metrics: Arc::new(Metrics::new().context("failed to register metrics")?),
            settings: Arc::new(settings),
        })
    }

    /// Wire up store, chain gateway and authenticators from configuration.
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self> {
        let store = open_store(cfg)?;

        let signer = match &cfg.admin_private_key {
            Some(key) => Some(AdminSigner::from_hex(key).context("ADMIN_PRIVATE_KEY")?),
            None => None,
        };
        let mode = if signer.is_some() {
            ClaimMode::Transfer
        } else {
            tracing::warn!("ADMIN_PRIVATE_KEY not set; claims are recorded without on-chain transfers");
            ClaimMode::Ledger
        };

        if !cfg.require_wallet_signature {
            tracing::warn!("wallet signatures not required; any caller can claim any allocated address");
        }

        let rpc = RpcClient::from_config(&cfg.rpc).context("failed to build RPC client")?;
        let gateway = EvmTokenGateway::new(rpc, signer, cfg.chain.clone())
            .context("invalid chain configuration")?;

        let admin = WalletAddress::parse(&cfg.admin_address).context("admin_address")?;
        let mut auth = AuthChain::new().with(SignedMessageAuth::new(admin, cfg.auth_max_skew_secs));
        if let Some(token) = &cfg.admin_token {
            auth = auth.with(BearerTokenAuth::new(token.clone()));
        }

        Self::new(
            store,
            Arc::new(gateway),
            Arc::new(auth),
            ClaimSettings {
                mode,
                require_wallet_signature: cfg.require_wallet_signature,
                max_skew_secs: cfg.auth_max_skew_secs,
            },
        )
    }
}

pub fn open_store(cfg: &ServiceConfig) -> Result<Arc<dyn AllocationStore>> {
    let store: Arc<dyn AllocationStore> = match cfg.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Sled => {
            let path = cfg.store_path();
            Arc::new(
                SledStore::open(&path)
                    .with_context(|| format!("failed to open sled store at {}", path.display()))?,
            )
        }
        StoreKind::Json => {
            let path = cfg.store_path();
            Arc::new(
                JsonFileStore::open(&path)
                    .with_context(|| format!("failed to open allocation file {}", path.display()))?,
            )
        }
    };
    tracing::info!(store = store.kind(), allocations = store.len().unwrap_or(0), "allocation store ready");
    Ok(store)
}
