//! Web3D token allocation and claim service.
//!
//! Admins record per-wallet allocations; wallet owners claim them, either
//! as an ERC20 transfer signed by the admin key or as a bookkeeping entry.

pub mod address;
pub mod amount;
pub mod api;
pub mod app_state;
pub mod auth;
pub mod chain;
pub mod config;
pub mod metrics;
pub mod service;
pub mod store;

pub use address::WalletAddress;
pub use amount::TokenAmount;
pub use api::build_router;
pub use app_state::{AppState, ClaimMode, ClaimSettings};
pub use config::ServiceConfig;
