use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use web3d_claim::config::{ServiceConfig, StoreKind};
use web3d_claim::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "web3d-claim", version, about = "Web3D token allocation and claim service")]
struct Args {
    /// TOML config file
    #[arg(long, env = "CLAIM_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port (overrides config and CLAIM_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Listen address (overrides config and CLAIM_BIND)
    #[arg(long)]
    bind: Option<String>,

    /// Allocation store: memory, sled or json
    #[arg(long)]
    store: Option<StoreKind>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Allow any CORS origin
    #[arg(long)]
    dev: bool,
}

fn mask(secret: Option<&str>) -> String {
    match secret {
        Some(s) if !s.is_empty() => format!("set (len={})", s.len()),
        _ => "unset".to_string(),
    }
}

fn cors_layer(cfg: &ServiceConfig) -> CorsLayer {
    if cfg.dev {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let list: Vec<HeaderValue> = cfg
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    if list.is_empty() {
        // same-origin only
        CorsLayer::new().allow_methods(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(list))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = std::env::var("CLAIM_LOG")
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    let mut cfg = ServiceConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        cfg.port = port;
    }
    if let Some(bind) = args.bind {
        cfg.bind = bind;
    }
    if let Some(store) = args.store {
        cfg.store = store;
    }
    if let Some(dir) = args.data_dir {
        cfg.data_dir = dir;
    }
    cfg.dev |= args.dev;
    cfg.validate()?;

    info!(
        admin = %cfg.admin_address,
        admin_token = %mask(cfg.admin_token.as_deref()),
        admin_key = %mask(cfg.admin_private_key.as_deref()),
        token = %cfg.chain.token_address,
        chain_id = cfg.chain.chain_id,
        rpc = %cfg.rpc.url,
        "web3d-claim starting up"
    );

    let state = AppState::from_config(&cfg)?;
    let store = state.store.clone();
    let app = build_router(state)
        .layer(RequestBodyLimitLayer::new(cfg.max_body_bytes))
        .layer(cors_layer(&cfg));

    let addr: SocketAddr = cfg
        .listen_addr()
        .parse()
        .with_context(|| format!("invalid listen address {}", cfg.listen_addr()))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(listen = %addr, store = store.kind(), "claim service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "failed to flush allocation store");
    }
    Ok(())
}
