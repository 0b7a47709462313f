//! ckb-faucet: testnet CKB faucet over HTTP.
//!
//! Pays a configured amount of CKB to an address once per GitHub account per
//! cooldown window, and serves a few address tools alongside.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

mod config;
mod github;
mod routes;
mod rpc;

use ckb_faucet_core::traits::ChainClient;
use ckb_faucet_service::{FaucetService, FaucetSettings, JsonlStore};
use ckb_faucet_wallet::Wallet;
use config::Config;
use github::GithubIdentity;
use rpc::RpcChainClient;

/// Shared application state passed to every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FaucetService>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Failed to load faucet configuration")?;

    info!(
        node = %config.node_url,
        bind = %config.bind_addr,
        network = %config.network,
        amount_ckb = config.amount_ckb(),
        fee_rate = config.fee_rate,
        cooldown_secs = config.cooldown_secs,
        records = %config.records_path.display(),
        "Starting ckb-faucet"
    );

    let chain = Arc::new(RpcChainClient::new(&config.node_url, config.request_timeout)?);
    let script_info = chain
        .system_script_info()
        .await
        .with_context(|| format!("Failed to read genesis block from {}", chain.endpoint()))?;
    info!(
        code_hash = %script_info.code_hash,
        type_hash = %script_info.secp256k1_type_hash,
        dep = %script_info.dep_out_point,
        "Loaded system script info"
    );

    let wallet = Wallet::new(config.private_key.clone(), script_info, config.network)
        .with_fee(config.fee_shannons)
        .with_fee_rate(config.fee_rate);
    info!(address = %wallet.address(), "Faucet wallet ready");

    let store = JsonlStore::open(&config.records_path)
        .await
        .with_context(|| format!("Failed to open records at {}", config.records_path.display()))?;

    let identities = GithubIdentity::new(&config.github_api_url, config.request_timeout)?;

    let service = FaucetService::new(
        Arc::new(wallet),
        chain,
        Arc::new(identities),
        Arc::new(store),
        FaucetSettings {
            amount: config.amount_shannons,
            cooldown: config.cooldown(),
        },
    );

    let app = routes::router(AppState { service: Arc::new(service) });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}
