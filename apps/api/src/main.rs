mod config;
mod errors;
mod extract;
mod license;
mod llm_client;
mod render;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::license::{GumroadVerifier, KeyStore, LicenseValidator, RedemptionLedger};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CVMark API v{}", env!("CARGO_PKG_VERSION"));

    // License validation core. A missing or malformed key file is fatal here,
    // never per-request.
    let key_store = KeyStore::load(&config.licenses_path)?;
    info!("Loaded {} local license keys", key_store.len());

    let ledger = Arc::new(RedemptionLedger::new(config.ledger_path.clone()));
    let verifier = Arc::new(GumroadVerifier::new(config.gumroad_product_id.clone()));
    let validator = Arc::new(LicenseValidator::new(key_store, ledger, verifier));
    info!("License validator initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.openai_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Build app state
    let state = AppState {
        validator,
        llm,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // frontend origin is unrestricted, as deployed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
