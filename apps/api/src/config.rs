use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub gumroad_product_id: String,
    /// JSON array of locally issued license keys, loaded once at startup.
    pub licenses_path: PathBuf,
    /// JSON array of consumed remote keys, owned exclusively by the ledger.
    pub ledger_path: PathBuf,
    /// Directory of markdown documents served by the PDF download endpoint.
    pub docs_dir: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            gumroad_product_id: require_env("GUMROAD_PRODUCT_ID")?,
            licenses_path: require_env("LICENSES_PATH")?.into(),
            ledger_path: std::env::var("LEDGER_PATH")
                .unwrap_or_else(|_| "used_licenses.json".to_string())
                .into(),
            docs_dir: std::env::var("DOCS_DIR")
                .unwrap_or_else(|_| "docs".to_string())
                .into(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
