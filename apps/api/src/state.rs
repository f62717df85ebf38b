use std::sync::Arc;

use crate::config::Config;
use crate::license::LicenseValidator;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// License validation core: key store + redemption ledger + remote verifier.
    pub validator: Arc<LicenseValidator>,
    pub llm: LlmClient,
    pub config: Config,
}
