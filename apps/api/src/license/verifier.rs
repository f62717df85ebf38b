//! Remote license verification against the Gumroad licensing API.
//!
//! The verifier is an unreliable external collaborator: transport and parse
//! failures are typed (`VerifierError`) so the validator can log them
//! distinctly, but they always collapse to rejection for the caller. License
//! checks gate a paid feature and must fail closed.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const GUMROAD_VERIFY_URL: &str = "https://api.gumroad.com/v2/licenses/verify";
/// Bounded call duration; the licensing API gets one attempt per request.
const VERIFY_TIMEOUT_SECS: u64 = 10;

/// What the licensing service said about a key. Transient, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Valid, unrefunded purchase.
    Valid,
    /// Key unknown to the licensing service.
    Invalid,
    /// Key was valid but the purchase has been refunded.
    Refunded,
}

/// Failure to complete a verification attempt, as distinct from a confirmed
/// rejection. Kept separate for observability; callers still fail closed.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("licensing API returned a non-conforming response")]
    MalformedResponse,
}

/// Contract for a remote license check. Implemented by [`GumroadVerifier`] in
/// production and by in-memory stubs in tests.
#[async_trait]
pub trait RemoteVerifier: Send + Sync {
    async fn verify(&self, key: &str) -> Result<Verification, VerifierError>;
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
    purchase: Option<Purchase>,
}

#[derive(Debug, Deserialize)]
struct Purchase {
    #[serde(default)]
    refunded: bool,
}

/// Production verifier: `POST {product_id, license_key}` to Gumroad.
pub struct GumroadVerifier {
    client: Client,
    url: String,
    product_id: String,
}

impl GumroadVerifier {
    pub fn new(product_id: String) -> Self {
        Self::with_url(product_id, GUMROAD_VERIFY_URL.to_string())
    }

    pub fn with_url(product_id: String, url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(VERIFY_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            url,
            product_id,
        }
    }
}

#[async_trait]
impl RemoteVerifier for GumroadVerifier {
    async fn verify(&self, key: &str) -> Result<Verification, VerifierError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[
                ("product_id", self.product_id.as_str()),
                ("license_key", key),
            ])
            .send()
            .await?;

        // Gumroad answers 404 with a JSON body for unknown keys; read the
        // body either way and let interpretation decide.
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|_| VerifierError::MalformedResponse)?;
        let parsed: VerifyResponse =
            serde_json::from_value(body).map_err(|_| VerifierError::MalformedResponse)?;

        let verdict = interpret(parsed);
        debug!("License verification verdict: {verdict:?}");
        Ok(verdict)
    }
}

fn interpret(response: VerifyResponse) -> Verification {
    if !response.success {
        return Verification::Invalid;
    }
    match response.purchase {
        Some(p) if p.refunded => Verification::Refunded,
        Some(_) => Verification::Valid,
        // success without purchase details does not prove an unrefunded sale
        None => Verification::Invalid,
    }
}
