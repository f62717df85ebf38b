//! License validation and single-use redemption.
//!
//! A key is either *local* (pre-provisioned in static configuration, always
//! valid, never single-use) or *remote* (confirmed by the licensing service,
//! consumable exactly once). The validator checks the local store first, so
//! owner keys never cost a network round-trip and can never be exhausted by
//! the redemption ledger.
//!
//! Redemption ordering: a remote key is claimed during validation, but its
//! consumption is recorded only when the caller commits the grant after the
//! protected operation succeeds. Dropping an uncommitted grant releases the
//! claim and records nothing.

mod key_store;
mod ledger;
mod verifier;

pub use key_store::KeyStore;
pub use ledger::{LedgerError, RedemptionLedger};
pub use verifier::{GumroadVerifier, RemoteVerifier, Verification, VerifierError};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LicenseError {
    /// Neither local nor remotely valid (includes refunded purchases).
    #[error("invalid or refunded license key")]
    InvalidKey,

    /// Remotely valid but already consumed.
    #[error("license key already used")]
    AlreadyUsed,

    /// The verification attempt itself failed. Collapsed into a rejection at
    /// the HTTP boundary but kept distinct here for observability.
    #[error("license verification attempt failed: {0}")]
    VerifierUnavailable(#[source] VerifierError),

    /// The consumption record could not be made durable. A server-side
    /// error, not a license rejection.
    #[error("ledger persistence failure: {0}")]
    Persistence(#[from] LedgerError),
}

/// How an accepted key was classified. Surfaced in the success response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseClass {
    Local,
    Remote,
}

/// Proof that a key passed validation for one request.
///
/// Remote grants hold a per-key claim that blocks concurrent redemption of
/// the same key. The claim is released on drop, which also covers caller
/// disconnects between validation and commit.
#[derive(Debug)]
pub struct LicenseGrant {
    key: String,
    class: LicenseClass,
    _claim: Option<Claim>,
}

impl LicenseGrant {
    pub fn class(&self) -> LicenseClass {
        self.class
    }
}

#[derive(Debug)]
struct Claim {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.key);
        }
    }
}

/// Orchestrates the key store, redemption ledger, and remote verifier.
pub struct LicenseValidator {
    store: KeyStore,
    ledger: Arc<RedemptionLedger>,
    verifier: Arc<dyn RemoteVerifier>,
    /// Remote keys currently claimed by an in-flight request.
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl LicenseValidator {
    pub fn new(
        store: KeyStore,
        ledger: Arc<RedemptionLedger>,
        verifier: Arc<dyn RemoteVerifier>,
    ) -> Self {
        Self {
            store,
            ledger,
            verifier,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Classifies `key` as accepted-local, accepted-remote, or rejected.
    ///
    /// Local keys never touch the ledger on either the read or the write
    /// side. Remote keys are verified (one attempt, fail closed), claimed,
    /// then checked against the consumed set.
    pub async fn validate(&self, key: &str) -> Result<LicenseGrant, LicenseError> {
        if self.store.contains(key) {
            debug!("License key accepted from local key store");
            return Ok(LicenseGrant {
                key: key.to_string(),
                class: LicenseClass::Local,
                _claim: None,
            });
        }

        match self.verifier.verify(key).await {
            Ok(Verification::Valid) => {}
            Ok(verdict) => {
                info!("License key rejected by verifier: {verdict:?}");
                return Err(LicenseError::InvalidKey);
            }
            Err(e) => {
                warn!("License verification attempt failed, rejecting: {e}");
                return Err(LicenseError::VerifierUnavailable(e));
            }
        }

        // Claim before reading the ledger. A commit releases its claim only
        // after the consumption record is durable, so a request that wins the
        // claim and then finds the key unconsumed holds it exclusively.
        // Checking the ledger first would leave a gap where a concurrent
        // commit lands between the check and the claim.
        let claimed = {
            let mut set = self.in_flight.lock().expect("in-flight claim set lock poisoned");
            set.insert(key.to_string())
        };
        if !claimed {
            // Another request holds this key between validation and commit.
            return Err(LicenseError::AlreadyUsed);
        }
        let claim = Claim {
            key: key.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        };

        if self.ledger.has_consumed(key).await {
            // `claim` drops here, releasing the key.
            return Err(LicenseError::AlreadyUsed);
        }

        Ok(LicenseGrant {
            key: key.to_string(),
            class: LicenseClass::Remote,
            _claim: Some(claim),
        })
    }

    /// Records consumption for a remote grant after the protected operation
    /// succeeded. Local grants are a no-op.
    ///
    /// The claim is released only after the consumption record is durable, so
    /// there is no window in which a concurrent request could re-validate the
    /// key.
    pub async fn commit(&self, grant: LicenseGrant) -> Result<LicenseClass, LicenseError> {
        if grant.class == LicenseClass::Remote {
            self.ledger.record(&grant.key).await?;
            info!("Remote license key consumed");
        }
        Ok(grant.class)
    }
}
