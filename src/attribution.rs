//! Attribution engine: resolves an inbound referral code and applies the
//! credit exactly once.
//!
//! Attribution is a reward, not a registration precondition: store failures
//! here are logged and reported as a degraded outcome, never propagated to
//! the registration path. Unknown codes are tolerated as a silent no-op
//! (codes get mistyped; registration must still succeed).

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::interfaces::{CreditOutcome, RegistrantStore};
use crate::model::Registrant;

/// Outcome of one attribution attempt. Never an error on the registration
/// path; `Failed` is the degraded case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttributionOutcome {
    /// No code supplied, unknown code, or self-referral. Nothing changed.
    NoAttribution,
    /// Edge written and referrer credited.
    Attributed { referrer_id: Uuid },
    /// A retried request found the edge already present; no double credit.
    AlreadyAttributed { referrer_id: Uuid },
    /// Store error during the credit transaction; both writes rolled back.
    Failed,
}

/// Applies referral credit for newly created registrants.
pub struct AttributionEngine {
    store: Arc<dyn RegistrantStore>,
}

impl AttributionEngine {
    pub fn new(store: Arc<dyn RegistrantStore>) -> Self {
        Self { store }
    }

    /// Attribute `new_registrant` to the owner of `inbound_code`, if any.
    ///
    /// Blank and unknown codes are a no-op. A code resolving to the new
    /// registrant itself is refused (self-referral guard). The edge insert
    /// and counter increment happen in one store transaction; an existing
    /// edge for this registrant absorbs retries without double-crediting.
    pub async fn attribute(
        &self,
        new_registrant: &Registrant,
        inbound_code: Option<&str>,
    ) -> AttributionOutcome {
        let code = match inbound_code.map(str::trim) {
            Some(code) if !code.is_empty() => code,
            _ => return AttributionOutcome::NoAttribution,
        };

        let referrer = match self.store.find_by_referral_code(code).await {
            Ok(Some(referrer)) => referrer,
            Ok(None) => {
                debug!(code, referred = %new_registrant.id, "inbound code resolves to nobody, skipping attribution");
                return AttributionOutcome::NoAttribution;
            }
            Err(e) => {
                error!(code, referred = %new_registrant.id, error = %e, "referrer lookup failed");
                return AttributionOutcome::Failed;
            }
        };

        if referrer.id == new_registrant.id {
            warn!(code, registrant = %new_registrant.id, "self-referral refused");
            return AttributionOutcome::NoAttribution;
        }

        match self
            .store
            .credit_referral(referrer.id, new_registrant.id, code)
            .await
        {
            Ok(CreditOutcome::Credited) => AttributionOutcome::Attributed {
                referrer_id: referrer.id,
            },
            Ok(CreditOutcome::AlreadyAttributed) => {
                debug!(referred = %new_registrant.id, referrer = %referrer.id, "already attributed, skipping increment");
                AttributionOutcome::AlreadyAttributed {
                    referrer_id: referrer.id,
                }
            }
            Err(e) => {
                error!(
                    code,
                    referrer = %referrer.id,
                    referred = %new_registrant.id,
                    error = %e,
                    "referral credit transaction failed"
                );
                AttributionOutcome::Failed
            }
        }
    }
}
