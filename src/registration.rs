//! Registration service: validation, code issue, insert, attribution.
//!
//! The single public write path of the engine. Input is validated before any
//! store access; uniqueness is enforced by the insert itself; attribution is
//! applied after the insert and never blocks success; the welcome email is
//! fired on a detached task.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::attribution::{AttributionEngine, AttributionOutcome};
use crate::codegen::{CodeGenError, ReferralCodeGenerator};
use crate::interfaces::{
    ConflictField, EmailSender, OutboundEmail, RegistrantStore, StoreError,
};
use crate::model::{NewRegistrant, Registrant};

/// Validation limits for registration input.
pub mod limits {
    /// Minimum full name length (after trimming).
    pub const MIN_FULL_NAME_LENGTH: usize = 2;
    /// Minimum username length.
    pub const MIN_USERNAME_LENGTH: usize = 3;
    /// Maximum length for any free-text field.
    pub const MAX_FIELD_LENGTH: usize = 320;
}

/// Error constants for validation failures.
pub mod errmsg {
    pub const FULL_NAME_TOO_SHORT: &str = "full name must be at least 2 characters";
    pub const EMAIL_INVALID: &str = "email address is not valid";
    pub const USERNAME_TOO_SHORT: &str = "username must be at least 3 characters";
    pub const FIELD_TOO_LONG: &str = "field exceeds maximum length";
}

/// A rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Errors surfaced by [`RegistrationService::register`].
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Email or username already taken; surfaced verbatim to the caller.
    #[error("{0} already registered")]
    Conflict(ConflictField),

    /// Unresolvable code collisions; internal, logged with seed context.
    #[error(transparent)]
    CodeGeneration(#[from] CodeGenError),

    /// Infrastructure failure; internal details are not for callers.
    #[error("storage error: {0}")]
    Store(StoreError),
}

/// Registration input as received from the hosting layer.
#[derive(Debug, Clone, Default)]
pub struct RegistrationInput {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub source: Option<String>,
    /// Inbound referral code, verbatim. Unknown codes are tolerated.
    pub referred_by_code: Option<String>,
}

/// Public view of a freshly registered user.
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub referral_code: String,
    pub referral_link: String,
    pub bonus_units: i64,
    pub referral_count: i64,
    /// How the inbound code played out; informational, never blocks success.
    pub attribution: AttributionOutcome,
}

/// Orchestrates code generation, insertion, attribution, and the welcome mail.
pub struct RegistrationService {
    store: Arc<dyn RegistrantStore>,
    generator: Arc<ReferralCodeGenerator>,
    engine: Arc<AttributionEngine>,
    email: Arc<dyn EmailSender>,
    base_url: String,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn RegistrantStore>,
        generator: Arc<ReferralCodeGenerator>,
        engine: Arc<AttributionEngine>,
        email: Arc<dyn EmailSender>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            generator,
            engine,
            email,
            base_url: base_url.into(),
        }
    }

    /// Register a new early-access user.
    ///
    /// On a referral-code collision at insert time the colliding code joins
    /// the avoid-set and the insert is retried with a fresh code, bounded by
    /// the generator's attempt cap. Email/username conflicts map to
    /// [`RegistrationError::Conflict`] with the violated field.
    pub async fn register(
        &self,
        input: RegistrationInput,
    ) -> Result<RegisteredUser, RegistrationError> {
        let input = validate(input)?;
        let inbound_code = input.referred_by_code.clone();

        let registrant = self.insert_with_fresh_code(&input).await?;
        info!(
            id = %registrant.id,
            username = %registrant.username,
            code = %registrant.referral_code,
            "registrant created"
        );

        let attribution = self
            .engine
            .attribute(&registrant, inbound_code.as_deref())
            .await;

        self.send_welcome(&registrant);

        Ok(RegisteredUser {
            referral_link: referral_link(&self.base_url, &registrant.referral_code),
            id: registrant.id,
            full_name: registrant.full_name,
            email: registrant.email,
            username: registrant.username,
            referral_code: registrant.referral_code,
            bonus_units: registrant.bonus_units,
            referral_count: registrant.referral_count,
            attribution,
        })
    }

    /// Generate a code and insert, feeding insert-time code collisions back
    /// into the generator's avoid-set. The uniqueness check and the insert are
    /// one statement; there is no check-then-act window.
    async fn insert_with_fresh_code(
        &self,
        input: &RegistrationInput,
    ) -> Result<Registrant, RegistrationError> {
        let mut avoid: HashSet<String> = HashSet::new();

        // The insert loop shares the generator's attempt cap: each pass costs
        // a store round-trip, so it must terminate even if the store reports
        // a code collision on every insert.
        for _ in 0..self.generator.max_attempts() {
            let code = match self.generator.generate(&input.username, &avoid) {
                Ok(code) => code,
                Err(e @ CodeGenError::Exhausted { .. }) => {
                    error!(
                        seed = %input.username,
                        email = %input.email,
                        collided = avoid.len(),
                        "referral code space exhausted"
                    );
                    return Err(e.into());
                }
            };

            let candidate = NewRegistrant {
                full_name: input.full_name.clone(),
                email: input.email.clone(),
                username: input.username.clone(),
                phone: input.phone.clone(),
                source: input.source.clone(),
                referral_code: code.clone(),
                referred_by_code: input.referred_by_code.clone(),
            };

            match self.store.insert_registrant(candidate).await {
                Ok(registrant) => return Ok(registrant),
                Err(StoreError::UniqueViolation(ConflictField::ReferralCode)) => {
                    warn!(code = %code, seed = %input.username, "referral code collided at insert, retrying");
                    avoid.insert(code);
                }
                Err(StoreError::UniqueViolation(field)) => {
                    return Err(RegistrationError::Conflict(field));
                }
                Err(e) => return Err(RegistrationError::Store(e)),
            }
        }

        error!(
            seed = %input.username,
            email = %input.email,
            collided = avoid.len(),
            "referral code space exhausted at insert"
        );
        Err(CodeGenError::Exhausted {
            seed: input.username.clone(),
            attempts: self.generator.max_attempts(),
        }
        .into())
    }

    /// Fire-and-forget welcome mail; failures are logged, never surfaced.
    fn send_welcome(&self, registrant: &Registrant) {
        let email = Arc::clone(&self.email);
        let message = OutboundEmail {
            to: registrant.email.clone(),
            subject: "Welcome to early access".to_string(),
            body: format!(
                "Hi {}, you're in. Share your referral link to earn bonus rewards: {}",
                registrant.full_name,
                referral_link(&self.base_url, &registrant.referral_code),
            ),
        };
        let to = registrant.email.clone();
        tokio::spawn(async move {
            if let Err(e) = email.send(message).await {
                warn!(to = %to, error = %e, "welcome email failed");
            }
        });
    }
}

/// Build the shareable referral link. The code is an opaque token; consumers
/// must never parse it.
pub fn referral_link(base_url: &str, code: &str) -> String {
    format!("{}/early-access?ref={}", base_url.trim_end_matches('/'), code)
}

/// Validate shape before touching storage, normalizing the email to
/// lowercase so uniqueness is case-insensitive for emails.
fn validate(mut input: RegistrationInput) -> Result<RegistrationInput, ValidationError> {
    input.full_name = input.full_name.trim().to_string();
    input.email = input.email.trim().to_lowercase();
    input.username = input.username.trim().to_string();

    if input.full_name.chars().count() < limits::MIN_FULL_NAME_LENGTH {
        return Err(ValidationError {
            field: "full_name",
            message: errmsg::FULL_NAME_TOO_SHORT,
        });
    }
    if input.username.chars().count() < limits::MIN_USERNAME_LENGTH {
        return Err(ValidationError {
            field: "username",
            message: errmsg::USERNAME_TOO_SHORT,
        });
    }
    if !email_shape_ok(&input.email) {
        return Err(ValidationError {
            field: "email",
            message: errmsg::EMAIL_INVALID,
        });
    }
    for (field, value) in [
        ("full_name", &input.full_name),
        ("email", &input.email),
        ("username", &input.username),
    ] {
        if value.len() > limits::MAX_FIELD_LENGTH {
            return Err(ValidationError {
                field,
                message: errmsg::FIELD_TOO_LONG,
            });
        }
    }

    Ok(input)
}

/// Syntactic email check: one `@`, non-empty local part, dotted domain.
fn email_shape_ok(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    let mut labels = domain.split('.');
    labels.clone().count() >= 2 && labels.all(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::NoopEmailSender;
    use crate::storage::mock::MockRegistrantStore;

    fn service(store: Arc<MockRegistrantStore>) -> RegistrationService {
        let engine = Arc::new(AttributionEngine::new(store.clone()));
        RegistrationService::new(
            store,
            Arc::new(ReferralCodeGenerator::default()),
            engine,
            Arc::new(NoopEmailSender),
            "https://example.com",
        )
    }

    fn input(name: &str, email: &str, username: &str) -> RegistrationInput {
        RegistrationInput {
            full_name: name.to_string(),
            email: email.to_string(),
            username: username.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rejects_malformed_input_before_storage() {
        let store = Arc::new(MockRegistrantStore::new());
        let svc = service(store.clone());

        for bad in [
            input("X", "x@example.com", "xavier"),
            input("Xavier", "not-an-email", "xavier"),
            input("Xavier", "x@nodot", "xavier"),
            input("Xavier", "x@example.com", "xy"),
        ] {
            assert!(matches!(
                svc.register(bad).await,
                Err(RegistrationError::Validation(_))
            ));
        }
        assert_eq!(store.count_registrants().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn email_is_normalized_to_lowercase() {
        let store = Arc::new(MockRegistrantStore::new());
        let svc = service(store.clone());

        let user = svc
            .register(input("Amira", "Amira@Example.COM", "amira"))
            .await
            .unwrap();
        assert_eq!(user.email, "amira@example.com");

        let dup = svc.register(input("Amira", "AMIRA@example.com", "amira2")).await;
        assert!(matches!(
            dup,
            Err(RegistrationError::Conflict(ConflictField::Email))
        ));
    }

    #[tokio::test]
    async fn username_conflict_maps_to_field() {
        let store = Arc::new(MockRegistrantStore::new());
        let svc = service(store);

        svc.register(input("Amira", "a@example.com", "amira")).await.unwrap();
        let dup = svc.register(input("Amira Two", "a2@example.com", "amira")).await;
        assert!(matches!(
            dup,
            Err(RegistrationError::Conflict(ConflictField::Username))
        ));
    }

    #[tokio::test]
    async fn referral_link_carries_the_code() {
        let store = Arc::new(MockRegistrantStore::new());
        let svc = service(store);

        let user = svc.register(input("Amira", "a@example.com", "amira")).await.unwrap();
        assert_eq!(
            user.referral_link,
            format!("https://example.com/early-access?ref={}", user.referral_code)
        );
        assert_eq!(user.referral_count, 0);
        assert_eq!(user.bonus_units, 1);
        assert_eq!(user.attribution, AttributionOutcome::NoAttribution);
    }

    #[tokio::test]
    async fn attribution_failure_does_not_fail_registration() {
        let store = Arc::new(MockRegistrantStore::new());
        let svc = service(store.clone());

        let referrer = svc.register(input("Amira", "a@example.com", "amira")).await.unwrap();
        store.set_fail_on_credit(true).await;

        let mut referred = input("Basim", "b@example.com", "basim");
        referred.referred_by_code = Some(referrer.referral_code.clone());
        let user = svc.register(referred).await.unwrap();

        assert_eq!(user.attribution, AttributionOutcome::Failed);
        assert_eq!(store.count_registrants().await.unwrap(), 2);
        let after = store
            .find_by_referral_code(&referrer.referral_code)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.referral_count, 0);
    }

    #[tokio::test]
    async fn persistent_code_collisions_exhaust_after_bounded_inserts() {
        use std::sync::atomic::{AtomicU32, Ordering};

        use crate::interfaces::registrant_store::Result as StoreResult;
        use crate::interfaces::CreditOutcome;
        use crate::model::{Registrant, ReferredEntry};

        // Store where every insert reports a referral-code collision; the
        // retry loop must give up after the attempt cap, not spin as long as
        // the store keeps colliding.
        #[derive(Default)]
        struct AlwaysCollidingStore {
            inserts: AtomicU32,
        }

        #[async_trait::async_trait]
        impl RegistrantStore for AlwaysCollidingStore {
            async fn insert_registrant(&self, _candidate: NewRegistrant) -> StoreResult<Registrant> {
                self.inserts.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::UniqueViolation(ConflictField::ReferralCode))
            }
            async fn find_by_referral_code(&self, _code: &str) -> StoreResult<Option<Registrant>> {
                Ok(None)
            }
            async fn find_by_email(&self, _email: &str) -> StoreResult<Option<Registrant>> {
                Ok(None)
            }
            async fn increment_referral_credit(&self, _registrant_id: Uuid) -> StoreResult<()> {
                unreachable!()
            }
            async fn insert_referral_edge(
                &self,
                _referrer_id: Uuid,
                _referred_id: Uuid,
                _code: &str,
            ) -> StoreResult<()> {
                unreachable!()
            }
            async fn credit_referral(
                &self,
                _referrer_id: Uuid,
                _referred_id: Uuid,
                _code: &str,
            ) -> StoreResult<CreditOutcome> {
                unreachable!()
            }
            async fn referrals_of(&self, _referrer_id: Uuid) -> StoreResult<Vec<ReferredEntry>> {
                Ok(Vec::new())
            }
            async fn list_ranked(&self, _limit: Option<u64>) -> StoreResult<Vec<Registrant>> {
                Ok(Vec::new())
            }
            async fn count_registrants(&self) -> StoreResult<u64> {
                Ok(0)
            }
            async fn count_edges(&self) -> StoreResult<u64> {
                Ok(0)
            }
            async fn source_breakdown(&self) -> StoreResult<Vec<(String, u64)>> {
                Ok(Vec::new())
            }
        }

        let store = Arc::new(AlwaysCollidingStore::default());
        let engine = Arc::new(AttributionEngine::new(store.clone()));
        let svc = RegistrationService::new(
            store.clone(),
            Arc::new(ReferralCodeGenerator::default()),
            engine,
            Arc::new(NoopEmailSender),
            "https://example.com",
        );

        let result = svc.register(input("Amira", "a@example.com", "amira")).await;
        assert!(matches!(
            result,
            Err(RegistrationError::CodeGeneration(CodeGenError::Exhausted { .. }))
        ));
        assert_eq!(
            store.inserts.load(Ordering::SeqCst),
            crate::codegen::DEFAULT_MAX_ATTEMPTS
        );
    }

    #[tokio::test]
    async fn insert_time_code_collision_is_retried() {
        let store = Arc::new(MockRegistrantStore::new());
        // Both services use identically seeded RNGs and usernames sharing the
        // "SAME" prefix, so the second registration's first candidate is
        // exactly the code the first registration already holds.
        let engine = Arc::new(AttributionEngine::new(store.clone()));
        let svc = RegistrationService::new(
            store.clone(),
            Arc::new(ReferralCodeGenerator::seeded(4, 4, 10, 7)),
            engine,
            Arc::new(NoopEmailSender),
            "https://example.com",
        );

        let first = svc.register(input("Amira", "a@example.com", "same")).await.unwrap();
        let second = RegistrationService::new(
            store.clone(),
            Arc::new(ReferralCodeGenerator::seeded(4, 4, 10, 7)),
            Arc::new(AttributionEngine::new(store.clone())),
            Arc::new(NoopEmailSender),
            "https://example.com",
        )
        .register(input("Basim", "b@example.com", "same2"))
        .await;

        let second = second.unwrap();
        assert_ne!(first.referral_code, second.referral_code);
    }

    #[test]
    fn link_format_tolerates_trailing_slash() {
        assert_eq!(
            referral_link("https://x.io/", "ABCD12"),
            "https://x.io/early-access?ref=ABCD12"
        );
    }
}
