//! Registrant persistence interface.

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{NewRegistrant, Registrant, ReferredEntry};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The field whose uniqueness constraint was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Email,
    Username,
    ReferralCode,
}

impl std::fmt::Display for ConflictField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictField::Email => write!(f, "email"),
            ConflictField::Username => write!(f, "username"),
            ConflictField::ReferralCode => write!(f, "referral_code"),
        }
    }
}

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(ConflictField),

    #[error("referral edge already exists for referred registrant")]
    EdgeExists,

    #[error("registrant not found: {id}")]
    NotFound { id: Uuid },

    #[error("invalid stored timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid stored UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[cfg(any(feature = "postgres", feature = "sqlite"))]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of a transactional referral credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Edge inserted and referrer counters incremented.
    Credited,
    /// An edge already existed for this referred registrant; nothing changed.
    AlreadyAttributed,
}

/// Interface for registrant persistence.
///
/// The store is the sole point of serialization: uniqueness checks happen
/// atomically with inserts, and counter updates are single atomic statements.
/// Application code never read-modify-writes the shared counters.
///
/// Implementations:
/// - `SqlRegistrantStore`: PostgreSQL / SQLite via sqlx + sea-query
/// - `MockRegistrantStore`: in-memory, for tests
#[async_trait]
pub trait RegistrantStore: Send + Sync {
    /// Insert a registrant, assigning id and creation time.
    ///
    /// Email/username/code uniqueness is enforced by the insert itself (not a
    /// separate pre-check); violations surface as
    /// [`StoreError::UniqueViolation`] with the offending field.
    async fn insert_registrant(&self, candidate: NewRegistrant) -> Result<Registrant>;

    /// Look up a registrant by referral code. Unknown codes are expected
    /// input, so this returns `None` rather than an error.
    async fn find_by_referral_code(&self, code: &str) -> Result<Option<Registrant>>;

    /// Look up a registrant by (already normalized) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Registrant>>;

    /// Atomically apply one referral credit to a registrant:
    /// `referral_count + 1`, with `bonus_units` recomputed in the same
    /// statement. Never implemented as read-modify-write.
    async fn increment_referral_credit(&self, registrant_id: Uuid) -> Result<()>;

    /// Append a referral edge. At most one edge may exist per referred
    /// registrant; duplicates surface as [`StoreError::EdgeExists`].
    async fn insert_referral_edge(
        &self,
        referrer_id: Uuid,
        referred_id: Uuid,
        code: &str,
    ) -> Result<()>;

    /// Edge insert plus counter increment in one database transaction.
    ///
    /// Idempotent under retry: an existing edge for `referred_id` yields
    /// [`CreditOutcome::AlreadyAttributed`] and skips the increment. Any other
    /// failure rolls both writes back; a half-applied credit is never
    /// observable.
    async fn credit_referral(
        &self,
        referrer_id: Uuid,
        referred_id: Uuid,
        code: &str,
    ) -> Result<CreditOutcome>;

    /// Registrants referred by `referrer_id`, newest first.
    async fn referrals_of(&self, referrer_id: Uuid) -> Result<Vec<ReferredEntry>>;

    /// All registrants in leaderboard order: `referral_count` descending,
    /// then `created_at` ascending, then id ascending. The ordering is total,
    /// which keeps ranks and pagination deterministic.
    async fn list_ranked(&self, limit: Option<u64>) -> Result<Vec<Registrant>>;

    /// Total number of registrants.
    async fn count_registrants(&self) -> Result<u64>;

    /// Total number of referral edges.
    async fn count_edges(&self) -> Result<u64>;

    /// Registrant counts grouped by acquisition source, largest first.
    async fn source_breakdown(&self) -> Result<Vec<(String, u64)>>;
}
