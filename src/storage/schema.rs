//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Registrants table schema.
#[derive(Iden)]
pub enum Registrants {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "full_name"]
    FullName,
    #[iden = "email"]
    Email,
    #[iden = "username"]
    Username,
    #[iden = "phone"]
    Phone,
    #[iden = "source"]
    Source,
    #[iden = "referral_code"]
    ReferralCode,
    #[iden = "referred_by_code"]
    ReferredByCode,
    #[iden = "referral_count"]
    ReferralCount,
    #[iden = "bonus_units"]
    BonusUnits,
    #[iden = "created_at"]
    CreatedAt,
}

/// Referral edges table schema.
#[derive(Iden)]
pub enum ReferralEdges {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "referrer_id"]
    ReferrerId,
    #[iden = "referred_id"]
    ReferredId,
    #[iden = "referral_code"]
    ReferralCode,
    #[iden = "created_at"]
    CreatedAt,
}

/// SQL for creating both tables and their uniqueness indexes.
///
/// Portable across SQLite and PostgreSQL. `created_at` is fixed-width RFC 3339
/// UTC, so TEXT ordering matches chronological ordering. The unique index on
/// `referral_edges(referred_id)` allows at most one inbound edge per
/// registrant; the `uq_*` names are what the unique-violation mapping keys on.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS registrants (
    id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL,
    username TEXT NOT NULL,
    phone TEXT,
    source TEXT,
    referral_code TEXT NOT NULL,
    referred_by_code TEXT,
    referral_count BIGINT NOT NULL DEFAULT 0,
    bonus_units BIGINT NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_registrants_email ON registrants(email);
CREATE UNIQUE INDEX IF NOT EXISTS uq_registrants_username ON registrants(username);
CREATE UNIQUE INDEX IF NOT EXISTS uq_registrants_referral_code ON registrants(referral_code);

CREATE TABLE IF NOT EXISTS referral_edges (
    id TEXT PRIMARY KEY,
    referrer_id TEXT NOT NULL,
    referred_id TEXT NOT NULL,
    referral_code TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_referral_edges_referred_id ON referral_edges(referred_id);
CREATE INDEX IF NOT EXISTS idx_referral_edges_referrer ON referral_edges(referrer_id);
"#;
