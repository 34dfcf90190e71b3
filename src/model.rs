//! Core data model: registrants, referral edges, and public views.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One early-access signup.
///
/// Logically immutable after creation except for `referral_count` and
/// `bonus_units`, which are mutated only by the attribution engine through
/// atomic store updates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registrant {
    /// Opaque unique identifier, assigned at creation.
    pub id: Uuid,
    pub full_name: String,
    /// Globally unique; lowercased before any store access.
    pub email: String,
    /// Globally unique; case-sensitive.
    pub username: String,
    pub phone: Option<String>,
    /// How the registrant heard about the program.
    pub source: Option<String>,
    /// Globally unique, immutable once assigned.
    pub referral_code: String,
    /// The inbound code supplied at registration, stored verbatim so the
    /// attribution history stays auditable even if the referrer is deleted.
    pub referred_by_code: Option<String>,
    /// Materialized count of referral edges where this registrant is the
    /// referrer. Never decremented in normal operation.
    pub referral_count: i64,
    /// Reward balance; always `1 + referral_count`.
    pub bonus_units: i64,
    /// Assignment time; rank tie-breaker, never mutated.
    pub created_at: DateTime<Utc>,
}

/// Candidate registrant handed to the store for insertion.
///
/// The store assigns `id` and `created_at` and enforces uniqueness of email,
/// username, and referral code atomically with the insert.
#[derive(Debug, Clone)]
pub struct NewRegistrant {
    pub full_name: String,
    pub email: String,
    pub username: String,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub referral_code: String,
    pub referred_by_code: Option<String>,
}

/// One successful attribution, linking a referrer to a referred registrant.
///
/// Append-only audit log: never updated or deleted. A uniqueness constraint
/// on `referred_id` allows at most one inbound edge per registrant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferralEdge {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
    /// The code that was used, stored verbatim.
    pub referral_code: String,
    pub created_at: DateTime<Utc>,
}

/// Public fields of a referred registrant, as shown on the referrer's dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferredEntry {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Public preview of a referrer, looked up by code before registering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferrerPreview {
    pub full_name: String,
    pub username: String,
    pub referral_count: i64,
    pub bonus_units: i64,
}

/// One leaderboard row. `rank` is the 1-based position in the deterministic
/// ordering; it is recomputed on every read, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub rank: u64,
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub referral_code: String,
    pub referral_count: i64,
    pub bonus_units: i64,
    pub created_at: DateTime<Utc>,
}

/// Per-registrant dashboard: profile, referred list, leaderboard position.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub user: Registrant,
    /// Referred registrants, newest first.
    pub referrals: Vec<ReferredEntry>,
    /// 1-based position in the leaderboard ordering.
    pub leaderboard_position: u64,
    pub total_registrants: u64,
}

/// Count of registrants per acquisition source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCount {
    pub source: String,
    pub count: u64,
}

/// Aggregate program stats for the admin view.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_registrants: u64,
    pub total_referrals: u64,
    pub top_referrers: Vec<RankEntry>,
    pub source_breakdown: Vec<SourceCount>,
}
