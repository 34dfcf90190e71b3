//! Mock storage implementation for testing.
//!
//! Keeps registrants and edges in memory behind an `RwLock`, mirroring the
//! SQL store's semantics: uniqueness enforced at insert, atomic credit,
//! idempotent `credit_referral`. Failure injection switches let service
//! tests exercise degraded paths.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::interfaces::registrant_store::Result;
use crate::interfaces::{ConflictField, CreditOutcome, RegistrantStore, StoreError};
use crate::model::{NewRegistrant, ReferralEdge, ReferredEntry, Registrant};

/// Mock registrant store that keeps all state in memory.
#[derive(Default)]
pub struct MockRegistrantStore {
    registrants: RwLock<HashMap<Uuid, Registrant>>,
    edges: RwLock<Vec<ReferralEdge>>,
    /// Strictly increasing creation clock, so rank tie-breaks on
    /// `created_at` are deterministic even within one test tick.
    last_created_at: RwLock<Option<DateTime<Utc>>>,
    fail_on_credit: RwLock<bool>,
    fail_on_find: RwLock<bool>,
}

impl MockRegistrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `credit_referral` and `increment_referral_credit` fail.
    pub async fn set_fail_on_credit(&self, fail: bool) {
        *self.fail_on_credit.write().await = fail;
    }

    /// Make lookups fail.
    pub async fn set_fail_on_find(&self, fail: bool) {
        *self.fail_on_find.write().await = fail;
    }

    async fn next_created_at(&self) -> DateTime<Utc> {
        let mut last = self.last_created_at.write().await;
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }

    fn injected_failure() -> StoreError {
        StoreError::NotFound { id: Uuid::nil() }
    }
}

#[async_trait]
impl RegistrantStore for MockRegistrantStore {
    async fn insert_registrant(&self, candidate: NewRegistrant) -> Result<Registrant> {
        let created_at = self.next_created_at().await;
        let mut registrants = self.registrants.write().await;

        for existing in registrants.values() {
            if existing.email == candidate.email {
                return Err(StoreError::UniqueViolation(ConflictField::Email));
            }
            if existing.username == candidate.username {
                return Err(StoreError::UniqueViolation(ConflictField::Username));
            }
            if existing.referral_code == candidate.referral_code {
                return Err(StoreError::UniqueViolation(ConflictField::ReferralCode));
            }
        }

        let registrant = Registrant {
            id: Uuid::new_v4(),
            full_name: candidate.full_name,
            email: candidate.email,
            username: candidate.username,
            phone: candidate.phone,
            source: candidate.source,
            referral_code: candidate.referral_code,
            referred_by_code: candidate.referred_by_code,
            referral_count: 0,
            bonus_units: 1,
            created_at,
        };
        registrants.insert(registrant.id, registrant.clone());
        Ok(registrant)
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<Registrant>> {
        if *self.fail_on_find.read().await {
            return Err(Self::injected_failure());
        }
        let registrants = self.registrants.read().await;
        Ok(registrants.values().find(|r| r.referral_code == code).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Registrant>> {
        if *self.fail_on_find.read().await {
            return Err(Self::injected_failure());
        }
        let registrants = self.registrants.read().await;
        Ok(registrants.values().find(|r| r.email == email).cloned())
    }

    async fn increment_referral_credit(&self, registrant_id: Uuid) -> Result<()> {
        if *self.fail_on_credit.read().await {
            return Err(Self::injected_failure());
        }
        let mut registrants = self.registrants.write().await;
        let registrant = registrants
            .get_mut(&registrant_id)
            .ok_or(StoreError::NotFound { id: registrant_id })?;
        registrant.referral_count += 1;
        registrant.bonus_units = 1 + registrant.referral_count;
        Ok(())
    }

    async fn insert_referral_edge(
        &self,
        referrer_id: Uuid,
        referred_id: Uuid,
        code: &str,
    ) -> Result<()> {
        let mut edges = self.edges.write().await;
        if edges.iter().any(|e| e.referred_id == referred_id) {
            return Err(StoreError::EdgeExists);
        }
        edges.push(ReferralEdge {
            id: Uuid::new_v4(),
            referrer_id,
            referred_id,
            referral_code: code.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn credit_referral(
        &self,
        referrer_id: Uuid,
        referred_id: Uuid,
        code: &str,
    ) -> Result<CreditOutcome> {
        if *self.fail_on_credit.read().await {
            return Err(Self::injected_failure());
        }

        // Both locks held for the whole operation: the mock's stand-in for
        // the SQL store's transaction.
        let mut registrants = self.registrants.write().await;
        let mut edges = self.edges.write().await;

        if edges.iter().any(|e| e.referred_id == referred_id) {
            return Ok(CreditOutcome::AlreadyAttributed);
        }
        let referrer = registrants
            .get_mut(&referrer_id)
            .ok_or(StoreError::NotFound { id: referrer_id })?;

        edges.push(ReferralEdge {
            id: Uuid::new_v4(),
            referrer_id,
            referred_id,
            referral_code: code.to_string(),
            created_at: Utc::now(),
        });
        referrer.referral_count += 1;
        referrer.bonus_units = 1 + referrer.referral_count;
        Ok(CreditOutcome::Credited)
    }

    async fn referrals_of(&self, referrer_id: Uuid) -> Result<Vec<ReferredEntry>> {
        let registrants = self.registrants.read().await;
        let edges = self.edges.read().await;

        let mut referred: Vec<(usize, ReferredEntry)> = edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.referrer_id == referrer_id)
            .filter_map(|(i, e)| {
                registrants.get(&e.referred_id).map(|r| {
                    (
                        i,
                        ReferredEntry {
                            full_name: r.full_name.clone(),
                            username: r.username.clone(),
                            email: r.email.clone(),
                            created_at: e.created_at,
                        },
                    )
                })
            })
            .collect();
        // Newest first; insertion order breaks timestamp ties.
        referred.sort_by(|(ia, a), (ib, b)| {
            b.created_at.cmp(&a.created_at).then(ib.cmp(ia))
        });
        Ok(referred.into_iter().map(|(_, entry)| entry).collect())
    }

    async fn list_ranked(&self, limit: Option<u64>) -> Result<Vec<Registrant>> {
        let registrants = self.registrants.read().await;
        let mut all: Vec<Registrant> = registrants.values().cloned().collect();
        all.sort_by(|a, b| {
            b.referral_count
                .cmp(&a.referral_count)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        if let Some(limit) = limit {
            all.truncate(limit as usize);
        }
        Ok(all)
    }

    async fn count_registrants(&self) -> Result<u64> {
        Ok(self.registrants.read().await.len() as u64)
    }

    async fn count_edges(&self) -> Result<u64> {
        Ok(self.edges.read().await.len() as u64)
    }

    async fn source_breakdown(&self) -> Result<Vec<(String, u64)>> {
        let registrants = self.registrants.read().await;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for registrant in registrants.values() {
            if let Some(source) = &registrant.source {
                *counts.entry(source.clone()).or_default() += 1;
            }
        }
        let mut breakdown: Vec<(String, u64)> = counts.into_iter().collect();
        breakdown.sort_by(|(sa, ca), (sb, cb)| cb.cmp(ca).then(sa.cmp(sb)));
        Ok(breakdown)
    }
}
