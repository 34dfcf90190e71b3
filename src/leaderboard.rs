//! Leaderboard: ranked read over registrants.
//!
//! Pure read path. Rank is the 1-based position in the deterministic ordering
//! (`referral_count` descending, `created_at` ascending, id ascending) and is
//! always recomputed from live state, so it can never drift from the counts.

use std::sync::Arc;

use uuid::Uuid;

use crate::interfaces::registrant_store::Result;
use crate::interfaces::RegistrantStore;
use crate::model::{RankEntry, Registrant};

pub struct LeaderboardBuilder {
    store: Arc<dyn RegistrantStore>,
}

impl LeaderboardBuilder {
    pub fn new(store: Arc<dyn RegistrantStore>) -> Self {
        Self { store }
    }

    /// Top `limit` registrants with contiguous 1-based ranks.
    pub async fn top_n(&self, limit: u64) -> Result<Vec<RankEntry>> {
        let ranked = self.store.list_ranked(Some(limit)).await?;
        Ok(rank_entries(ranked))
    }

    /// Locate a registrant inside the full ordering.
    ///
    /// Returns `(position, total_registrants)`, or `None` if the id is
    /// unknown. Walks the same ordering as [`top_n`](Self::top_n), so the
    /// reported position is always consistent with the visible leaderboard.
    pub async fn position_of(&self, id: Uuid) -> Result<Option<(u64, u64)>> {
        let ranked = self.store.list_ranked(None).await?;
        let total = ranked.len() as u64;
        let position = ranked
            .iter()
            .position(|r| r.id == id)
            .map(|i| (i as u64 + 1, total));
        Ok(position)
    }
}

/// Assign contiguous 1-based ranks to an already-ordered list.
pub(crate) fn rank_entries(ranked: Vec<Registrant>) -> Vec<RankEntry> {
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, r)| RankEntry {
            rank: i as u64 + 1,
            id: r.id,
            full_name: r.full_name,
            username: r.username,
            referral_code: r.referral_code,
            referral_count: r.referral_count,
            bonus_units: r.bonus_units,
            created_at: r.created_at,
        })
        .collect()
}
