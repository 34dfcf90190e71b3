//! Aggregate program stats for the admin view.

use std::sync::Arc;

use crate::interfaces::registrant_store::Result;
use crate::interfaces::RegistrantStore;
use crate::leaderboard::rank_entries;
use crate::model::{SourceCount, Stats};

/// Number of top referrers included in the stats view.
const TOP_REFERRERS_LIMIT: u64 = 10;

pub struct StatsQuery {
    store: Arc<dyn RegistrantStore>,
}

impl StatsQuery {
    pub fn new(store: Arc<dyn RegistrantStore>) -> Self {
        Self { store }
    }

    /// Totals, top referrers, and acquisition-source breakdown.
    pub async fn stats(&self) -> Result<Stats> {
        let total_registrants = self.store.count_registrants().await?;
        let total_referrals = self.store.count_edges().await?;
        let top_referrers = rank_entries(self.store.list_ranked(Some(TOP_REFERRERS_LIMIT)).await?);
        let source_breakdown = self
            .store
            .source_breakdown()
            .await?
            .into_iter()
            .map(|(source, count)| SourceCount { source, count })
            .collect();

        Ok(Stats {
            total_registrants,
            total_referrals,
            top_referrers,
            source_breakdown,
        })
    }
}
