//! Dashboard query: profile, referred list, leaderboard position.

use std::sync::Arc;

use tracing::debug;

use crate::interfaces::{RegistrantStore, StoreError};
use crate::leaderboard::LeaderboardBuilder;
use crate::model::Dashboard;

/// Errors from the dashboard read path.
///
/// Unlike lookup-by-code, a miss here is an explicit error: the caller is
/// expected to already be a registrant.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("no registrant for email")]
    NotFound,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Read-only composition over the store and the leaderboard ordering.
pub struct DashboardQuery {
    store: Arc<dyn RegistrantStore>,
    leaderboard: Arc<LeaderboardBuilder>,
}

impl DashboardQuery {
    pub fn new(store: Arc<dyn RegistrantStore>, leaderboard: Arc<LeaderboardBuilder>) -> Self {
        Self { store, leaderboard }
    }

    /// Dashboard for the registrant with `email` (normalized to lowercase).
    pub async fn dashboard_for(&self, email: &str) -> Result<Dashboard, DashboardError> {
        let email = email.trim().to_lowercase();
        let user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(DashboardError::NotFound)?;

        let referrals = self.store.referrals_of(user.id).await?;
        let (leaderboard_position, total_registrants) = self
            .leaderboard
            .position_of(user.id)
            .await?
            // The registrant was just resolved, so absence from the ordering
            // can only mean a concurrent deletion; treat it as not found.
            .ok_or(DashboardError::NotFound)?;

        debug!(
            id = %user.id,
            referrals = referrals.len(),
            position = leaderboard_position,
            "dashboard assembled"
        );

        Ok(Dashboard {
            user,
            referrals,
            leaderboard_position,
            total_registrants,
        })
    }
}
