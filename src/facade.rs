//! Early-access facade for in-process library usage.
//!
//! Wires the store, code generator, attribution engine, and read paths into
//! one handle exposing the operations the hosting CRUD layer maps onto its
//! transport. No transport lives here.

use std::sync::Arc;

use crate::attribution::AttributionEngine;
use crate::codegen::ReferralCodeGenerator;
use crate::config::Config;
use crate::dashboard::{DashboardError, DashboardQuery};
use crate::interfaces::registrant_store::Result as StoreResult;
use crate::interfaces::{EmailSender, NoopEmailSender, RegistrantStore};
use crate::leaderboard::LeaderboardBuilder;
use crate::model::{Dashboard, RankEntry, ReferrerPreview, Stats};
use crate::registration::{RegisteredUser, RegistrationError, RegistrationInput, RegistrationService};
use crate::stats::StatsQuery;

/// In-process referral engine handle.
pub struct EarlyAccess {
    store: Arc<dyn RegistrantStore>,
    registration: RegistrationService,
    leaderboard: Arc<LeaderboardBuilder>,
    dashboard: DashboardQuery,
    stats: StatsQuery,
    default_leaderboard_limit: u64,
}

impl EarlyAccess {
    /// Connect to the configured store and wire up the engine.
    pub async fn connect(
        config: Config,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let store = crate::storage::init_storage(&config.storage).await?;
        Ok(Self::with_store(store, config, Arc::new(NoopEmailSender)))
    }

    /// Engine over an in-memory SQLite database (tests, embedded use).
    #[cfg(feature = "sqlite")]
    pub async fn in_memory() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::connect(Config::for_test()).await
    }

    /// Wire the engine over an already-constructed store.
    pub fn with_store(
        store: Arc<dyn RegistrantStore>,
        config: Config,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        let generator = Arc::new(ReferralCodeGenerator::new(
            config.referral.code_seed_len,
            config.referral.code_suffix_len,
            config.referral.max_code_attempts,
        ));
        let engine = Arc::new(AttributionEngine::new(Arc::clone(&store)));
        let registration = RegistrationService::new(
            Arc::clone(&store),
            generator,
            engine,
            email,
            config.server.base_url.clone(),
        );
        let leaderboard = Arc::new(LeaderboardBuilder::new(Arc::clone(&store)));
        let dashboard = DashboardQuery::new(Arc::clone(&store), Arc::clone(&leaderboard));
        let stats = StatsQuery::new(Arc::clone(&store));

        Self {
            store,
            registration,
            leaderboard,
            dashboard,
            stats,
            default_leaderboard_limit: config.referral.leaderboard_limit,
        }
    }

    /// The underlying store (for composition and tests).
    pub fn store(&self) -> &Arc<dyn RegistrantStore> {
        &self.store
    }

    /// Register a new early-access user.
    pub async fn register(
        &self,
        input: RegistrationInput,
    ) -> Result<RegisteredUser, RegistrationError> {
        self.registration.register(input).await
    }

    /// Public preview of a referrer by code; `None` for unknown codes.
    pub async fn get_user_by_referral_code(
        &self,
        code: &str,
    ) -> StoreResult<Option<ReferrerPreview>> {
        let registrant = self.store.find_by_referral_code(code).await?;
        Ok(registrant.map(|r| ReferrerPreview {
            full_name: r.full_name,
            username: r.username,
            referral_count: r.referral_count,
            bonus_units: r.bonus_units,
        }))
    }

    /// Ranked leaderboard; `limit` defaults to the configured page size.
    pub async fn get_leaderboard(&self, limit: Option<u64>) -> StoreResult<Vec<RankEntry>> {
        self.leaderboard
            .top_n(limit.unwrap_or(self.default_leaderboard_limit))
            .await
    }

    /// Dashboard for a registrant identified by email.
    pub async fn get_dashboard(&self, email: &str) -> Result<Dashboard, DashboardError> {
        self.dashboard.dashboard_for(email).await
    }

    /// Aggregate program stats.
    pub async fn get_stats(&self) -> StoreResult<Stats> {
        self.stats.stats().await
    }
}
