use std::sync::Arc;

use chrono::FixedOffset;

use coach_core::catalog::{Catalog, StrategyCatalog};
use coach_core::model::ScenarioId;
use coach_core::progression::UnlockTable;
use storage::repository::Storage;

use crate::Clock;
use crate::coaching::{CoachingConfig, CoachingSession};
use crate::error::AppServicesError;
use crate::progress::ProgressService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    catalog: Arc<Catalog>,
    strategies: Arc<StrategyCatalog>,
    coaching: CoachingConfig,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        offset: FixedOffset,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, offset).await)
    }

    /// Build services over in-memory storage.
    pub async fn in_memory(clock: Clock, offset: FixedOffset) -> Self {
        Self::from_storage(Storage::in_memory(), clock, offset).await
    }

    async fn from_storage(storage: Storage, clock: Clock, offset: FixedOffset) -> Self {
        let catalog = Arc::new(Catalog::built_in());
        let progress = ProgressService::load(
            clock,
            offset,
            Arc::clone(&catalog),
            Arc::new(UnlockTable::default_table()),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.unlocks),
        )
        .await;

        Self {
            clock,
            catalog,
            strategies: Arc::new(StrategyCatalog::built_in()),
            coaching: CoachingConfig::default(),
            progress: Arc::new(progress),
        }
    }

    #[must_use]
    pub fn with_coaching_config(mut self, config: CoachingConfig) -> Self {
        self.coaching = config;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    /// Begin live coaching for a scenario, starting now.
    #[must_use]
    pub fn start_coaching(&self, scenario_id: ScenarioId) -> CoachingSession {
        CoachingSession::start(
            scenario_id,
            &self.catalog,
            &self.strategies,
            self.coaching.clone(),
            self.clock.now(),
        )
    }
}
