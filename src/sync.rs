//! Republishing schemas after each successful recompilation.
//!
//! Every spec is fetched and published independently: a spec whose source is down or
//! returns garbage is reported in the [`SyncReport`] and logged, while the rest of the
//! specs are still published.

use crate::artifact::ArtifactStore;
use crate::config::ConfigSet;
use crate::environment::Environment;
use crate::error::Error;
use crate::schema::SchemaFetcher;
use crate::tasks::{SpecOutcome, TaskSet};
use log::{debug, error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Per-spec results of one sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// `true` when the pass did nothing because the environment is not development
    pub skipped: bool,
    pub outcomes: Vec<SpecOutcome<PathBuf>>,
}

impl SyncReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            outcomes: Vec::new(),
        }
    }

    pub fn published(&self) -> impl Iterator<Item = &SpecOutcome<PathBuf>> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &SpecOutcome<PathBuf>> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(SpecOutcome::is_success)
    }
}

#[derive(Clone)]
pub struct SchemaSyncOrchestrator {
    environment: Environment,
    store: ArtifactStore,
    fetcher: Arc<dyn SchemaFetcher>,
}

impl SchemaSyncOrchestrator {
    pub fn new(environment: Environment, store: ArtifactStore, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            environment,
            store,
            fetcher,
        }
    }

    /// Fetches and publishes every spec, waiting for all of them. Never fails as a whole.
    pub async fn on_recompile(&self, config_set: &ConfigSet) -> SyncReport {
        if !self.environment.is_development() {
            debug!("Skipping schema sync in {} environment", self.environment);
            return SyncReport::skipped();
        }

        let mut tasks = TaskSet::new();
        for spec in config_set {
            let name = spec.display_name().to_string();
            let location = spec.schema_location.clone();
            let store = self.store.clone();
            let fetcher = self.fetcher.clone();

            tasks.spawn(name.clone(), async move {
                let document = fetcher.fetch(&location).await?;
                tokio::task::spawn_blocking(move || store.publish(&name, &document))
                    .await
                    .map_err(|e| Error::Task(e.to_string()))?
            });
        }

        let report = SyncReport {
            skipped: false,
            outcomes: tasks.join_all().await,
        };

        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(path) => info!("[openAPI]: published '{}' to {}", outcome.name, path.display()),
                Err(e) => error!("[openAPI]: failed to sync '{}': {}", outcome.name, e),
            }
        }

        report
    }

    /// Starts a sync pass in the background and returns without waiting for it.
    ///
    /// Passes are not serialized: an earlier pass still in flight may finish after this one,
    /// in which case the last write to each artifact wins.
    pub fn spawn_recompile(&self, config_set: ConfigSet) -> JoinHandle<SyncReport> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.on_recompile(&config_set).await })
    }
}
