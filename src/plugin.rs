//! The plugin: lifecycle hooks tying every component to a host.
//!
//! A host calls these at its own lifecycle points:
//!
//! 1. [`OpenApiPlugin::on_activate`] once at startup: resets the artifact directory and
//!    registers the dev server integration.
//! 2. [`OpenApiPlugin::on_generate_files`] on every file-generation pass: rewrites the viewer page.
//! 3. [`OpenApiPlugin::on_recompile`] (or [`OpenApiPlugin::spawn_recompile`]) after every
//!    successful recompilation: republishes the schemas.
//! 4. [`OpenApiPlugin::run_openapi_command`] when the user asks for code generation.
//!
//! Steps 2 and 3 do nothing outside development.

use crate::artifact::{ArtifactStore, ResetOutcome};
use crate::codegen::{CodeGenOrchestrator, CodegenReport, HostProject, ServiceGenerator};
use crate::config::{normalize, ConfigSet, RawConfig};
use crate::dev_server::{DevHost, DevServerIntegration};
use crate::environment::Environment;
use crate::error::Result;
use crate::schema::SchemaFetcher;
use crate::sync::{SchemaSyncOrchestrator, SyncReport};
use crate::viewer;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Directories of the host project the plugin works in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    pub root: PathBuf,
    /// Dependency cache; the artifact directory lives inside it
    pub dependency_cache: PathBuf,
    /// Temp build area for generated pages
    pub tmp: PathBuf,
}

impl HostPaths {
    pub fn for_project(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            dependency_cache: root.join("node_modules"),
            tmp: root.join(".openapi-devkit").join("tmp"),
            root,
        }
    }
}

pub struct OpenApiPlugin {
    environment: Environment,
    paths: HostPaths,
    config_set: ConfigSet,
    store: ArtifactStore,
    sync: SchemaSyncOrchestrator,
    integration: DevServerIntegration,
}

impl OpenApiPlugin {
    /// Normalizes and validates `raw`. Fails with a configuration error naming the first
    /// offending spec.
    pub fn new(
        environment: Environment,
        paths: HostPaths,
        raw: &RawConfig,
        fetcher: Arc<dyn SchemaFetcher>,
    ) -> Result<Self> {
        let config_set = normalize(raw);
        config_set.validate()?;

        let store = ArtifactStore::in_dependency_cache(&paths.dependency_cache);
        let sync = SchemaSyncOrchestrator::new(environment.clone(), store.clone(), fetcher);
        let integration = DevServerIntegration::new(environment.clone(), store.clone(), &paths.tmp);

        Ok(Self {
            environment,
            paths,
            config_set,
            store,
            sync,
            integration,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn paths(&self) -> &HostPaths {
        &self.paths
    }

    pub fn config_set(&self) -> &ConfigSet {
        &self.config_set
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Replaces the configuration after an edit. The previous configuration stays in place
    /// when the new one is invalid.
    pub fn update_config(&mut self, raw: &RawConfig) -> Result<()> {
        let config_set = normalize(raw);
        config_set.validate()?;
        debug!("Configuration now has {} spec(s)", config_set.len());
        self.config_set = config_set;
        Ok(())
    }

    /// Startup: resets the artifact directory and wires the dev server integration into `host`.
    pub fn on_activate(&self, host: &mut DevHost) -> ResetOutcome {
        info!("Using openapi plugin");
        let outcome = self.store.reset();
        self.integration.activate(host);
        outcome
    }

    /// Rewrites the viewer page from the current configuration. Returns its path, or `None`
    /// outside development.
    pub fn on_generate_files(&self) -> anyhow::Result<Option<PathBuf>> {
        if !self.environment.is_development() {
            return Ok(None);
        }
        viewer::write_viewer_page(&self.paths.tmp, &self.config_set).map(Some)
    }

    /// Republishes every spec's schema and waits for all of them.
    pub async fn on_recompile(&self) -> SyncReport {
        self.sync.on_recompile(&self.config_set).await
    }

    /// Republishes every spec's schema in the background.
    pub fn spawn_recompile(&self) -> JoinHandle<SyncReport> {
        self.sync.spawn_recompile(self.config_set.clone())
    }

    /// Generates services (and mocks) for every spec, in any environment.
    pub async fn run_openapi_command(
        &self,
        generator: Arc<dyn ServiceGenerator>,
    ) -> Result<CodegenReport> {
        let project = HostProject::discover(&self.paths.root)?;
        debug!("Generating services for project '{}'", project.name);
        let orchestrator = CodeGenOrchestrator::new(project, generator);
        Ok(orchestrator.run_all(&self.config_set).await)
    }

    /// Location of the viewer page inside the temp build area.
    pub fn viewer_page_path(&self) -> PathBuf {
        self.paths.tmp.join(viewer::VIEWER_FILE)
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }
}
