//! Generation of typed services and mocks from every configured spec.
//!
//! The generator itself is external: [`ServiceGenerator`] receives a [`GeneratorConfig`]
//! built from the spec and the host project, and writes code under `serversPath` (and
//! `mockFolder` when mocks are enabled). [`CommandGenerator`] hands that configuration to an
//! external program as JSON on stdin.

use crate::config::{ApiPrefix, ConfigSet, Hooks, SpecConfig};
use crate::error::{Error, Result};
use crate::tasks::{SpecOutcome, TaskSet};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Environment variable holding the generator command line.
pub const GENERATOR_ENV_VAR: &str = "OPENAPI_DEVKIT_GENERATOR";

/// Generator command used when [`GENERATOR_ENV_VAR`] is unset.
pub const DEFAULT_GENERATOR_COMMAND: &str = "openapi-servicegen";

/// The project the specs are integrated into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProject {
    pub root: PathBuf,
    /// Package name without any `@scope/` prefix
    pub name: String,
}

#[derive(Deserialize)]
struct PackageManifest {
    name: Option<String>,
}

impl HostProject {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    /// Reads the project name from `package.json` in `root`, falling back to the
    /// directory name when the manifest is missing or unnamed.
    pub fn discover(root: &Path) -> Result<Self> {
        let manifest_path = root.join("package.json");
        let declared = if manifest_path.is_file() {
            let content = std::fs::read_to_string(&manifest_path)?;
            let manifest: PackageManifest = serde_json::from_str(&content)?;
            manifest.name
        } else {
            debug!("No package.json in {}", root.display());
            None
        };

        let name = declared
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| {
                root.file_name()
                    .map(|dir| dir.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "app".to_string());

        Ok(Self::new(root, name))
    }

    pub fn services_dir(&self) -> PathBuf {
        self.root.join("src").join("services")
    }

    pub fn mock_dir(&self) -> PathBuf {
        self.root.join("mock")
    }
}

/// Everything the external generator needs for one spec.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    pub project_name: String,
    pub schema_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_lib_path: Option<String>,
    pub mock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_prefix: Option<ApiPrefix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_style: Option<String>,
    pub servers_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_folder: Option<PathBuf>,
    #[serde(skip)]
    pub hooks: Hooks,
}

impl GeneratorConfig {
    /// Layers `spec` over the project defaults.
    pub fn merge(project: &HostProject, spec: &SpecConfig) -> Self {
        Self {
            project_name: spec
                .display_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| project.name.clone()),
            schema_path: spec.schema_location.clone(),
            request_lib_path: spec.request_lib_path.clone(),
            mock: spec.mock_enabled,
            namespace: spec.namespace.clone(),
            api_prefix: spec.api_prefix.clone(),
            enum_style: spec.enum_style.clone(),
            servers_path: project.services_dir(),
            mock_folder: spec.mock_enabled.then(|| project.mock_dir()),
            hooks: spec.hooks.clone(),
        }
    }
}

/// Writes service (and mock) code for one spec.
#[async_trait]
pub trait ServiceGenerator: Send + Sync {
    async fn generate(&self, config: &GeneratorConfig) -> Result<()>;
}

/// Runs an external program per spec, writing the [`GeneratorConfig`] as JSON to its stdin.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.into(),
        }
    }

    /// Splits a whitespace-separated command line. Returns `None` for a blank line.
    pub fn from_command_line(line: &str, working_dir: impl Into<PathBuf>) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), working_dir))
    }

    /// Uses [`GENERATOR_ENV_VAR`], or [`DEFAULT_GENERATOR_COMMAND`] when it is unset or blank.
    pub fn from_env(working_dir: &Path) -> Self {
        std::env::var(GENERATOR_ENV_VAR)
            .ok()
            .and_then(|line| Self::from_command_line(&line, working_dir))
            .unwrap_or_else(|| Self::new(DEFAULT_GENERATOR_COMMAND, Vec::new(), working_dir))
    }
}

#[async_trait]
impl ServiceGenerator for CommandGenerator {
    async fn generate(&self, config: &GeneratorConfig) -> Result<()> {
        let spec = config.project_name.as_str();
        if !config.hooks.is_empty() {
            warn!("[openAPI]: naming hooks for '{}' are ignored by external generators", spec);
        }
        let payload = serde_json::to_vec(config).map_err(|e| Error::generation(spec, e))?;

        debug!("Running generator '{}' for '{}'", self.program, spec);
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::generation(spec, format!("cannot start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A generator may exit without reading its config; the exit status decides then.
            match stdin.write_all(&payload).await {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!("Generator '{}' closed stdin early for '{}'", self.program, spec);
                }
                other => other.map_err(|e| Error::generation(spec, e))?,
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::generation(spec, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            debug!("[{}] {}", self.program, line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::generation(
                spec,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }
        Ok(())
    }
}

/// Per-spec results of one `openapi` command run.
#[derive(Debug, Default)]
pub struct CodegenReport {
    pub outcomes: Vec<SpecOutcome<()>>,
}

impl CodegenReport {
    pub fn failures(&self) -> impl Iterator<Item = &SpecOutcome<()>> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(SpecOutcome::is_success)
    }
}

#[derive(Clone)]
pub struct CodeGenOrchestrator {
    project: HostProject,
    generator: Arc<dyn ServiceGenerator>,
}

impl CodeGenOrchestrator {
    pub fn new(project: HostProject, generator: Arc<dyn ServiceGenerator>) -> Self {
        Self { project, generator }
    }

    /// Generates code for every spec. Specs run concurrently and a failing spec does not
    /// stop the others; failures are collected in the report.
    pub async fn run_all(&self, config_set: &ConfigSet) -> CodegenReport {
        let mut tasks = TaskSet::new();
        for spec in config_set {
            let config = GeneratorConfig::merge(&self.project, spec);
            let generator = self.generator.clone();
            tasks.spawn(spec.display_name(), async move {
                ensure_output_dirs(&config).await?;
                generator.generate(&config).await
            });
        }

        let report = CodegenReport {
            outcomes: tasks.join_all().await,
        };
        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(()) => info!("[openAPI]: execution complete ({})", outcome.name),
                Err(e) => error!("[openAPI]: {}", e),
            }
        }
        report
    }
}

async fn ensure_output_dirs(config: &GeneratorConfig) -> Result<()> {
    if let Some(mock_folder) = &config.mock_folder {
        tokio::fs::create_dir_all(mock_folder).await?;
    }
    tokio::fs::create_dir_all(&config.servers_path).await?;
    Ok(())
}
