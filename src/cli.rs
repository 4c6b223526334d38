use crate::codegen::CommandGenerator;
use crate::config::{discover_config, load_config, RawConfig};
use crate::dev_server::{self, DevHost};
use crate::environment::{Environment, ENV_VAR};
use crate::plugin::{HostPaths, OpenApiPlugin};
use crate::schema::DefaultSchemaFetcher;
use crate::viewer;
use crate::watcher;
use anyhow::{Context, Result};
use axum::Router;
use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Serve, preview and generate clients for OpenAPI specs during local development
#[derive(Parser, Debug)]
#[command(name = "openapi-devkit")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Spec configuration file (default: openapi.yaml, openapi.yml or openapi.json in the root)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Project root directory
    #[arg(short = 'r', long = "root", value_name = "DIR", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Environment name (default: development for `dev` and `sync`, production otherwise)
    #[arg(short = 'e', long = "env", env = ENV_VAR, global = true)]
    pub env: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Generate services (and mocks) for every configured spec
    Openapi,
    /// Run the dev server with the spec viewer and live schema sync
    Dev {
        /// Address to listen on
        #[arg(short = 'a', long = "addr", default_value = "127.0.0.1:8000")]
        addr: SocketAddr,

        /// Directories whose changes count as a recompilation (default: <root>/src)
        #[arg(short = 'w', long = "watch", value_name = "DIR")]
        watch: Vec<PathBuf>,
    },
    /// Publish every spec's schema once and exit
    Sync,
    /// Print the viewer page for the current configuration
    Viewer {
        /// Write to a file instead of stdout
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.root.is_dir() {
        anyhow::bail!("Project root is not a directory: {}", args.root.display());
    }
    if let Some(ref config) = args.config {
        if !config.is_file() {
            anyhow::bail!("Config file does not exist: {}", config.display());
        }
    }

    info!("Project root: {}", args.root.display());
    Ok(args)
}

/// The environment to run in: `--env`/`OPENAPI_DEVKIT_ENV`, else the command's default.
pub fn resolve_environment(args: &CliArgs) -> Environment {
    let default = match args.command {
        Command::Dev { .. } | Command::Sync => Environment::Development,
        Command::Openapi | Command::Viewer { .. } => Environment::Production,
    };
    match args.env.as_deref() {
        Some(name) if !name.trim().is_empty() => name.parse().unwrap_or(default),
        _ => default,
    }
}

fn config_path(args: &CliArgs, root: &Path) -> Result<PathBuf> {
    match &args.config {
        Some(path) => Ok(path.clone()),
        None => discover_config(root).with_context(|| {
            format!(
                "No openapi.yaml, openapi.yml or openapi.json in {}; pass --config",
                root.display()
            )
        }),
    }
}

fn load_raw_config(path: &Path) -> Result<RawConfig> {
    info!("Loading spec configuration from {}", path.display());
    Ok(load_config(path)?)
}

/// Run the selected command
pub async fn run(args: CliArgs) -> Result<()> {
    let root = args
        .root
        .canonicalize()
        .with_context(|| format!("Cannot resolve project root {}", args.root.display()))?;
    let environment = resolve_environment(&args);
    info!("Environment: {}", environment);

    let config_path = config_path(&args, &root)?
        .canonicalize()
        .context("Cannot resolve config file path")?;
    let raw = load_raw_config(&config_path)?;
    let fetcher = Arc::new(DefaultSchemaFetcher::new(&root));
    let plugin = OpenApiPlugin::new(environment, HostPaths::for_project(&root), &raw, fetcher)
        .context("Invalid spec configuration")?;
    info!("Loaded {} spec(s): {:?}", plugin.config_set().len(), plugin.config_set().names());

    match args.command {
        Command::Openapi => run_openapi(&plugin).await,
        Command::Sync => run_sync(&plugin).await,
        Command::Viewer { output } => run_viewer(&plugin, output.as_deref()),
        Command::Dev { addr, watch } => run_dev(plugin, &config_path, addr, watch).await,
    }
}

async fn run_openapi(plugin: &OpenApiPlugin) -> Result<()> {
    let generator = Arc::new(CommandGenerator::from_env(plugin.root()));
    let report = plugin.run_openapi_command(generator).await?;

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("Service generation failed for {} of {} spec(s)", failed, report.outcomes.len());
    }
    Ok(())
}

async fn run_sync(plugin: &OpenApiPlugin) -> Result<()> {
    if !plugin.environment().is_development() {
        warn!("Schema sync only runs in the development environment");
        return Ok(());
    }

    let reset = plugin.on_activate(&mut DevHost::new());
    debug!("Artifact directory reset: {:?}", reset);

    let report = plugin.on_recompile().await;

    info!("Summary:");
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(path) => info!("  - {}: {}", outcome.name, path.display()),
            Err(e) => info!("  - {}: FAILED ({})", outcome.name, e),
        }
    }
    Ok(())
}

fn run_viewer(plugin: &OpenApiPlugin, output: Option<&Path>) -> Result<()> {
    let page = viewer::generate(plugin.config_set());
    match output {
        Some(path) => {
            std::fs::write(path, page)
                .with_context(|| format!("Failed to write to file: {}", path.display()))?;
            info!("Wrote viewer page to {}", path.display());
        }
        None => println!("{}", page),
    }
    Ok(())
}

async fn run_dev(
    mut plugin: OpenApiPlugin,
    config_path: &Path,
    addr: SocketAddr,
    watch: Vec<PathBuf>,
) -> Result<()> {
    if !plugin.environment().is_development() {
        warn!(
            "Running the dev server in the {} environment: the viewer and spec files are disabled",
            plugin.environment()
        );
    }

    let mut host = DevHost::new();
    let reset = plugin.on_activate(&mut host);
    debug!("Artifact directory reset: {:?}", reset);
    plugin.on_generate_files()?;

    let router = host.into_router(Router::new());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot listen on {}", addr))?;
    let mut server = tokio::spawn(dev_server::serve(listener, router));

    plugin.spawn_recompile();

    let root = plugin.root().to_path_buf();
    let mut dirs = if watch.is_empty() {
        vec![root.join("src")]
    } else {
        watch.iter().map(|dir| root.join(dir)).collect()
    };
    dirs.retain(|dir| dir.exists());

    let set = watcher::WatchSet {
        dirs,
        files: vec![config_path.to_path_buf()],
        ignored: vec![
            plugin.paths().dependency_cache.clone(),
            plugin.paths().tmp.clone(),
            root.join("target"),
        ],
    };
    let mut events = watcher::watch(set, watcher::DEFAULT_DEBOUNCE)?;

    loop {
        tokio::select! {
            changed = events.next() => {
                let Some(changed) = changed else { break };
                let reload = apply_changes(&mut plugin, config_path, &changed);
                debug!("Configuration after change: {:?}", reload);
                plugin.spawn_recompile();
            }
            result = &mut server => {
                result.context("Dev server task failed")??;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// What a burst of changes did to the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigReload {
    Unchanged,
    Reloaded,
    /// The edited file could not be loaded or failed validation; the previous configuration stays.
    Rejected,
}

/// Handles one burst of changed paths: reloads the configuration when its file is among
/// them, then regenerates the viewer page.
pub fn apply_changes(plugin: &mut OpenApiPlugin, config_path: &Path, changed: &[PathBuf]) -> ConfigReload {
    let reload = if changed.iter().any(|path| path == config_path) {
        match load_config(config_path).and_then(|raw| plugin.update_config(&raw)) {
            Ok(()) => {
                info!("Reloaded {} spec(s): {:?}", plugin.config_set().len(), plugin.config_set().names());
                ConfigReload::Reloaded
            }
            Err(e) => {
                error!("Keeping previous configuration: {}", e);
                ConfigReload::Rejected
            }
        }
    } else {
        ConfigReload::Unchanged
    };

    if let Err(e) = plugin.on_generate_files() {
        error!("Failed to regenerate viewer page: {:#}", e);
    }
    reload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(argv.iter().copied()).unwrap()
    }

    #[test]
    fn test_openapi_command_has_no_flags() {
        let args = parse(&["openapi-devkit", "openapi"]);
        assert_eq!(args.command, Command::Openapi);
        assert!(CliArgs::try_parse_from(["openapi-devkit", "openapi", "--addr", "x"]).is_err());
    }

    #[test]
    fn test_dev_defaults() {
        let args = parse(&["openapi-devkit", "dev"]);
        match args.command {
            Command::Dev { addr, watch } => {
                assert_eq!(addr, "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
                assert!(watch.is_empty());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["openapi-devkit", "sync", "--config", "specs.yaml", "-v"]);
        assert_eq!(args.config, Some(PathBuf::from("specs.yaml")));
        assert!(args.verbose);
    }

    #[test]
    fn test_environment_defaults_per_command() {
        let mut args = parse(&["openapi-devkit", "dev"]);
        args.env = None;
        assert_eq!(resolve_environment(&args), Environment::Development);

        let mut args = parse(&["openapi-devkit", "openapi"]);
        args.env = None;
        assert_eq!(resolve_environment(&args), Environment::Production);

        args.env = Some("development".to_string());
        assert_eq!(resolve_environment(&args), Environment::Development);
    }

    struct Project {
        _temp_dir: tempfile::TempDir,
        config_path: PathBuf,
        plugin: OpenApiPlugin,
    }

    fn project(env: Environment, config: &str) -> Project {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let config_path = root.join("openapi.yaml");
        std::fs::write(&config_path, config).unwrap();
        let plugin = OpenApiPlugin::new(
            env,
            HostPaths::for_project(&root),
            &load_config(&config_path).unwrap(),
            Arc::new(DefaultSchemaFetcher::new(&root)),
        )
        .unwrap();
        Project {
            _temp_dir: temp_dir,
            config_path,
            plugin,
        }
    }

    #[test]
    fn test_config_edit_is_reloaded() {
        let mut p = project(Environment::Development, "projectName: a\nschemaPath: a.json\n");
        std::fs::write(
            &p.config_path,
            "- projectName: a\n  schemaPath: a.json\n- projectName: b\n  schemaPath: b.json\n",
        )
        .unwrap();

        let changed = vec![p.config_path.clone()];
        assert_eq!(apply_changes(&mut p.plugin, &p.config_path, &changed), ConfigReload::Reloaded);
        assert_eq!(p.plugin.config_set().names(), vec!["a", "b"]);

        let page = std::fs::read_to_string(p.plugin.viewer_page_path()).unwrap();
        assert!(page.contains("<option value=\"b\">b</option>"));
    }

    #[test]
    fn test_invalid_config_edit_keeps_previous() {
        let mut p = project(Environment::Development, "projectName: a\nschemaPath: a.json\n");
        let changed = vec![p.config_path.clone()];

        std::fs::write(&p.config_path, "- schemaPath: a.json\n- schemaPath: b.json\n").unwrap();
        assert_eq!(apply_changes(&mut p.plugin, &p.config_path, &changed), ConfigReload::Rejected);

        std::fs::write(&p.config_path, "schemaPath: a.json\nunknownField: 1\n").unwrap();
        assert_eq!(apply_changes(&mut p.plugin, &p.config_path, &changed), ConfigReload::Rejected);

        assert_eq!(p.plugin.config_set().names(), vec!["a"]);
    }

    #[test]
    fn test_source_change_only_regenerates_page() {
        let mut p = project(Environment::Development, "projectName: a\nschemaPath: a.json\n");
        let source = p.plugin.root().join("src/app.ts");

        assert_eq!(apply_changes(&mut p.plugin, &p.config_path, &[source]), ConfigReload::Unchanged);
        assert!(p.plugin.viewer_page_path().is_file());
    }

    #[tokio::test]
    async fn test_sync_outside_development_leaves_artifacts_alone() {
        let p = project(Environment::Production, "projectName: a\nschemaPath: a.json\n");
        let previous = p.plugin.store().publish_bytes("a", b"{}").unwrap();

        run_sync(&p.plugin).await.unwrap();

        assert!(previous.is_file());
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let args = parse(&["openapi-devkit", "--root", "/definitely/not/here", "sync"]);
        assert!(parse_args_from_parsed(args).is_err());
    }
}
