//! OpenAPI devkit - keep API specs served, browsable and generated during local development.
//!
//! This library integrates one or more OpenAPI specs into a development workflow. It keeps
//! a machine-readable copy of each spec available over HTTP, renders a documentation viewer
//! with a spec selector inside the running application, and generates typed services and
//! mocks from the specs on demand.
//!
//! # Architecture
//!
//! 1. [`config`] - Normalizes one-or-many spec configurations into an ordered [`config::ConfigSet`]
//! 2. [`artifact`] - Owns the directory of published schema files
//! 3. [`dev_server`] - Serves that directory and the viewer route from the dev server
//! 4. [`viewer`] - Generates the viewer page
//! 5. [`sync`] - Republishes every spec's schema after each recompilation
//! 6. [`codegen`] - Runs the service generator for every spec
//! 7. [`plugin`] - Ties the components to the host's lifecycle hooks
//!
//! Development-only behavior is gated on an explicit [`environment::Environment`] value.
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_devkit::{
//!     config::{RawConfig, SpecConfig},
//!     dev_server::DevHost,
//!     environment::Environment,
//!     plugin::{HostPaths, OpenApiPlugin},
//!     schema::DefaultSchemaFetcher,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let raw = RawConfig::from(vec![
//!     SpecConfig::new("https://petstore3.swagger.io/api/v3/openapi.json").with_display_name("pets"),
//!     SpecConfig::new("./specs/users.yaml").with_display_name("users"),
//! ]);
//! let plugin = OpenApiPlugin::new(
//!     Environment::Development,
//!     HostPaths::for_project("."),
//!     &raw,
//!     Arc::new(DefaultSchemaFetcher::new(".")),
//! )?;
//!
//! let mut host = DevHost::new();
//! plugin.on_activate(&mut host);
//! plugin.on_generate_files()?;
//! let report = plugin.on_recompile().await;
//! println!("{} spec(s) published", report.published().count());
//!
//! let router = host.into_router(axum::Router::new());
//! # let _ = router;
//! # Ok(())
//! # }
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod artifact;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod dev_server;
pub mod environment;
pub mod error;
pub mod plugin;
pub mod schema;
pub mod sync;
pub mod tasks;
pub mod viewer;
pub mod watcher;
