//! OpenAPI devkit - command-line tool for working with OpenAPI specs during development.
//!
//! # Usage
//!
//! ```bash
//! openapi-devkit [OPTIONS] <COMMAND>
//! ```
//!
//! # Examples
//!
//! Run the dev server with the spec viewer at `/umi/plugin/openapi`:
//! ```bash
//! openapi-devkit dev --addr 127.0.0.1:8000
//! ```
//!
//! Generate services for every spec in `openapi.yaml`:
//! ```bash
//! OPENAPI_DEVKIT_GENERATOR="npx my-servicegen" openapi-devkit openapi
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_devkit::cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI devkit starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args).await
}
