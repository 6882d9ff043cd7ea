//! aeapi server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `AEAPI_*` environment variables, builds the configured CRM backend, picks
//! the contact matching strategy and serves the submission API over HTTP.
//!
//! Nested keys use `__` in the environment, e.g. `AEAPI_CIVICRM__API_KEY`.
//!
//! ```
//! cargo run -p aeapi-server -- --config config.toml
//! cargo run -p aeapi-server -- --check
//! ```

mod backend;
mod config;

use std::{path::PathBuf, sync::Arc};

use aeapi_core::{CrmApi, MatchingStrategy, SubmissionService};
use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::{Backend, ServerConfig};

#[derive(Parser)]
#[command(author, version, about = "Contact submission gateway for CiviCRM")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Build the backend, print the matching strategy and exit.
  #[arg(long)]
  check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = ::config::Config::builder()
    .add_source(::config::File::from(cli.config).required(false))
    .add_source(
      ::config::Environment::with_prefix("AEAPI")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  match server_cfg.backend {
    Backend::Civicrm => {
      let crm = backend::civicrm(server_cfg.civicrm.clone())?;
      run(crm, &server_cfg, cli.check).await
    }
    Backend::Sandbox => {
      let crm = backend::sandbox(&server_cfg.sandbox).await?;
      run(crm, &server_cfg, cli.check).await
    }
  }
}

async fn run<C>(crm: C, cfg: &ServerConfig, check: bool) -> anyhow::Result<()>
where
  C: CrmApi + 'static,
{
  let strategy = match cfg.matching.fixed() {
    Some(strategy) => strategy,
    None => MatchingStrategy::detect(&crm)
      .await
      .context("failed to probe the CRM for the contact matcher")?,
  };
  tracing::info!(?strategy, mode = ?cfg.matching, "contact matching strategy selected");

  if check {
    println!("{strategy:?}");
    return Ok(());
  }

  let app = aeapi_api::api_router(SubmissionService::new(Arc::new(crm), strategy));
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
