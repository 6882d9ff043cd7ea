//! Construction of the configured CRM backend.

use std::path::{Path, PathBuf};

use aeapi_civicrm::{CivicrmClient, CivicrmConfig};
use aeapi_sandbox::SandboxCrm;
use anyhow::Context as _;

use crate::config::SandboxConfig;

pub fn civicrm(config: Option<CivicrmConfig>) -> anyhow::Result<CivicrmClient> {
  let config = config.context("backend \"civicrm\" requires a [civicrm] section")?;
  let url = config.rest_url.clone();
  let client = CivicrmClient::new(config).context("failed to build HTTP client")?;
  tracing::info!(%url, "using CRM REST backend");
  Ok(client)
}

/// Open the sandbox and seed its groups, countries and matcher flag.
pub async fn sandbox(config: &SandboxConfig) -> anyhow::Result<SandboxCrm> {
  let crm = if config.path == Path::new(":memory:") {
    SandboxCrm::open_in_memory().await
  } else {
    SandboxCrm::open(expand_tilde(&config.path)).await
  }
  .with_context(|| format!("failed to open sandbox at {:?}", config.path))?;

  crm
    .set_fuzzy_matching(config.fuzzy_matching)
    .await
    .context("failed to configure sandbox matcher")?;
  for group in &config.groups {
    crm
      .ensure_group(group)
      .await
      .with_context(|| format!("failed to seed group {group}"))?;
  }
  for country in &config.countries {
    crm
      .add_country(&country.iso_code, country.id)
      .await
      .with_context(|| format!("failed to seed country {}", country.iso_code))?;
  }

  tracing::info!(
    path = %config.path.display(),
    groups = config.groups.len(),
    countries = config.countries.len(),
    "using sandbox backend"
  );
  Ok(crm)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
