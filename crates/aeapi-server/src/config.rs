//! Server configuration, deserialised from the layered `config` sources.

use std::path::PathBuf;

use aeapi_civicrm::CivicrmConfig;
use aeapi_core::MatchingStrategy;
use serde::Deserialize;

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:     String,
  #[serde(default = "default_port")]
  pub port:     u16,
  #[serde(default)]
  pub matching: MatchingMode,
  #[serde(default)]
  pub backend:  Backend,
  /// Required when `backend = "civicrm"`.
  #[serde(default)]
  pub civicrm:  Option<CivicrmConfig>,
  #[serde(default)]
  pub sandbox:  SandboxConfig,
}

/// How the matching strategy is chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
  /// Probe the CRM for the fuzzy matcher extension.
  #[default]
  Auto,
  Fuzzy,
  Exact,
}

impl MatchingMode {
  /// The strategy this mode pins, or `None` when it has to be detected.
  pub fn fixed(self) -> Option<MatchingStrategy> {
    match self {
      MatchingMode::Auto => None,
      MatchingMode::Fuzzy => Some(MatchingStrategy::Fuzzy),
      MatchingMode::Exact => Some(MatchingStrategy::ExactOrCreate),
    }
  }
}

/// Which [`aeapi_core::CrmApi`] implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
  #[default]
  Civicrm,
  Sandbox,
}

fn default_sandbox_path() -> PathBuf { PathBuf::from("sandbox.db") }

/// Settings for the SQLite sandbox backend. Groups and countries are seeded
/// on every start; existing rows are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
  /// Database file; `:memory:` keeps everything in process.
  #[serde(default = "default_sandbox_path")]
  pub path:           PathBuf,
  /// Emulate the fuzzy matcher extension.
  #[serde(default)]
  pub fuzzy_matching: bool,
  #[serde(default)]
  pub groups:         Vec<String>,
  #[serde(default)]
  pub countries:      Vec<CountrySeed>,
}

impl Default for SandboxConfig {
  fn default() -> Self {
    Self {
      path:           default_sandbox_path(),
      fuzzy_matching: false,
      groups:         Vec::new(),
      countries:      Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountrySeed {
  pub iso_code: String,
  pub id:       i64,
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}
