//! Runtime server configuration, deserialised from `config.toml` and
//! `PPTO_*` environment variables.
//!
//! Every field has a default, so an absent config file yields a working
//! local server on `127.0.0.1:8080` backed by `contabilidad.db`.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use ppto_api::ApiConfig;
use ppto_core::operation::{
  Classifier, DEFAULT_BUDGET_TAGS, DEFAULT_EXECUTED_TAGS, DEFAULT_FORECAST_TAGS,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                  String,
  #[serde(default = "default_port")]
  pub port:                  u16,
  #[serde(default = "default_database_path")]
  pub database_path:         PathBuf,
  #[serde(default = "default_session_ttl_hours")]
  pub session_ttl_hours:     u32,
  #[serde(default = "default_true")]
  pub trust_directory_users: bool,
  #[serde(default)]
  pub secure_cookies:        bool,
  #[serde(default)]
  pub classes:               ClassesConfig,
}

/// `[classes]`: the `tipo_operacion` tags that make up each operation class.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassesConfig {
  #[serde(default = "default_budget")]
  pub budget:   Vec<String>,
  #[serde(default = "default_executed")]
  pub executed: Vec<String>,
  #[serde(default = "default_forecast")]
  pub forecast: Vec<String>,
}

impl Default for ClassesConfig {
  fn default() -> Self {
    Self {
      budget:   default_budget(),
      executed: default_executed(),
      forecast: default_forecast(),
    }
  }
}

impl ClassesConfig {
  pub fn classifier(&self) -> Classifier {
    Classifier::new(
      self.budget.iter().cloned(),
      self.executed.iter().cloned(),
      self.forecast.iter().cloned(),
    )
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// Resolve `database_path` (expanding a leading `~`) and create its parent
  /// directory so SQLite can create the file.
  pub fn prepare_database_path(&self) -> std::io::Result<PathBuf> {
    let path = expand_tilde(&self.database_path);
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
      std::fs::create_dir_all(dir)?;
    }
    Ok(path)
  }

  /// The slice of configuration the HTTP layer consumes.
  pub fn api_config(&self) -> ApiConfig {
    ApiConfig {
      session_ttl:           TimeDelta::hours(i64::from(self.session_ttl_hours)),
      trust_directory_users: self.trust_directory_users,
      secure_cookies:        self.secure_cookies,
      classifier:            self.classes.classifier(),
    }
  }
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

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_database_path() -> PathBuf { PathBuf::from("contabilidad.db") }

fn default_session_ttl_hours() -> u32 { 24 }

fn default_true() -> bool { true }

fn tags(defaults: &[&str]) -> Vec<String> {
  defaults.iter().map(|t| t.to_string()).collect()
}

fn default_budget() -> Vec<String> { tags(DEFAULT_BUDGET_TAGS) }

fn default_executed() -> Vec<String> { tags(DEFAULT_EXECUTED_TAGS) }

fn default_forecast() -> Vec<String> { tags(DEFAULT_FORECAST_TAGS) }
