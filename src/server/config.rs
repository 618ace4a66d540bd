use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cache::CacheConfig;

/// Expand environment variables in a string.
/// Supports $VAR_NAME and ${VAR_NAME} syntax.
fn expand_env_vars(input: &str) -> String {
  let mut result = input.to_string();

  while let Some(start) = result.find("${") {
    let Some(end) = result[start..].find('}') else {
      break;
    };
    let value = std::env::var(&result[start + 2..start + end]).unwrap_or_default();
    result.replace_range(start..start + end + 1, &value);
  }

  // $VAR_NAME ends at the first character outside [A-Za-z0-9_]
  let mut i = 0;
  while let Some(offset) = result[i..].find('$') {
    let start = i + offset;
    let name_len = result[start + 1..]
      .chars()
      .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
      .count();
    if name_len == 0 {
      i = start + 1;
      continue;
    }
    let value = std::env::var(&result[start + 1..start + 1 + name_len]).unwrap_or_default();
    result.replace_range(start..start + 1 + name_len, &value);
    i = start + value.len();
  }

  result
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
  #[default]
  Postgres,
  Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
  #[serde(default)]
  pub server: ServerSection,
  #[serde(default)]
  pub backend: BackendType,
  #[serde(default)]
  pub postgres: PostgresSection,
  #[serde(default)]
  pub sqlite: SqliteSection,
  #[serde(default)]
  pub logging: LoggingSection,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
  /// Allowed CORS origins; ["*"] or an empty list is permissive
  #[serde(default = "default_cors_origins")]
  pub cors_origins: Vec<String>,
}

fn default_host() -> String {
  "0.0.0.0".into()
}
fn default_port() -> u16 {
  8080
}
fn default_cors_origins() -> Vec<String> {
  vec!["*".to_string()]
}

impl Default for ServerSection {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      cors_origins: default_cors_origins(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresSection {
  #[serde(default = "default_pg_url")]
  pub url: String,
  #[serde(default = "default_max_conn")]
  pub max_connections: usize,
}
fn default_pg_url() -> String {
  "postgres://localhost/roster".into()
}
fn default_max_conn() -> usize {
  20
}
impl Default for PostgresSection {
  fn default() -> Self {
    Self {
      url: default_pg_url(),
      max_connections: default_max_conn(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteSection {
  #[serde(default = "default_sqlite_path")]
  pub path: String,
}
fn default_sqlite_path() -> String {
  "roster.db".into()
}
impl Default for SqliteSection {
  fn default() -> Self {
    Self {
      path: default_sqlite_path(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
  #[serde(default = "default_level")]
  pub level: String,
}
fn default_level() -> String {
  "info".into()
}
impl Default for LoggingSection {
  fn default() -> Self {
    Self {
      level: default_level(),
    }
  }
}

impl ServerConfig {
  pub fn from_yaml(content: &str) -> Result<Self, anyhow::Error> {
    Ok(serde_yaml::from_str(&expand_env_vars(content))?)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
    let content = std::fs::read_to_string(&path)?;
    Self::from_yaml(&content)
  }

  pub fn find_and_load() -> Result<Option<Self>, anyhow::Error> {
    for p in ["roster.yaml", "roster.yml"] {
      if Path::new(p).exists() {
        tracing::info!("Loading config from {}", p);
        return Ok(Some(Self::from_file(p)?));
      }
    }
    Ok(None)
  }

  pub fn address(&self) -> String {
    format!("{}:{}", self.server.host, self.server.port)
  }
}
