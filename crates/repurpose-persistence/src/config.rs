//! Configuración del pool como pares clave/valor.
//!
//! Las claves se pueden pasar en un mapa (`from_properties`) o leerse del
//! entorno (`from_env`, que además carga `.env` con dotenvy).
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const KEY_URL: &str = "db.url";
pub const KEY_USER: &str = "db.user";
pub const KEY_PASSWORD: &str = "db.password";
pub const KEY_MIN_SIZE: &str = "pool.min_size";
pub const KEY_MAX_SIZE: &str = "pool.max_size";
pub const KEY_MAX_WAIT_MS: &str = "pool.max_wait_ms";
pub const KEY_MAX_IDLE_MS: &str = "pool.max_idle_ms";
pub const KEY_VALIDATION_TIMEOUT_MS: &str = "pool.validation_timeout_ms";
pub const KEY_RETRY_ATTEMPTS: &str = "pool.retry_attempts";
pub const KEY_RETRY_BACKOFF_MS: &str = "pool.retry_backoff_ms";
pub const KEY_MAINTENANCE_INTERVAL_MS: &str = "pool.maintenance_interval_ms";
pub const KEY_STATS_INTERVAL_MS: &str = "pool.stats_interval_ms";
pub const KEY_LEAK_CHECK_INTERVAL_MS: &str = "pool.leak_check_interval_ms";
pub const KEY_LEAK_CHECK_THRESHOLD: &str = "pool.leak_check_threshold";

/// Destino SQLite resuelto a partir de la URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqliteTarget {
  File(PathBuf),
  Memory,
  Uri(String),
}

impl SqliteTarget {
  /// Despacho básico por esquema de URL. Los esquemas de otros motores se
  /// reconocen pero se rechazan porque su driver no está compilado.
  pub fn parse(url: &str) -> Result<Self, ConfigError> {
    let url = url.trim();
    if url.is_empty() {
      return Err(ConfigError::MissingUrl);
    }
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:")).unwrap_or(url);
    if rest == ":memory:" {
      return Ok(SqliteTarget::Memory);
    }
    if rest.starts_with("file:") {
      return Ok(SqliteTarget::Uri(rest.to_string()));
    }
    if let Some((scheme, _)) = rest.split_once("://") {
      return Err(ConfigError::UnsupportedBackend(scheme.to_ascii_lowercase()));
    }
    Ok(SqliteTarget::File(PathBuf::from(rest)))
  }

  /// Cadena que recibe `SqliteConnection::establish`.
  pub fn connection_string(&self) -> String {
    match self {
      SqliteTarget::File(path) => path.to_string_lossy().into_owned(),
      SqliteTarget::Memory => ":memory:".to_string(),
      SqliteTarget::Uri(uri) => uri.clone(),
    }
  }

  /// Un fichero debe existir y ser legible; el motor no crea bases nuevas.
  pub fn check(&self) -> Result<(), ConfigError> {
    let SqliteTarget::File(path) = self else {
      return Ok(());
    };
    let shown = path.display().to_string();
    if !path.exists() {
      return Err(ConfigError::DatabaseFileMissing(shown));
    }
    if !path.is_file() {
      return Err(ConfigError::DatabaseFileUnreadable(shown));
    }
    std::fs::File::open(path).map_err(|e| ConfigError::DatabaseFileUnreadable(format!("{}: {}", shown, e)))?;
    if std::fs::metadata(path).map(|m| m.permissions().readonly()).unwrap_or(false) {
      log::warn!("La base de datos {} es de sólo lectura", shown);
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
  pub url: String,
  pub user: Option<String>,
  pub password: Option<String>,
  pub min_size: usize,
  pub max_size: usize,
  pub max_wait: Duration,
  pub max_idle: Duration,
  pub validation_timeout: Duration,
  pub retry_attempts: u32,
  pub retry_backoff: Duration,
  pub maintenance_interval: Duration,
  pub stats_interval: Duration,
  pub leak_check_interval: Duration,
  /// Fracción de `max_size` a partir de la cual se revisan fugas al adquirir.
  pub leak_check_threshold: f64,
}

impl Default for PoolConfig {
  fn default() -> Self {
    Self { url: String::new(),
           user: None,
           password: None,
           min_size: 5,
           max_size: 20,
           max_wait: Duration::from_millis(5_000),
           max_idle: Duration::from_millis(60_000),
           validation_timeout: Duration::from_millis(3_000),
           retry_attempts: 3,
           retry_backoff: Duration::from_millis(500),
           maintenance_interval: Duration::from_secs(30),
           stats_interval: Duration::from_secs(300),
           leak_check_interval: Duration::from_secs(300),
           leak_check_threshold: 0.8 }
  }
}

fn parse_value<T: FromStr>(props: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError> {
  match props.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
    None => Ok(default),
    Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: raw.to_string() }),
  }
}

fn parse_millis(props: &HashMap<String, String>, key: &str, default: Duration) -> Result<Duration, ConfigError> {
  parse_value::<u64>(props, key, default.as_millis() as u64).map(Duration::from_millis)
}

impl PoolConfig {
  pub fn for_url(url: impl Into<String>) -> Self {
    Self { url: url.into(), ..Self::default() }
  }

  pub fn from_properties(props: &HashMap<String, String>) -> Result<Self, ConfigError> {
    let d = Self::default();
    let url = props.get(KEY_URL).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).ok_or(ConfigError::MissingUrl)?;
    let non_empty = |key: &str| props.get(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let cfg = Self { url,
                     user: non_empty(KEY_USER),
                     password: non_empty(KEY_PASSWORD),
                     min_size: parse_value(props, KEY_MIN_SIZE, d.min_size)?,
                     max_size: parse_value(props, KEY_MAX_SIZE, d.max_size)?,
                     max_wait: parse_millis(props, KEY_MAX_WAIT_MS, d.max_wait)?,
                     max_idle: parse_millis(props, KEY_MAX_IDLE_MS, d.max_idle)?,
                     validation_timeout: parse_millis(props, KEY_VALIDATION_TIMEOUT_MS, d.validation_timeout)?,
                     retry_attempts: parse_value(props, KEY_RETRY_ATTEMPTS, d.retry_attempts)?,
                     retry_backoff: parse_millis(props, KEY_RETRY_BACKOFF_MS, d.retry_backoff)?,
                     maintenance_interval: parse_millis(props, KEY_MAINTENANCE_INTERVAL_MS, d.maintenance_interval)?,
                     stats_interval: parse_millis(props, KEY_STATS_INTERVAL_MS, d.stats_interval)?,
                     leak_check_interval: parse_millis(props, KEY_LEAK_CHECK_INTERVAL_MS, d.leak_check_interval)?,
                     leak_check_threshold: parse_value(props, KEY_LEAK_CHECK_THRESHOLD, d.leak_check_threshold)? };
    cfg.validate()?;
    Ok(cfg)
  }

  /// Lee la configuración del entorno (cargando `.env` si existe).
  /// `REPURPOSE_DB_URL` tiene prioridad sobre `DATABASE_URL`.
  pub fn from_env() -> Result<Self, ConfigError> {
    dotenvy::dotenv().ok();
    let mut props = HashMap::new();
    if let Some(url) = std::env::var("REPURPOSE_DB_URL").ok().or_else(|| std::env::var("DATABASE_URL").ok()) {
      props.insert(KEY_URL.to_string(), url);
    }
    for key in [KEY_USER,
                KEY_PASSWORD,
                KEY_MIN_SIZE,
                KEY_MAX_SIZE,
                KEY_MAX_WAIT_MS,
                KEY_MAX_IDLE_MS,
                KEY_VALIDATION_TIMEOUT_MS,
                KEY_RETRY_ATTEMPTS,
                KEY_RETRY_BACKOFF_MS,
                KEY_MAINTENANCE_INTERVAL_MS,
                KEY_STATS_INTERVAL_MS,
                KEY_LEAK_CHECK_INTERVAL_MS,
                KEY_LEAK_CHECK_THRESHOLD]
    {
      if let Ok(value) = std::env::var(env_name(key)) {
        props.insert(key.to_string(), value);
      }
    }
    Self::from_properties(&props)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.max_size == 0 {
      return Err(ConfigError::Inconsistent("pool.max_size debe ser al menos 1".into()));
    }
    if self.min_size > self.max_size {
      return Err(ConfigError::Inconsistent(format!("pool.min_size ({}) mayor que pool.max_size ({})",
                                                   self.min_size, self.max_size)));
    }
    if self.retry_attempts == 0 {
      return Err(ConfigError::Inconsistent("pool.retry_attempts debe ser al menos 1".into()));
    }
    if !(self.leak_check_threshold > 0.0 && self.leak_check_threshold <= 1.0) {
      return Err(ConfigError::InvalidValue { key: KEY_LEAK_CHECK_THRESHOLD.into(),
                                             value: self.leak_check_threshold.to_string() });
    }
    self.target()?.check()
  }

  pub fn target(&self) -> Result<SqliteTarget, ConfigError> {
    SqliteTarget::parse(&self.url)
  }

  /// Número de conexiones a partir del cual se dispara la revisión de fugas.
  pub fn leak_check_watermark(&self) -> usize {
    ((self.max_size as f64) * self.leak_check_threshold).ceil() as usize
  }
}

/// `pool.max_wait_ms` -> `REPURPOSE_POOL_MAX_WAIT_MS`.
fn env_name(key: &str) -> String {
  format!("REPURPOSE_{}", key.replace('.', "_").to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn url_dispatch() {
    assert_eq!(SqliteTarget::parse("sqlite::memory:").unwrap(), SqliteTarget::Memory);
    assert_eq!(SqliteTarget::parse(":memory:").unwrap(), SqliteTarget::Memory);
    assert_eq!(SqliteTarget::parse("sqlite:///tmp/x.db").unwrap(), SqliteTarget::File(PathBuf::from("/tmp/x.db")));
    assert!(matches!(SqliteTarget::parse("file:memdb1?mode=memory&cache=shared").unwrap(), SqliteTarget::Uri(_)));
    assert_eq!(SqliteTarget::parse("postgres://u@h/db"), Err(ConfigError::UnsupportedBackend("postgres".into())));
    assert_eq!(SqliteTarget::parse("  "), Err(ConfigError::MissingUrl));
  }

  #[test]
  fn properties_override_defaults() {
    let cfg = PoolConfig::from_properties(&props(&[(KEY_URL, ":memory:"),
                                                   (KEY_MIN_SIZE, "1"),
                                                   (KEY_MAX_SIZE, "4"),
                                                   (KEY_MAX_WAIT_MS, "250"),
                                                   (KEY_LEAK_CHECK_THRESHOLD, "0.5")])).unwrap();
    assert_eq!(cfg.min_size, 1);
    assert_eq!(cfg.max_size, 4);
    assert_eq!(cfg.max_wait, Duration::from_millis(250));
    assert_eq!(cfg.retry_attempts, 3);
    assert_eq!(cfg.leak_check_watermark(), 2);
  }

  #[test]
  fn invalid_configuration_is_rejected() {
    assert_eq!(PoolConfig::from_properties(&props(&[])), Err(ConfigError::MissingUrl));
    assert!(matches!(PoolConfig::from_properties(&props(&[(KEY_URL, ":memory:"), (KEY_MAX_SIZE, "abc")])),
                     Err(ConfigError::InvalidValue { .. })));
    assert!(matches!(PoolConfig::from_properties(&props(&[(KEY_URL, ":memory:"), (KEY_MIN_SIZE, "9"), (KEY_MAX_SIZE, "2")])),
                     Err(ConfigError::Inconsistent(_))));
    let missing = std::env::temp_dir().join("repurpose_no_existe_1f2e.db");
    assert!(matches!(PoolConfig::from_properties(&props(&[(KEY_URL, missing.to_str().unwrap())])),
                     Err(ConfigError::DatabaseFileMissing(_))));
  }

  #[test]
  fn env_names_follow_key_layout() {
    assert_eq!(env_name(KEY_MAX_WAIT_MS), "REPURPOSE_POOL_MAX_WAIT_MS");
    assert_eq!(env_name(KEY_USER), "REPURPOSE_DB_USER");
  }
}
