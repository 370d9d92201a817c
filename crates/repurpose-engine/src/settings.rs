//! Ajustes del motor: tamaño de los pools por llamada, timeout global de los
//! lotes y profundidad por defecto del recorrido de red.
use repurpose_persistence::ConfigError;
use std::time::Duration;

const ENV_MAX_WORKERS: &str = "REPURPOSE_ENGINE_MAX_WORKERS";
const ENV_BATCH_TIMEOUT_MS: &str = "REPURPOSE_ENGINE_BATCH_TIMEOUT_MS";
const ENV_SHUTDOWN_GRACE_MS: &str = "REPURPOSE_ENGINE_SHUTDOWN_GRACE_MS";
const ENV_NETWORK_DEPTH: &str = "REPURPOSE_ENGINE_NETWORK_DEPTH";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
  /// Tope de hilos por lote; el real es `min(paralelismo disponible, tope)`.
  pub max_workers: usize,
  pub batch_timeout: Duration,
  /// Espera a las tareas en curso tras cancelar un lote.
  pub shutdown_grace: Duration,
  pub network_depth: usize,
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self { max_workers: 8,
           batch_timeout: Duration::from_secs(60),
           shutdown_grace: Duration::from_secs(5),
           network_depth: 2 }
  }
}

fn env_value<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
  match std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
    None => Ok(default),
    Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidValue { key: name.to_string(), value: raw }),
  }
}

impl EngineSettings {
  /// Lee los ajustes del entorno (cargando `.env` si existe).
  pub fn from_env() -> Result<Self, ConfigError> {
    dotenvy::dotenv().ok();
    let d = Self::default();
    let settings = Self { max_workers: env_value(ENV_MAX_WORKERS, d.max_workers)?,
                          batch_timeout: Duration::from_millis(env_value(ENV_BATCH_TIMEOUT_MS,
                                                                         d.batch_timeout.as_millis() as u64)?),
                          shutdown_grace: Duration::from_millis(env_value(ENV_SHUTDOWN_GRACE_MS,
                                                                          d.shutdown_grace.as_millis() as u64)?),
                          network_depth: env_value(ENV_NETWORK_DEPTH, d.network_depth)? };
    settings.validate()?;
    Ok(settings)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.max_workers == 0 {
      return Err(ConfigError::Inconsistent(format!("{} debe ser al menos 1", ENV_MAX_WORKERS)));
    }
    if self.batch_timeout.is_zero() {
      return Err(ConfigError::Inconsistent(format!("{} debe ser mayor que 0", ENV_BATCH_TIMEOUT_MS)));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let s = EngineSettings::default();
    assert_eq!(s.max_workers, 8);
    assert_eq!(s.batch_timeout, Duration::from_secs(60));
    assert!(s.validate().is_ok());
    let bad = EngineSettings { max_workers: 0, ..s };
    assert!(matches!(bad.validate(), Err(ConfigError::Inconsistent(_))));
  }
}
