// errors.rs
use repurpose_domain::DomainError;
use thiserror::Error;

/// Errores de configuración: fatales al arrancar, nunca se reintentan.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
  #[error("Falta la URL de conexión (db.url / REPURPOSE_DB_URL / DATABASE_URL)")]
  MissingUrl,
  #[error("Backend '{0}' no compilado en este binario (sólo sqlite)")]
  UnsupportedBackend(String),
  #[error("El fichero de base de datos no existe: {0}")]
  DatabaseFileMissing(String),
  #[error("El fichero de base de datos no es legible: {0}")]
  DatabaseFileUnreadable(String),
  #[error("Valor inválido para '{key}': {value}")]
  InvalidValue { key: String, value: String },
  #[error("Configuración inconsistente: {0}")]
  Inconsistent(String),
}

#[derive(Debug, Error)]
pub enum PoolError {
  #[error("Tiempo de espera agotado tras {attempts} intentos ({waited_ms} ms)")]
  Timeout { attempts: u32, waited_ms: u64 },
  #[error("No se pudo obtener una conexión tras {attempts} intentos: {reason}")]
  Exhausted { attempts: u32, reason: String },
  #[error("El pool de conexiones está cerrado")]
  Closed,
  #[error("Error de conexión: {0}")]
  Connection(String),
  #[error("No se pudo crear ninguna conexión inicial: {0}")]
  InitialPopulation(String),
  #[error(transparent)]
  Configuration(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum RepositoryError {
  #[error("pool: {0}")]
  Pool(#[from] PoolError),
  #[error("db: {0}")]
  Query(#[from] diesel::result::Error),
  #[error(transparent)]
  Domain(#[from] DomainError),
}

impl From<diesel::r2d2::Error> for PoolError {
  fn from(e: diesel::r2d2::Error) -> Self {
    PoolError::Connection(e.to_string())
  }
}
