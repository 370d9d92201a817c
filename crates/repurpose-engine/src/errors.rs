// Archivo: errors.rs
// Propósito: errores del motor de descubrimiento y scoring.
use repurpose_domain::{DomainError, EntityKind};
use repurpose_persistence::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Repository(#[from] RepositoryError),
  #[error(transparent)]
  Domain(#[from] DomainError),
  /// La entidad pedida no existe en la base.
  #[error("No encontrado: {kind} '{id}'")]
  NotFound { kind: EntityKind, id: String },
  /// El lote no terminó dentro del tiempo global.
  #[error("Tiempo agotado en '{label}': {completed}/{total} tareas en {waited_ms} ms")]
  Timeout {
    label: String,
    completed: usize,
    total: usize,
    waited_ms: u64,
  },
  #[error("No se pudo crear el pool de trabajadores: {0}")]
  WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
