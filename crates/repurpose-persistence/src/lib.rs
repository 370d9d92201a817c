//! Persistencia del motor de reposicionamiento.
//! Este crate expone el pool de conexiones SQLite (`pool`), su configuración
//! y el accesor del grafo de entidades (`graph`) con su detección de esquema
//! y su caché. `fixtures` crea bases temporarias para las pruebas.

mod cache;
mod capabilities;
pub mod config;
mod errors;
pub mod fixtures;
mod graph;
mod pool;
pub mod schema;
mod tuning;

pub use cache::{CachedStructure, EntityCache};
pub use capabilities::{SchemaCapabilities, SchemaTable};
pub use config::{PoolConfig, SqliteTarget};
pub use errors::{ConfigError, PoolError, RepositoryError};
pub use graph::{EntityGraph, GraphSession, ResolvedInteraction};
pub use pool::{ConnectionPool, DbConn, LeakReport, LeaseId, PoolStatistics, PooledConnection, ShutdownReport};
pub use tuning::SqliteTuning;
