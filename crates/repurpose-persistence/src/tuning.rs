use diesel::connection::SimpleConnection;
use diesel::SqliteConnection;
use r2d2::CustomizeConnection;
use std::time::Duration;

/// Ajustes de SQLite aplicados a cada conexión nueva: durabilidad relajada
/// y caché amplia. Un pragma que falla se registra y se omite.
#[derive(Debug, Clone)]
pub struct SqliteTuning {
  busy_timeout: Duration,
}

impl SqliteTuning {
  pub fn new(busy_timeout: Duration) -> Self {
    Self { busy_timeout }
  }

  fn pragmas(&self) -> Vec<String> {
    vec!["PRAGMA journal_mode = WAL;".to_string(),
         "PRAGMA synchronous = NORMAL;".to_string(),
         "PRAGMA cache_size = 10000;".to_string(),
         "PRAGMA mmap_size = 30000000;".to_string(),
         "PRAGMA temp_store = MEMORY;".to_string(),
         "PRAGMA foreign_keys = ON;".to_string(),
         format!("PRAGMA busy_timeout = {};", self.busy_timeout.as_millis())]
  }

  /// Aplica los pragmas y devuelve cuántos se aplicaron.
  pub fn apply(&self, conn: &mut SqliteConnection) -> usize {
    let mut applied = 0;
    for pragma in self.pragmas() {
      match conn.batch_execute(&pragma) {
        Ok(()) => applied += 1,
        Err(e) => log::warn!("No se pudo aplicar '{}': {}", pragma.trim_end_matches(';'), e),
      }
    }
    applied
  }
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqliteTuning {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
    self.apply(conn);
    Ok(())
  }
}
