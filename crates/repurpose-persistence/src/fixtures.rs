//! Base SQLite temporaria para pruebas y demostraciones.
//!
//! El fichero se crea en `std::env::temp_dir()` con un nombre único y se
//! borra (junto con `-wal` y `-shm`) al soltar el fixture. Las tablas
//! omitidas con `without` no se crean, y las inserciones dirigidas a ellas se
//! ignoran, de modo que un mismo sembrado sirve para probar los caminos de
//! inferencia.
use crate::capabilities::SchemaTable;
use crate::config::PoolConfig;
use crate::errors::{PoolError, RepositoryError};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text};
use repurpose_domain::{EntityKind, NodeRef};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

fn ddl(table: SchemaTable) -> &'static str {
  match table {
    SchemaTable::GeneAliases => "CREATE TABLE GeneAliases (alias TEXT NOT NULL, gene_id TEXT NOT NULL);",
    SchemaTable::DrugAliases => "CREATE TABLE DrugAliases (alias TEXT NOT NULL, drug_id TEXT NOT NULL);",
    SchemaTable::DiseaseAliases => "CREATE TABLE DiseaseAliases (alias TEXT NOT NULL, disease_id TEXT NOT NULL);",
    SchemaTable::CompoundAliases => "CREATE TABLE CompoundAliases (alias TEXT NOT NULL, compound_id TEXT NOT NULL);",
    SchemaTable::Genes => "CREATE TABLE Genes (id TEXT PRIMARY KEY);",
    SchemaTable::Drugs => "CREATE TABLE Drugs (id TEXT PRIMARY KEY);",
    SchemaTable::Diseases => "CREATE TABLE Diseases (id TEXT PRIMARY KEY);",
    SchemaTable::Compounds => "CREATE TABLE Compounds (id TEXT PRIMARY KEY);",
    SchemaTable::GeneDiseases => "CREATE TABLE GeneDiseases (gene_id TEXT NOT NULL, disease_id TEXT NOT NULL);",
    SchemaTable::DiseaseDrugs => "CREATE TABLE DiseaseDrugs (disease_id TEXT NOT NULL, drug_id TEXT NOT NULL);",
    SchemaTable::GenePathways => "CREATE TABLE GenePathways (gene_id TEXT NOT NULL, pathway_id TEXT NOT NULL);",
    SchemaTable::DrugPathways => "CREATE TABLE DrugPathways (drug_id TEXT NOT NULL, pathway_id TEXT NOT NULL);",
    SchemaTable::DrugGenes => "CREATE TABLE DrugGenes (drug_id TEXT NOT NULL, gene_id TEXT NOT NULL);",
    SchemaTable::DrugCompounds => "CREATE TABLE DrugCompounds (drug_id TEXT NOT NULL, compound_id TEXT NOT NULL);",
    SchemaTable::DrugStructures => "CREATE TABLE DrugStructures (drug_id TEXT PRIMARY KEY, smiles TEXT);",
    SchemaTable::CompoundStructures => "CREATE TABLE CompoundStructures (compound_id TEXT PRIMARY KEY, smiles TEXT);",
    SchemaTable::Interaction => {
      "CREATE TABLE Interaction (id INTEGER PRIMARY KEY, source_name TEXT NOT NULL, target_name TEXT NOT NULL, \
       relation_type TEXT, source_type TEXT NOT NULL, target_type TEXT NOT NULL);"
    }
    SchemaTable::Subtype => {
      "CREATE TABLE Subtype (id INTEGER PRIMARY KEY, interaction_id INTEGER NOT NULL, name TEXT, value TEXT);"
    }
  }
}

#[derive(QueryableByName)]
struct RowId {
  #[diesel(sql_type = BigInt)]
  id: i64,
}

pub struct SqliteFixture {
  path: PathBuf,
  skipped: HashSet<SchemaTable>,
  conn: Mutex<SqliteConnection>,
}

impl SqliteFixture {
  /// Base con todas las tablas conocidas.
  pub fn new() -> Result<Self, RepositoryError> {
    Self::without(&[])
  }

  /// Base sin las tablas indicadas.
  pub fn without(skip: &[SchemaTable]) -> Result<Self, RepositoryError> {
    let path = std::env::temp_dir().join(format!("repurpose_test_{}.db", Uuid::new_v4()));
    let url = path.to_string_lossy().into_owned();
    let mut conn = SqliteConnection::establish(&url).map_err(|e| PoolError::Connection(format!("fixture: {}", e)))?;
    let skipped: HashSet<SchemaTable> = skip.iter().copied().collect();
    let script: String = SchemaTable::ALL.into_iter().filter(|t| !skipped.contains(t)).map(ddl).collect::<Vec<_>>().join("\n");
    conn.batch_execute(&script)?;
    Ok(Self { path, skipped, conn: Mutex::new(conn) })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn url(&self) -> String {
    format!("sqlite://{}", self.path.display())
  }

  /// Configuración pequeña y con esperas cortas para pruebas.
  pub fn pool_config(&self) -> PoolConfig {
    PoolConfig { min_size: 1,
                 max_size: 4,
                 max_wait: Duration::from_millis(200),
                 retry_attempts: 2,
                 retry_backoff: Duration::from_millis(10),
                 ..PoolConfig::for_url(self.url()) }
  }

  fn with_conn<T>(&self, f: impl FnOnce(&mut SqliteConnection) -> Result<T, diesel::result::Error>) -> Result<T, RepositoryError> {
    let mut guard = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Ok(f(&mut guard)?)
  }

  fn present(&self, table: SchemaTable) -> bool {
    !self.skipped.contains(&table)
  }

  pub fn execute(&self, sql: &str) -> Result<(), RepositoryError> {
    self.with_conn(|c| c.batch_execute(sql))
  }

  /// Registra la entidad (si su tabla existe) sin alias.
  pub fn entity(&self, kind: EntityKind, id: &str) -> Result<&Self, RepositoryError> {
    if self.present(SchemaTable::entities_of(kind)) {
      let sql = format!("INSERT OR IGNORE INTO {} (id) VALUES (?)", kind.entity_table());
      self.with_conn(|c| diesel::sql_query(sql).bind::<Text, _>(id).execute(c))?;
    }
    Ok(self)
  }

  /// Registra la entidad y un alias para ella.
  pub fn alias(&self, kind: EntityKind, alias: &str, id: &str) -> Result<&Self, RepositoryError> {
    self.entity(kind, id)?;
    if self.present(SchemaTable::aliases_of(kind)) {
      let sql = format!("INSERT INTO {} (alias, {}) VALUES (?, ?)", kind.alias_table(), kind.id_column());
      self.with_conn(|c| diesel::sql_query(sql).bind::<Text, _>(alias).bind::<Text, _>(id).execute(c))?;
    }
    Ok(self)
  }

  /// Inserta una fila de una tabla de enlace de dos columnas, en el orden de
  /// columnas de la tabla (p. ej. `GeneDiseases`: gen, enfermedad).
  pub fn link(&self, table: SchemaTable, left: &str, right: &str) -> Result<&Self, RepositoryError> {
    if self.present(table) {
      let sql = format!("INSERT INTO {} VALUES (?, ?)", table.name());
      self.with_conn(|c| diesel::sql_query(sql).bind::<Text, _>(left).bind::<Text, _>(right).execute(c))?;
    }
    Ok(self)
  }

  pub fn structure(&self, kind: EntityKind, id: &str, smiles: Option<&str>) -> Result<&Self, RepositoryError> {
    let table = match kind {
      EntityKind::Drug => SchemaTable::DrugStructures,
      EntityKind::Compound => SchemaTable::CompoundStructures,
      other => {
        return Err(repurpose_domain::DomainError::ValidationError(format!("{} no tiene estructura", other)).into())
      }
    };
    if self.present(table) {
      let sql = format!("INSERT OR REPLACE INTO {} VALUES (?, ?)", table.name());
      self.with_conn(|c| diesel::sql_query(sql).bind::<Text, _>(id).bind::<Nullable<Text>, _>(smiles).execute(c))?;
    }
    Ok(self)
  }

  /// Inserta una arista con sus sub-relaciones y devuelve su id (0 si la
  /// tabla de interacciones no existe).
  pub fn interaction(&self,
                     source: &NodeRef,
                     target: &NodeRef,
                     relation: Option<&str>,
                     subs: &[(&str, &str)])
                     -> Result<i64, RepositoryError> {
    if !self.present(SchemaTable::Interaction) {
      return Ok(0);
    }
    let with_subs = self.present(SchemaTable::Subtype);
    self.with_conn(|c| {
      diesel::sql_query("INSERT INTO Interaction (source_name, target_name, relation_type, source_type, target_type) \
                         VALUES (?, ?, ?, ?, ?)").bind::<Text, _>(&source.id)
                                                 .bind::<Text, _>(&target.id)
                                                 .bind::<Nullable<Text>, _>(relation)
                                                 .bind::<Text, _>(source.kind.as_str())
                                                 .bind::<Text, _>(target.kind.as_str())
                                                 .execute(c)?;
      let id = diesel::sql_query("SELECT last_insert_rowid() AS id").get_result::<RowId>(c)?.id;
      if with_subs {
        for (name, value) in subs {
          diesel::sql_query("INSERT INTO Subtype (interaction_id, name, value) VALUES (?, ?, ?)").bind::<BigInt, _>(id)
                                                                                               .bind::<Text, _>(*name)
                                                                                               .bind::<Text, _>(*value)
                                                                                               .execute(c)?;
        }
      }
      Ok(id)
    })
  }
}

impl Drop for SqliteFixture {
  fn drop(&mut self) {
    for suffix in ["", "-wal", "-shm"] {
      let mut name = self.path.clone().into_os_string();
      name.push(suffix);
      let _ = std::fs::remove_file(PathBuf::from(name));
    }
  }
}
