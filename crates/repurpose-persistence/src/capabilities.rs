//! Detección de las tablas presentes en la base.
//!
//! Se consulta `sqlite_master` una sola vez al construir el accesor; las
//! consultas preguntan aquí antes de tocar una tabla opcional en lugar de
//! interpretar un error de SQL como "tabla ausente".
use crate::errors::RepositoryError;
use crate::pool::DbConn;
use diesel::prelude::*;
use diesel::sql_types::Text;
use repurpose_domain::EntityKind;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SchemaTable {
  GeneAliases,
  DrugAliases,
  DiseaseAliases,
  CompoundAliases,
  Genes,
  Drugs,
  Diseases,
  Compounds,
  GeneDiseases,
  DiseaseDrugs,
  GenePathways,
  DrugPathways,
  DrugGenes,
  DrugCompounds,
  DrugStructures,
  CompoundStructures,
  Interaction,
  Subtype,
}

impl SchemaTable {
  pub const ALL: [SchemaTable; 18] = [SchemaTable::GeneAliases,
                                      SchemaTable::DrugAliases,
                                      SchemaTable::DiseaseAliases,
                                      SchemaTable::CompoundAliases,
                                      SchemaTable::Genes,
                                      SchemaTable::Drugs,
                                      SchemaTable::Diseases,
                                      SchemaTable::Compounds,
                                      SchemaTable::GeneDiseases,
                                      SchemaTable::DiseaseDrugs,
                                      SchemaTable::GenePathways,
                                      SchemaTable::DrugPathways,
                                      SchemaTable::DrugGenes,
                                      SchemaTable::DrugCompounds,
                                      SchemaTable::DrugStructures,
                                      SchemaTable::CompoundStructures,
                                      SchemaTable::Interaction,
                                      SchemaTable::Subtype];

  pub fn name(self) -> &'static str {
    match self {
      SchemaTable::GeneAliases => "GeneAliases",
      SchemaTable::DrugAliases => "DrugAliases",
      SchemaTable::DiseaseAliases => "DiseaseAliases",
      SchemaTable::CompoundAliases => "CompoundAliases",
      SchemaTable::Genes => "Genes",
      SchemaTable::Drugs => "Drugs",
      SchemaTable::Diseases => "Diseases",
      SchemaTable::Compounds => "Compounds",
      SchemaTable::GeneDiseases => "GeneDiseases",
      SchemaTable::DiseaseDrugs => "DiseaseDrugs",
      SchemaTable::GenePathways => "GenePathways",
      SchemaTable::DrugPathways => "DrugPathways",
      SchemaTable::DrugGenes => "DrugGenes",
      SchemaTable::DrugCompounds => "DrugCompounds",
      SchemaTable::DrugStructures => "DrugStructures",
      SchemaTable::CompoundStructures => "CompoundStructures",
      SchemaTable::Interaction => "Interaction",
      SchemaTable::Subtype => "Subtype",
    }
  }

  pub fn aliases_of(kind: EntityKind) -> Self {
    match kind {
      EntityKind::Gene => SchemaTable::GeneAliases,
      EntityKind::Drug => SchemaTable::DrugAliases,
      EntityKind::Disease => SchemaTable::DiseaseAliases,
      EntityKind::Compound => SchemaTable::CompoundAliases,
    }
  }

  pub fn entities_of(kind: EntityKind) -> Self {
    match kind {
      EntityKind::Gene => SchemaTable::Genes,
      EntityKind::Drug => SchemaTable::Drugs,
      EntityKind::Disease => SchemaTable::Diseases,
      EntityKind::Compound => SchemaTable::Compounds,
    }
  }

  fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|t| t.name().eq_ignore_ascii_case(name))
  }
}

impl fmt::Display for SchemaTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(QueryableByName)]
struct MasterRow {
  #[diesel(sql_type = Text)]
  name: String,
}

/// Tablas conocidas presentes en la base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaCapabilities {
  present: BTreeSet<SchemaTable>,
}

impl SchemaCapabilities {
  pub fn detect(conn: &mut DbConn) -> Result<Self, RepositoryError> {
    let rows = diesel::sql_query("SELECT name FROM sqlite_master WHERE type IN ('table', 'view')").load::<MasterRow>(conn)?;
    let present: BTreeSet<SchemaTable> = rows.iter().filter_map(|r| SchemaTable::from_name(&r.name)).collect();
    let caps = Self { present };
    let missing = caps.missing();
    if missing.is_empty() {
      log::info!("Esquema completo: {} tablas conocidas", caps.present.len());
    } else {
      log::info!("Esquema parcial; tablas ausentes: {}",
                 missing.iter().map(|t| t.name()).collect::<Vec<_>>().join(", "));
    }
    Ok(caps)
  }

  /// Capacidades con todas las tablas presentes.
  pub fn all() -> Self {
    Self { present: SchemaTable::ALL.into_iter().collect() }
  }

  pub fn from_tables(tables: impl IntoIterator<Item = SchemaTable>) -> Self {
    Self { present: tables.into_iter().collect() }
  }

  pub fn has(&self, table: SchemaTable) -> bool {
    self.present.contains(&table)
  }

  pub fn missing(&self) -> Vec<SchemaTable> {
    SchemaTable::ALL.into_iter().filter(|t| !self.present.contains(t)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn names_round_trip_case_insensitively() {
    for t in SchemaTable::ALL {
      assert_eq!(SchemaTable::from_name(&t.name().to_ascii_lowercase()), Some(t));
    }
    assert_eq!(SchemaTable::from_name("sqlite_sequence"), None);
  }

  #[test]
  fn kind_tables() {
    assert_eq!(SchemaTable::aliases_of(EntityKind::Compound).name(), EntityKind::Compound.alias_table());
    assert_eq!(SchemaTable::entities_of(EntityKind::Drug).name(), EntityKind::Drug.entity_table());
  }

  #[test]
  fn missing_lists_absent_tables() {
    let caps = SchemaCapabilities::from_tables([SchemaTable::GeneAliases, SchemaTable::GeneDiseases]);
    assert!(caps.has(SchemaTable::GeneDiseases));
    assert!(!caps.has(SchemaTable::DrugGenes));
    assert_eq!(caps.missing().len(), SchemaTable::ALL.len() - 2);
    assert!(SchemaCapabilities::all().missing().is_empty());
  }
}
