use dashmap::DashMap;
use repurpose_domain::{CanonicalId, EntityKind};
use std::sync::Arc;

/// Resultado memorizado de una consulta de estructura. `Absent` distingue
/// "sin estructura" de "aún no consultado" (ausencia de entrada).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedStructure {
  Present(Arc<str>),
  Absent,
}

impl CachedStructure {
  pub fn as_option(&self) -> Option<Arc<str>> {
    match self {
      CachedStructure::Present(s) => Some(Arc::clone(s)),
      CachedStructure::Absent => None,
    }
  }
}

type Key = (EntityKind, CanonicalId);

/// Caché de estructuras y nombres visibles, compartida entre hilos.
///
/// Nunca se invalida de forma implícita: los datos de origen cambian mucho
/// menos de lo que se leen. `clear` la vacía explícitamente.
#[derive(Debug, Default)]
pub struct EntityCache {
  structures: DashMap<Key, CachedStructure>,
  names: DashMap<Key, String>,
}

impl EntityCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn structure(&self, kind: EntityKind, id: &str) -> Option<CachedStructure> {
    self.structures.get(&(kind, id.to_string())).map(|e| e.value().clone())
  }

  pub fn store_structure(&self, kind: EntityKind, id: &str, smiles: Option<&str>) -> CachedStructure {
    let entry = match smiles.map(str::trim).filter(|s| !s.is_empty()) {
      Some(s) => CachedStructure::Present(Arc::from(s)),
      None => CachedStructure::Absent,
    };
    self.structures.insert((kind, id.to_string()), entry.clone());
    entry
  }

  pub fn display_name(&self, kind: EntityKind, id: &str) -> Option<String> {
    self.names.get(&(kind, id.to_string())).map(|e| e.value().clone())
  }

  pub fn store_display_name(&self, kind: EntityKind, id: &str, name: &str) {
    self.names.insert((kind, id.to_string()), name.to_string());
  }

  pub fn structure_count(&self) -> usize {
    self.structures.len()
  }

  pub fn name_count(&self) -> usize {
    self.names.len()
  }

  pub fn clear(&self) {
    self.structures.clear();
    self.names.clear();
  }
}
