//! Colaborador opcional que aporta descripciones legibles de una entidad.
//!
//! El motor funciona sin él: si no hay descripción o la consulta falla, los
//! textos de los resultados se rellenan con lo que haya en la base.
use repurpose_domain::{DomainError, EntityKind};
use std::collections::HashMap;

pub trait DescriptionSource: Send + Sync {
  /// Descripción de la entidad, o `None` si no se conoce.
  fn describe(&self, kind: EntityKind, id: &str) -> Result<Option<String>, DomainError>;
}

/// Fuente vacía: nunca aporta descripciones.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDescriptions;

impl DescriptionSource for NoDescriptions {
  fn describe(&self, _kind: EntityKind, _id: &str) -> Result<Option<String>, DomainError> {
    Ok(None)
  }
}

/// Descripciones fijas en memoria, cargables desde JSON
/// (`{"drug": {"D00001": "..."}}`).
#[derive(Debug, Default, Clone)]
pub struct StaticDescriptions {
  entries: HashMap<(EntityKind, String), String>,
}

impl StaticDescriptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, kind: EntityKind, id: impl Into<String>, text: impl Into<String>) -> Self {
    self.entries.insert((kind, id.into()), text.into());
    self
  }

  pub fn from_json(raw: &str) -> Result<Self, DomainError> {
    let parsed: HashMap<String, HashMap<String, String>> = serde_json::from_str(raw)?;
    let mut out = Self::new();
    for (tag, items) in parsed {
      let kind: EntityKind = tag.parse()?;
      for (id, text) in items {
        out.entries.insert((kind, id), text);
      }
    }
    Ok(out)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl DescriptionSource for StaticDescriptions {
  fn describe(&self, kind: EntityKind, id: &str) -> Result<Option<String>, DomainError> {
    Ok(self.entries.get(&(kind, id.to_string())).cloned())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn static_descriptions_load_from_json() {
    let src = StaticDescriptions::from_json(r#"{"drug": {"A": "inhibidor de PARP"}}"#).unwrap();
    assert_eq!(src.len(), 1);
    assert_eq!(src.describe(EntityKind::Drug, "A").unwrap().as_deref(), Some("inhibidor de PARP"));
    assert_eq!(src.describe(EntityKind::Gene, "A").unwrap(), None);
    assert!(StaticDescriptions::from_json(r#"{"planeta": {}}"#).is_err());
    assert!(StaticDescriptions::from_json("no es json").is_err());
    assert_eq!(NoDescriptions.describe(EntityKind::Drug, "A").unwrap(), None);
  }
}
