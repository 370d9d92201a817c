// entity.rs
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identificador canónico (estable) de una entidad biológica.
pub type CanonicalId = String;

/// Conjunto cerrado de tipos de nodo del grafo heterogéneo.
///
/// Cada variante conoce su tabla de alias, la columna de id y la tabla de
/// entidades, de modo que ningún llamador despacha por cadenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  Gene,
  Drug,
  Disease,
  Compound,
}

impl EntityKind {
  pub const ALL: [EntityKind; 4] = [EntityKind::Gene, EntityKind::Drug, EntityKind::Disease, EntityKind::Compound];

  /// Tabla alias -> id canónico.
  pub fn alias_table(self) -> &'static str {
    match self {
      EntityKind::Gene => "GeneAliases",
      EntityKind::Drug => "DrugAliases",
      EntityKind::Disease => "DiseaseAliases",
      EntityKind::Compound => "CompoundAliases",
    }
  }

  pub fn id_column(self) -> &'static str {
    match self {
      EntityKind::Gene => "gene_id",
      EntityKind::Drug => "drug_id",
      EntityKind::Disease => "disease_id",
      EntityKind::Compound => "compound_id",
    }
  }

  pub fn entity_table(self) -> &'static str {
    match self {
      EntityKind::Gene => "Genes",
      EntityKind::Drug => "Drugs",
      EntityKind::Disease => "Diseases",
      EntityKind::Compound => "Compounds",
    }
  }

  /// Etiqueta usada en la tabla de interacciones (`source_type`/`target_type`).
  pub fn as_str(self) -> &'static str {
    match self {
      EntityKind::Gene => "gene",
      EntityKind::Drug => "drug",
      EntityKind::Disease => "disease",
      EntityKind::Compound => "compound",
    }
  }

  /// Interpreta una etiqueta de tipo; `None` para tipos fuera del conjunto.
  pub fn parse(tag: &str) -> Option<Self> {
    match tag.trim().to_ascii_lowercase().as_str() {
      "gene" => Some(EntityKind::Gene),
      "drug" => Some(EntityKind::Drug),
      "disease" => Some(EntityKind::Disease),
      "compound" => Some(EntityKind::Compound),
      _ => None,
    }
  }

  /// Construye el objeto de valor correspondiente a esta variante.
  pub fn entity(self, id: impl Into<CanonicalId>, name: impl Into<String>) -> Entity {
    let id = id.into();
    let name = name.into();
    match self {
      EntityKind::Gene => Entity::Gene(Gene { id, name }),
      EntityKind::Drug => Entity::Drug(Drug { id, name }),
      EntityKind::Disease => Entity::Disease(Disease { id, name }),
      EntityKind::Compound => Entity::Compound(Compound { id, name }),
    }
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EntityKind {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s).ok_or_else(|| DomainError::ValidationError(format!("tipo de entidad desconocido: {}", s)))
  }
}

macro_rules! entity_value {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct $name {
      id: CanonicalId,
      name: String,
    }

    impl $name {
      pub fn new(id: impl Into<CanonicalId>, name: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
          return Err(DomainError::ValidationError(format!("{}: el id no puede estar vacío", stringify!($name))));
        }
        let name = name.into();
        let name = if name.trim().is_empty() { id.clone() } else { name };
        Ok(Self { id, name })
      }

      pub fn id(&self) -> &str {
        &self.id
      }

      pub fn name(&self) -> &str {
        &self.name
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", stringify!($name), self.id, self.name)
      }
    }
  };
}

entity_value!(
  /// Gen (por ejemplo un id Entrez) con su nombre de presentación.
  Gene
);
entity_value!(
  /// Enfermedad.
  Disease
);
entity_value!(Drug);
entity_value!(Compound);

/// Entidad construida a partir de un `EntityKind`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
  Gene(Gene),
  Drug(Drug),
  Disease(Disease),
  Compound(Compound),
}

impl Entity {
  pub fn kind(&self) -> EntityKind {
    match self {
      Entity::Gene(_) => EntityKind::Gene,
      Entity::Drug(_) => EntityKind::Drug,
      Entity::Disease(_) => EntityKind::Disease,
      Entity::Compound(_) => EntityKind::Compound,
    }
  }

  pub fn id(&self) -> &str {
    match self {
      Entity::Gene(g) => g.id(),
      Entity::Drug(d) => d.id(),
      Entity::Disease(d) => d.id(),
      Entity::Compound(c) => c.id(),
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Entity::Gene(g) => g.name(),
      Entity::Drug(d) => d.name(),
      Entity::Disease(d) => d.name(),
      Entity::Compound(c) => c.name(),
    }
  }
}
