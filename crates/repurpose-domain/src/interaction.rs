use crate::{CanonicalId, EntityKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nodo tipado del grafo de interacciones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
  pub kind: EntityKind,
  pub id: CanonicalId,
}

impl NodeRef {
  pub fn new(kind: EntityKind, id: impl Into<CanonicalId>) -> Self {
    Self { kind, id: id.into() }
  }

  pub fn is_drug(&self) -> bool {
    self.kind == EntityKind::Drug
  }
}

impl fmt::Display for NodeRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind, self.id)
  }
}

/// Sub-relación (nombre, valor) asociada a una arista.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRelation {
  pub name: String,
  pub value: String,
}

/// Arista de interacción. Se almacena dirigida pero el recorrido la trata
/// como no dirigida.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEdge {
  pub source: NodeRef,
  pub target: NodeRef,
  pub relation: Option<String>,
  pub sub_relations: Vec<SubRelation>,
}

impl InteractionEdge {
  pub fn new(source: NodeRef, target: NodeRef, relation: Option<String>) -> Self {
    Self { source, target, relation, sub_relations: Vec::new() }
  }

  pub fn with_sub_relations(mut self, subs: Vec<SubRelation>) -> Self {
    self.sub_relations = subs;
    self
  }

  pub fn touches(&self, node: &NodeRef) -> bool {
    &self.source == node || &self.target == node
  }

  /// Extremo opuesto a `node`, o `None` si la arista no lo toca.
  pub fn other_end(&self, node: &NodeRef) -> Option<&NodeRef> {
    if &self.source == node {
      Some(&self.target)
    } else if &self.target == node {
      Some(&self.source)
    } else {
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn other_end_is_symmetric() {
    let g = NodeRef::new(EntityKind::Gene, "G1");
    let d = NodeRef::new(EntityKind::Drug, "DB01");
    let e = InteractionEdge::new(g.clone(), d.clone(), Some("target".into()));
    assert_eq!(e.other_end(&g), Some(&d));
    assert_eq!(e.other_end(&d), Some(&g));
    assert_eq!(e.other_end(&NodeRef::new(EntityKind::Gene, "G2")), None);
    assert!(d.is_drug() && !g.is_drug());
  }
}
