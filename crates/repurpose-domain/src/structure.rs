// structure.rs
use crate::fingerprint::FingerprintSet;
use crate::smiles::{has_coordination_motif, parse_smiles, ParseMode};
use crate::DomainError;
use serde::{Deserialize, Serialize};

/// Método usado para comparar dos estructuras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonMethod {
  Fingerprint,
  PropertyFallback,
  ParseFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructuralComparison {
  pub score: f64,
  pub method: ComparisonMethod,
}

impl StructuralComparison {
  fn failed() -> Self {
    Self { score: 0.0, method: ComparisonMethod::ParseFailure }
  }
}

/// Estructura ya procesada, lista para comparaciones repetidas.
///
/// Las estructuras con motivos de coordinación metálica sólo guardan sus
/// propiedades básicas; el resto lleva además sus tres fingerprints.
#[derive(Debug, Clone)]
pub struct MoleculeProfile {
  atom_count: usize,
  bond_count: usize,
  fingerprints: Option<FingerprintSet>,
}

impl MoleculeProfile {
  pub fn from_smiles(smiles: &str) -> Result<Self, DomainError> {
    if smiles.trim().is_empty() {
      return Err(DomainError::ValidationError("SMILES no puede estar vacío".to_string()));
    }
    if has_coordination_motif(smiles) {
      let graph = parse_smiles(smiles, ParseMode::Relaxed)?;
      return Ok(Self { atom_count: graph.atom_count(), bond_count: graph.bond_count(), fingerprints: None });
    }
    let graph = parse_smiles(smiles, ParseMode::Strict)?;
    Ok(Self { atom_count: graph.atom_count(),
              bond_count: graph.bond_count(),
              fingerprints: Some(FingerprintSet::compute(&graph)) })
  }

  pub fn atom_count(&self) -> usize {
    self.atom_count
  }

  pub fn bond_count(&self) -> usize {
    self.bond_count
  }

  pub fn is_organometallic(&self) -> bool {
    self.fingerprints.is_none()
  }

  pub fn fingerprints(&self) -> Option<&FingerprintSet> {
    self.fingerprints.as_ref()
  }

  pub fn compare(&self, other: &MoleculeProfile) -> StructuralComparison {
    match (&self.fingerprints, &other.fingerprints) {
      (Some(a), Some(b)) => StructuralComparison { score: a.weighted_similarity(b).clamp(0.0, 1.0),
                                                   method: ComparisonMethod::Fingerprint },
      _ => StructuralComparison { score: self.property_similarity(other), method: ComparisonMethod::PropertyFallback },
    }
  }

  /// Media 50/50 de las similitudes relativas de número de átomos y enlaces.
  fn property_similarity(&self, other: &MoleculeProfile) -> f64 {
    0.5 * relative_closeness(self.atom_count, other.atom_count)
    + 0.5 * relative_closeness(self.bond_count, other.bond_count)
  }
}

fn relative_closeness(a: usize, b: usize) -> f64 {
  let max = a.max(b);
  if max == 0 {
    return 0.0;
  }
  1.0 - (a.abs_diff(b) as f64 / max as f64)
}

/// Compara dos SMILES. Un fallo de parseo en cualquiera de los lados
/// produce 0.0 en lugar de un error.
pub fn structural_similarity(a: &str, b: &str) -> StructuralComparison {
  match (MoleculeProfile::from_smiles(a), MoleculeProfile::from_smiles(b)) {
    (Ok(pa), Ok(pb)) => pa.compare(&pb),
    _ => StructuralComparison::failed(),
  }
}
