// repurposing_result.rs
use crate::{CanonicalId, DomainError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Nivel de evidencia derivado del score final (función escalonada).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvidenceLevel {
  TheoreticalOnly,
  ModeratePreclinical,
  StrongPreclinical,
  ModerateClinical,
  StrongClinical,
}

impl EvidenceLevel {
  pub fn from_score(score: f64) -> Self {
    if score >= 0.8 {
      EvidenceLevel::StrongClinical
    } else if score >= 0.6 {
      EvidenceLevel::ModerateClinical
    } else if score >= 0.4 {
      EvidenceLevel::StrongPreclinical
    } else if score >= 0.2 {
      EvidenceLevel::ModeratePreclinical
    } else {
      EvidenceLevel::TheoreticalOnly
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      EvidenceLevel::StrongClinical => "Strong clinical evidence",
      EvidenceLevel::ModerateClinical => "Moderate clinical evidence",
      EvidenceLevel::StrongPreclinical => "Strong preclinical evidence",
      EvidenceLevel::ModeratePreclinical => "Moderate preclinical evidence",
      EvidenceLevel::TheoreticalOnly => "Theoretical only",
    }
  }
}

impl fmt::Display for EvidenceLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Campos extendidos que sólo se rellenan bajo demanda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtendedDetails {
  pub evidence_details: String,
  pub adverse_effects: String,
  pub dosage_information: String,
}

/// Resultado de reposicionamiento para un par fármaco-enfermedad.
///
/// Se crea por consulta y no se persiste.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugRepurposingResult {
  drug_id: CanonicalId,
  drug_name: String,
  disease_id: CanonicalId,
  score: f64,
  mechanism_of_action: String,
  current_indication: String,
  evidence_level: EvidenceLevel,
  extended: Option<ExtendedDetails>,
}

impl DrugRepurposingResult {
  /// El score se acota a [0,1]; un score no finito es un error de validación.
  pub fn new(drug_id: impl Into<CanonicalId>,
             drug_name: impl Into<String>,
             disease_id: impl Into<CanonicalId>,
             score: f64)
             -> Result<Self, DomainError> {
    if !score.is_finite() {
      return Err(DomainError::ValidationError(format!("score no finito: {}", score)));
    }
    let score = clamp_unit(score);
    Ok(Self { drug_id: drug_id.into(),
              drug_name: drug_name.into(),
              disease_id: disease_id.into(),
              score,
              mechanism_of_action: String::new(),
              current_indication: String::new(),
              evidence_level: EvidenceLevel::from_score(score),
              extended: None })
  }

  pub fn with_mechanism(mut self, mechanism: impl Into<String>) -> Self {
    self.mechanism_of_action = mechanism.into();
    self
  }

  pub fn with_indication(mut self, indication: impl Into<String>) -> Self {
    self.current_indication = indication.into();
    self
  }

  pub fn with_extended(mut self, details: ExtendedDetails) -> Self {
    self.extended = Some(details);
    self
  }

  pub fn drug_id(&self) -> &str {
    &self.drug_id
  }

  pub fn drug_name(&self) -> &str {
    &self.drug_name
  }

  pub fn disease_id(&self) -> &str {
    &self.disease_id
  }

  pub fn score(&self) -> f64 {
    self.score
  }

  pub fn mechanism_of_action(&self) -> &str {
    &self.mechanism_of_action
  }

  pub fn current_indication(&self) -> &str {
    &self.current_indication
  }

  pub fn evidence_level(&self) -> EvidenceLevel {
    self.evidence_level
  }

  pub fn extended(&self) -> Option<&ExtendedDetails> {
    self.extended.as_ref()
  }

  /// Orden de ranking: score descendente y, a igualdad, id ascendente.
  pub fn ranking_order(a: &Self, b: &Self) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.drug_id.cmp(&b.drug_id))
  }
}

impl fmt::Display for DrugRepurposingResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f,
           "{} ({}) score={:.3} [{}]",
           self.drug_name, self.drug_id, self.score, self.evidence_level)
  }
}

/// Acota un valor al intervalo [0,1]; NaN se trata como 0.
pub fn clamp_unit(value: f64) -> f64 {
  if value.is_nan() {
    0.0
  } else {
    value.clamp(0.0, 1.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn evidence_levels_follow_step_function() {
    assert_eq!(EvidenceLevel::from_score(0.95), EvidenceLevel::StrongClinical);
    assert_eq!(EvidenceLevel::from_score(0.8), EvidenceLevel::StrongClinical);
    assert_eq!(EvidenceLevel::from_score(0.6), EvidenceLevel::ModerateClinical);
    assert_eq!(EvidenceLevel::from_score(0.59), EvidenceLevel::StrongPreclinical);
    assert_eq!(EvidenceLevel::from_score(0.2), EvidenceLevel::ModeratePreclinical);
    assert_eq!(EvidenceLevel::from_score(0.0), EvidenceLevel::TheoreticalOnly);
    assert_eq!(EvidenceLevel::StrongClinical.to_string(), "Strong clinical evidence");
  }

  #[test]
  fn result_clamps_score_and_orders_by_score_then_id() {
    let a = DrugRepurposingResult::new("B", "b", "D", 1.7).unwrap();
    let b = DrugRepurposingResult::new("A", "a", "D", 1.0).unwrap();
    let c = DrugRepurposingResult::new("C", "c", "D", 0.3).unwrap();
    assert_eq!(a.score(), 1.0);
    let mut v = vec![c.clone(), a.clone(), b.clone()];
    v.sort_by(DrugRepurposingResult::ranking_order);
    let ids: Vec<&str> = v.iter().map(|r| r.drug_id()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    assert!(DrugRepurposingResult::new("X", "x", "D", f64::NAN).is_err());
  }
}
