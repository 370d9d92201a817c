//! Similitud entre fármacos apoyada en el grafo de entidades.
//!
//! Combina la similitud estructural (fingerprints de los SMILES) con la
//! funcional (dianas y rutas compartidas). Los perfiles moleculares ya
//! procesados se memorizan por cadena SMILES, incluidos los que no se pueden
//! parsear.
use crate::errors::Result;
use dashmap::DashMap;
use log::debug;
use repurpose_domain::{clamp_unit, jaccard_slices, ComparisonMethod, EntityKind, MoleculeProfile, StructuralComparison};
use repurpose_persistence::{EntityGraph, GraphSession, RepositoryError};
use std::hash::Hash;
use std::sync::Arc;

const STRUCTURAL_WEIGHT: f64 = 0.7;
const FUNCTIONAL_WITH_STRUCTURE: f64 = 0.3;
const COMPOUND_WEIGHT: f64 = 0.6;
const FUNCTIONAL_WITHOUT_STRUCTURE: f64 = 0.4;
const GENE_WEIGHT: f64 = 0.7;
const PATHWAY_WEIGHT: f64 = 0.3;

#[derive(Debug)]
pub struct SimilarityEngine {
  graph: EntityGraph,
  profiles: DashMap<String, Option<Arc<MoleculeProfile>>>,
}

impl SimilarityEngine {
  pub fn new(graph: EntityGraph) -> Self {
    Self { graph, profiles: DashMap::new() }
  }

  pub fn graph(&self) -> &EntityGraph {
    &self.graph
  }

  /// Jaccard de dos colecciones; 0 si ambas están vacías.
  pub fn set_similarity<T>(a: &[T], b: &[T]) -> f64
    where T: Eq + Hash
  {
    jaccard_slices(a, b)
  }

  /// Perfil memorizado de un SMILES; `None` si no se puede parsear.
  pub fn profile(&self, smiles: &str) -> Option<Arc<MoleculeProfile>> {
    if let Some(hit) = self.profiles.get(smiles) {
      return hit.value().clone();
    }
    let parsed = match MoleculeProfile::from_smiles(smiles) {
      Ok(p) => Some(Arc::new(p)),
      Err(e) => {
        debug!("SMILES descartado '{}': {}", smiles, e);
        None
      }
    };
    self.profiles.entry(smiles.to_string()).or_insert(parsed).value().clone()
  }

  pub fn profile_count(&self) -> usize {
    self.profiles.len()
  }

  pub fn clear_profiles(&self) {
    self.profiles.clear();
  }

  /// Un fallo de parseo en cualquiera de los lados da 0.0.
  pub fn structural_similarity(&self, a: &str, b: &str) -> StructuralComparison {
    match (self.profile(a), self.profile(b)) {
      (Some(pa), Some(pb)) => pa.compare(&pb),
      _ => StructuralComparison { score: 0.0, method: ComparisonMethod::ParseFailure },
    }
  }

  /// 0.7 · Jaccard de dianas + 0.3 · Jaccard de rutas.
  pub fn functional_similarity_in(&self, s: &mut GraphSession<'_>, a: &str, b: &str) -> Result<f64> {
    let genes = Self::set_similarity(&s.gene_targets_for_drug(a)?, &s.gene_targets_for_drug(b)?);
    let pathways = Self::set_similarity(&s.pathways_for_drug(a)?, &s.pathways_for_drug(b)?);
    Ok(clamp_unit(GENE_WEIGHT * genes + PATHWAY_WEIGHT * pathways))
  }

  /// Similitud entre los compuestos de dos fármacos: media simétrica de la
  /// mejor coincidencia estructural. Sin estructuras de compuesto se usa el
  /// Jaccard de los ids.
  pub fn compound_similarity_in(&self, s: &mut GraphSession<'_>, a: &str, b: &str) -> Result<f64> {
    let compounds_a = s.compounds_for_drug(a)?;
    let compounds_b = s.compounds_for_drug(b)?;
    if compounds_a.is_empty() || compounds_b.is_empty() {
      return Ok(0.0);
    }
    let profiles_a = self.compound_profiles(s, &compounds_a)?;
    let profiles_b = self.compound_profiles(s, &compounds_b)?;
    if profiles_a.is_empty() || profiles_b.is_empty() {
      return Ok(Self::set_similarity(&compounds_a, &compounds_b));
    }
    let forward = best_match_mean(&profiles_a, &profiles_b);
    let backward = best_match_mean(&profiles_b, &profiles_a);
    Ok(clamp_unit((forward + backward) / 2.0))
  }

  fn compound_profiles(&self, s: &mut GraphSession<'_>, ids: &[String]) -> Result<Vec<Arc<MoleculeProfile>>> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
      if let Some(smiles) = s.structure(EntityKind::Compound, id)? {
        if let Some(profile) = self.profile(&smiles) {
          out.push(profile);
        }
      }
    }
    Ok(out)
  }

  /// Similitud molecular de dos fármacos.
  ///
  /// Con estructura en ambos lados: 0.7 · estructural + 0.3 · funcional.
  /// Si falta alguna: 0.6 · compuestos + 0.4 · funcional.
  pub fn molecular_similarity_in(&self, s: &mut GraphSession<'_>, a: &str, b: &str) -> Result<f64> {
    let functional = self.functional_similarity_in(s, a, b)?;
    let structures = (s.structure(EntityKind::Drug, a)?, s.structure(EntityKind::Drug, b)?);
    let score = match structures {
      (Some(sa), Some(sb)) => {
        STRUCTURAL_WEIGHT * self.structural_similarity(&sa, &sb).score + FUNCTIONAL_WITH_STRUCTURE * functional
      }
      _ => COMPOUND_WEIGHT * self.compound_similarity_in(s, a, b)? + FUNCTIONAL_WITHOUT_STRUCTURE * functional,
    };
    Ok(clamp_unit(score))
  }

  pub fn functional_similarity(&self, a: &str, b: &str) -> Result<f64> {
    self.leased(|me, s| me.functional_similarity_in(s, a, b))
  }

  pub fn compound_similarity(&self, a: &str, b: &str) -> Result<f64> {
    self.leased(|me, s| me.compound_similarity_in(s, a, b))
  }

  pub fn molecular_similarity(&self, a: &str, b: &str) -> Result<f64> {
    self.leased(|me, s| me.molecular_similarity_in(s, a, b))
  }

  /// Similitud estructural de dos entidades con estructura registrada;
  /// `None` si a alguna le falta.
  pub fn structural_similarity_of(&self, kind: EntityKind, a: &str, b: &str) -> Result<Option<StructuralComparison>> {
    let (sa, sb) = self.graph.with_session(|s| Ok((s.structure(kind, a)?, s.structure(kind, b)?)))?;
    Ok(match (sa, sb) {
      (Some(sa), Some(sb)) => Some(self.structural_similarity(&sa, &sb)),
      _ => None,
    })
  }

  fn leased<T, F>(&self, f: F) -> Result<T>
    where F: FnOnce(&Self, &mut GraphSession<'_>) -> Result<T>
  {
    engine_session(&self.graph, |s| f(self, s))
  }
}

/// Como `EntityGraph::with_session`, pero con errores del motor dentro del
/// lote.
pub(crate) fn engine_session<T, F>(graph: &EntityGraph, f: F) -> Result<T>
  where F: FnOnce(&mut GraphSession<'_>) -> Result<T>
{
  let mut conn = graph.pool().acquire().map_err(RepositoryError::from)?;
  let mut session = graph.session(&mut conn);
  f(&mut session)
}

fn best_match_mean(from: &[Arc<MoleculeProfile>], to: &[Arc<MoleculeProfile>]) -> f64 {
  let total: f64 = from.iter()
                       .map(|p| to.iter().map(|q| p.compare(q).score).fold(0.0, f64::max))
                       .sum();
  total / from.len() as f64
}

#[cfg(test)]
mod tests {
  use super::*;
  use repurpose_persistence::fixtures::SqliteFixture;
  use repurpose_persistence::{ConnectionPool, EntityCache};

  fn engine(fx: &SqliteFixture) -> SimilarityEngine {
    let pool = Arc::new(ConnectionPool::new(fx.pool_config()).unwrap());
    SimilarityEngine::new(EntityGraph::new(pool, Arc::new(EntityCache::new())).unwrap())
  }

  #[test]
  fn set_similarity_edge_cases() {
    let a = vec!["x", "y"];
    let empty: Vec<&str> = Vec::new();
    assert_eq!(SimilarityEngine::set_similarity(&a, &a), 1.0);
    assert_eq!(SimilarityEngine::set_similarity(&a, &empty), 0.0);
    assert_eq!(SimilarityEngine::set_similarity(&empty, &empty), 0.0);
  }

  #[test]
  fn profiles_are_memoized_including_failures() {
    let fx = SqliteFixture::new().unwrap();
    let engine = engine(&fx);
    assert!(engine.profile("CCO").is_some());
    assert!(engine.profile("C1CC(").is_none());
    assert!(engine.profile("CCO").is_some());
    assert_eq!(engine.profile_count(), 2);
    let cmp = engine.structural_similarity("C1CC(", "CCO");
    assert_eq!(cmp.method, ComparisonMethod::ParseFailure);
    engine.clear_profiles();
    assert_eq!(engine.profile_count(), 0);
  }
}
