// Archivo: discovery.rs
// Propósito: búsqueda de candidatos. Enfermedades similares por genes, rutas
// y fármacos compartidos; recorrido en anchura del grafo de interacciones; y
// candidatos estructurales a partir de los fármacos de enfermedades
// similares.
use crate::errors::Result;
use crate::parallel::ParallelMap;
use crate::settings::EngineSettings;
use crate::similarity_engine::SimilarityEngine;
use indexmap::{IndexMap, IndexSet};
use log::{debug, info};
use repurpose_domain::{CanonicalId, EntityKind, NodeRef};
use repurpose_persistence::{EntityGraph, GraphSession, RepositoryError};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

const SHARED_GENE_POINTS: u32 = 3;
const SHARED_PATHWAY_POINTS: u32 = 2;
const SHARED_DRUG_POINTS: u32 = 5;
const MIN_SIMILAR_SCORE: u32 = 5;
const MAX_SIMILAR_DISEASES: usize = 10;
const MIN_STRUCTURAL_SCORE: f64 = 0.5;
const MAX_MATCHES_PER_SEED: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarDisease {
  pub disease_id: CanonicalId,
  pub score: u32,
}

/// Resultado completo de un recorrido de red.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkTraversal {
  pub candidates: BTreeSet<CanonicalId>,
  /// Nodos expandidos, en orden de visita. Nunca contiene fármacos.
  pub expanded: Vec<NodeRef>,
  pub visited: usize,
  pub depth_reached: usize,
}

#[derive(Debug, Clone)]
pub struct CandidateDiscovery {
  graph: EntityGraph,
  similarity: Arc<SimilarityEngine>,
  settings: EngineSettings,
}

impl CandidateDiscovery {
  pub fn new(graph: EntityGraph, similarity: Arc<SimilarityEngine>, settings: EngineSettings) -> Self {
    Self { graph, similarity, settings }
  }

  /// Enfermedades parecidas a `disease`: +3 por gen compartido, +2 por ruta
  /// compartida y +5 por fármaco compartido. Se quedan las que suman al menos
  /// 5, ordenadas por puntuación descendente e id ascendente, hasta 10.
  pub fn similar_diseases(&self, disease: &str) -> Result<Vec<SimilarDisease>> {
    Ok(self.graph.with_session(|s| similar_diseases_in(s, disease))?)
  }

  pub fn network_candidates(&self, seed_gene: &str, max_depth: usize) -> Result<BTreeSet<CanonicalId>> {
    Ok(self.network_traversal(seed_gene, max_depth)?.candidates)
  }

  /// Recorrido en anchura desde un gen. Los nodos de tipo fármaco se anotan
  /// como candidatos y no se expanden; ningún nodo se visita dos veces.
  pub fn network_traversal(&self, seed_gene: &str, max_depth: usize) -> Result<NetworkTraversal> {
    let seed = NodeRef::new(EntityKind::Gene, seed_gene);
    let traversal = self.graph.with_session(|s| {
                                let mut out = NetworkTraversal::default();
                                let mut visited: HashSet<NodeRef> = HashSet::new();
                                visited.insert(seed.clone());
                                let mut frontier = vec![seed.clone()];
                                while !frontier.is_empty() && out.depth_reached < max_depth {
                                  let mut next = Vec::new();
                                  for node in frontier {
                                    if node.is_drug() {
                                      continue;
                                    }
                                    for neighbour in s.neighbours(&node)? {
                                      if !visited.insert(neighbour.clone()) {
                                        continue;
                                      }
                                      if neighbour.is_drug() {
                                        out.candidates.insert(neighbour.id);
                                      } else {
                                        next.push(neighbour);
                                      }
                                    }
                                    out.expanded.push(node);
                                  }
                                  out.depth_reached += 1;
                                  frontier = next;
                                }
                                out.visited = visited.len();
                                Ok(out)
                              })?;
    debug!("red desde {}: {} candidatos, {} nodos expandidos",
           seed_gene,
           traversal.candidates.len(),
           traversal.expanded.len());
    Ok(traversal)
  }

  /// Fármacos estructuralmente parecidos a los aprobados para enfermedades
  /// similares.
  pub fn structural_candidates(&self, disease: &str) -> Result<BTreeSet<CanonicalId>> {
    let similar = self.similar_diseases(disease)?;
    self.structural_candidates_from(disease, &similar)
  }

  pub(crate) fn structural_candidates_from(&self,
                                           disease: &str,
                                           similar: &[SimilarDisease])
                                           -> Result<BTreeSet<CanonicalId>> {
    let (seeds, others) = self.graph.with_session(|s| {
                                      let mut seeds: IndexSet<CanonicalId> = IndexSet::new();
                                      for sim in similar {
                                        seeds.extend(s.drugs_for_disease(&sim.disease_id)?);
                                      }
                                      let own: HashSet<String> = s.drugs_for_disease(disease)?.into_iter().collect();
                                      let others: Vec<String> = s.all_drug_ids()?
                                                                 .into_iter()
                                                                 .filter(|d| !seeds.contains(d) && !own.contains(d))
                                                                 .collect();
                                      Ok((seeds, others))
                                    })?;
    if seeds.is_empty() || others.is_empty() {
      return Ok(BTreeSet::new());
    }
    let pairs: Vec<(String, String)> =
      seeds.iter().flat_map(|seed| others.iter().map(move |other| (seed.clone(), other.clone()))).collect();
    info!("candidatos estructurales para {}: {} semillas x {} fármacos", disease, seeds.len(), others.len());

    let similarity = Arc::clone(&self.similarity);
    let batch = ParallelMap::new("structural", &self.settings);
    let scored = batch.run(pairs, move |(seed, other)| {
                        let score = similarity.molecular_similarity(&seed, &other)?;
                        Ok((seed, other, score))
                      })?;

    let mut per_seed: IndexMap<String, Vec<(String, f64)>> = IndexMap::new();
    for (seed, other, score) in scored {
      if score >= MIN_STRUCTURAL_SCORE {
        per_seed.entry(seed).or_default().push((other, score));
      }
    }
    let mut out = BTreeSet::new();
    for (_, mut matches) in per_seed {
      matches.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
      out.extend(matches.into_iter().take(MAX_MATCHES_PER_SEED).map(|(id, _)| id));
    }
    Ok(out)
  }
}

pub(crate) fn similar_diseases_in(s: &mut GraphSession<'_>,
                                  disease: &str)
                                  -> std::result::Result<Vec<SimilarDisease>, RepositoryError> {
  let mut scores: HashMap<String, u32> = HashMap::new();
  let mut add = |ids: Vec<String>, points: u32| {
    for id in ids {
      if id != disease {
        *scores.entry(id).or_insert(0) += points;
      }
    }
  };
  for gene in s.genes_for_disease(disease)? {
    add(s.diseases_for_gene(&gene)?, SHARED_GENE_POINTS);
  }
  for pathway in s.pathways_for_disease(disease)? {
    add(s.diseases_for_pathway(&pathway)?, SHARED_PATHWAY_POINTS);
  }
  for drug in s.drugs_for_disease(disease)? {
    add(s.diseases_for_drug(&drug)?, SHARED_DRUG_POINTS);
  }
  let mut ranked: Vec<SimilarDisease> = scores.into_iter()
                                              .filter(|(_, score)| *score >= MIN_SIMILAR_SCORE)
                                              .map(|(disease_id, score)| SimilarDisease { disease_id, score })
                                              .collect();
  ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.disease_id.cmp(&b.disease_id)));
  ranked.truncate(MAX_SIMILAR_DISEASES);
  Ok(ranked)
}
