// Archivo: scoring.rs
// Propósito: orquestador de scoring. Puntúa pares fármaco-enfermedad,
// ordena los fármacos de una enfermedad y descubre candidatos para las
// enfermedades sin tratamiento registrado.
use crate::description::{DescriptionSource, NoDescriptions};
use crate::discovery::{CandidateDiscovery, SimilarDisease};
use crate::errors::{EngineError, Result};
use crate::parallel::ParallelMap;
use crate::settings::EngineSettings;
use crate::similarity_engine::{engine_session, SimilarityEngine};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};
use repurpose_domain::similarity::intersection_size;
use repurpose_domain::{clamp_unit, jaccard_slices, overlap_ratio, CanonicalId, DrugRepurposingResult, EntityKind,
                       ExtendedDetails};
use repurpose_persistence::{EntityGraph, GraphSession, RepositoryError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

const GENE_WEIGHT: f64 = 0.4;
const PATHWAY_WEIGHT: f64 = 0.25;
const SIMILAR_DRUG_WEIGHT: f64 = 0.2;
const CHEMICAL_WEIGHT: f64 = 0.15;

const COMPREHENSIVE_BASE: f64 = 0.3;
const COMPREHENSIVE_GENES: f64 = 0.3;
const COMPREHENSIVE_PATHWAYS: f64 = 0.2;
const COMPREHENSIVE_MOLECULAR: f64 = 0.2;

/// Compuestos compartidos que equivalen a similitud química plena.
const SHARED_COMPOUNDS_FOR_FULL_SCORE: f64 = 5.0;
const CANDIDATE_POOL_FACTOR: usize = 3;

const MECHANISM_KEYWORDS: [&str; 4] = ["inhibitor", "agonist", "antagonist", "blocker"];
const UNKNOWN_MECHANISM: &str = "No hay información detallada del mecanismo de acción en la base de datos. \
                                 Podría actuar por unión a dianas o modulación enzimática.";
const NO_INDICATIONS: &str = "Sin indicaciones registradas en la base de datos";
const ADVERSE_EFFECTS: &str = "Los efectos adversos esperables son los propios de su clase terapéutica. \
                               Consultar la literatura del fármaco para su perfil de seguridad; \
                               se requieren ensayos adicionales.";
const DOSAGE: &str = "La dosis para una nueva indicación debe establecerse en ensayos clínicos, \
                      partiendo de las pautas de los usos ya aprobados.";

/// Desglose de las señales que componen el score básico.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
  pub gene_overlap: f64,
  pub pathway_overlap: f64,
  pub similar_drugs: f64,
  pub chemical: f64,
  pub total: f64,
}

impl ScoreBreakdown {
  fn combine(gene_overlap: f64, pathway_overlap: f64, similar_drugs: f64, chemical: f64) -> Self {
    let total = clamp_unit(GENE_WEIGHT * gene_overlap
                           + PATHWAY_WEIGHT * pathway_overlap
                           + SIMILAR_DRUG_WEIGHT * similar_drugs
                           + CHEMICAL_WEIGHT * chemical);
    Self { gene_overlap, pathway_overlap, similar_drugs, chemical, total }
  }
}

#[derive(Clone)]
enum ScoreMode {
  Base,
  /// Lleva los fármacos de las enfermedades similares, calculados una vez
  /// por lote.
  Comprehensive(Arc<Vec<CanonicalId>>),
}

/// Punto de entrada del motor: `score`, `rank` y `discover`.
///
/// Es barato de clonar; cada tarea de un lote trabaja con su propia copia y
/// su propio lease del pool.
#[derive(Clone)]
pub struct ScoringOrchestrator {
  graph: EntityGraph,
  similarity: Arc<SimilarityEngine>,
  discovery: CandidateDiscovery,
  descriptions: Arc<dyn DescriptionSource>,
  settings: EngineSettings,
}

impl fmt::Debug for ScoringOrchestrator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ScoringOrchestrator")
     .field("graph", &self.graph)
     .field("settings", &self.settings)
     .field("cached_profiles", &self.similarity.profile_count())
     .finish()
  }
}

impl ScoringOrchestrator {
  pub fn new(graph: EntityGraph, settings: EngineSettings) -> Self {
    let similarity = Arc::new(SimilarityEngine::new(graph.clone()));
    let discovery = CandidateDiscovery::new(graph.clone(), Arc::clone(&similarity), settings.clone());
    Self { graph, similarity, discovery, descriptions: Arc::new(NoDescriptions), settings }
  }

  pub fn with_descriptions(mut self, descriptions: Arc<dyn DescriptionSource>) -> Self {
    self.descriptions = descriptions;
    self
  }

  pub fn graph(&self) -> &EntityGraph {
    &self.graph
  }

  pub fn similarity(&self) -> &Arc<SimilarityEngine> {
    &self.similarity
  }

  pub fn discovery(&self) -> &CandidateDiscovery {
    &self.discovery
  }

  pub fn settings(&self) -> &EngineSettings {
    &self.settings
  }

  /// Score de reposicionamiento del par, en [0,1].
  pub fn score(&self, drug: &str, disease: &str) -> Result<f64> {
    Ok(self.score_breakdown(drug, disease)?.total)
  }

  /// Recupera en paralelo las seis señales del score y las combina:
  /// 0.4 · genes + 0.25 · rutas + 0.2 · fármacos similares + 0.15 · química.
  /// Los solapamientos se miden sobre el conjunto de la enfermedad.
  pub fn score_breakdown(&self, drug: &str, disease: &str) -> Result<ScoreBreakdown> {
    let graph = &self.graph;
    let ((disease_genes, drug_genes), ((disease_pathways, drug_pathways), (similar, chemical))) =
      rayon::join(|| rayon::join(|| graph.genes_for_disease(disease), || graph.gene_targets_for_drug(drug)),
                  || {
                    rayon::join(|| rayon::join(|| graph.pathways_for_disease(disease), || graph.pathways_for_drug(drug)),
                                || {
                                  rayon::join(|| self.similar_drug_score(drug, disease),
                                              || self.chemical_similarity_score(drug, disease))
                                })
                  });
    let breakdown = ScoreBreakdown::combine(overlap_ratio(&disease_genes?, &drug_genes?),
                                            overlap_ratio(&disease_pathways?, &drug_pathways?),
                                            similar?,
                                            chemical?);
    debug!("score {} / {}: {:?}", drug, disease, breakdown);
    Ok(breakdown)
  }

  /// Media del Jaccard de dianas entre el fármaco y los fármacos de las
  /// enfermedades que comparten algún gen con `disease`, él incluido.
  pub fn similar_drug_score(&self, drug: &str, disease: &str) -> Result<f64> {
    Ok(self.graph.with_session(|s| similar_drug_score_in(s, drug, disease))?)
  }

  /// Compuestos compartidos con los fármacos de referencia de la enfermedad
  /// (o, si no tiene, de sus enfermedades relacionadas), normalizados por
  /// `comparaciones × 5` y acotados a 1.
  pub fn chemical_similarity_score(&self, drug: &str, disease: &str) -> Result<f64> {
    Ok(self.graph.with_session(|s| chemical_similarity_score_in(s, drug, disease))?)
  }

  pub fn molecular_similarity(&self, a: &str, b: &str) -> Result<f64> {
    self.similarity.molecular_similarity(a, b)
  }

  /// Variante usada al descubrir candidatos: 0.3 · score básico + 0.3 ·
  /// Jaccard de genes + 0.2 · Jaccard de rutas + 0.2 · similitud molecular
  /// con los fármacos de las enfermedades similares. Si falla algún término
  /// extra, se devuelve el score básico.
  pub fn comprehensive_score(&self, drug: &str, disease: &str) -> Result<f64> {
    match self.similar_disease_drugs(disease) {
      Ok(related) => self.comprehensive_with(drug, disease, &related),
      Err(e) => {
        warn!("score completo de {} / {} degradado al básico: {}", drug, disease, e);
        self.score(drug, disease)
      }
    }
  }

  fn comprehensive_with(&self, drug: &str, disease: &str, related: &[CanonicalId]) -> Result<f64> {
    let base = self.score(drug, disease)?;
    match self.comprehensive_terms(drug, disease, related) {
      Ok((genes, pathways, molecular)) => Ok(clamp_unit(COMPREHENSIVE_BASE * base
                                                        + COMPREHENSIVE_GENES * genes
                                                        + COMPREHENSIVE_PATHWAYS * pathways
                                                        + COMPREHENSIVE_MOLECULAR * molecular)),
      Err(e) => {
        warn!("score completo de {} / {} degradado al básico: {}", drug, disease, e);
        Ok(base)
      }
    }
  }

  fn comprehensive_terms(&self, drug: &str, disease: &str, related: &[CanonicalId]) -> Result<(f64, f64, f64)> {
    engine_session(&self.graph, |s| {
      let genes = jaccard_slices(&s.genes_for_disease(disease)?, &s.gene_targets_for_drug(drug)?);
      let pathways = jaccard_slices(&s.pathways_for_disease(disease)?, &s.pathways_for_drug(drug)?);
      let mut total = 0.0;
      let mut count = 0usize;
      for other in related {
        total += self.similarity.molecular_similarity_in(s, drug, other)?;
        count += 1;
      }
      let molecular = if count == 0 { 0.0 } else { total / count as f64 };
      Ok((genes, pathways, molecular))
    })
  }

  fn similar_disease_drugs(&self, disease: &str) -> Result<Vec<CanonicalId>> {
    let similar = self.discovery.similar_diseases(disease)?;
    self.drugs_of(&similar)
  }

  fn drugs_of(&self, similar: &[SimilarDisease]) -> Result<Vec<CanonicalId>> {
    let drugs: IndexSet<CanonicalId> = self.graph.with_session(|s| {
                                                   let mut drugs = IndexSet::new();
                                                   for sim in similar {
                                                     drugs.extend(s.drugs_for_disease(&sim.disease_id)?);
                                                   }
                                                   Ok(drugs)
                                                 })?;
    Ok(drugs.into_iter().collect())
  }

  /// Fármacos registrados para la enfermedad, ordenados por score. Si no
  /// tiene ninguno se pasa a `discover`. Los fallos de un fármaco concreto se
  /// registran y se descartan.
  pub fn rank(&self, disease: &str, max_results: usize) -> Result<Vec<DrugRepurposingResult>> {
    let drugs = self.graph.drugs_for_disease(disease)?;
    if drugs.is_empty() {
      info!("{} no tiene fármacos registrados: se buscan candidatos", disease);
      return self.discover(disease, max_results);
    }
    self.score_candidates(disease, drugs, ScoreMode::Base, max_results)
  }

  /// Página `[offset, offset + limit)` del ranking completo.
  pub fn rank_page(&self, disease: &str, offset: usize, limit: usize) -> Result<Vec<DrugRepurposingResult>> {
    let all = self.rank(disease, usize::MAX)?;
    if offset >= all.len() {
      return Ok(Vec::new());
    }
    Ok(all.into_iter().skip(offset).take(limit).collect())
  }

  /// Candidatos para una enfermedad sin fármacos registrados.
  ///
  /// Parte de los fármacos de las enfermedades similares. Si hay menos de
  /// `3 × max_results`, añade los candidatos estructurales y después los
  /// fármacos que actúan sobre los genes de la enfermedad. Cada candidato se
  /// puntúa con el score completo.
  pub fn discover(&self, disease: &str, max_results: usize) -> Result<Vec<DrugRepurposingResult>> {
    if !self.graph.exists(EntityKind::Disease, disease)? {
      return Err(EngineError::NotFound { kind: EntityKind::Disease, id: disease.to_string() });
    }
    if !self.graph.drugs_for_disease(disease)?.is_empty() {
      return self.rank(disease, max_results);
    }
    let similar = self.discovery.similar_diseases(disease)?;
    let related = self.drugs_of(&similar)?;
    let wanted = max_results.saturating_mul(CANDIDATE_POOL_FACTOR);
    let mut candidates: IndexSet<CanonicalId> = related.iter().cloned().collect();
    if candidates.len() < wanted {
      match self.discovery.structural_candidates_from(disease, &similar) {
        Ok(extra) => candidates.extend(extra),
        Err(e) => warn!("sin candidatos estructurales para {}: {}", disease, e),
      }
    }
    if candidates.len() < wanted {
      let targeting: IndexSet<CanonicalId> = self.graph.with_session(|s| {
                                                       let mut drugs = IndexSet::new();
                                                       for gene in s.genes_for_disease(disease)? {
                                                         drugs.extend(s.drugs_targeting_gene(&gene)?);
                                                       }
                                                       Ok(drugs)
                                                     })?;
      candidates.extend(targeting);
    }
    info!("{}: {} enfermedades similares, {} candidatos", disease, similar.len(), candidates.len());
    if candidates.is_empty() {
      return Ok(Vec::new());
    }
    self.score_candidates(disease,
                          candidates.into_iter().collect(),
                          ScoreMode::Comprehensive(Arc::new(related)),
                          max_results)
  }

  fn score_candidates(&self,
                      disease: &str,
                      candidates: Vec<CanonicalId>,
                      mode: ScoreMode,
                      max_results: usize)
                      -> Result<Vec<DrugRepurposingResult>> {
    let me = self.clone();
    let disease_id = disease.to_string();
    let batch = ParallelMap::new("scoring", &self.settings);
    let mut results = batch.run(candidates, move |drug| me.build_result(&drug, &disease_id, &mode))?;
    results.sort_by(DrugRepurposingResult::ranking_order);
    results.truncate(max_results);
    Ok(results)
  }

  fn build_result(&self, drug: &str, disease: &str, mode: &ScoreMode) -> Result<DrugRepurposingResult> {
    let score = match mode {
      ScoreMode::Base => self.score(drug, disease)?,
      ScoreMode::Comprehensive(related) => self.comprehensive_with(drug, disease, related)?,
    };
    let (name, mechanism, indication) = self.graph.with_session(|s| {
                                                    Ok((s.display_name(EntityKind::Drug, drug)?,
                                                        self.mechanism_in(s, drug)?,
                                                        indication_in(s, drug)?))
                                                  })?;
    Ok(DrugRepurposingResult::new(drug, name, disease, score)?.with_mechanism(mechanism)
                                                               .with_indication(indication))
  }

  /// Resultado de un par con los campos extendidos rellenos.
  pub fn drug_details(&self, drug: &str, disease: &str) -> Result<DrugRepurposingResult> {
    let breakdown = self.score_breakdown(drug, disease)?;
    let result = self.build_result(drug, disease, &ScoreMode::Base)?;
    let evidence = format!("Evidencia basada en análisis de rutas y estudios preclínicos. \
                            Cobertura de genes {:.2}, de rutas {:.2}, afinidad con fármacos similares {:.2} \
                            y similitud química {:.2}.",
                           breakdown.gene_overlap, breakdown.pathway_overlap, breakdown.similar_drugs, breakdown.chemical);
    Ok(result.with_extended(ExtendedDetails { evidence_details: evidence,
                                              adverse_effects: ADVERSE_EFFECTS.to_string(),
                                              dosage_information: DOSAGE.to_string() }))
  }

  pub fn orphan_diseases(&self) -> Result<Vec<CanonicalId>> {
    Ok(self.graph.diseases_without_drugs()?)
  }

  /// Candidatos para las primeras `max_diseases` enfermedades huérfanas. Las
  /// que fallan o no tienen candidatos no aparecen.
  pub fn candidates_for_orphans(&self,
                                max_per_disease: usize,
                                max_diseases: usize)
                                -> Result<IndexMap<CanonicalId, Vec<DrugRepurposingResult>>> {
    let mut out = IndexMap::new();
    for disease in self.orphan_diseases()?.into_iter().take(max_diseases) {
      match self.discover(&disease, max_per_disease) {
        Ok(found) if !found.is_empty() => {
          out.insert(disease, found);
        }
        Ok(_) => debug!("{}: sin candidatos", disease),
        Err(e) => warn!("{}: descubrimiento fallido: {}", disease, e),
      }
    }
    Ok(out)
  }

  /// Mecanismo inferido de los alias del fármaco; si no, la descripción del
  /// colaborador externo; si no, un texto neutro.
  fn mechanism_in(&self, s: &mut GraphSession<'_>, drug: &str) -> std::result::Result<String, RepositoryError> {
    for alias in s.aliases(EntityKind::Drug, drug)? {
      let lower = alias.to_lowercase();
      if MECHANISM_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Ok(format!("Mecanismo inferido de los alias: {}", alias));
      }
    }
    match self.descriptions.describe(EntityKind::Drug, drug) {
      Ok(Some(text)) if !text.trim().is_empty() => return Ok(text),
      Ok(_) => {}
      Err(e) => warn!("sin descripción externa para {}: {}", drug, e),
    }
    Ok(UNKNOWN_MECHANISM.to_string())
  }
}

fn indication_in(s: &mut GraphSession<'_>, drug: &str) -> std::result::Result<String, RepositoryError> {
  let mut names = Vec::new();
  for disease in s.diseases_for_drug(drug)? {
    names.push(s.display_name(EntityKind::Disease, &disease)?);
  }
  if names.is_empty() {
    Ok(NO_INDICATIONS.to_string())
  } else {
    Ok(format!("Aprobado actualmente para: {}", names.join(", ")))
  }
}

fn similar_drug_score_in(s: &mut GraphSession<'_>,
                         drug: &str,
                         disease: &str)
                         -> std::result::Result<f64, RepositoryError> {
  let targets = s.gene_targets_for_drug(drug)?;
  let mut others: IndexSet<CanonicalId> = IndexSet::new();
  for related in s.related_diseases(disease)? {
    others.extend(s.drugs_for_disease(&related)?);
  }
  let mut total = 0.0;
  let mut count = 0usize;
  for other in &others {
    let other_targets = s.gene_targets_for_drug(other)?;
    if targets.is_empty() && other_targets.is_empty() {
      continue;
    }
    total += jaccard_slices(&targets, &other_targets);
    count += 1;
  }
  Ok(if count == 0 { 0.0 } else { total / count as f64 })
}

fn chemical_similarity_score_in(s: &mut GraphSession<'_>,
                                drug: &str,
                                disease: &str)
                                -> std::result::Result<f64, RepositoryError> {
  let compounds = s.compounds_for_drug(drug)?;
  let mut reference: IndexSet<String> = s.drugs_for_disease(disease)?.into_iter().collect();
  if reference.is_empty() {
    for related in s.related_diseases(disease)? {
      reference.extend(s.drugs_for_disease(&related)?);
    }
  }
  let mut comparisons = 0usize;
  let mut shared = 0usize;
  for other in &reference {
    let other_compounds = s.compounds_for_drug(other)?;
    if compounds.is_empty() && other_compounds.is_empty() {
      continue;
    }
    comparisons += 1;
    shared += intersection_size(&compounds, &other_compounds);
  }
  if comparisons == 0 {
    return Ok(0.0);
  }
  Ok((shared as f64 / (comparisons as f64 * SHARED_COMPOUNDS_FOR_FULL_SCORE)).min(1.0))
}
