use approx::assert_relative_eq;
use repurpose_domain::{DomainError, EntityKind, EvidenceLevel};
use repurpose_engine::{DescriptionSource, EngineError, EngineSettings, ScoringOrchestrator, StaticDescriptions};
use repurpose_persistence::fixtures::SqliteFixture;
use repurpose_persistence::{ConnectionPool, EntityCache, EntityGraph, PoolConfig, SchemaTable};
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(fx: &SqliteFixture) -> ScoringOrchestrator {
  let cfg = PoolConfig { max_size: 8, max_wait: Duration::from_secs(2), ..fx.pool_config() };
  let pool = Arc::new(ConnectionPool::new(cfg).expect("pool"));
  let graph = EntityGraph::new(pool, Arc::new(EntityCache::new())).expect("grafo");
  let settings = EngineSettings { max_workers: 4, batch_timeout: Duration::from_secs(30), ..EngineSettings::default() };
  ScoringOrchestrator::new(graph, settings)
}

/// D1 y D2 comparten el gen G; el fármaco A actúa sobre G y sólo está
/// registrado para D1.
fn shared_gene_scenario(with_pathway: bool) -> SqliteFixture {
  use EntityKind::*;
  use SchemaTable::*;
  let fx = SqliteFixture::new().expect("fixture");
  fx.alias(Gene, "BRCA1", "G").unwrap();
  fx.alias(Disease, "breast cancer", "D1").unwrap().alias(Disease, "ovarian cancer", "D2").unwrap();
  fx.alias(Drug, "olaparib", "A").unwrap();
  fx.link(GeneDiseases, "G", "D1").unwrap().link(GeneDiseases, "G", "D2").unwrap();
  fx.link(DiseaseDrugs, "D1", "A").unwrap();
  fx.link(DrugGenes, "A", "G").unwrap();
  if with_pathway {
    fx.link(GenePathways, "G", "P1").unwrap();
  }
  fx
}

#[test]
fn orphan_disease_surfaces_drug_of_gene_sharing_disease() {
  let fx = shared_gene_scenario(false);
  let engine = orchestrator(&fx);
  let ranked = engine.rank("D2", 5).expect("rank");
  assert_eq!(ranked.len(), 1);
  let a = &ranked[0];
  assert_eq!(a.drug_id(), "A");
  assert_eq!(a.drug_name(), "olaparib");
  assert_eq!(a.disease_id(), "D2");
  assert!(a.score() > 0.0);
  // Score básico: 0.4 · genes + 0.2 · A frente a sí mismo como fármaco de D1.
  // Completo: 0.3 · básico + 0.3 · Jaccard de genes.
  assert_relative_eq!(a.score(), 0.3 * (0.4 + 0.2) + 0.3 * 1.0, epsilon = 1e-9);
  assert_eq!(a.evidence_level(), EvidenceLevel::StrongPreclinical);
  assert_eq!(a.current_indication(), "Aprobado actualmente para: breast cancer");
}

#[test]
fn shared_pathway_makes_diseases_similar_and_transfers_drugs() {
  let fx = shared_gene_scenario(true);
  let engine = orchestrator(&fx);
  let similar = engine.discovery().similar_diseases("D2").unwrap();
  assert_eq!(similar.len(), 1);
  assert_eq!(similar[0].disease_id, "D1");
  assert_eq!(similar[0].score, 5);
  let found = engine.discover("D2", 3).unwrap();
  assert_eq!(found.iter().map(|r| r.drug_id()).collect::<Vec<_>>(), vec!["A"]);
  assert!(found[0].score() > 0.0 && found[0].score() <= 1.0);
}

#[test]
fn rank_scores_recorded_drugs_with_base_score() {
  let fx = shared_gene_scenario(true);
  let engine = orchestrator(&fx);
  let ranked = engine.rank("D1", 5).unwrap();
  assert_eq!(ranked.len(), 1);
  // Genes y rutas cubiertos por completo; sin otros fármacos de referencia.
  assert_relative_eq!(ranked[0].score(), 0.4 + 0.25, epsilon = 1e-9);
  assert_eq!(ranked[0].evidence_level(), EvidenceLevel::ModerateClinical);
  let breakdown = engine.score_breakdown("A", "D1").unwrap();
  assert_relative_eq!(breakdown.gene_overlap, 1.0);
  assert_relative_eq!(breakdown.pathway_overlap, 1.0);
  assert_eq!(breakdown.similar_drugs, 0.0);
  assert_eq!(breakdown.chemical, 0.0);
}

#[test]
fn sub_scores_count_the_drug_among_its_references() {
  let fx = shared_gene_scenario(true);
  fx.link(SchemaTable::DrugCompounds, "A", "C1").unwrap();
  let engine = orchestrator(&fx);
  // D1 comparte G con D2; A es el único fármaco de referencia.
  assert_relative_eq!(engine.similar_drug_score("A", "D2").unwrap(), 1.0, epsilon = 1e-9);
  assert_relative_eq!(engine.chemical_similarity_score("A", "D1").unwrap(), 0.2, epsilon = 1e-9);
  assert_relative_eq!(engine.chemical_similarity_score("A", "D2").unwrap(), 0.2, epsilon = 1e-9);
  // Mismos compuestos, dianas y rutas que sí mismo.
  assert_relative_eq!(engine.molecular_similarity("A", "A").unwrap(), 1.0, epsilon = 1e-9);

  let base = 0.4 + 0.25 + 0.2 + 0.15 * 0.2;
  assert_relative_eq!(engine.score("A", "D2").unwrap(), base, epsilon = 1e-9);
  let comprehensive = 0.3 * base + 0.3 + 0.2 + 0.2;
  assert_relative_eq!(engine.comprehensive_score("A", "D2").unwrap(), comprehensive, epsilon = 1e-9);
  let found = engine.discover("D2", 3).unwrap();
  assert_relative_eq!(found[0].score(), comprehensive, epsilon = 1e-9);
  assert_eq!(found[0].evidence_level(), EvidenceLevel::StrongClinical);
}

fn rich_fixture() -> SqliteFixture {
  use EntityKind::*;
  use SchemaTable::*;
  let fx = SqliteFixture::new().expect("fixture");
  for (alias, id) in [("BRCA1", "G1"), ("TP53", "G2"), ("EGFR", "G3"), ("KRAS", "G4")] {
    fx.alias(Gene, alias, id).unwrap();
  }
  for (alias, id) in [("breast cancer", "D1"), ("ovarian cancer", "D2"), ("lung cancer", "D3"), ("rare syndrome", "D4")] {
    fx.alias(Disease, alias, id).unwrap();
  }
  for (alias, id) in [("olaparib", "A"), ("PARP inhibitor", "A"), ("gefitinib", "B"), ("erlotinib", "C"), ("aspirin", "E")] {
    fx.alias(Drug, alias, id).unwrap();
  }
  for (gene, disease) in [("G1", "D1"), ("G2", "D1"), ("G1", "D2"), ("G3", "D3"), ("G4", "D3"), ("G3", "D4")] {
    fx.link(GeneDiseases, gene, disease).unwrap();
  }
  for (disease, drug) in [("D1", "A"), ("D1", "E"), ("D2", "A"), ("D3", "B"), ("D3", "C")] {
    fx.link(DiseaseDrugs, disease, drug).unwrap();
  }
  for (gene, pathway) in [("G1", "P1"), ("G2", "P1"), ("G3", "P2"), ("G4", "P2")] {
    fx.link(GenePathways, gene, pathway).unwrap();
  }
  for (drug, gene) in [("A", "G1"), ("B", "G3"), ("C", "G3"), ("C", "G4"), ("E", "G2")] {
    fx.link(DrugGenes, drug, gene).unwrap();
  }
  for (drug, compound) in [("B", "K1"), ("C", "K1"), ("C", "K2")] {
    fx.link(DrugCompounds, drug, compound).unwrap();
  }
  fx.structure(Drug, "A", Some("O=C1NN=C(Cc2ccccc12)c1ccccc1")).unwrap();
  fx.structure(Drug, "B", Some("COc1cc2ncnc(Nc3ccccc3)c2cc1OC")).unwrap();
  fx.structure(Drug, "C", Some("COCCOc1cc2ncnc(Nc3ccccc3)c2cc1OCCOC")).unwrap();
  fx
}

#[test]
fn every_score_stays_in_unit_interval() {
  let fx = rich_fixture();
  let engine = orchestrator(&fx);
  for drug in ["A", "B", "C", "E", "ZZ"] {
    for disease in ["D1", "D2", "D3", "D4", "D9"] {
      let score = engine.score(drug, disease).unwrap();
      assert!((0.0..=1.0).contains(&score), "{} / {} -> {}", drug, disease, score);
      let comprehensive = engine.comprehensive_score(drug, disease).unwrap();
      assert!((0.0..=1.0).contains(&comprehensive), "{} / {} -> {}", drug, disease, comprehensive);
    }
  }
  let chemical = engine.chemical_similarity_score("B", "D3").unwrap();
  // B frente a B y frente a C: un compuesto compartido en cada comparación.
  assert_relative_eq!(chemical, 2.0 / (2.0 * 5.0), epsilon = 1e-9);
}

#[test]
fn ranking_is_sorted_by_score_then_id() {
  let fx = rich_fixture();
  let engine = orchestrator(&fx);
  let ranked = engine.rank("D3", 10).unwrap();
  assert_eq!(ranked.len(), 2);
  for pair in ranked.windows(2) {
    assert!(pair[0].score() > pair[1].score()
            || (pair[0].score() == pair[1].score() && pair[0].drug_id() < pair[1].drug_id()));
  }
  let page = engine.rank_page("D3", 1, 5).unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].drug_id(), ranked[1].drug_id());
  assert!(engine.rank_page("D3", 2, 5).unwrap().is_empty());
  assert_eq!(engine.rank("D3", 1).unwrap().len(), 1);
}

#[test]
fn mechanism_comes_from_aliases_then_descriptions() {
  let fx = rich_fixture();
  let descriptions = StaticDescriptions::new().with(EntityKind::Drug, "E", "inhibe la ciclooxigenasa");
  let engine = orchestrator(&fx).with_descriptions(Arc::new(descriptions));
  let ranked = engine.rank("D1", 5).unwrap();
  let a = ranked.iter().find(|r| r.drug_id() == "A").expect("A");
  assert_eq!(a.mechanism_of_action(), "Mecanismo inferido de los alias: PARP inhibitor");
  assert_eq!(a.current_indication(), "Aprobado actualmente para: breast cancer, ovarian cancer");
  let e = ranked.iter().find(|r| r.drug_id() == "E").expect("E");
  assert_eq!(e.mechanism_of_action(), "inhibe la ciclooxigenasa");
}

struct Unreachable;

impl DescriptionSource for Unreachable {
  fn describe(&self, _kind: EntityKind, id: &str) -> Result<Option<String>, DomainError> {
    Err(DomainError::ExternalError(format!("servicio caído consultando {}", id)))
  }
}

#[test]
fn unavailable_description_service_only_reduces_text() {
  let fx = rich_fixture();
  let engine = orchestrator(&fx).with_descriptions(Arc::new(Unreachable));
  let ranked = engine.rank("D3", 5).unwrap();
  assert_eq!(ranked.len(), 2);
  assert!(ranked.iter().all(|r| r.mechanism_of_action().starts_with("No hay información detallada")));
}

#[test]
fn drug_details_fill_extended_fields() {
  let fx = rich_fixture();
  let engine = orchestrator(&fx);
  let details = engine.drug_details("B", "D4").unwrap();
  let extended = details.extended().expect("campos extendidos");
  assert!(extended.evidence_details.contains("Cobertura de genes 1.00"));
  assert!(!extended.adverse_effects.is_empty());
  assert!(!extended.dosage_information.is_empty());
  assert_eq!(details.current_indication(), "Aprobado actualmente para: lung cancer");
}

#[test]
fn discover_rejects_unknown_diseases_and_delegates_when_drugs_exist() {
  let fx = rich_fixture();
  let engine = orchestrator(&fx);
  match engine.discover("D9", 5) {
    Err(EngineError::NotFound { kind, id }) => {
      assert_eq!(kind, EntityKind::Disease);
      assert_eq!(id, "D9");
    }
    other => panic!("se esperaba NotFound, llegó {:?}", other.map(|v| v.len())),
  }
  let discovered = engine.discover("D3", 5).unwrap();
  let ranked = engine.rank("D3", 5).unwrap();
  assert_eq!(discovered, ranked);
}

#[test]
fn orphan_diseases_get_candidates() {
  let fx = rich_fixture();
  let engine = orchestrator(&fx);
  assert_eq!(engine.orphan_diseases().unwrap(), vec!["D4".to_string()]);
  let found = engine.candidates_for_orphans(3, 5).unwrap();
  assert_eq!(found.len(), 1);
  let d4 = &found["D4"];
  assert!(!d4.is_empty() && d4.len() <= 3);
  // D4 comparte G3 y P2 con D3: sus fármacos pasan a ser candidatos.
  let ids: Vec<&str> = d4.iter().map(|r| r.drug_id()).collect();
  assert!(ids.contains(&"B") && ids.contains(&"C"), "{:?}", ids);
  assert!(engine.candidates_for_orphans(3, 0).unwrap().is_empty());
}
