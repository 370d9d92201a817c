use repurpose_domain::{ComparisonMethod, EntityKind, NodeRef};
use repurpose_engine::{CandidateDiscovery, EngineSettings, SimilarityEngine};
use repurpose_persistence::fixtures::SqliteFixture;
use repurpose_persistence::{ConnectionPool, EntityCache, EntityGraph, PoolConfig, SchemaTable};
use std::sync::Arc;
use std::time::Duration;

const ASPIRIN: &str = "CC(=O)Oc1ccccc1C(=O)O";
const CISPLATIN: &str = "N->[Pt](Cl)(Cl)<-N";
const CARBOPLATIN: &str = "N->[Pt]1(OC(=O)C2(CCC2)C(=O)O1)<-N";

fn parts(fx: &SqliteFixture) -> (EntityGraph, Arc<SimilarityEngine>, CandidateDiscovery) {
  let cfg = PoolConfig { max_size: 8, max_wait: Duration::from_secs(2), ..fx.pool_config() };
  let pool = Arc::new(ConnectionPool::new(cfg).expect("pool"));
  let graph = EntityGraph::new(pool, Arc::new(EntityCache::new())).expect("grafo");
  let similarity = Arc::new(SimilarityEngine::new(graph.clone()));
  let settings = EngineSettings { max_workers: 4, ..EngineSettings::default() };
  let discovery = CandidateDiscovery::new(graph.clone(), Arc::clone(&similarity), settings);
  (graph, similarity, discovery)
}

#[test]
fn similar_diseases_are_capped_thresholded_and_sorted() {
  use SchemaTable::*;
  let fx = SqliteFixture::new().expect("fixture");
  fx.alias(EntityKind::Disease, "target", "T").unwrap();
  fx.link(GeneDiseases, "GT", "T").unwrap().link(GeneDiseases, "GX", "T").unwrap();
  fx.link(DiseaseDrugs, "T", "Z").unwrap();
  for i in 1..=12 {
    let id = format!("D{:02}", i);
    fx.alias(EntityKind::Disease, &format!("disease {}", i), &id).unwrap();
    fx.link(GeneDiseases, "GT", &id).unwrap();
    fx.link(DiseaseDrugs, &id, "Z").unwrap();
    if i <= 4 {
      fx.link(GeneDiseases, "GX", &id).unwrap();
    }
  }
  // Sólo un gen compartido: 3 puntos, por debajo del umbral.
  fx.link(GeneDiseases, "GX", "LOW").unwrap();
  let (_, _, discovery) = parts(&fx);
  let similar = discovery.similar_diseases("T").unwrap();
  assert_eq!(similar.len(), 10);
  assert!(similar.iter().all(|d| d.score >= 5));
  assert!(similar.windows(2).all(|w| w[0].score >= w[1].score));
  let ids: Vec<&str> = similar.iter().map(|d| d.disease_id.as_str()).collect();
  assert_eq!(ids, vec!["D01", "D02", "D03", "D04", "D05", "D06", "D07", "D08", "D09", "D10"]);
  assert_eq!(similar[0].score, 3 + 3 + 5);
  assert_eq!(similar[9].score, 3 + 5);
  assert!(!ids.contains(&"T") && !ids.contains(&"LOW"));
}

fn network_fixture() -> SqliteFixture {
  let fx = SqliteFixture::new().expect("fixture");
  let gene = |id: &str| NodeRef::new(EntityKind::Gene, id);
  let drug = |id: &str| NodeRef::new(EntityKind::Drug, id);
  let compound = |id: &str| NodeRef::new(EntityKind::Compound, id);
  fx.interaction(&gene("G1"), &gene("G2"), Some("binding"), &[]).unwrap();
  fx.interaction(&gene("G2"), &drug("X"), Some("activation"), &[]).unwrap();
  fx.interaction(&drug("X"), &gene("G3"), Some("inhibition"), &[]).unwrap();
  fx.interaction(&compound("C1"), &gene("G2"), None, &[]).unwrap();
  fx.interaction(&compound("C1"), &gene("G4"), None, &[]).unwrap();
  fx.interaction(&drug("Y"), &gene("G4"), Some("inhibition"), &[]).unwrap();
  fx
}

#[test]
fn network_traversal_stops_at_drugs_and_depth() {
  let fx = network_fixture();
  let (_, _, discovery) = parts(&fx);

  let one = discovery.network_traversal("G1", 1).unwrap();
  assert_eq!(one.expanded, vec![NodeRef::new(EntityKind::Gene, "G1")]);
  assert!(one.candidates.is_empty());

  let two = discovery.network_traversal("G1", 2).unwrap();
  assert_eq!(two.candidates.iter().map(String::as_str).collect::<Vec<_>>(), vec!["X"]);

  let three = discovery.network_traversal("G1", 3).unwrap();
  assert_eq!(three.candidates, two.candidates);
  assert_eq!(three.depth_reached, 3);

  let four = discovery.network_traversal("G1", 4).unwrap();
  assert_eq!(four.candidates.iter().map(String::as_str).collect::<Vec<_>>(), vec!["X", "Y"]);
  assert!(four.expanded.iter().all(|n| !n.is_drug()));
  // Ningún nodo se expande dos veces.
  let mut unique = four.expanded.clone();
  unique.sort();
  unique.dedup();
  assert_eq!(unique.len(), four.expanded.len());
  // G3 sólo es alcanzable a través del fármaco X.
  assert!(!four.expanded.contains(&NodeRef::new(EntityKind::Gene, "G3")));
  assert_eq!(four.visited, 6);

  assert!(discovery.network_candidates("G1", 0).unwrap().is_empty());
  assert!(discovery.network_candidates("NOPE", 3).unwrap().is_empty());
}

#[test]
fn structural_candidates_keep_close_structures_only() {
  use EntityKind::*;
  use SchemaTable::*;
  let fx = SqliteFixture::new().expect("fixture");
  fx.alias(Disease, "target", "T").unwrap().alias(Disease, "neighbour", "D1").unwrap();
  fx.link(GeneDiseases, "G", "T").unwrap().link(GeneDiseases, "G", "D1").unwrap();
  fx.link(GenePathways, "G", "P").unwrap();
  fx.alias(Drug, "seed", "S").unwrap().alias(Drug, "twin", "TW").unwrap().alias(Drug, "ethanol", "ET").unwrap();
  fx.link(DiseaseDrugs, "D1", "S").unwrap();
  fx.structure(Drug, "S", Some(ASPIRIN)).unwrap();
  fx.structure(Drug, "TW", Some(ASPIRIN)).unwrap();
  fx.structure(Drug, "ET", Some("CCO")).unwrap();
  let (_, _, discovery) = parts(&fx);
  let found = discovery.structural_candidates("T").unwrap();
  assert!(found.contains("TW"), "{:?}", found);
  assert!(!found.contains("ET"), "{:?}", found);
  assert!(!found.contains("S"));
}

#[test]
fn organometallic_structures_use_property_comparator_end_to_end() {
  use EntityKind::*;
  let fx = SqliteFixture::without(&[SchemaTable::DrugCompounds]).expect("fixture");
  fx.alias(Drug, "cisplatin", "PT1").unwrap().alias(Drug, "carboplatin", "PT2").unwrap();
  fx.structure(Drug, "PT1", Some(CISPLATIN)).unwrap();
  fx.structure(Drug, "PT2", Some(CARBOPLATIN)).unwrap();
  let (_, similarity, _) = parts(&fx);
  let cmp = similarity.structural_similarity_of(Drug, "PT1", "PT2").unwrap().expect("ambas estructuras");
  assert_eq!(cmp.method, ComparisonMethod::PropertyFallback);
  assert!((0.0..=1.0).contains(&cmp.score));
  let molecular = similarity.molecular_similarity("PT1", "PT2").unwrap();
  assert!((0.0..=1.0).contains(&molecular));
  // Sin dianas ni rutas sólo cuenta la parte estructural.
  assert!((molecular - 0.7 * cmp.score).abs() < 1e-9);
  assert!(similarity.profile_count() >= 2);
}

#[test]
fn missing_structures_fall_back_to_compounds() {
  use EntityKind::*;
  use SchemaTable::*;
  let fx = SqliteFixture::new().expect("fixture");
  fx.alias(Drug, "first", "A").unwrap().alias(Drug, "second", "B").unwrap();
  fx.link(DrugCompounds, "A", "K1").unwrap().link(DrugCompounds, "B", "K1").unwrap();
  fx.link(DrugCompounds, "B", "K2").unwrap();
  let (_, similarity, _) = parts(&fx);
  // Sin estructura de compuestos: Jaccard de ids (1/2).
  assert!((similarity.compound_similarity("A", "B").unwrap() - 0.5).abs() < 1e-9);
  assert!((similarity.molecular_similarity("A", "B").unwrap() - 0.6 * 0.5).abs() < 1e-9);
  fx.structure(Compound, "K1", Some(ASPIRIN)).unwrap();
  fx.structure(Compound, "K2", Some(ASPIRIN)).unwrap();
  similarity.graph().cache().clear();
  assert!((similarity.compound_similarity("A", "B").unwrap() - 1.0).abs() < 1e-9);
}
