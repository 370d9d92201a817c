use repurpose_domain::{DomainError, EntityKind, NodeRef};
use repurpose_persistence::fixtures::SqliteFixture;
use repurpose_persistence::{CachedStructure, ConnectionPool, EntityCache, EntityGraph, RepositoryError, SchemaTable};
use std::sync::Arc;

const ASPIRIN: &str = "CC(=O)Oc1ccccc1C(=O)O";

fn seed(fx: &SqliteFixture) -> Result<(), RepositoryError> {
  use EntityKind::*;
  use SchemaTable::*;
  fx.alias(Gene, "BRCA1", "G1")?.alias(Gene, "TP53", "G2")?.alias(Gene, "EGFR", "G3")?;
  fx.alias(Disease, "breast cancer", "D1")?.alias(Disease, "ovarian cancer", "D2")?.alias(Disease, "lung cancer", "D3")?;
  fx.alias(Drug, "olaparib inhibitor", "A")?.alias(Drug, "gefitinib", "B")?.alias(Drug, "aspirin", "C")?;
  fx.alias(Compound, "olaparib base", "C1")?.alias(Compound, "gefitinib hydrochloride", "C2")?;
  fx.link(GeneDiseases, "G1", "D1")?.link(GeneDiseases, "G1", "D2")?.link(GeneDiseases, "G2", "D1")?.link(GeneDiseases, "G3", "D3")?;
  fx.link(DiseaseDrugs, "D1", "A")?.link(DiseaseDrugs, "D3", "B")?;
  fx.link(GenePathways, "G1", "P1")?.link(GenePathways, "G2", "P1")?.link(GenePathways, "G3", "P2")?;
  fx.link(DrugPathways, "A", "P1")?;
  fx.link(DrugGenes, "A", "G1")?.link(DrugGenes, "B", "G3")?;
  fx.link(DrugCompounds, "A", "C1")?;
  fx.structure(Drug, "A", Some(ASPIRIN))?.structure(Drug, "B", None)?.structure(Compound, "C1", Some("CCO"))?;
  fx.interaction(&NodeRef::new(Gene, "G2"), &NodeRef::new(Drug, "C"), Some("activation"), &[("phosphorylation", "+p")])?;
  fx.interaction(&NodeRef::new(Drug, "B"), &NodeRef::new(Gene, "G1"), Some("inhibition"), &[])?;
  Ok(())
}

fn seeded(skip: &[SchemaTable]) -> SqliteFixture {
  let fx = SqliteFixture::without(skip).expect("fixture");
  seed(&fx).expect("sembrado");
  fx
}

fn graph_over(fx: &SqliteFixture) -> EntityGraph {
  let pool = Arc::new(ConnectionPool::new(fx.pool_config()).expect("pool"));
  EntityGraph::new(pool, Arc::new(EntityCache::new())).expect("grafo")
}

fn ids(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn alias_resolution_distinguishes_missing_from_empty() {
  let fx = seeded(&[]);
  let graph = graph_over(&fx);
  assert_eq!(graph.resolve(EntityKind::Gene, "BRCA1").unwrap(), Some("G1".to_string()));
  assert_eq!(graph.resolve(EntityKind::Gene, " TP53 ").unwrap(), Some("G2".to_string()));
  assert_eq!(graph.resolve(EntityKind::Gene, "NOPE").unwrap(), None);
  assert!(matches!(graph.resolve(EntityKind::Gene, "   "),
                   Err(RepositoryError::Domain(DomainError::ValidationError(_)))));
  // Mismo alias, otro tipo de entidad.
  assert_eq!(graph.resolve(EntityKind::Drug, "BRCA1").unwrap(), None);
  assert_eq!(graph.display_name(EntityKind::Drug, "C").unwrap(), "aspirin");
  assert_eq!(graph.display_name(EntityKind::Drug, "ZZ").unwrap(), "ZZ");
  assert!(graph.exists(EntityKind::Disease, "D2").unwrap());
  assert!(!graph.exists(EntityKind::Disease, "D9").unwrap());
  let entity = graph.entity(EntityKind::Gene, "G3").unwrap().expect("gen existente");
  assert_eq!(entity.name(), "EGFR");
}

#[test]
fn direct_and_multi_hop_associations() {
  let fx = seeded(&[]);
  let graph = graph_over(&fx);
  assert_eq!(graph.genes_for_disease("D1").unwrap(), ids(&["G1", "G2"]));
  assert_eq!(graph.diseases_for_gene("G1").unwrap(), ids(&["D1", "D2"]));
  assert_eq!(graph.drugs_for_disease("D2").unwrap(), Vec::<String>::new());
  assert_eq!(graph.pathways_for_disease("D1").unwrap(), ids(&["P1"]));
  assert_eq!(graph.diseases_for_pathway("P1").unwrap(), ids(&["D1", "D2"]));
  assert_eq!(graph.genes_in_pathway("P1").unwrap(), ids(&["G1", "G2"]));
  assert_eq!(graph.related_diseases("D2").unwrap(), ids(&["D1"]));
  assert_eq!(graph.gene_targets_for_drug("A").unwrap(), ids(&["G1"]));
  assert_eq!(graph.pathways_for_drug("B").unwrap(), ids(&["P2"]));
  // DrugGenes directo más la arista B -> G1.
  assert_eq!(graph.drugs_targeting_gene("G1").unwrap(), ids(&["A", "B"]));
  // Sin DrugGenes para G2: fármacos de sus enfermedades más la arista G2 -> C.
  assert_eq!(graph.drugs_targeting_gene("G2").unwrap(), ids(&["A", "C"]));
  assert_eq!(graph.drugs_in_pathway("P1").unwrap(), ids(&["A"]));
  assert_eq!(graph.drugs_in_pathway("P2").unwrap(), ids(&["B"]));
  assert_eq!(graph.compounds_for_drug("A").unwrap(), ids(&["C1"]));
}

#[test]
fn missing_link_tables_fall_back_to_inference() {
  let fx = seeded(&[SchemaTable::DrugGenes, SchemaTable::DrugPathways, SchemaTable::DrugCompounds]);
  let graph = graph_over(&fx);
  assert!(!graph.capabilities().has(SchemaTable::DrugGenes));
  // Dianas y rutas inferidas a través de la enfermedad tratada (D1).
  assert_eq!(graph.gene_targets_for_drug("A").unwrap(), ids(&["G1", "G2"]));
  assert_eq!(graph.pathways_for_drug("A").unwrap(), ids(&["P1"]));
  // Fármacos de la ruta vía sus genes: sin DrugGenes no hay ninguno.
  assert!(graph.drugs_in_pathway("P1").unwrap().is_empty());
  // Compuestos por palabras del alias del fármaco.
  assert_eq!(graph.compounds_for_drug("A").unwrap(), ids(&["C1"]));
  assert_eq!(graph.compounds_for_drug("B").unwrap(), ids(&["C2"]));
  assert!(graph.compounds_for_drug("C").unwrap().is_empty());
}

#[test]
fn drug_targets_fall_back_to_pathway_genes_first() {
  let fx = seeded(&[SchemaTable::DrugGenes]);
  let graph = graph_over(&fx);
  assert_eq!(graph.gene_targets_for_drug("A").unwrap(), ids(&["G1", "G2"]));
  assert!(graph.gene_targets_for_drug("C").unwrap().is_empty());
}

#[test]
fn structures_are_memoized_with_absent_sentinel() {
  let fx = seeded(&[]);
  let graph = graph_over(&fx);
  assert_eq!(graph.structure(EntityKind::Drug, "A").unwrap().as_deref(), Some(ASPIRIN));
  assert_eq!(graph.structure(EntityKind::Drug, "B").unwrap(), None);
  assert_eq!(graph.structure(EntityKind::Drug, "ZZ").unwrap(), None);
  assert_eq!(graph.structure(EntityKind::Compound, "C1").unwrap().as_deref(), Some("CCO"));
  let cache = graph.cache();
  assert_eq!(cache.structure(EntityKind::Drug, "B"), Some(CachedStructure::Absent));
  assert_eq!(cache.structure_count(), 4);
  // Un cambio en la base no se ve hasta vaciar la caché.
  fx.structure(EntityKind::Drug, "B", Some("CCN")).unwrap();
  assert_eq!(graph.structure(EntityKind::Drug, "B").unwrap(), None);
  cache.clear();
  assert_eq!(graph.structure(EntityKind::Drug, "B").unwrap().as_deref(), Some("CCN"));
}

#[test]
fn interaction_edges_are_read_in_both_directions() {
  let fx = seeded(&[]);
  let graph = graph_over(&fx);
  let g2 = NodeRef::new(EntityKind::Gene, "G2");
  let edges = graph.edges_touching(&g2).unwrap();
  assert_eq!(edges.len(), 1);
  assert_eq!(edges[0].relation.as_deref(), Some("activation"));
  assert_eq!(edges[0].sub_relations.len(), 1);
  assert_eq!(edges[0].sub_relations[0].name, "phosphorylation");
  let g1 = NodeRef::new(EntityKind::Gene, "G1");
  assert_eq!(graph.neighbours(&g1).unwrap(), vec![NodeRef::new(EntityKind::Drug, "B")]);
  let resolved = graph.interactions_by_source(EntityKind::Gene, "TP53").unwrap();
  assert_eq!(resolved.len(), 1);
  assert_eq!(resolved[0].target_name, "aspirin");
  assert!(graph.interactions_by_source(EntityKind::Gene, "NOPE").unwrap().is_empty());
}

#[test]
fn absent_interaction_table_yields_empty_results() {
  let fx = seeded(&[SchemaTable::Interaction, SchemaTable::Subtype]);
  let graph = graph_over(&fx);
  assert!(graph.edges_touching(&NodeRef::new(EntityKind::Gene, "G2")).unwrap().is_empty());
  assert_eq!(graph.drugs_targeting_gene("G1").unwrap(), ids(&["A"]));
}

#[test]
fn listings_and_orphans() {
  let fx = seeded(&[]);
  let graph = graph_over(&fx);
  assert_eq!(graph.all_drug_ids().unwrap(), ids(&["A", "B", "C"]));
  assert_eq!(graph.all_disease_ids().unwrap(), ids(&["D1", "D2", "D3"]));
  assert_eq!(graph.diseases_without_drugs().unwrap(), ids(&["D2"]));
}

#[test]
fn caller_supplied_connection_batches_queries_under_one_lease() {
  let fx = seeded(&[]);
  let graph = graph_over(&fx);
  let pool = Arc::clone(graph.pool());
  let mut conn = pool.acquire().expect("lease");
  let mut session = graph.session(&mut conn);
  let genes = session.genes_for_disease("D1").unwrap();
  let drugs = session.drugs_for_disease("D1").unwrap();
  let name = session.display_name(EntityKind::Drug, &drugs[0]).unwrap();
  assert_eq!(genes.len(), 2);
  assert_eq!(name, "olaparib inhibitor");
  assert_eq!(pool.in_use_connections(), 1);
  drop(conn);
  let batched = graph.with_session(|s| {
                       let d = s.resolve(EntityKind::Disease, "lung cancer")?.unwrap_or_default();
                       s.drugs_for_disease(&d)
                     })
                     .unwrap();
  assert_eq!(batched, ids(&["B"]));
  assert_eq!(pool.in_use_connections(), 0);
}
