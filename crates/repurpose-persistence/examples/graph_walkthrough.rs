use repurpose_domain::{EntityKind, NodeRef};
use repurpose_persistence::fixtures::SqliteFixture;
use repurpose_persistence::{ConnectionPool, EntityCache, EntityGraph, SchemaTable};
use std::sync::Arc;

fn main() {
  // Base temporaria sin tabla DrugGenes: las dianas del fármaco se infieren.
  let fx = SqliteFixture::without(&[SchemaTable::DrugGenes]).expect("no se pudo crear la base temporaria");
  fx.alias(EntityKind::Gene, "BRCA1", "hsa:672").expect("alias");
  fx.alias(EntityKind::Disease, "breast cancer", "H00031").expect("alias");
  fx.alias(EntityKind::Drug, "olaparib", "D09726").expect("alias");
  fx.link(SchemaTable::GeneDiseases, "hsa:672", "H00031").expect("enlace");
  fx.link(SchemaTable::DiseaseDrugs, "H00031", "D09726").expect("enlace");
  fx.interaction(&NodeRef::new(EntityKind::Drug, "D09726"),
                 &NodeRef::new(EntityKind::Gene, "hsa:672"),
                 Some("inhibition"),
                 &[("indirect effect", "-")])
    .expect("interacción");

  let pool = Arc::new(ConnectionPool::new(fx.pool_config()).expect("pool"));
  let graph = EntityGraph::new(Arc::clone(&pool), Arc::new(EntityCache::new())).expect("grafo");
  println!("tablas ausentes: {:?}", graph.capabilities().missing());

  let drug = graph.resolve(EntityKind::Drug, "olaparib").expect("consulta").expect("alias conocido");
  println!("olaparib -> {}", drug);
  println!("dianas inferidas: {:?}", graph.gene_targets_for_drug(&drug).expect("dianas"));
  for edge in graph.edges_touching(&NodeRef::new(EntityKind::Gene, "hsa:672")).expect("aristas") {
    println!("{} -[{}]-> {} {:?}",
             edge.source,
             edge.relation.as_deref().unwrap_or("?"),
             edge.target,
             edge.sub_relations);
  }
  println!("{:?}", pool.statistics());
  pool.shutdown();
}
