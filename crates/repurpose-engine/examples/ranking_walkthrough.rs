use repurpose_domain::EntityKind;
use repurpose_engine::{EngineSettings, ScoringOrchestrator, StaticDescriptions};
use repurpose_persistence::fixtures::SqliteFixture;
use repurpose_persistence::{ConnectionPool, EntityCache, EntityGraph, SchemaTable};
use std::sync::Arc;

fn main() {
  use EntityKind::*;
  use SchemaTable::*;
  let fx = SqliteFixture::new().expect("no se pudo crear la base temporaria");
  fx.alias(Gene, "BRCA1", "hsa:672").expect("alias");
  fx.alias(Disease, "breast cancer", "H00031").expect("alias");
  fx.alias(Disease, "ovarian cancer", "H00027").expect("alias");
  fx.alias(Drug, "olaparib", "D09726").expect("alias");
  fx.link(GeneDiseases, "hsa:672", "H00031").expect("enlace");
  fx.link(GeneDiseases, "hsa:672", "H00027").expect("enlace");
  fx.link(GenePathways, "hsa:672", "hsa03440").expect("enlace");
  fx.link(DiseaseDrugs, "H00031", "D09726").expect("enlace");
  fx.link(DrugGenes, "D09726", "hsa:672").expect("enlace");
  fx.structure(Drug, "D09726", Some("O=C1NN=C(Cc2ccccc12)c1ccccc1")).expect("estructura");

  let pool = Arc::new(ConnectionPool::new(fx.pool_config()).expect("pool"));
  let graph = EntityGraph::new(Arc::clone(&pool), Arc::new(EntityCache::new())).expect("grafo");
  let descriptions = StaticDescriptions::new().with(Drug, "D09726", "inhibidor de PARP1/PARP2");
  let engine = ScoringOrchestrator::new(graph, EngineSettings::default()).with_descriptions(Arc::new(descriptions));

  // H00027 no tiene fármacos: se buscan candidatos.
  for r in engine.discover("H00027", 5).expect("descubrimiento") {
    println!("{}", r);
    println!("  {}", r.current_indication());
    println!("  {}", r.mechanism_of_action());
  }
  println!("{:?}", engine.score_breakdown("D09726", "H00031").expect("desglose"));
  println!("{:?}", engine.discovery().similar_diseases("H00027").expect("similares"));
  pool.shutdown();
}
