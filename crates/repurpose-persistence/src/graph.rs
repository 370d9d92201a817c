//! Accesor del grafo de entidades.
//!
//! `GraphSession` ejecuta consultas sobre una conexión que aporta el llamador
//! (varias consultas bajo un mismo lease). `EntityGraph` es la fachada
//! compartible: abre una sesión por llamada o por lote con `with_session`.
//!
//! Cada asociación intenta primero su tabla de enlace directo y, si la tabla
//! falta o no devuelve filas para ese id, recurre a una cadena de inferencia
//! de varios saltos. Los resultados se deduplican conservando el orden.
use crate::cache::EntityCache;
use crate::capabilities::{SchemaCapabilities, SchemaTable};
use crate::errors::RepositoryError;
use crate::pool::{ConnectionPool, DbConn};
use crate::schema;
use diesel::prelude::*;
use diesel::sql_types::Text;
use indexmap::IndexSet;
use repurpose_domain::{CanonicalId, DomainError, Entity, EntityKind, InteractionEdge, NodeRef, SubRelation};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Longitud mínima de palabra de alias usada para buscar compuestos.
const MIN_COMPOUND_WORD: usize = 4;

fn dedup(ids: impl IntoIterator<Item = String>) -> Vec<String> {
  ids.into_iter().collect::<IndexSet<_>>().into_iter().collect()
}

#[derive(QueryableByName)]
struct IdRow {
  #[diesel(sql_type = Text)]
  id: String,
}

#[derive(Debug, Queryable)]
struct InteractionRow {
  id: i32,
  source_name: String,
  target_name: String,
  relation_type: Option<String>,
  source_type: String,
  target_type: String,
}

/// Interacción con el nombre visible del destino ya resuelto.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedInteraction {
  pub edge: InteractionEdge,
  pub target_name: String,
}

macro_rules! link_lookup {
  ($($(#[$meta:meta])* $name:ident: $table:ident [$cap:ident] $from:ident -> $to:ident;)*) => {
    $(
      $(#[$meta])*
      fn $name(&mut self, keys: &[String]) -> Result<Vec<CanonicalId>, RepositoryError> {
        if keys.is_empty() || !self.caps.has(SchemaTable::$cap) {
          return Ok(Vec::new());
        }
        let rows = schema::$table::table.filter(schema::$table::$from.eq_any(keys))
                                        .select(schema::$table::$to)
                                        .load::<String>(self.conn())?;
        Ok(dedup(rows))
      }
    )*
  };
}

pub struct GraphSession<'a> {
  conn: &'a mut DbConn,
  caps: &'a SchemaCapabilities,
  cache: &'a EntityCache,
}

impl<'a> GraphSession<'a> {
  pub fn new(conn: &'a mut DbConn, caps: &'a SchemaCapabilities, cache: &'a EntityCache) -> Self {
    Self { conn, caps, cache }
  }

  fn conn(&mut self) -> &mut DbConn {
    self.conn
  }

  fn has(&self, table: SchemaTable) -> bool {
    self.caps.has(table)
  }

  link_lookup! {
    genes_of_diseases: gene_diseases [GeneDiseases] disease_id -> gene_id;
    diseases_of_genes: gene_diseases [GeneDiseases] gene_id -> disease_id;
    drugs_of_diseases: disease_drugs [DiseaseDrugs] disease_id -> drug_id;
    diseases_of_drugs: disease_drugs [DiseaseDrugs] drug_id -> disease_id;
    pathways_of_genes: gene_pathways [GenePathways] gene_id -> pathway_id;
    genes_of_pathways: gene_pathways [GenePathways] pathway_id -> gene_id;
    pathways_of_drugs: drug_pathways [DrugPathways] drug_id -> pathway_id;
    drugs_of_pathways: drug_pathways [DrugPathways] pathway_id -> drug_id;
    genes_of_drugs: drug_genes [DrugGenes] drug_id -> gene_id;
    drugs_of_genes: drug_genes [DrugGenes] gene_id -> drug_id;
    compounds_of_drugs: drug_compounds [DrugCompounds] drug_id -> compound_id;
  }

  // ---------------- alias e identidad ----------------

  /// Resuelve un alias a su id canónico. `Ok(None)` si no existe; un alias
  /// vacío es un error de validación.
  pub fn resolve(&mut self, kind: EntityKind, alias: &str) -> Result<Option<CanonicalId>, RepositoryError> {
    let alias = alias.trim();
    if alias.is_empty() {
      return Err(DomainError::ValidationError(format!("alias vacío para {}", kind)).into());
    }
    if !self.has(SchemaTable::aliases_of(kind)) {
      log::debug!("Sin tabla {}; '{}' no se puede resolver", kind.alias_table(), alias);
      return Ok(None);
    }
    let sql = format!("SELECT {col} AS id FROM {table} WHERE alias = ? ORDER BY {col} LIMIT 1",
                      col = kind.id_column(),
                      table = kind.alias_table());
    let row = diesel::sql_query(sql).bind::<Text, _>(alias).get_result::<IdRow>(self.conn()).optional()?;
    Ok(row.map(|r| r.id))
  }

  /// Alias registrados para un id, en el orden almacenado.
  pub fn aliases(&mut self, kind: EntityKind, id: &str) -> Result<Vec<String>, RepositoryError> {
    if !self.has(SchemaTable::aliases_of(kind)) {
      return Ok(Vec::new());
    }
    let sql = format!("SELECT alias AS id FROM {} WHERE {} = ?", kind.alias_table(), kind.id_column());
    let rows = diesel::sql_query(sql).bind::<Text, _>(id).load::<IdRow>(self.conn())?;
    Ok(dedup(rows.into_iter().map(|r| r.id)))
  }

  /// Primer alias del id, o el propio id si no tiene ninguno.
  pub fn display_name(&mut self, kind: EntityKind, id: &str) -> Result<String, RepositoryError> {
    if let Some(name) = self.cache.display_name(kind, id) {
      return Ok(name);
    }
    let name = self.aliases(kind, id)?.into_iter().next().unwrap_or_else(|| id.to_string());
    self.cache.store_display_name(kind, id, &name);
    Ok(name)
  }

  pub fn exists(&mut self, kind: EntityKind, id: &str) -> Result<bool, RepositoryError> {
    let sql = if self.has(SchemaTable::entities_of(kind)) {
      format!("SELECT id FROM {} WHERE id = ? LIMIT 1", kind.entity_table())
    } else if self.has(SchemaTable::aliases_of(kind)) {
      format!("SELECT {col} AS id FROM {} WHERE {col} = ? LIMIT 1", kind.alias_table(), col = kind.id_column())
    } else {
      return Ok(false);
    };
    let row = diesel::sql_query(sql).bind::<Text, _>(id).get_result::<IdRow>(self.conn()).optional()?;
    Ok(row.is_some())
  }

  /// Objeto de valor de la entidad, con su nombre visible.
  pub fn entity(&mut self, kind: EntityKind, id: &str) -> Result<Option<Entity>, RepositoryError> {
    if !self.exists(kind, id)? {
      return Ok(None);
    }
    let name = self.display_name(kind, id)?;
    Ok(Some(kind.entity(id, name)))
  }

  // ---------------- asociaciones directas ----------------

  pub fn genes_for_disease(&mut self, disease: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    self.genes_of_diseases(&[disease.to_string()])
  }

  pub fn diseases_for_gene(&mut self, gene: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    self.diseases_of_genes(&[gene.to_string()])
  }

  pub fn drugs_for_disease(&mut self, disease: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    self.drugs_of_diseases(&[disease.to_string()])
  }

  pub fn diseases_for_drug(&mut self, drug: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    self.diseases_of_drugs(&[drug.to_string()])
  }

  pub fn pathways_for_gene(&mut self, gene: &str) -> Result<Vec<String>, RepositoryError> {
    self.pathways_of_genes(&[gene.to_string()])
  }

  pub fn genes_in_pathway(&mut self, pathway: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    self.genes_of_pathways(&[pathway.to_string()])
  }

  // ---------------- asociaciones inferidas ----------------

  /// Rutas de los genes de la enfermedad.
  pub fn pathways_for_disease(&mut self, disease: &str) -> Result<Vec<String>, RepositoryError> {
    let genes = self.genes_for_disease(disease)?;
    self.pathways_of_genes(&genes)
  }

  /// Enfermedades asociadas a los genes de la ruta.
  pub fn diseases_for_pathway(&mut self, pathway: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    let genes = self.genes_in_pathway(pathway)?;
    self.diseases_of_genes(&genes)
  }

  /// `DrugPathways`; si no hay filas, rutas de los genes diana del fármaco
  /// (directos o, en su defecto, los de sus enfermedades).
  pub fn pathways_for_drug(&mut self, drug: &str) -> Result<Vec<String>, RepositoryError> {
    let key = [drug.to_string()];
    let direct = self.pathways_of_drugs(&key)?;
    if !direct.is_empty() {
      return Ok(direct);
    }
    let mut genes = self.genes_of_drugs(&key)?;
    if genes.is_empty() {
      let diseases = self.diseases_of_drugs(&key)?;
      genes = self.genes_of_diseases(&diseases)?;
    }
    log::debug!("Rutas de {} inferidas desde {} genes", drug, genes.len());
    self.pathways_of_genes(&genes)
  }

  /// `DrugGenes`; si no, genes de sus rutas; si no, genes de las
  /// enfermedades que trata.
  pub fn gene_targets_for_drug(&mut self, drug: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    let key = [drug.to_string()];
    let direct = self.genes_of_drugs(&key)?;
    if !direct.is_empty() {
      return Ok(direct);
    }
    let pathways = self.pathways_of_drugs(&key)?;
    let via_pathways = self.genes_of_pathways(&pathways)?;
    if !via_pathways.is_empty() {
      log::debug!("Dianas de {} inferidas por rutas", drug);
      return Ok(via_pathways);
    }
    let diseases = self.diseases_of_drugs(&key)?;
    log::debug!("Dianas de {} inferidas por {} enfermedades", drug, diseases.len());
    self.genes_of_diseases(&diseases)
  }

  /// `DrugGenes` (o fármacos de las enfermedades del gen) más los fármacos
  /// unidos al gen por aristas de interacción en cualquier sentido.
  pub fn drugs_targeting_gene(&mut self, gene: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    let key = [gene.to_string()];
    let mut drugs = self.drugs_of_genes(&key)?;
    if drugs.is_empty() {
      let diseases = self.diseases_of_genes(&key)?;
      drugs = self.drugs_of_diseases(&diseases)?;
    }
    let node = NodeRef::new(EntityKind::Gene, gene);
    let linked = self.edges_touching(&node)?
                     .into_iter()
                     .filter_map(|e| e.other_end(&node).filter(|n| n.is_drug()).map(|n| n.id.clone()))
                     .collect::<Vec<_>>();
    drugs.extend(linked);
    Ok(dedup(drugs))
  }

  /// `DrugPathways` (o fármacos que actúan sobre genes de la ruta) más los
  /// fármacos con aristas de interacción hacia la ruta.
  pub fn drugs_in_pathway(&mut self, pathway: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    let key = [pathway.to_string()];
    let mut drugs = self.drugs_of_pathways(&key)?;
    if drugs.is_empty() {
      let genes = self.genes_of_pathways(&key)?;
      drugs = self.drugs_of_genes(&genes)?;
    }
    if self.has(SchemaTable::Interaction) {
      use schema::interaction::dsl as it;
      let drug_tag = EntityKind::Drug.as_str();
      let sources = it::interaction.filter(it::target_name.eq(pathway).and(it::source_type.eq(drug_tag)))
                                   .select(it::source_name)
                                   .load::<String>(self.conn())?;
      let targets = it::interaction.filter(it::source_name.eq(pathway).and(it::target_type.eq(drug_tag)))
                                   .select(it::target_name)
                                   .load::<String>(self.conn())?;
      drugs.extend(sources);
      drugs.extend(targets);
    }
    Ok(dedup(drugs))
  }

  /// `DrugCompounds`; si no hay filas, compuestos cuyo alias contiene alguna
  /// palabra (de al menos cuatro letras) de los alias del fármaco.
  pub fn compounds_for_drug(&mut self, drug: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    let direct = self.compounds_of_drugs(&[drug.to_string()])?;
    if !direct.is_empty() || !self.has(SchemaTable::CompoundAliases) {
      return Ok(direct);
    }
    let words: IndexSet<String> = self.aliases(EntityKind::Drug, drug)?
                                      .iter()
                                      .flat_map(|alias| {
                                        alias.split(|c: char| !c.is_alphanumeric())
                                             .filter(|w| w.chars().count() >= MIN_COMPOUND_WORD)
                                             .map(str::to_lowercase)
                                             .collect::<Vec<_>>()
                                      })
                                      .collect();
    let mut found = Vec::new();
    for word in words {
      use schema::compound_aliases::dsl as ca;
      let ids = ca::compound_aliases.filter(ca::alias.like(format!("%{}%", word)))
                                    .select(ca::compound_id)
                                    .load::<String>(self.conn())?;
      found.extend(ids);
    }
    Ok(dedup(found))
  }

  /// Otras enfermedades que comparten al menos un gen con `disease`.
  pub fn related_diseases(&mut self, disease: &str) -> Result<Vec<CanonicalId>, RepositoryError> {
    let genes = self.genes_for_disease(disease)?;
    Ok(self.diseases_of_genes(&genes)?.into_iter().filter(|d| d != disease).collect())
  }

  // ---------------- estructuras ----------------

  /// SMILES de un fármaco o compuesto, memorizado (incluida la ausencia).
  pub fn structure(&mut self, kind: EntityKind, id: &str) -> Result<Option<Arc<str>>, RepositoryError> {
    if let Some(hit) = self.cache.structure(kind, id) {
      return Ok(hit.as_option());
    }
    let smiles = match kind {
      EntityKind::Drug if self.has(SchemaTable::DrugStructures) => {
        use schema::drug_structures::dsl as ds;
        ds::drug_structures.filter(ds::drug_id.eq(id))
                           .select(ds::smiles)
                           .first::<Option<String>>(self.conn())
                           .optional()?
                           .flatten()
      }
      EntityKind::Compound if self.has(SchemaTable::CompoundStructures) => {
        use schema::compound_structures::dsl as cs;
        cs::compound_structures.filter(cs::compound_id.eq(id))
                               .select(cs::smiles)
                               .first::<Option<String>>(self.conn())
                               .optional()?
                               .flatten()
      }
      _ => None,
    };
    Ok(self.cache.store_structure(kind, id, smiles.as_deref()).as_option())
  }

  // ---------------- interacciones ----------------

  /// Aristas que tocan el nodo, comprobando ambos sentidos.
  pub fn edges_touching(&mut self, node: &NodeRef) -> Result<Vec<InteractionEdge>, RepositoryError> {
    if !self.has(SchemaTable::Interaction) {
      return Ok(Vec::new());
    }
    use schema::interaction::dsl as it;
    let tag = node.kind.as_str();
    let rows = it::interaction.filter(it::source_name.eq(&node.id).and(it::source_type.eq(tag)))
                              .or_filter(it::target_name.eq(&node.id).and(it::target_type.eq(tag)))
                              .order(it::id)
                              .load::<InteractionRow>(self.conn())?;
    self.edges_from_rows(rows)
  }

  /// Vecinos distintos del nodo, en orden de aparición.
  pub fn neighbours(&mut self, node: &NodeRef) -> Result<Vec<NodeRef>, RepositoryError> {
    let mut seen = IndexSet::new();
    for edge in self.edges_touching(node)? {
      if let Some(other) = edge.other_end(node) {
        if other != node {
          seen.insert(other.clone());
        }
      }
    }
    Ok(seen.into_iter().collect())
  }

  /// Interacciones cuyo origen es el id del alias dado; los destinos llevan
  /// su nombre visible.
  pub fn interactions_by_source(&mut self, kind: EntityKind, alias: &str)
                                -> Result<Vec<ResolvedInteraction>, RepositoryError> {
    let Some(id) = self.resolve(kind, alias)? else {
      return Ok(Vec::new());
    };
    if !self.has(SchemaTable::Interaction) {
      return Ok(Vec::new());
    }
    use schema::interaction::dsl as it;
    let rows = it::interaction.filter(it::source_name.eq(&id)).order(it::id).load::<InteractionRow>(self.conn())?;
    let edges = self.edges_from_rows(rows)?;
    let mut out = Vec::with_capacity(edges.len());
    for edge in edges {
      let target_name = self.display_name(edge.target.kind, &edge.target.id)?;
      out.push(ResolvedInteraction { edge, target_name });
    }
    Ok(out)
  }

  fn edges_from_rows(&mut self, rows: Vec<InteractionRow>) -> Result<Vec<InteractionEdge>, RepositoryError> {
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let mut subs: HashMap<i32, Vec<SubRelation>> = HashMap::new();
    if !ids.is_empty() && self.has(SchemaTable::Subtype) {
      use schema::subtype::dsl as st;
      let sub_rows = st::subtype.filter(st::interaction_id.eq_any(&ids))
                                .order(st::id)
                                .select((st::interaction_id, st::name, st::value))
                                .load::<(i32, Option<String>, Option<String>)>(self.conn())?;
      for (interaction_id, name, value) in sub_rows {
        subs.entry(interaction_id)
            .or_default()
            .push(SubRelation { name: name.unwrap_or_default(), value: value.unwrap_or_default() });
      }
    }
    let mut edges = Vec::with_capacity(rows.len());
    for row in rows {
      let (Some(source_kind), Some(target_kind)) = (EntityKind::parse(&row.source_type), EntityKind::parse(&row.target_type))
      else {
        log::debug!("Interacción {} con tipos fuera del conjunto ({} -> {}); se omite",
                    row.id, row.source_type, row.target_type);
        continue;
      };
      let edge = InteractionEdge::new(NodeRef::new(source_kind, row.source_name),
                                      NodeRef::new(target_kind, row.target_name),
                                      row.relation_type).with_sub_relations(subs.remove(&row.id).unwrap_or_default());
      edges.push(edge);
    }
    Ok(edges)
  }

  // ---------------- listados ----------------

  pub fn all_drug_ids(&mut self) -> Result<Vec<CanonicalId>, RepositoryError> {
    if self.has(SchemaTable::Drugs) {
      use schema::drugs::dsl as d;
      return Ok(dedup(d::drugs.select(d::id).order(d::id).load::<String>(self.conn())?));
    }
    if self.has(SchemaTable::DrugAliases) {
      use schema::drug_aliases::dsl as da;
      return Ok(dedup(da::drug_aliases.select(da::drug_id).order(da::drug_id).load::<String>(self.conn())?));
    }
    Ok(Vec::new())
  }

  pub fn all_disease_ids(&mut self) -> Result<Vec<CanonicalId>, RepositoryError> {
    if self.has(SchemaTable::Diseases) {
      use schema::diseases::dsl as d;
      return Ok(dedup(d::diseases.select(d::id).order(d::id).load::<String>(self.conn())?));
    }
    if self.has(SchemaTable::DiseaseAliases) {
      use schema::disease_aliases::dsl as da;
      return Ok(dedup(da::disease_aliases.select(da::disease_id).order(da::disease_id).load::<String>(self.conn())?));
    }
    Ok(Vec::new())
  }

  /// Enfermedades sin ningún fármaco registrado (huérfanas).
  pub fn diseases_without_drugs(&mut self) -> Result<Vec<CanonicalId>, RepositoryError> {
    let all = self.all_disease_ids()?;
    if !self.has(SchemaTable::DiseaseDrugs) {
      return Ok(all);
    }
    use schema::disease_drugs::dsl as dd;
    let treated: HashSet<String> = dd::disease_drugs.select(dd::disease_id).load::<String>(self.conn())?.into_iter().collect();
    Ok(all.into_iter().filter(|d| !treated.contains(d)).collect())
  }
}

macro_rules! leased {
  ($($(#[$meta:meta])* $name:ident($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
    $(
      $(#[$meta])*
      pub fn $name(&self, $($arg: $ty),*) -> Result<$ret, RepositoryError> {
        self.with_session(|s| s.$name($($arg),*))
      }
    )*
  };
}

/// Fachada compartible del accesor: pool, capacidades y caché.
#[derive(Debug, Clone)]
pub struct EntityGraph {
  pool: Arc<ConnectionPool>,
  caps: Arc<SchemaCapabilities>,
  cache: Arc<EntityCache>,
}

impl EntityGraph {
  /// Sondea el esquema con una conexión del pool.
  pub fn new(pool: Arc<ConnectionPool>, cache: Arc<EntityCache>) -> Result<Self, RepositoryError> {
    let caps = pool.with_connection(|conn| SchemaCapabilities::detect(conn))?;
    Ok(Self::with_capabilities(pool, caps, cache))
  }

  pub fn with_capabilities(pool: Arc<ConnectionPool>, caps: SchemaCapabilities, cache: Arc<EntityCache>) -> Self {
    Self { pool, caps: Arc::new(caps), cache }
  }

  pub fn pool(&self) -> &Arc<ConnectionPool> {
    &self.pool
  }

  pub fn capabilities(&self) -> &SchemaCapabilities {
    &self.caps
  }

  pub fn cache(&self) -> &Arc<EntityCache> {
    &self.cache
  }

  /// Sesión sobre una conexión gestionada por el llamador.
  pub fn session<'a>(&'a self, conn: &'a mut DbConn) -> GraphSession<'a> {
    GraphSession::new(conn, &self.caps, &self.cache)
  }

  /// Ejecuta un lote de consultas bajo un único lease del pool.
  pub fn with_session<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where F: FnOnce(&mut GraphSession<'_>) -> Result<T, RepositoryError>
  {
    let mut conn = self.pool.acquire()?;
    let mut session = GraphSession::new(&mut conn, &self.caps, &self.cache);
    f(&mut session)
  }

  leased! {
    resolve(kind: EntityKind, alias: &str) -> Option<CanonicalId>;
    aliases(kind: EntityKind, id: &str) -> Vec<String>;
    display_name(kind: EntityKind, id: &str) -> String;
    exists(kind: EntityKind, id: &str) -> bool;
    entity(kind: EntityKind, id: &str) -> Option<Entity>;
    genes_for_disease(disease: &str) -> Vec<CanonicalId>;
    diseases_for_gene(gene: &str) -> Vec<CanonicalId>;
    drugs_for_disease(disease: &str) -> Vec<CanonicalId>;
    diseases_for_drug(drug: &str) -> Vec<CanonicalId>;
    pathways_for_gene(gene: &str) -> Vec<String>;
    genes_in_pathway(pathway: &str) -> Vec<CanonicalId>;
    pathways_for_disease(disease: &str) -> Vec<String>;
    diseases_for_pathway(pathway: &str) -> Vec<CanonicalId>;
    pathways_for_drug(drug: &str) -> Vec<String>;
    gene_targets_for_drug(drug: &str) -> Vec<CanonicalId>;
    drugs_targeting_gene(gene: &str) -> Vec<CanonicalId>;
    drugs_in_pathway(pathway: &str) -> Vec<CanonicalId>;
    compounds_for_drug(drug: &str) -> Vec<CanonicalId>;
    related_diseases(disease: &str) -> Vec<CanonicalId>;
    structure(kind: EntityKind, id: &str) -> Option<Arc<str>>;
    edges_touching(node: &NodeRef) -> Vec<InteractionEdge>;
    neighbours(node: &NodeRef) -> Vec<NodeRef>;
    interactions_by_source(kind: EntityKind, alias: &str) -> Vec<ResolvedInteraction>;
    all_drug_ids() -> Vec<CanonicalId>;
    all_disease_ids() -> Vec<CanonicalId>;
    diseases_without_drugs() -> Vec<CanonicalId>;
  }
}
