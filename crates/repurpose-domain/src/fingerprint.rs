//! Fingerprints binarios de longitud fija sobre `MolecularGraph`.
//!
//! Tres codificaciones independientes:
//! - `StructuralKeys` (166 bits): claves estructurales predefinidas.
//! - `PublicBank` (881 bits): umbrales de recuento de elementos y anillos,
//!   más pares de átomos, entornos y caminos cortos en rangos fijos.
//! - `ExtendedPath` (1024 bits): caminos lineales de hasta 7 átomos con
//!   hashing, más bits de información de anillos.
use crate::smiles::{BondOrder, MolecularGraph};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Límite de caminos enumerados por molécula.
const MAX_PATHS: usize = 50_000;
const EXTENDED_PATH_BITS: usize = 999;
const EXTENDED_MAX_BONDS: usize = 6;
const FRAGMENT_KEY_OFFSET: usize = 81;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
  len: usize,
  words: Vec<u64>,
}

impl Fingerprint {
  pub fn new(len: usize) -> Self {
    Self { len, words: vec![0; len.div_ceil(64)] }
  }

  /// Activa un bit; los índices fuera de rango se ignoran.
  pub fn set(&mut self, bit: usize) {
    if bit < self.len {
      self.words[bit / 64] |= 1u64 << (bit % 64);
    }
  }

  pub fn get(&self, bit: usize) -> bool {
    bit < self.len && self.words[bit / 64] & (1u64 << (bit % 64)) != 0
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.cardinality() == 0
  }

  pub fn cardinality(&self) -> usize {
    self.words.iter().map(|w| w.count_ones() as usize).sum()
  }

  /// Coeficiente de Tanimoto c / (a + b - c); 0 si ambos están vacíos o si
  /// las longitudes no coinciden.
  pub fn tanimoto(&self, other: &Fingerprint) -> f64 {
    if self.len != other.len {
      return 0.0;
    }
    let common: u32 = self.words.iter().zip(&other.words).map(|(a, b)| (a & b).count_ones()).sum();
    let total = self.cardinality() + other.cardinality() - common as usize;
    if total == 0 {
      0.0
    } else {
      common as f64 / total as f64
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerprintKind {
  StructuralKeys,
  PublicBank,
  ExtendedPath,
}

impl FingerprintKind {
  pub const ALL: [FingerprintKind; 3] =
    [FingerprintKind::StructuralKeys, FingerprintKind::PublicBank, FingerprintKind::ExtendedPath];

  pub fn len(self) -> usize {
    match self {
      FingerprintKind::StructuralKeys => 166,
      FingerprintKind::PublicBank => 881,
      FingerprintKind::ExtendedPath => 1024,
    }
  }

  /// Peso en la similitud estructural combinada.
  pub fn weight(self) -> f64 {
    match self {
      FingerprintKind::StructuralKeys => 0.4,
      FingerprintKind::PublicBank | FingerprintKind::ExtendedPath => 0.3,
    }
  }

  pub fn compute(self, graph: &MolecularGraph) -> Fingerprint {
    let features = Features::new(graph);
    match self {
      FingerprintKind::StructuralKeys => structural_keys(&features),
      FingerprintKind::PublicBank => public_bank(&features),
      FingerprintKind::ExtendedPath => extended_path(&features),
    }
  }
}

/// Los tres fingerprints de una molécula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintSet {
  keys: Fingerprint,
  bank: Fingerprint,
  extended: Fingerprint,
}

impl FingerprintSet {
  pub fn compute(graph: &MolecularGraph) -> Self {
    let features = Features::new(graph);
    Self { keys: structural_keys(&features), bank: public_bank(&features), extended: extended_path(&features) }
  }

  pub fn get(&self, kind: FingerprintKind) -> &Fingerprint {
    match kind {
      FingerprintKind::StructuralKeys => &self.keys,
      FingerprintKind::PublicBank => &self.bank,
      FingerprintKind::ExtendedPath => &self.extended,
    }
  }

  /// Suma ponderada (0.4 / 0.3 / 0.3) de los Tanimoto por tipo.
  pub fn weighted_similarity(&self, other: &FingerprintSet) -> f64 {
    FingerprintKind::ALL.iter().map(|k| k.weight() * self.get(*k).tanimoto(other.get(*k))).sum()
  }

  /// Media simple de los tres Tanimoto.
  pub fn mean_similarity(&self, other: &FingerprintSet) -> f64 {
    FingerprintKind::ALL.iter().map(|k| self.get(*k).tanimoto(other.get(*k))).sum::<f64>() / 3.0
  }
}

fn hash_feature(feature: &str) -> u64 {
  let digest = Sha256::digest(feature.as_bytes());
  let mut bytes = [0u8; 8];
  bytes.copy_from_slice(&digest[..8]);
  u64::from_le_bytes(bytes)
}

fn hashed_bit(feature: &str, offset: usize, width: usize) -> usize {
  offset + (hash_feature(feature) % width as u64) as usize
}

/// Resumen de rasgos de un grafo compartido por los tres fingerprints.
struct Features<'g> {
  graph: &'g MolecularGraph,
  element_counts: HashMap<String, usize>,
  hydrogens: usize,
}

impl<'g> Features<'g> {
  fn new(graph: &'g MolecularGraph) -> Self {
    let mut element_counts = HashMap::new();
    let mut hydrogens = 0;
    for (idx, atom) in graph.atoms().iter().enumerate() {
      *element_counts.entry(atom.element.clone()).or_insert(0) += 1;
      hydrogens += graph.hydrogen_count(idx) as usize;
    }
    Self { graph, element_counts, hydrogens }
  }

  fn count(&self, element: &str) -> usize {
    self.element_counts.get(element).copied().unwrap_or(0)
  }

  fn heavy_atoms(&self) -> usize {
    self.graph.atom_count()
  }

  fn has_bond(&self, a: &str, order: BondOrder, b: &str) -> bool {
    let atoms = self.graph.atoms();
    self.graph.bonds().iter().any(|bond| {
                                bond.order == order
                                && ((atoms[bond.a].element == a && atoms[bond.b].element == b)
                                    || (atoms[bond.a].element == b && atoms[bond.b].element == a))
                              })
  }

  fn atoms_where(&self, pred: impl Fn(usize) -> bool) -> usize {
    (0..self.graph.atom_count()).filter(|&i| pred(i)).count()
  }

  fn element(&self, idx: usize) -> &str {
    &self.graph.atoms()[idx].element
  }

  fn neighbor_bonds(&self, idx: usize) -> impl Iterator<Item = (usize, BondOrder)> + '_ {
    self.graph.neighbors(idx).iter().map(|&(n, b)| (n, self.graph.bonds()[b].order))
  }

  fn rings_of_size(&self, size: usize) -> usize {
    self.graph.rings().iter().filter(|r| r.len() == size).count()
  }

  fn aromatic_rings(&self) -> usize {
    self.graph.rings().iter().filter(|r| self.graph.is_aromatic_ring(r)).count()
  }

  fn hetero_rings(&self) -> usize {
    self.graph.rings().iter().filter(|r| r.iter().any(|&a| self.graph.atoms()[a].is_hetero())).count()
  }

  fn fused_atoms(&self) -> usize {
    let mut membership: HashMap<usize, usize> = HashMap::new();
    for ring in self.graph.rings() {
      for &a in ring {
        *membership.entry(a).or_insert(0) += 1;
      }
    }
    membership.values().filter(|&&n| n > 1).count()
  }

  fn carbonyl_carbon(&self, idx: usize) -> bool {
    self.element(idx) == "C" && self.neighbor_bonds(idx).any(|(n, o)| o == BondOrder::Double && self.element(n) == "O")
  }

  fn bonds_count(&self, order: BondOrder) -> usize {
    self.graph.bonds().iter().filter(|b| b.order == order).count()
  }

  fn hydroxyl(&self, idx: usize) -> bool {
    self.element(idx) == "O" && self.graph.degree(idx) == 1 && self.graph.hydrogen_count(idx) >= 1
  }
}

type KeyRule = fn(&Features) -> bool;

/// Claves estructurales: (bit, regla).
const STRUCTURAL_KEYS: &[(usize, KeyRule)] = &[
  (1, |f| f.atoms_where(|i| f.graph.atoms()[i].isotope.is_some()) > 0),
  (2, |f| f.atoms_where(|i| f.graph.atoms()[i].is_metal()) > 0),
  (3, |f| f.rings_of_size(3) > 0),
  (4, |f| f.rings_of_size(4) > 0),
  (5, |f| f.rings_of_size(5) > 0),
  (6, |f| f.rings_of_size(6) > 0),
  (7, |f| f.rings_of_size(7) > 0),
  (8, |f| f.graph.rings().iter().any(|r| r.len() >= 8)),
  (9, |f| f.count("B") > 0),
  (10, |f| f.count("Si") > 0),
  (11, |f| f.count("P") > 0),
  (12, |f| f.count("S") > 0),
  (13, |f| f.count("F") > 0),
  (14, |f| f.count("Cl") > 0),
  (15, |f| f.count("Br") > 0),
  (16, |f| f.count("I") > 0),
  (17, |f| f.count("N") > 0),
  (18, |f| f.count("O") > 0),
  (19, |f| f.count("N") > 1),
  (20, |f| f.count("O") > 1),
  (21, |f| f.count("O") > 2),
  (22, |f| f.count("O") > 3),
  (23, |f| f.count("N") > 2),
  (24, |f| f.has_bond("C", BondOrder::Triple, "N")),
  (25, |f| f.has_bond("C", BondOrder::Triple, "C")),
  (26, |f| f.has_bond("C", BondOrder::Double, "C")),
  (27, |f| f.has_bond("C", BondOrder::Double, "N")),
  (28, |f| f.has_bond("N", BondOrder::Double, "N")),
  (29, |f| f.has_bond("N", BondOrder::Single, "O") || f.has_bond("N", BondOrder::Double, "O")),
  (30, |f| f.has_bond("S", BondOrder::Double, "O")),
  (31, |f| f.has_bond("P", BondOrder::Double, "O")),
  (32, |f| f.has_bond("S", BondOrder::Single, "S")),
  (33, |f| f.has_bond("N", BondOrder::Single, "N")),
  (34, |f| f.has_bond("O", BondOrder::Single, "O")),
  (35, |f| f.atoms_where(|i| f.carbonyl_carbon(i)) > 0),
  (36, |f| f.atoms_where(|i| f.carbonyl_carbon(i)) > 1),
  (37, |f| f.atoms_where(|i| f.hydroxyl(i)) > 0),
  (38, |f| f.atoms_where(|i| f.hydroxyl(i)) > 1),
  (39, |f| {
    f.atoms_where(|i| f.carbonyl_carbon(i) && f.neighbor_bonds(i).any(|(n, o)| o == BondOrder::Single && f.hydroxyl(n)))
    > 0
  }),
  (40, |f| {
    f.atoms_where(|i| f.carbonyl_carbon(i) && f.neighbor_bonds(i).any(|(n, _)| f.element(n) == "N")) > 0
  }),
  (41, |f| f.atoms_where(|i| f.element(i) == "N" && f.graph.hydrogen_count(i) >= 2) > 0),
  (42, |f| f.atoms_where(|i| f.element(i) == "N" && f.graph.hydrogen_count(i) == 1) > 0),
  (43, |f| f.atoms_where(|i| f.element(i) == "N" && f.graph.degree(i) >= 3 && !f.graph.atoms()[i].aromatic) > 0),
  (44, |f| {
    f.atoms_where(|i| {
       f.element(i) == "O"
       && f.graph.degree(i) == 2
       && f.neighbor_bonds(i).all(|(n, o)| o == BondOrder::Single && f.element(n) == "C" && !f.carbonyl_carbon(n))
     }) > 0
  }),
  (45, |f| f.atoms_where(|i| f.element(i) == "S" && f.graph.hydrogen_count(i) >= 1) > 0),
  (46, |f| f.atoms_where(|i| f.element(i) == "C" && f.graph.hydrogen_count(i) == 3) > 0),
  (47, |f| f.atoms_where(|i| f.element(i) == "C" && f.graph.hydrogen_count(i) == 3) > 1),
  (48, |f| f.atoms_where(|i| f.element(i) == "C" && f.graph.hydrogen_count(i) == 2) > 0),
  (49, |f| f.atoms_where(|i| f.element(i) == "C" && f.graph.degree(i) == 4) > 0),
  (50, |f| f.atoms_where(|i| f.graph.atoms()[i].charge > 0) > 0),
  (51, |f| f.atoms_where(|i| f.graph.atoms()[i].charge < 0) > 0),
  (52, |f| f.atoms_where(|i| f.graph.atoms()[i].is_halogen()) > 1),
  (53, |f| f.atoms_where(|i| f.graph.atoms()[i].is_halogen() && f.graph.is_ring_atom(i)) > 0),
  (54, |f| {
    f.atoms_where(|i| {
       f.graph.atoms()[i].is_halogen() && f.neighbor_bonds(i).any(|(n, _)| f.graph.atoms()[n].aromatic)
     }) > 0
  }),
  (55, |f| f.aromatic_rings() > 0),
  (56, |f| f.aromatic_rings() > 1),
  (57, |f| f.hetero_rings() > 0),
  (58, |f| f.graph.rings().len() > 1),
  (59, |f| f.graph.rings().len() > 2),
  (60, |f| f.fused_atoms() > 0),
  (61, |f| f.atoms_where(|i| f.element(i) == "N" && f.graph.is_ring_atom(i)) > 0),
  (62, |f| f.atoms_where(|i| f.element(i) == "O" && f.graph.is_ring_atom(i)) > 0),
  (63, |f| f.atoms_where(|i| f.element(i) == "S" && f.graph.is_ring_atom(i)) > 0),
  (64, |f| f.atoms_where(|i| f.graph.atoms()[i].aromatic && f.graph.atoms()[i].is_hetero()) > 0),
  (65, |f| {
    f.atoms_where(|i| {
       f.graph.is_ring_atom(i) && f.neighbor_bonds(i).any(|(n, _)| !f.graph.is_ring_atom(n) && f.graph.atoms()[n].is_hetero())
     }) > 0
  }),
  (66, |f| (0..f.graph.bond_count()).any(|b| !f.graph.is_ring_bond(b)) && !f.graph.rings().is_empty()),
  (67, |f| {
    f.graph.bonds().iter().any(|b| {
                             f.element(b.a) == "C"
                             && f.element(b.b) == "C"
                             && f.graph.hydrogen_count(b.a) == 2
                             && f.graph.hydrogen_count(b.b) == 2
                           })
  }),
  (68, |f| f.heavy_atoms() >= 8),
  (69, |f| f.heavy_atoms() >= 16),
  (70, |f| f.heavy_atoms() >= 24),
  (71, |f| f.heavy_atoms() >= 32),
  (72, |f| f.count("C") >= 6),
  (73, |f| f.count("C") >= 12),
  (74, |f| f.atoms_where(|i| f.graph.atoms()[i].is_hetero()) as f64 >= f.heavy_atoms() as f64 * 0.25),
  (75, |f| f.bonds_count(BondOrder::Double) > 1),
  (76, |f| f.graph.bonds().iter().any(|b| b.order == BondOrder::Coordinate)),
  (77, |f| f.hydrogens >= 10),
  (78, |f| f.atoms_where(|i| f.graph.degree(i) == 1) >= 4),
  (79, |f| f.atoms_where(|i| f.element(i) == "N" && f.graph.atoms()[i].aromatic) > 1),
  (80, |f| f.count("S") > 1),
];

fn structural_keys(f: &Features) -> Fingerprint {
  let len = FingerprintKind::StructuralKeys.len();
  let mut fp = Fingerprint::new(len);
  for (bit, rule) in STRUCTURAL_KEYS {
    if rule(f) {
      fp.set(*bit);
    }
  }
  // Bits 81-165: fragmentos de dos átomos con marca de anillo.
  let g = f.graph;
  for (idx, bond) in g.bonds().iter().enumerate() {
    let (a, b) = (g.atoms()[bond.a].label(), g.atoms()[bond.b].label());
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let ring = if g.is_ring_bond(idx) { "@" } else { "" };
    fp.set(hashed_bit(&format!("key:{}{}{}{}", lo, ring, bond.order.symbol(), hi), FRAGMENT_KEY_OFFSET, len - FRAGMENT_KEY_OFFSET));
  }
  fp
}

const ELEMENT_THRESHOLDS: &[(&str, &[usize])] = &[
  ("C", &[2, 4, 8, 16, 32]),
  ("N", &[1, 2, 4, 8]),
  ("O", &[1, 2, 4, 8, 16]),
  ("F", &[1, 2, 4]),
  ("Cl", &[1, 2, 4, 8]),
  ("Br", &[1, 2, 4]),
  ("I", &[1, 2, 4]),
  ("S", &[1, 2, 4, 8]),
  ("P", &[1, 2, 4]),
  ("B", &[1, 2, 4]),
  ("Si", &[1, 2]),
  ("Li", &[1]),
  ("Na", &[1]),
  ("K", &[1]),
  ("Mg", &[1]),
  ("Ca", &[1]),
  ("Al", &[1]),
  ("Se", &[1]),
  ("As", &[1]),
  ("Fe", &[1]),
  ("Pt", &[1]),
  ("Ru", &[1]),
  ("Os", &[1]),
  ("Pd", &[1]),
  ("Rh", &[1]),
  ("Ir", &[1]),
  ("Cu", &[1]),
  ("Zn", &[1]),
  ("Co", &[1]),
  ("Ni", &[1]),
  ("Mn", &[1]),
  ("Au", &[1]),
  ("Hg", &[1]),
  ("Sn", &[1]),
];

const BANK_RING_OFFSET: usize = 115;
const BANK_PAIR_OFFSET: usize = 263;
const BANK_ENV_OFFSET: usize = 327;
const BANK_PATH_OFFSET: usize = 416;

fn public_bank(f: &Features) -> Fingerprint {
  let len = FingerprintKind::PublicBank.len();
  let mut fp = Fingerprint::new(len);
  let g = f.graph;

  // Sección 1: umbrales de recuento (hidrógenos primero).
  let mut bit = 0;
  for threshold in [4, 8, 16, 32] {
    if f.hydrogens >= threshold {
      fp.set(bit);
    }
    bit += 1;
  }
  for (element, thresholds) in ELEMENT_THRESHOLDS {
    for t in thresholds.iter() {
      if f.count(element) >= *t {
        fp.set(bit);
      }
      bit += 1;
    }
  }

  // Sección 2: anillos por tamaño y tipo.
  let mut bit = BANK_RING_OFFSET;
  for size in 3..=10 {
    let n = f.rings_of_size(size);
    for t in 1..=5 {
      if n >= t {
        fp.set(bit);
      }
      bit += 1;
    }
  }
  let nitrogen_rings = g.rings().iter().filter(|r| r.iter().any(|&a| f.element(a) == "N")).count();
  for (value, thresholds) in [(f.aromatic_rings(), &[1, 2, 3, 4][..]), (f.hetero_rings(), &[1, 2, 3, 4][..]), (nitrogen_rings, &[1, 2][..])] {
    for t in thresholds {
      if value >= *t {
        fp.set(bit);
      }
      bit += 1;
    }
  }

  // Sección 3: pares de átomos enlazados.
  for bond in g.bonds() {
    let (a, b) = (g.atoms()[bond.a].label(), g.atoms()[bond.b].label());
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    fp.set(hashed_bit(&format!("pair:{}{}{}", lo, bond.order.symbol(), hi),
                      BANK_PAIR_OFFSET,
                      BANK_ENV_OFFSET - BANK_PAIR_OFFSET));
  }

  // Sección 4: entornos de primer vecino.
  for idx in 0..g.atom_count() {
    let mut neighbors: Vec<String> =
      f.neighbor_bonds(idx).map(|(n, o)| format!("{}{}", o.symbol(), g.atoms()[n].label())).collect();
    neighbors.sort();
    let env = format!("env:{}H{}:{}", g.atoms()[idx].label(), g.hydrogen_count(idx), neighbors.join(","));
    fp.set(hashed_bit(&env, BANK_ENV_OFFSET, BANK_PATH_OFFSET - BANK_ENV_OFFSET));
  }

  // Secciones 5-7: caminos de 2 y 3 enlaces.
  for path in enumerate_paths(g, 3).into_iter().filter(|p| p.bonds >= 2) {
    fp.set(hashed_bit(&format!("path:{}", path.key), BANK_PATH_OFFSET, len - BANK_PATH_OFFSET));
  }
  fp
}

fn extended_path(f: &Features) -> Fingerprint {
  let len = FingerprintKind::ExtendedPath.len();
  let mut fp = Fingerprint::new(len);
  for path in enumerate_paths(f.graph, EXTENDED_MAX_BONDS) {
    fp.set(hashed_bit(&path.key, 0, EXTENDED_PATH_BITS));
  }
  // 25 bits finales: tamaños de anillo, anillos fusionados y aromáticos.
  let mut bit = EXTENDED_PATH_BITS;
  for size in 3..=10 {
    if f.rings_of_size(size) > 0 {
      fp.set(bit);
    }
    bit += 1;
  }
  let fused = f.fused_atoms();
  for t in [1, 2, 4, 8] {
    if fused >= t {
      fp.set(bit);
    }
    bit += 1;
  }
  let aromatic = f.aromatic_rings();
  for t in 1..=4 {
    if aromatic >= t {
      fp.set(bit);
    }
    bit += 1;
  }
  let rings = f.graph.rings().len();
  for t in 1..=9 {
    if rings >= t {
      fp.set(bit);
    }
    bit += 1;
  }
  fp
}

struct LinearPath {
  key: String,
  bonds: usize,
}

/// Enumera caminos simples de hasta `max_bonds` enlaces. Cada camino se
/// representa con la menor de sus dos lecturas para que no dependa del
/// sentido de recorrido.
fn enumerate_paths(graph: &MolecularGraph, max_bonds: usize) -> Vec<LinearPath> {
  let mut out = Vec::new();
  let mut atoms_stack = Vec::new();
  let mut bonds_stack = Vec::new();
  for start in 0..graph.atom_count() {
    atoms_stack.clear();
    bonds_stack.clear();
    atoms_stack.push(start);
    walk(graph, max_bonds, &mut atoms_stack, &mut bonds_stack, &mut out);
    if out.len() >= MAX_PATHS {
      break;
    }
  }
  out
}

fn walk(graph: &MolecularGraph,
        max_bonds: usize,
        atoms: &mut Vec<usize>,
        bonds: &mut Vec<BondOrder>,
        out: &mut Vec<LinearPath>) {
  if out.len() >= MAX_PATHS {
    return;
  }
  out.push(LinearPath { key: path_key(graph, atoms, bonds), bonds: bonds.len() });
  if bonds.len() == max_bonds {
    return;
  }
  let Some(&last) = atoms.last() else {
    return;
  };
  for &(next, bond) in graph.neighbors(last) {
    if atoms.contains(&next) {
      continue;
    }
    atoms.push(next);
    bonds.push(graph.bonds()[bond].order);
    walk(graph, max_bonds, atoms, bonds, out);
    atoms.pop();
    bonds.pop();
  }
}

fn path_key(graph: &MolecularGraph, atoms: &[usize], bonds: &[BondOrder]) -> String {
  let forward = interleave(graph, atoms.iter().copied(), bonds.iter().copied());
  let backward = interleave(graph, atoms.iter().rev().copied(), bonds.iter().rev().copied());
  if forward <= backward {
    forward
  } else {
    backward
  }
}

fn interleave(graph: &MolecularGraph,
              atoms: impl Iterator<Item = usize>,
              mut bonds: impl Iterator<Item = BondOrder>)
              -> String {
  let mut s = String::new();
  for (step, idx) in atoms.enumerate() {
    if step > 0 {
      if let Some(order) = bonds.next() {
        s.push_str(order.symbol());
      }
    }
    s.push_str(&graph.atoms()[idx].label());
  }
  s
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::smiles::{parse_smiles, ParseMode};

  fn set(smiles: &str) -> FingerprintSet {
    FingerprintSet::compute(&parse_smiles(smiles, ParseMode::Strict).unwrap())
  }

  #[test]
  fn fingerprint_lengths_are_fixed() {
    let g = parse_smiles("CC(=O)Oc1ccccc1C(=O)O", ParseMode::Strict).unwrap();
    for kind in FingerprintKind::ALL {
      let fp = kind.compute(&g);
      assert_eq!(fp.len(), kind.len());
      assert!(!fp.is_empty(), "{:?} vacío", kind);
    }
  }

  #[test]
  fn identical_structures_score_one() {
    let a = set("CC(=O)Oc1ccccc1C(=O)O");
    let b = set("CC(=O)Oc1ccccc1C(=O)O");
    assert!((a.weighted_similarity(&b) - 1.0).abs() < 1e-12);
    assert!((a.mean_similarity(&b) - 1.0).abs() < 1e-12);
  }

  #[test]
  fn related_structures_score_higher_than_unrelated() {
    let aspirin = set("CC(=O)Oc1ccccc1C(=O)O");
    let salicylic = set("Oc1ccccc1C(=O)O");
    let hexane = set("CCCCCC");
    let close = aspirin.weighted_similarity(&salicylic);
    let far = aspirin.weighted_similarity(&hexane);
    assert!(close > far, "close={} far={}", close, far);
    assert!((0.0..=1.0).contains(&close) && (0.0..=1.0).contains(&far));
  }

  #[test]
  fn tanimoto_edge_cases() {
    let empty = Fingerprint::new(16);
    assert_eq!(empty.tanimoto(&Fingerprint::new(16)), 0.0);
    let mut a = Fingerprint::new(16);
    a.set(1);
    a.set(3);
    let mut b = Fingerprint::new(16);
    b.set(3);
    assert!((a.tanimoto(&b) - 0.5).abs() < 1e-12);
    assert_eq!(a.tanimoto(&Fingerprint::new(8)), 0.0);
    a.set(99);
    assert_eq!(a.cardinality(), 2);
  }

  #[test]
  fn path_key_is_direction_independent() {
    let g = parse_smiles("OCN", ParseMode::Strict).unwrap();
    assert_eq!(path_key(&g, &[0, 1, 2], &[BondOrder::Single, BondOrder::Single]),
               path_key(&g, &[2, 1, 0], &[BondOrder::Single, BondOrder::Single]));
  }
}
