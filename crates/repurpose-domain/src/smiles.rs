//! Parser SMILES a grafo molecular.
//!
//! Cubre el subconjunto orgánico, átomos entre corchetes (isótopo,
//! quiralidad, hidrógenos, carga y clase), ramas, cierres de anillo (`1`,
//! `%12`) y los enlaces `- = # $ : / \ .`. En modo `Relaxed` acepta además
//! enlaces de coordinación `->` / `<-`, habituales en complejos metálicos.
use crate::DomainError;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet, VecDeque};

static ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
  ["H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
   "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y",
   "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce",
   "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir",
   "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
   "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh", "Fl", "Mc",
   "Lv", "Ts", "Og"].into_iter()
                    .collect()
});

/// Metales cuya química de coordinación rompe los fingerprints estándar.
pub const COORDINATION_METALS: [&str; 7] = ["Pt", "Fe", "Ru", "Os", "Pd", "Rh", "Ir"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
  Strict,
  Relaxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BondOrder {
  Single,
  Double,
  Triple,
  Quadruple,
  Aromatic,
  Coordinate,
}

impl BondOrder {
  pub fn symbol(self) -> &'static str {
    match self {
      BondOrder::Single => "-",
      BondOrder::Double => "=",
      BondOrder::Triple => "#",
      BondOrder::Quadruple => "$",
      BondOrder::Aromatic => ":",
      BondOrder::Coordinate => ">",
    }
  }

  fn valence(self) -> u8 {
    match self {
      BondOrder::Single | BondOrder::Aromatic => 1,
      BondOrder::Double => 2,
      BondOrder::Triple => 3,
      BondOrder::Quadruple => 4,
      BondOrder::Coordinate => 0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
  pub element: String,
  pub aromatic: bool,
  pub charge: i8,
  pub explicit_h: Option<u8>,
  pub isotope: Option<u16>,
  pub bracket: bool,
}

impl Atom {
  fn organic(element: &str, aromatic: bool) -> Self {
    Self { element: element.to_string(), aromatic, charge: 0, explicit_h: None, isotope: None, bracket: false }
  }

  /// Símbolo con marca de aromaticidad (`c`, `n`...), útil como etiqueta.
  pub fn label(&self) -> String {
    if self.aromatic {
      self.element.to_lowercase()
    } else {
      self.element.clone()
    }
  }

  pub fn is_carbon(&self) -> bool {
    self.element == "C"
  }

  pub fn is_hetero(&self) -> bool {
    !matches!(self.element.as_str(), "C" | "H" | "*")
  }

  pub fn is_halogen(&self) -> bool {
    matches!(self.element.as_str(), "F" | "Cl" | "Br" | "I")
  }

  pub fn is_metal(&self) -> bool {
    !matches!(self.element.as_str(),
              "H" | "He" | "B" | "C" | "N" | "O" | "F" | "Ne" | "Si" | "P" | "S" | "Cl" | "Ar" | "As" | "Se" | "Br"
              | "Kr" | "Te" | "I" | "Xe" | "At" | "Rn" | "*")
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
  pub a: usize,
  pub b: usize,
  pub order: BondOrder,
}

impl Bond {
  pub fn other(&self, atom: usize) -> usize {
    if self.a == atom {
      self.b
    } else {
      self.a
    }
  }
}

/// Grafo molecular con anillos percibidos.
#[derive(Debug, Clone)]
pub struct MolecularGraph {
  atoms: Vec<Atom>,
  bonds: Vec<Bond>,
  adjacency: Vec<Vec<(usize, usize)>>,
  rings: Vec<Vec<usize>>,
  ring_atoms: HashSet<usize>,
  ring_bonds: HashSet<usize>,
}

impl MolecularGraph {
  fn build(atoms: Vec<Atom>, bonds: Vec<Bond>, closures: &[usize]) -> Self {
    let mut adjacency = vec![Vec::new(); atoms.len()];
    for (idx, bond) in bonds.iter().enumerate() {
      adjacency[bond.a].push((bond.b, idx));
      adjacency[bond.b].push((bond.a, idx));
    }
    let mut graph = Self { atoms, bonds, adjacency, rings: Vec::new(), ring_atoms: HashSet::new(), ring_bonds: HashSet::new() };
    graph.perceive_rings(closures);
    graph
  }

  /// Cada enlace de cierre define un anillo: el camino más corto entre sus
  /// extremos usando sólo enlaces de árbol y cierres anteriores.
  fn perceive_rings(&mut self, closures: &[usize]) {
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    for (k, &closure) in closures.iter().enumerate() {
      let excluded: HashSet<usize> = closures[k..].iter().copied().collect();
      let bond = self.bonds[closure];
      let Some(path) = self.shortest_path_without(bond.a, bond.b, &excluded) else {
        continue;
      };
      let mut key = path.clone();
      key.sort_unstable();
      if !seen.insert(key) {
        continue;
      }
      self.ring_bonds.insert(closure);
      for pair in path.windows(2) {
        if let Some(&(_, idx)) = self.adjacency[pair[0]].iter().find(|(n, _)| *n == pair[1]) {
          self.ring_bonds.insert(idx);
        }
      }
      self.ring_atoms.extend(path.iter().copied());
      self.rings.push(path);
    }
  }

  fn shortest_path_without(&self, from: usize, to: usize, excluded: &HashSet<usize>) -> Option<Vec<usize>> {
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    parent.insert(from, from);
    while let Some(node) = queue.pop_front() {
      if node == to {
        let mut path = vec![to];
        let mut cur = to;
        while cur != from {
          cur = parent[&cur];
          path.push(cur);
        }
        path.reverse();
        return Some(path);
      }
      for &(next, bond) in &self.adjacency[node] {
        if excluded.contains(&bond) || parent.contains_key(&next) {
          continue;
        }
        parent.insert(next, node);
        queue.push_back(next);
      }
    }
    None
  }

  pub fn atoms(&self) -> &[Atom] {
    &self.atoms
  }

  pub fn bonds(&self) -> &[Bond] {
    &self.bonds
  }

  pub fn atom_count(&self) -> usize {
    self.atoms.len()
  }

  pub fn bond_count(&self) -> usize {
    self.bonds.len()
  }

  pub fn rings(&self) -> &[Vec<usize>] {
    &self.rings
  }

  pub fn is_ring_atom(&self, atom: usize) -> bool {
    self.ring_atoms.contains(&atom)
  }

  pub fn is_ring_bond(&self, bond: usize) -> bool {
    self.ring_bonds.contains(&bond)
  }

  /// Vecinos de un átomo como pares (átomo vecino, índice de enlace).
  pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
    &self.adjacency[atom]
  }

  pub fn degree(&self, atom: usize) -> usize {
    self.adjacency[atom].len()
  }

  pub fn is_aromatic_ring(&self, ring: &[usize]) -> bool {
    ring.iter().all(|&a| self.atoms[a].aromatic)
  }

  /// Hidrógenos implícitos según valencias por defecto del subconjunto
  /// orgánico; en átomos entre corchetes se usa el recuento explícito.
  pub fn hydrogen_count(&self, atom: usize) -> u8 {
    let a = &self.atoms[atom];
    if a.bracket {
      return a.explicit_h.unwrap_or(0);
    }
    let valences: &[u8] = match a.element.as_str() {
      "B" => &[3],
      "C" => &[4],
      "N" => &[3, 5],
      "O" => &[2],
      "P" => &[3, 5],
      "S" => &[2, 4, 6],
      "F" | "Cl" | "Br" | "I" => &[1],
      _ => return 0,
    };
    let mut used: u8 = self.adjacency[atom]
                           .iter()
                           .fold(0u8, |acc, &(_, b)| acc.saturating_add(self.bonds[b].order.valence()));
    if a.aromatic {
      used = used.saturating_add(1);
    }
    valences.iter().find(|&&v| v >= used).map(|v| v - used).unwrap_or(0)
  }
}

/// Detecta motivos de coordinación metálica por tokens de la notación:
/// un átomo entre corchetes de un metal de `COORDINATION_METALS` o un
/// enlace `->` / `<-`.
pub fn has_coordination_motif(smiles: &str) -> bool {
  if smiles.contains("->") || smiles.contains("<-") {
    return true;
  }
  let mut rest = smiles;
  while let Some(start) = rest.find('[') {
    let after = &rest[start + 1..];
    let Some(end) = after.find(']') else {
      break;
    };
    let inner = after[..end].trim_start_matches(|c: char| c.is_ascii_digit());
    let mut chars = inner.chars();
    if let Some(first) = chars.next().filter(|c| c.is_ascii_uppercase()) {
      let mut symbol = first.to_string();
      if let Some(second) = chars.next().filter(|c| c.is_ascii_lowercase()) {
        symbol.push(second);
      }
      if COORDINATION_METALS.contains(&symbol.as_str()) {
        return true;
      }
    }
    rest = &after[end + 1..];
  }
  false
}

pub fn parse_smiles(input: &str, mode: ParseMode) -> Result<MolecularGraph, DomainError> {
  Parser::new(input, mode).parse()
}

struct Parser {
  chars: Vec<char>,
  pos: usize,
  mode: ParseMode,
  atoms: Vec<Atom>,
  bonds: Vec<Bond>,
  closures: Vec<usize>,
  branches: Vec<usize>,
  prev: Option<usize>,
  pending: Option<BondOrder>,
  open_rings: HashMap<u32, (usize, Option<BondOrder>)>,
}

fn err(msg: impl Into<String>) -> DomainError {
  DomainError::ParseError(msg.into())
}

impl Parser {
  fn new(input: &str, mode: ParseMode) -> Self {
    Self { chars: input.trim().chars().collect(),
           pos: 0,
           mode,
           atoms: Vec::new(),
           bonds: Vec::new(),
           closures: Vec::new(),
           branches: Vec::new(),
           prev: None,
           pending: None,
           open_rings: HashMap::new() }
  }

  fn peek(&self, offset: usize) -> Option<char> {
    self.chars.get(self.pos + offset).copied()
  }

  fn parse(mut self) -> Result<MolecularGraph, DomainError> {
    if self.chars.is_empty() {
      return Err(err("cadena SMILES vacía"));
    }
    while let Some(c) = self.peek(0) {
      match c {
        '(' => {
          let prev = self.prev.ok_or_else(|| err(format!("rama sin átomo previo en posición {}", self.pos)))?;
          if self.pending.is_some() {
            return Err(err(format!("enlace antes de rama en posición {}", self.pos)));
          }
          self.branches.push(prev);
          self.pos += 1;
        }
        ')' => {
          let top = self.branches.pop().ok_or_else(|| err(format!("')' sin '(' en posición {}", self.pos)))?;
          if self.pending.is_some() {
            return Err(err(format!("enlace colgante en posición {}", self.pos)));
          }
          self.prev = Some(top);
          self.pos += 1;
        }
        '-' if self.peek(1) == Some('>') => {
          self.coordinate_bond()?;
        }
        '<' if self.peek(1) == Some('-') => {
          self.coordinate_bond()?;
        }
        '-' | '/' | '\\' => self.bond(BondOrder::Single)?,
        '=' => self.bond(BondOrder::Double)?,
        '#' => self.bond(BondOrder::Triple)?,
        '$' => self.bond(BondOrder::Quadruple)?,
        ':' => self.bond(BondOrder::Aromatic)?,
        '.' => {
          if self.pending.is_some() {
            return Err(err(format!("enlace antes de '.' en posición {}", self.pos)));
          }
          self.prev = None;
          self.pos += 1;
        }
        '%' => {
          let digits: String = [self.peek(1), self.peek(2)].iter().flatten().collect();
          if digits.len() != 2 || !digits.chars().all(|d| d.is_ascii_digit()) {
            return Err(err(format!("cierre de anillo '%' mal formado en posición {}", self.pos)));
          }
          let n: u32 = digits.parse().map_err(|_| err("número de anillo inválido"))?;
          self.pos += 3;
          self.ring_closure(n)?;
        }
        d if d.is_ascii_digit() => {
          self.pos += 1;
          self.ring_closure(d.to_digit(10).unwrap_or(0))?;
        }
        '[' => {
          let atom = self.bracket_atom()?;
          self.add_atom(atom);
        }
        '*' => {
          self.pos += 1;
          self.add_atom(Atom::organic("*", false));
        }
        c if c.is_ascii_alphabetic() => {
          let atom = self.organic_atom()?;
          self.add_atom(atom);
        }
        other => return Err(err(format!("carácter inesperado '{}' en posición {}", other, self.pos))),
      }
    }
    if self.pending.is_some() {
      return Err(err("enlace colgante al final de la cadena"));
    }
    if !self.branches.is_empty() {
      return Err(err("paréntesis sin cerrar"));
    }
    if let Some(n) = self.open_rings.keys().min() {
      return Err(err(format!("anillo {} sin cerrar", n)));
    }
    if self.atoms.is_empty() {
      return Err(err("la cadena no contiene átomos"));
    }
    let strict = self.mode == ParseMode::Strict;
    let graph = MolecularGraph::build(self.atoms, self.bonds, &self.closures);
    if strict {
      if let Some(idx) = (0..graph.atom_count()).find(|&i| graph.atoms[i].aromatic && !graph.is_ring_atom(i)) {
        return Err(err(format!("átomo aromático {} fuera de anillo", idx)));
      }
    }
    Ok(graph)
  }

  fn coordinate_bond(&mut self) -> Result<(), DomainError> {
    if self.mode == ParseMode::Strict {
      return Err(err(format!("enlace de coordinación no soportado en posición {}", self.pos)));
    }
    self.bond(BondOrder::Coordinate)?;
    // `bond` avanza un carácter; el token tiene dos.
    self.pos += 1;
    Ok(())
  }

  fn bond(&mut self, order: BondOrder) -> Result<(), DomainError> {
    if self.prev.is_none() {
      return Err(err(format!("enlace sin átomo previo en posición {}", self.pos)));
    }
    if self.pending.is_some() {
      return Err(err(format!("dos enlaces consecutivos en posición {}", self.pos)));
    }
    self.pending = Some(order);
    self.pos += 1;
    Ok(())
  }

  fn default_order(&self, a: usize, b: usize) -> BondOrder {
    if self.atoms[a].aromatic && self.atoms[b].aromatic {
      BondOrder::Aromatic
    } else {
      BondOrder::Single
    }
  }

  fn add_atom(&mut self, atom: Atom) {
    let idx = self.atoms.len();
    self.atoms.push(atom);
    if let Some(prev) = self.prev {
      let order = self.pending.take().unwrap_or_else(|| self.default_order(prev, idx));
      self.bonds.push(Bond { a: prev, b: idx, order });
    }
    self.pending = None;
    self.prev = Some(idx);
  }

  fn ring_closure(&mut self, n: u32) -> Result<(), DomainError> {
    let current = self.prev.ok_or_else(|| err(format!("cierre de anillo {} sin átomo previo", n)))?;
    let bond = self.pending.take();
    match self.open_rings.remove(&n) {
      None => {
        self.open_rings.insert(n, (current, bond));
      }
      Some((start, open_bond)) => {
        if start == current {
          return Err(err(format!("anillo {} cerrado sobre el mismo átomo", n)));
        }
        let order = match (open_bond, bond) {
          (Some(a), Some(b)) if a != b => return Err(err(format!("órdenes de enlace en conflicto en anillo {}", n))),
          (Some(a), _) | (None, Some(a)) => a,
          (None, None) => self.default_order(start, current),
        };
        if self.bonds.iter().any(|b| (b.a == start && b.b == current) || (b.a == current && b.b == start)) {
          return Err(err(format!("enlace duplicado al cerrar anillo {}", n)));
        }
        self.closures.push(self.bonds.len());
        self.bonds.push(Bond { a: start, b: current, order });
      }
    }
    Ok(())
  }

  fn organic_atom(&mut self) -> Result<Atom, DomainError> {
    let c = self.peek(0).unwrap_or(' ');
    let next = self.peek(1);
    let (symbol, aromatic, width) = match (c, next) {
      ('C', Some('l')) => ("Cl", false, 2),
      ('B', Some('r')) => ("Br", false, 2),
      ('B', _) => ("B", false, 1),
      ('C', _) => ("C", false, 1),
      ('N', _) => ("N", false, 1),
      ('O', _) => ("O", false, 1),
      ('P', _) => ("P", false, 1),
      ('S', _) => ("S", false, 1),
      ('F', _) => ("F", false, 1),
      ('I', _) => ("I", false, 1),
      ('b', _) => ("B", true, 1),
      ('c', _) => ("C", true, 1),
      ('n', _) => ("N", true, 1),
      ('o', _) => ("O", true, 1),
      ('p', _) => ("P", true, 1),
      ('s', _) => ("S", true, 1),
      _ => return Err(err(format!("'{}' fuera del subconjunto orgánico en posición {}", c, self.pos))),
    };
    self.pos += width;
    Ok(Atom::organic(symbol, aromatic))
  }

  fn bracket_atom(&mut self) -> Result<Atom, DomainError> {
    let open = self.pos;
    let close = (open + 1..self.chars.len()).find(|&i| self.chars[i] == ']')
                                           .ok_or_else(|| err(format!("'[' sin cerrar en posición {}", open)))?;
    let inner: Vec<char> = self.chars[open + 1..close].to_vec();
    self.pos = close + 1;
    let mut i = 0;

    let isotope_digits: String = inner.iter().take_while(|c| c.is_ascii_digit()).collect();
    i += isotope_digits.len();
    let isotope = if isotope_digits.is_empty() {
      None
    } else {
      Some(isotope_digits.parse::<u16>().map_err(|_| err(format!("isótopo inválido en posición {}", open)))?)
    };

    let first = *inner.get(i).ok_or_else(|| err(format!("átomo vacío entre corchetes en posición {}", open)))?;
    let second = inner.get(i + 1).copied();
    let (element, aromatic) = if first == '*' {
      i += 1;
      ("*".to_string(), false)
    } else if first.is_ascii_uppercase() {
      let two = second.filter(|c| c.is_ascii_lowercase()).map(|s| format!("{}{}", first, s));
      match two {
        Some(sym) if ELEMENTS.contains(sym.as_str()) => {
          i += 2;
          (sym, false)
        }
        _ if ELEMENTS.contains(first.to_string().as_str()) => {
          i += 1;
          (first.to_string(), false)
        }
        _ => return Err(err(format!("elemento desconocido en posición {}", open))),
      }
    } else {
      let two: Option<String> = second.map(|s| format!("{}{}", first, s));
      match two.as_deref() {
        Some("se") | Some("as") | Some("te") => {
          i += 2;
          let mut sym = first.to_ascii_uppercase().to_string();
          sym.extend(second);
          (sym, true)
        }
        _ if matches!(first, 'b' | 'c' | 'n' | 'o' | 'p' | 's') => {
          i += 1;
          (first.to_ascii_uppercase().to_string(), true)
        }
        _ => return Err(err(format!("símbolo aromático inválido en posición {}", open))),
      }
    };

    // Quiralidad: @, @@ o formas extendidas (@TH1, @SP2...).
    let chirality_start = i;
    while inner.get(i) == Some(&'@') {
      i += 1;
    }
    if i > chirality_start {
      let tag: String = inner.iter().skip(i).take(2).collect();
      if matches!(tag.as_str(), "TH" | "AL" | "SP" | "TB" | "OH") {
        i += 2;
        while inner.get(i).is_some_and(|c| c.is_ascii_digit()) {
          i += 1;
        }
      }
    }

    let mut explicit_h = Some(0);
    if inner.get(i) == Some(&'H') {
      i += 1;
      let digits: String = inner.iter().skip(i).take_while(|c| c.is_ascii_digit()).collect();
      i += digits.len();
      explicit_h = Some(if digits.is_empty() { 1 } else { digits.parse().map_err(|_| err("recuento de H inválido"))? });
    }

    let mut charge: i8 = 0;
    if let Some(&sign) = inner.get(i).filter(|c| **c == '+' || **c == '-') {
      let unit: i8 = if sign == '+' { 1 } else { -1 };
      i += 1;
      let digits: String = inner.iter().skip(i).take_while(|c| c.is_ascii_digit()).collect();
      if !digits.is_empty() {
        i += digits.len();
        charge = digits.parse::<i8>()
                       .ok()
                       .and_then(|n| n.checked_mul(unit))
                       .ok_or_else(|| err(format!("carga fuera de rango en posición {}", open)))?;
      } else {
        charge = unit;
        while inner.get(i) == Some(&sign) {
          charge = charge.checked_add(unit).ok_or_else(|| err(format!("carga fuera de rango en posición {}", open)))?;
          i += 1;
        }
      }
    }

    if inner.get(i) == Some(&':') {
      i += 1;
      let digits = inner.iter().skip(i).take_while(|c| c.is_ascii_digit()).count();
      if digits == 0 {
        return Err(err(format!("clase de átomo vacía en posición {}", open)));
      }
      i += digits;
    }

    if i != inner.len() {
      return Err(err(format!("átomo entre corchetes mal formado en posición {}", open)));
    }
    Ok(Atom { element, aromatic, charge, explicit_h, isotope, bracket: true })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_ethanol_and_counts_hydrogens() {
    let g = parse_smiles("CCO", ParseMode::Strict).unwrap();
    assert_eq!(g.atom_count(), 3);
    assert_eq!(g.bond_count(), 2);
    assert_eq!(g.hydrogen_count(0), 3);
    assert_eq!(g.hydrogen_count(2), 1);
    assert!(g.rings().is_empty());
  }

  #[test]
  fn perceives_aromatic_ring() {
    let g = parse_smiles("c1ccccc1O", ParseMode::Strict).unwrap();
    assert_eq!(g.rings().len(), 1);
    assert_eq!(g.rings()[0].len(), 6);
    assert!(g.is_aromatic_ring(&g.rings()[0]));
    assert_eq!(g.hydrogen_count(1), 1);
    assert!(!g.is_ring_atom(6));
  }

  #[test]
  fn fused_rings_and_percent_closures() {
    let naphthalene = parse_smiles("c1ccc2ccccc2c1", ParseMode::Strict).unwrap();
    assert_eq!(naphthalene.rings().len(), 2);
    let g = parse_smiles("C%10CCCCC%10", ParseMode::Strict).unwrap();
    assert_eq!(g.rings()[0].len(), 6);
  }

  #[test]
  fn bracket_atoms() {
    let g = parse_smiles("[13CH3][N+](C)(C)C.[Cl-]", ParseMode::Strict).unwrap();
    assert_eq!(g.atoms()[0].isotope, Some(13));
    assert_eq!(g.atoms()[0].explicit_h, Some(3));
    assert_eq!(g.atoms()[1].charge, 1);
    assert_eq!(g.atoms()[5].element, "Cl");
    assert_eq!(g.atoms()[5].charge, -1);
    assert_eq!(g.bond_count(), 4);
    let chiral = parse_smiles("N[C@@H](C)C(=O)O", ParseMode::Strict).unwrap();
    assert_eq!(chiral.atoms()[1].explicit_h, Some(1));
    let pyrrole = parse_smiles("c1cc[nH]c1", ParseMode::Strict).unwrap();
    assert!(pyrrole.atoms()[3].aromatic);
  }

  #[test]
  fn rejects_malformed_input() {
    for bad in ["", "C(C", "CC)", "C1CC", "C==C", "c1cccc", "Xy", "C[Zz]C", "ccc"] {
      assert!(parse_smiles(bad, ParseMode::Strict).is_err(), "debería fallar: {}", bad);
    }
  }

  #[test]
  fn coordinate_bonds_only_in_relaxed_mode() {
    let cisplatin = "N->[Pt](Cl)(Cl)<-N";
    assert!(parse_smiles(cisplatin, ParseMode::Strict).is_err());
    let g = parse_smiles(cisplatin, ParseMode::Relaxed).unwrap();
    assert_eq!(g.atom_count(), 5);
    assert_eq!(g.bond_count(), 4);
    assert!(g.bonds().iter().any(|b| b.order == BondOrder::Coordinate));
  }

  #[test]
  fn out_of_range_charges_are_parse_errors() {
    let many = format!("[C{}]", "+".repeat(200));
    assert!(matches!(parse_smiles(&many, ParseMode::Strict), Err(DomainError::ParseError(_))));
    assert!(parse_smiles(&format!("[N{}]", "-".repeat(128)), ParseMode::Strict).is_err());
    assert!(parse_smiles("[Fe+200]", ParseMode::Relaxed).is_err());
    assert_eq!(parse_smiles("[O-127]", ParseMode::Strict).unwrap().atoms()[0].charge, -127);
    assert_eq!(parse_smiles("[N+++]", ParseMode::Strict).unwrap().atoms()[0].charge, 3);
  }

  #[test]
  fn hydrogen_count_saturates_on_crowded_atoms() {
    // 90 triples sobre un mismo carbono: la suma de valencias supera u8.
    let hub: String = (10..100).map(|n| format!("#%{}", n)).collect();
    let partners: Vec<String> = (10..100).map(|n| format!("C#%{}", n)).collect();
    let crowded = format!("C{}.{}", hub, partners.join("."));
    let g = parse_smiles(&crowded, ParseMode::Strict).unwrap();
    assert_eq!(g.bond_count(), 90);
    assert_eq!(g.hydrogen_count(0), 0);
    assert_eq!(g.hydrogen_count(1), 1);
  }

  #[test]
  fn detects_coordination_motifs() {
    assert!(has_coordination_motif("N->[Pt](Cl)(Cl)<-N"));
    assert!(has_coordination_motif("[Fe+2].[Cl-].[Cl-]"));
    assert!(has_coordination_motif("C1=CC=C[C-]1.[Ru]"));
    assert!(!has_coordination_motif("CC(=O)Oc1ccccc1C(=O)O"));
    assert!(!has_coordination_motif("[Na+].[Cl-]"));
  }
}
