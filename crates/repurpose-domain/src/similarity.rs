//! Similitud por solapamiento de conjuntos.
use std::collections::HashSet;
use std::hash::Hash;

/// Coeficiente de Jaccard |A∩B| / |A∪B|; 0 cuando ambos conjuntos están vacíos.
pub fn jaccard<T>(a: &HashSet<T>, b: &HashSet<T>) -> f64
  where T: Eq + Hash
{
  if a.is_empty() && b.is_empty() {
    return 0.0;
  }
  let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
  let intersection = small.iter().filter(|x| large.contains(*x)).count();
  let union = a.len() + b.len() - intersection;
  intersection as f64 / union as f64
}

/// Jaccard sobre listas (se deduplican antes de comparar).
pub fn jaccard_slices<T>(a: &[T], b: &[T]) -> f64
  where T: Eq + Hash
{
  let sa: HashSet<&T> = a.iter().collect();
  let sb: HashSet<&T> = b.iter().collect();
  jaccard(&sa, &sb)
}

/// Fracción del conjunto de referencia cubierta por `other`:
/// |reference∩other| / |reference|, 0 si la referencia está vacía.
pub fn overlap_ratio<T>(reference: &[T], other: &[T]) -> f64
  where T: Eq + Hash
{
  let reference: HashSet<&T> = reference.iter().collect();
  if reference.is_empty() {
    return 0.0;
  }
  let other: HashSet<&T> = other.iter().collect();
  reference.intersection(&other).count() as f64 / reference.len() as f64
}

/// Tamaño de la intersección de dos listas deduplicadas.
pub fn intersection_size<T>(a: &[T], b: &[T]) -> usize
  where T: Eq + Hash
{
  let sa: HashSet<&T> = a.iter().collect();
  b.iter().collect::<HashSet<&T>>().intersection(&sa).count()
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn jaccard_identity_empty_and_symmetry() {
    let a = set(&["G1", "G2", "G3"]);
    let b = set(&["G2", "G3", "G4", "G5"]);
    let empty = set(&[]);
    assert_relative_eq!(jaccard(&a, &a), 1.0);
    assert_relative_eq!(jaccard(&a, &empty), 0.0);
    assert_relative_eq!(jaccard(&empty, &empty), 0.0);
    assert_relative_eq!(jaccard(&a, &b), jaccard(&b, &a));
    assert_relative_eq!(jaccard(&a, &b), 2.0 / 5.0);
  }

  #[test]
  fn slices_ignore_duplicates() {
    assert_relative_eq!(jaccard_slices(&["a", "a", "b"], &["b", "b"]), 0.5);
    assert_eq!(intersection_size(&["a", "b", "b"], &["b", "c"]), 1);
  }

  #[test]
  fn overlap_ratio_uses_reference_side() {
    assert_relative_eq!(overlap_ratio(&["G1", "G2"], &["G1", "G9", "G8"]), 0.5);
    assert_relative_eq!(overlap_ratio::<&str>(&[], &["G1"]), 0.0);
  }
}
