use repurpose_domain::{jaccard, structural_similarity, ComparisonMethod, MoleculeProfile};
use std::collections::HashSet;

fn sets() -> Vec<HashSet<String>> {
  let raw: Vec<Vec<&str>> = vec![vec![],
                                 vec!["G1"],
                                 vec!["G1", "G2"],
                                 vec!["G2", "G3", "G4"],
                                 vec!["G1", "G2", "G3", "G4", "G5"],
                                 vec!["P9"]];
  raw.into_iter().map(|v| v.into_iter().map(String::from).collect()).collect()
}

#[test]
fn jaccard_properties_hold_for_all_pairs() {
  let empty: HashSet<String> = HashSet::new();
  for a in sets() {
    if !a.is_empty() {
      assert_eq!(jaccard(&a, &a), 1.0);
    }
    assert_eq!(jaccard(&a, &empty), 0.0);
    for b in sets() {
      let ab = jaccard(&a, &b);
      assert_eq!(ab, jaccard(&b, &a));
      assert!((0.0..=1.0).contains(&ab));
    }
  }
}

#[test]
fn structural_scores_stay_in_unit_interval() {
  let smiles = ["CC(=O)Oc1ccccc1C(=O)O",
                "CC(C)Cc1ccc(cc1)C(C)C(=O)O",
                "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",
                "N->[Pt](Cl)(Cl)<-N",
                "C1CC(",
                "c1ccc2ccccc2c1"];
  for a in smiles {
    for b in smiles {
      let cmp = structural_similarity(a, b);
      assert!((0.0..=1.0).contains(&cmp.score), "{} vs {} -> {}", a, b, cmp.score);
    }
  }
  // Cafeína: anillos fusionados no aromáticos en notación Kekulé.
  let caffeine = MoleculeProfile::from_smiles("CN1C=NC2=C1C(=O)N(C(=O)N2C)C").expect("cafeína");
  assert!(!caffeine.is_organometallic());
  assert_eq!(caffeine.atom_count(), 14);
  assert_eq!(structural_similarity("C1CC(", "CCO").method, ComparisonMethod::ParseFailure);
}

#[test]
fn absurd_charges_score_zero_instead_of_failing() {
  let cmp = structural_similarity(&format!("[C{}]", "+".repeat(200)), "CCO");
  assert_eq!(cmp.method, ComparisonMethod::ParseFailure);
  assert_eq!(cmp.score, 0.0);
  let metal = structural_similarity(&format!("[Pt{}]", "+".repeat(130)), "N->[Pt](Cl)(Cl)<-N");
  assert_eq!(metal.score, 0.0);
}
