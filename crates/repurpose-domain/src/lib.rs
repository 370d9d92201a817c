mod entity;
mod errors;
pub mod fingerprint;
mod interaction;
mod repurposing_result;
pub mod similarity;
pub mod smiles;
mod structure;

pub use entity::{CanonicalId, Compound, Disease, Drug, Entity, EntityKind, Gene};
pub use errors::DomainError;
pub use fingerprint::{Fingerprint, FingerprintKind, FingerprintSet};
pub use interaction::{InteractionEdge, NodeRef, SubRelation};
pub use repurposing_result::{clamp_unit, DrugRepurposingResult, EvidenceLevel, ExtendedDetails};
pub use similarity::{jaccard, jaccard_slices, overlap_ratio};
pub use structure::{structural_similarity, ComparisonMethod, MoleculeProfile, StructuralComparison};
