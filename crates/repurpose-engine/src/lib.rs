//! Motor de reposicionamiento de fármacos: similitud entre fármacos,
//! descubrimiento de candidatos y scoring sobre el grafo de entidades de
//! `repurpose-persistence`.

pub mod description;
pub mod discovery;
pub mod errors;
pub mod parallel;
pub mod scoring;
pub mod settings;
mod similarity_engine;

pub use description::{DescriptionSource, NoDescriptions, StaticDescriptions};
pub use discovery::{CandidateDiscovery, NetworkTraversal, SimilarDisease};
pub use errors::EngineError;
pub use parallel::ParallelMap;
pub use scoring::{ScoreBreakdown, ScoringOrchestrator};
pub use settings::EngineSettings;
pub use similarity_engine::SimilarityEngine;
