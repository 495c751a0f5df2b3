//! # Resilience Core
//!
//! Probabilistic resilience assessment for emergency scenarios: expert
//! judgments and historical samples become a parameterized Bayesian network,
//! which is then queried under case evidence.
//!
//! The pipeline is a chain of phases, each consuming the previous handle:
//!
//! ```text
//! NetworkBuilder -> BuiltNetwork -> ParameterizedNetwork -> InferenceCoordinator
//! ```

pub mod config;
pub mod engine;
pub mod pipeline;
pub mod scenario;
#[cfg(feature = "serde")]
pub mod storage;

pub use config::ResilienceConfig;
pub use engine::builder::{BuiltNetwork, NetworkBuilder};
pub use engine::coordinator::{InferenceCoordinator, InferenceState, PosteriorReport};
pub use engine::cpt::{CptParameterizer, ParameterizedNetwork};
pub use engine::diagnostics::{Diagnostic, Diagnostics};
pub use engine::errors::ResilienceError;
pub use engine::evidence::{CaseFacts, Evidence, EvidenceMapper, TimeStage};
pub use engine::fuzzy::{ExpertPanel, FuzzyEvaluator, LinguisticGrade};
pub use engine::inference::{InferenceEngine, Posteriors, VariableElimination};
pub use engine::network::BayesianNetwork;

/// A validated network definition.
pub use resilience_frontend::NetworkAst as NetworkSpec;

/// Parse and validate a network definition.
///
/// Combines parsing and validation, converting frontend errors to core errors.
pub fn load_network_spec(source: &str) -> Result<NetworkSpec, ResilienceError> {
    let spec = resilience_frontend::parse_network(source)?;
    resilience_frontend::validate_network(&spec)?;
    Ok(spec)
}
