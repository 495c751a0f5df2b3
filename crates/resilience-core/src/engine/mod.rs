//! The assessment engine.
//!
//! Modules, leaves first:
//! - **errors** / **diagnostics**: fatal errors and recovered problems
//! - **fuzzy**: linguistic grades, expert weighting, defuzzification
//! - **elicitation**: expert grades to conditional probability records
//! - **prior**: root priors from historical samples
//! - **network** / **builder**: network structure and the build phase
//! - **cpt**: parameterization and table verification
//! - **inference** / **coordinator**: exact inference and evidence management
//! - **evidence**: evidence maps and case-fact classification
//! - **trajectory**: stage-by-stage resilience filtering

pub mod builder;
pub mod coordinator;
pub mod cpt;
pub mod diagnostics;
pub mod elicitation;
pub mod errors;
pub mod evidence;
pub mod fuzzy;
pub mod inference;
pub mod network;
pub mod prior;
pub mod trajectory;
