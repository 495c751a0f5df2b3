//! End-to-end parameterization from raw inputs.

use tracing::info;

use crate::config::ResilienceConfig;
use crate::engine::builder::NetworkBuilder;
use crate::engine::cpt::ParameterizedNetwork;
use crate::engine::elicitation::{elicit, ElicitationItem};
use crate::engine::errors::ResilienceError;
use crate::engine::fuzzy::ExpertPanel;
use crate::engine::prior::PriorTable;
use crate::NetworkSpec;

/// Everything the parameterizer consumes besides the network definition.
#[derive(Debug, Clone)]
pub struct AssessmentInputs {
    pub prior_table: PriorTable,
    pub panel: ExpertPanel,
    pub items: Vec<ElicitationItem>,
}

/// Builds `spec`, estimates root priors, aggregates expert grades and writes
/// every table. Diagnostics from all steps end up on the returned network.
pub fn parameterize(
    spec: NetworkSpec,
    inputs: &AssessmentInputs,
    config: &ResilienceConfig,
) -> Result<ParameterizedNetwork, ResilienceError> {
    let config = config.clone().validate()?;
    let mut built = NetworkBuilder::new(spec).build()?;
    let spec = built.spec().clone();

    let priors = config
        .estimator()
        .estimate_roots(&spec, &inputs.prior_table, built.diagnostics_mut());
    let records = elicit(
        &inputs.items,
        &inputs.panel,
        &config.evaluator()?,
        built.diagnostics_mut(),
    );
    info!(
        priors = priors.len(),
        records = records.len(),
        items = inputs.items.len(),
        "parameterization inputs ready"
    );
    Ok(config.parameterizer()?.parameterize(built, &priors, &records))
}
