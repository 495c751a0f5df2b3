//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```toml
//! fuzzy_beta = 0.6
//!
//! [evidence]
//! response_minutes = [15.0, 30.0, 60.0]
//!
//! [trajectory]
//! temperature = 4.0
//! ```

use std::collections::BTreeMap;

use crate::engine::cpt::{CptParameterizer, DEFAULT_ROW_TOLERANCE};
use crate::engine::errors::ResilienceError;
use crate::engine::evidence::{EvidenceMapper, EvidenceThresholds};
use crate::engine::fuzzy::{FuzzyEvaluator, DEFAULT_BETA};
use crate::engine::prior::{PriorEstimator, DEFAULT_LOWER_PERCENTILE, DEFAULT_UPPER_PERCENTILE};
use crate::engine::trajectory::StageChain;
use crate::scenario::nodes;

/// Stage-chain settings for trajectory assessment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct TrajectoryConfig {
    /// Capacity node -> weight in the stage emission.
    pub capacity_weights: BTreeMap<String, f64>,
    /// Softmax temperature of the stage emission.
    pub temperature: f64,
    /// Row-stochastic `[Good, Bad]` transition matrix between stages.
    pub transition: Vec<Vec<f64>>,
    /// Initial `[Good, Bad]` distribution; uniform when absent.
    pub initial: Option<Vec<f64>>,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            capacity_weights: nodes::CAPACITIES
                .iter()
                .map(|c| (c.to_string(), 1.0 / 3.0))
                .collect(),
            temperature: 1.0,
            transition: vec![vec![0.9, 0.1], vec![0.1, 0.9]],
            initial: None,
        }
    }
}

impl TrajectoryConfig {
    pub fn weights(&self) -> Vec<(String, f64)> {
        self.capacity_weights
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    pub fn stage_chain(&self) -> Result<StageChain, ResilienceError> {
        let chain = StageChain::new(
            vec!["Good".to_string(), "Bad".to_string()],
            self.transition.clone(),
        )?;
        match &self.initial {
            Some(initial) => chain.with_initial(initial.clone()),
            None => Ok(chain),
        }
    }
}

/// Tunable parameters of the whole pipeline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ResilienceConfig {
    /// Blend between prior expert weight and relative similarity.
    pub fuzzy_beta: f64,
    /// Allowed deviation of a CPT row sum from 1.
    pub row_tolerance: f64,
    /// Truncation percentiles for duration priors.
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    pub evidence: EvidenceThresholds,
    pub trajectory: TrajectoryConfig,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            fuzzy_beta: DEFAULT_BETA,
            row_tolerance: DEFAULT_ROW_TOLERANCE,
            lower_percentile: DEFAULT_LOWER_PERCENTILE,
            upper_percentile: DEFAULT_UPPER_PERCENTILE,
            evidence: EvidenceThresholds::default(),
            trajectory: TrajectoryConfig::default(),
        }
    }
}

impl ResilienceConfig {
    pub fn validate(self) -> Result<Self, ResilienceError> {
        FuzzyEvaluator::new(self.fuzzy_beta)?;
        CptParameterizer::new(self.row_tolerance)?;
        if !(0.0..100.0).contains(&self.lower_percentile)
            || !(self.lower_percentile..=100.0).contains(&self.upper_percentile)
            || self.lower_percentile >= self.upper_percentile
        {
            return Err(ResilienceError::ValidationError(format!(
                "percentiles must satisfy 0 <= lower < upper <= 100, got {} and {}",
                self.lower_percentile, self.upper_percentile
            )));
        }
        self.evidence.validate()?;
        if !self.trajectory.temperature.is_finite() || self.trajectory.temperature <= 0.0 {
            return Err(ResilienceError::ValidationError(format!(
                "trajectory temperature must be positive, got {}",
                self.trajectory.temperature
            )));
        }
        if self
            .trajectory
            .capacity_weights
            .values()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(ResilienceError::ValidationError(
                "capacity weights must be finite and non-negative".into(),
            ));
        }
        self.trajectory.stage_chain()?;
        Ok(self)
    }

    pub fn evaluator(&self) -> Result<FuzzyEvaluator, ResilienceError> {
        FuzzyEvaluator::new(self.fuzzy_beta)
    }

    pub fn parameterizer(&self) -> Result<CptParameterizer, ResilienceError> {
        CptParameterizer::new(self.row_tolerance)
    }

    pub fn estimator(&self) -> PriorEstimator {
        PriorEstimator {
            lower_percentile: self.lower_percentile,
            upper_percentile: self.upper_percentile,
        }
    }

    pub fn mapper(&self) -> Result<EvidenceMapper, ResilienceError> {
        EvidenceMapper::new(self.evidence)
    }

    /// Parses and validates a TOML config.
    #[cfg(feature = "serde")]
    pub fn from_toml_str(source: &str) -> Result<Self, ResilienceError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ResilienceError::Format(e.to_string()))?;
        config.validate()
    }

    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ResilienceError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ResilienceError::io(path, e))?;
        Self::from_toml_str(&source)
    }
}
