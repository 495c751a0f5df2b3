//! Resilience trajectory across incident stages.
//!
//! A small hidden chain over the resilience states is filtered forward
//! through the stages T0..T3:
//!
//! ```text
//! alpha_0 ∝ e_0 ⊙ alpha_init
//! alpha_t ∝ e_t ⊙ (Tᵀ alpha_{t-1})
//! ```
//!
//! Each stage's emission comes from the network's capacity posteriors under
//! that stage's evidence.

use tracing::debug;

use crate::engine::coordinator::{InferenceCoordinator, PosteriorReport};
use crate::engine::errors::ResilienceError;
use crate::engine::evidence::{CaseFacts, EvidenceMapper, TimeStage};
use crate::engine::inference::InferenceEngine;

const STOCHASTIC_TOLERANCE: f64 = 1e-9;

/// Observation attached to one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// No information; the prediction passes through unchanged.
    None,
    /// The state with this index was observed. Out-of-range indices carry no information.
    Observed(usize),
    /// Soft likelihood over the states.
    Soft(Vec<f64>),
}

impl Emission {
    fn likelihood(&self, n: usize) -> Result<Vec<f64>, ResilienceError> {
        match self {
            Emission::None => Ok(vec![1.0; n]),
            Emission::Observed(i) if *i < n => {
                let mut like = vec![0.0; n];
                like[*i] = 1.0;
                Ok(like)
            }
            Emission::Observed(_) => Ok(vec![1.0; n]),
            Emission::Soft(values) if values.len() == n => Ok(normalize(values.clone())),
            Emission::Soft(values) => Err(ResilienceError::ValidationError(format!(
                "soft emission has {} values for {} states",
                values.len(),
                n
            ))),
        }
    }
}

/// Forward filter over an ordered sequence of stages.
#[derive(Debug, Clone, PartialEq)]
pub struct StageChain {
    states: Vec<String>,
    transition: Vec<Vec<f64>>,
    initial: Vec<f64>,
}

impl StageChain {
    /// `transition[i][j]` is P(next = j | current = i); rows must sum to 1.
    pub fn new(states: Vec<String>, transition: Vec<Vec<f64>>) -> Result<Self, ResilienceError> {
        let n = states.len();
        if n == 0 {
            return Err(ResilienceError::ValidationError(
                "stage chain needs at least one state".into(),
            ));
        }
        if transition.len() != n || transition.iter().any(|row| row.len() != n) {
            return Err(ResilienceError::ValidationError(format!(
                "transition matrix must be {}x{}",
                n, n
            )));
        }
        for (i, row) in transition.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            if row.iter().any(|p| !p.is_finite() || *p < 0.0)
                || (sum - 1.0).abs() > STOCHASTIC_TOLERANCE
            {
                return Err(ResilienceError::ValidationError(format!(
                    "transition row {} is not a distribution: {:?}",
                    i, row
                )));
            }
        }
        Ok(Self {
            initial: vec![1.0 / n as f64; n],
            states,
            transition,
        })
    }

    /// Replaces the uniform initial distribution.
    pub fn with_initial(mut self, initial: Vec<f64>) -> Result<Self, ResilienceError> {
        if initial.len() != self.states.len() || initial.iter().any(|p| !p.is_finite() || *p < 0.0)
        {
            return Err(ResilienceError::ValidationError(format!(
                "initial distribution {:?} does not fit {} states",
                initial,
                self.states.len()
            )));
        }
        self.initial = normalize(initial);
        Ok(self)
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Filtered distribution after each emission.
    pub fn run(&self, emissions: &[Emission]) -> Result<Vec<Vec<f64>>, ResilienceError> {
        let n = self.states.len();
        let mut alpha = self.initial.clone();
        let mut out = Vec::with_capacity(emissions.len());
        for (t, emission) in emissions.iter().enumerate() {
            let like = emission.likelihood(n)?;
            let predicted = if t == 0 {
                alpha.clone()
            } else {
                (0..n)
                    .map(|j| (0..n).map(|i| self.transition[i][j] * alpha[i]).sum())
                    .collect()
            };
            alpha = normalize(like.iter().zip(&predicted).map(|(l, p)| l * p).collect());
            out.push(alpha.clone());
        }
        Ok(out)
    }
}

/// Rescales to sum 1, or uniform when the sum is not positive.
fn normalize(values: Vec<f64>) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        values.into_iter().map(|v| v / sum).collect()
    } else {
        let n = values.len().max(1) as f64;
        vec![1.0 / n; values.len()]
    }
}

/// Soft `[Good, Bad]` likelihood from weighted capacity posteriors.
///
/// The weighted mean of each capacity's `Good` probability is passed through
/// a softmax of `[mean, 1 - mean] * temperature`. Capacities missing from the
/// report count as `Good = 0`; zero total weight yields a mean of 0.5.
pub fn capacity_emission(
    report: &PosteriorReport,
    weights: &[(String, f64)],
    temperature: f64,
) -> Emission {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (capacity, weight) in weights {
        let good = report
            .nodes
            .get(capacity)
            .and_then(|states| states.iter().find(|s| s.state == "Good"))
            .map(|s| s.probability)
            .unwrap_or(0.0);
        weighted += good * weight;
        total += weight;
    }
    let mean = if total == 0.0 { 0.5 } else { weighted / total };

    let scores = [mean * temperature, (1.0 - mean) * temperature];
    let max = scores[0].max(scores[1]);
    let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    Emission::Soft(exp.into_iter().map(|e| e / sum).collect())
}

/// One stage of an assessed trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct StageAssessment {
    pub stage: TimeStage,
    pub report: PosteriorReport,
    pub emission: Emission,
    /// Filtered `[Good, Bad]` distribution after this stage.
    pub filtered: Vec<f64>,
}

/// Runs the network at every stage and filters the results through `chain`.
///
/// The coordinator is left holding the T3 evidence.
pub fn assess_stages<E: InferenceEngine>(
    coordinator: &mut InferenceCoordinator<E>,
    mapper: &EvidenceMapper,
    facts: &CaseFacts,
    chain: &StageChain,
    weights: &[(String, f64)],
    temperature: f64,
) -> Result<Vec<StageAssessment>, ResilienceError> {
    let mut reports = Vec::with_capacity(TimeStage::ALL.len());
    for stage in TimeStage::ALL {
        coordinator.set_evidence(mapper.map(facts, stage))?;
        let report = coordinator.posterior_report()?;
        let emission = capacity_emission(&report, weights, temperature);
        debug!(stage = %stage, emission = ?emission, "stage emission");
        reports.push((stage, report, emission));
    }

    let emissions: Vec<Emission> = reports.iter().map(|(_, _, e)| e.clone()).collect();
    let filtered = chain.run(&emissions)?;
    Ok(reports
        .into_iter()
        .zip(filtered)
        .map(|((stage, report, emission), filtered)| StageAssessment {
            stage,
            report,
            emission,
            filtered,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::coordinator::StateProbability;
    use std::collections::BTreeMap;

    fn chain() -> StageChain {
        StageChain::new(
            vec!["Good".into(), "Bad".into()],
            vec![vec![0.9, 0.1], vec![0.2, 0.8]],
        )
        .unwrap()
    }

    #[test]
    fn first_stage_uses_initial_distribution() {
        let out = chain()
            .with_initial(vec![3.0, 1.0])
            .unwrap()
            .run(&[Emission::None, Emission::None])
            .unwrap();
        assert_eq!(out[0], vec![0.75, 0.25]);
        let predicted = [0.75 * 0.9 + 0.25 * 0.2, 0.75 * 0.1 + 0.25 * 0.8];
        assert!((out[1][0] - predicted[0]).abs() < 1e-12);
        assert!((out[1][1] - predicted[1]).abs() < 1e-12);
    }

    #[test]
    fn observations_pin_the_state() {
        let out = chain()
            .run(&[Emission::Observed(1), Emission::Observed(9), Emission::Soft(vec![1.0, 0.0])])
            .unwrap();
        assert_eq!(out[0], vec![0.0, 1.0]);
        assert!((out[1][0] - 0.2).abs() < 1e-12);
        assert_eq!(out[2], vec![1.0, 0.0]);
    }

    #[test]
    fn malformed_chains_are_rejected() {
        assert!(StageChain::new(vec!["a".into()], vec![vec![0.5]]).is_err());
        assert!(chain().run(&[Emission::Soft(vec![1.0])]).is_err());
    }

    #[test]
    fn capacity_emission_favours_good_capacities() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "Cap".to_string(),
            vec![
                StateProbability {
                    state: "Good".into(),
                    probability: 0.9,
                },
                StateProbability {
                    state: "Bad".into(),
                    probability: 0.1,
                },
            ],
        );
        let report = PosteriorReport {
            network: "n".into(),
            evidence: BTreeMap::new(),
            nodes,
        };
        let Emission::Soft(like) = capacity_emission(&report, &[("Cap".into(), 1.0)], 4.0) else {
            panic!("expected soft emission");
        };
        assert!(like[0] > like[1]);
        assert!((like.iter().sum::<f64>() - 1.0).abs() < 1e-12);

        let Emission::Soft(neutral) = capacity_emission(&report, &[], 4.0) else {
            panic!("expected soft emission");
        };
        assert!((neutral[0] - 0.5).abs() < 1e-12);
    }
}
