//! Turning raw expert grades into conditional probability records.

use tracing::debug;

use crate::engine::diagnostics::{Diagnostic, Diagnostics};
use crate::engine::fuzzy::{ExpertPanel, FuzzyEvaluator, LinguisticGrade, Opinion};

/// One row of the elicitation table: every expert's raw grade for
/// P(`node` = `state` | parents = `condition`).
#[derive(Debug, Clone, PartialEq)]
pub struct ElicitationItem {
    pub node: String,
    /// Parent-state indices in the node's declared parent order.
    pub condition: Vec<usize>,
    pub state: usize,
    /// `(expert id, raw grade)` pairs; blank grades mean no opinion.
    pub grades: Vec<(String, String)>,
}

/// An aggregated conditional probability ready for the parameterizer.
#[derive(Debug, Clone, PartialEq)]
pub struct ElicitationRecord {
    pub node: String,
    pub condition: Vec<usize>,
    pub state: usize,
    pub probability: f64,
}

impl ElicitationRecord {
    pub fn new(node: impl Into<String>, condition: Vec<usize>, state: usize, probability: f64) -> Self {
        Self {
            node: node.into(),
            condition,
            state,
            probability,
        }
    }
}

/// Aggregates every item with the fuzzy evaluator.
///
/// Unrecognized grades and experts missing from the panel are dropped with a
/// diagnostic. Items left without any usable grade yield no record.
pub fn elicit(
    items: &[ElicitationItem],
    panel: &ExpertPanel,
    evaluator: &FuzzyEvaluator,
    diagnostics: &mut Diagnostics,
) -> Vec<ElicitationRecord> {
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let mut opinions = Vec::with_capacity(item.grades.len());
        for (expert, raw) in &item.grades {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let grade = match raw.parse::<LinguisticGrade>() {
                Ok(grade) => grade,
                Err(_) => {
                    diagnostics.push(Diagnostic::UnknownGrade {
                        node: item.node.clone(),
                        expert: expert.clone(),
                        value: raw.to_string(),
                    });
                    continue;
                }
            };
            let Some(prior_weight) = panel.weight(expert) else {
                diagnostics.push(Diagnostic::UnknownExpert {
                    node: item.node.clone(),
                    expert: expert.clone(),
                });
                continue;
            };
            opinions.push(Opinion {
                grade,
                prior_weight,
            });
        }

        match evaluator.evaluate(&opinions) {
            Some(assessment) => {
                debug!(
                    node = %item.node,
                    condition = ?item.condition,
                    state = item.state,
                    experts = opinions.len(),
                    probability = assessment.probability,
                    "aggregated expert grades"
                );
                records.push(ElicitationRecord::new(
                    item.node.clone(),
                    item.condition.clone(),
                    item.state,
                    assessment.probability,
                ));
            }
            None => diagnostics.push(Diagnostic::NoExpertData {
                node: item.node.clone(),
                condition: item.condition.clone(),
                state: item.state,
            }),
        }
    }
    records
}
