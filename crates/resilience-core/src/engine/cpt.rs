//! # CPT Parameterization
//!
//! Writes elicited conditionals and estimated root priors onto a built
//! network, then verifies every table.
//!
//! ## Condition ordering
//!
//! Every elicited condition is read in the node's **declared** parent order.
//! A condition whose arity differs from the declared parent count is dropped
//! with [`Diagnostic::UnresolvableConditionOrdering`]; no alternative ordering
//! is ever guessed. When the network's actual parent order differs from the
//! declaration, conditions are permuted by parent name onto the table axes.
//!
//! ## Group completion
//!
//! Records are grouped by node, then by condition. A binary group that
//! supplies one state gets the complement `1 - p` for the other. A wider
//! group with missing states takes them as 0 and is reported. Each group is
//! then rescaled to sum to 1 and written as one table row.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::engine::builder::BuiltNetwork;
use crate::engine::diagnostics::{Diagnostic, Diagnostics};
use crate::engine::elicitation::ElicitationRecord;
use crate::engine::errors::ResilienceError;
use crate::engine::network::{BayesianNetwork, NodeIndex};
use crate::engine::prior::RootPriors;
use crate::NetworkSpec;

/// Default tolerance for the row-sum verification pass.
pub const DEFAULT_ROW_TOLERANCE: f64 = 1e-9;

/// node -> condition -> state -> probability
type Groups = BTreeMap<String, BTreeMap<Vec<usize>, BTreeMap<usize, f64>>>;

/// Parameterized phase: every table written and verified.
#[derive(Debug, Clone)]
pub struct ParameterizedNetwork {
    spec: NetworkSpec,
    network: BayesianNetwork,
    diagnostics: Diagnostics,
}

impl ParameterizedNetwork {
    pub(crate) fn from_parts(
        spec: NetworkSpec,
        network: BayesianNetwork,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            spec,
            network,
            diagnostics,
        }
    }

    pub fn spec(&self) -> &NetworkSpec {
        &self.spec
    }

    pub fn network(&self) -> &BayesianNetwork {
        &self.network
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Whether the network can be trusted: no diagnostic was recorded in any phase.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Writes normalized conditional probability tables onto a built network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CptParameterizer {
    row_tolerance: f64,
}

impl Default for CptParameterizer {
    fn default() -> Self {
        Self {
            row_tolerance: DEFAULT_ROW_TOLERANCE,
        }
    }
}

impl CptParameterizer {
    pub fn new(row_tolerance: f64) -> Result<Self, ResilienceError> {
        if !row_tolerance.is_finite() || row_tolerance <= 0.0 {
            return Err(ResilienceError::ValidationError(format!(
                "row tolerance must be positive and finite, got {}",
                row_tolerance
            )));
        }
        Ok(Self { row_tolerance })
    }

    pub fn row_tolerance(&self) -> f64 {
        self.row_tolerance
    }

    /// Consumes the built network and returns it fully parameterized.
    pub fn parameterize(
        &self,
        built: BuiltNetwork,
        priors: &RootPriors,
        records: &[ElicitationRecord],
    ) -> ParameterizedNetwork {
        let (spec, mut network, mut diagnostics) = built.into_parts();

        self.write_priors(&mut network, priors, &mut diagnostics);
        let groups = group_records(&spec, &network, records, &mut diagnostics);
        let written = write_groups(&mut network, groups, &mut diagnostics);
        verify_tables(&network, self.row_tolerance, &mut diagnostics);

        info!(
            network = %network.name(),
            rows_written = written,
            priors = priors.len(),
            diagnostics = diagnostics.len(),
            "network parameterized"
        );
        ParameterizedNetwork::from_parts(spec, network, diagnostics)
    }

    fn write_priors(
        &self,
        network: &mut BayesianNetwork,
        priors: &RootPriors,
        diagnostics: &mut Diagnostics,
    ) {
        for (name, probs) in priors {
            let Some(idx) = network.index_of(name) else {
                diagnostics.push(Diagnostic::UnknownNode { node: name.clone() });
                continue;
            };
            let node = network.node(idx);
            if !node.is_root() || probs.len() != node.cardinality() {
                diagnostics.push(Diagnostic::PriorShapeMismatch {
                    node: name.clone(),
                    expected: node.cardinality(),
                    found: probs.len(),
                });
                continue;
            }
            let Some(row) = normalized(probs) else {
                diagnostics.push(Diagnostic::NonPositiveNormalizationGroup {
                    node: name.clone(),
                    condition: Vec::new(),
                    sum: probs.iter().sum(),
                });
                continue;
            };
            if let Err(err) = network.node_mut(idx).cpt.set_row(0, &row) {
                debug!(node = %name, error = %err, "prior not written");
            }
        }
    }
}

/// Groups records by node and condition, with each condition permuted onto
/// the table's axis order.
fn group_records(
    spec: &NetworkSpec,
    network: &BayesianNetwork,
    records: &[ElicitationRecord],
    diagnostics: &mut Diagnostics,
) -> Groups {
    let mut groups = Groups::new();
    for record in records {
        let Some(idx) = network.index_of(&record.node) else {
            diagnostics.push(Diagnostic::UnknownNode {
                node: record.node.clone(),
            });
            continue;
        };
        let declared = spec
            .node(&record.node)
            .map(|decl| decl.parents.clone())
            .unwrap_or_else(|| network.parent_names(idx));

        let Some(condition) = canonical_condition(network, idx, &declared, &record.condition) else {
            diagnostics.push(Diagnostic::UnresolvableConditionOrdering {
                node: record.node.clone(),
                condition: record.condition.clone(),
                expected_arity: declared.len(),
            });
            continue;
        };

        let node = network.node(idx);
        if node.cpt.row_index(&condition).is_none() {
            diagnostics.push(Diagnostic::ConditionOutOfRange {
                node: record.node.clone(),
                condition: record.condition.clone(),
            });
            continue;
        }
        if record.state >= node.cardinality() {
            diagnostics.push(Diagnostic::StateOutOfRange {
                node: record.node.clone(),
                state: record.state,
            });
            continue;
        }

        let previous = groups
            .entry(record.node.clone())
            .or_default()
            .entry(condition)
            .or_default()
            .insert(record.state, record.probability);
        if previous.is_some() {
            diagnostics.push(Diagnostic::DuplicateRecord {
                node: record.node.clone(),
                condition: record.condition.clone(),
                state: record.state,
            });
        }
    }
    groups
}

/// Maps a condition given in declared parent order onto the network's actual
/// parent order. `None` when the arity or the parent sets disagree.
fn canonical_condition(
    network: &BayesianNetwork,
    idx: NodeIndex,
    declared: &[String],
    condition: &[usize],
) -> Option<Vec<usize>> {
    let actual = network.parent_names(idx);
    if condition.len() != declared.len() || actual.len() != declared.len() {
        return None;
    }
    actual
        .iter()
        .map(|name| {
            declared
                .iter()
                .position(|d| d == name)
                .map(|pos| condition[pos])
        })
        .collect()
}

/// Completes, normalizes and writes each group. Returns the number of rows written.
fn write_groups(network: &mut BayesianNetwork, groups: Groups, diagnostics: &mut Diagnostics) -> usize {
    let mut written = 0;
    for (name, conditions) in groups {
        let Some(idx) = network.index_of(&name) else {
            continue;
        };
        let cardinality = network.node(idx).cardinality();
        for (condition, states) in conditions {
            let mut row = vec![0.0; cardinality];
            for (&state, &p) in &states {
                row[state] = p;
            }

            let single = if cardinality == 2 && states.len() == 1 {
                states.iter().next()
            } else {
                None
            };
            if let Some((&given, &p)) = single {
                row[1 - given] = (1.0 - p).max(0.0);
            } else if states.len() < cardinality {
                let missing: Vec<usize> = (0..cardinality)
                    .filter(|s| !states.contains_key(s))
                    .collect();
                diagnostics.push(Diagnostic::IncompleteGroup {
                    node: name.clone(),
                    condition: condition.clone(),
                    missing,
                });
            }

            let Some(row) = normalized(&row) else {
                diagnostics.push(Diagnostic::NonPositiveNormalizationGroup {
                    node: name.clone(),
                    condition: condition.clone(),
                    sum: row.iter().sum(),
                });
                continue;
            };

            let cpt = &mut network.node_mut(idx).cpt;
            let stored = match cpt.row_index(&condition) {
                Some(r) => cpt.set_row(r, &row).is_ok(),
                None => false,
            };
            if stored {
                written += 1;
            } else {
                diagnostics.push(Diagnostic::ConditionOutOfRange {
                    node: name.clone(),
                    condition,
                });
            }
        }
    }
    written
}

/// Rescales to sum 1. `None` if any value is negative or non-finite, or the
/// sum is not positive.
fn normalized(values: &[f64]) -> Option<Vec<f64>> {
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return None;
    }
    let sum: f64 = values.iter().sum();
    if sum <= 0.0 {
        return None;
    }
    Some(values.iter().map(|v| v / sum).collect())
}

/// Checks every row of every table.
///
/// Assigned rows must sum to 1 within `tolerance`; rows that were never
/// assigned are summarised per node.
pub fn verify_tables(network: &BayesianNetwork, tolerance: f64, diagnostics: &mut Diagnostics) {
    for node in network.nodes() {
        for (row, sum) in node.cpt.row_sums().enumerate() {
            if !sum.is_finite() || (sum - 1.0).abs() > tolerance {
                diagnostics.push(Diagnostic::UnnormalizedRow {
                    node: node.name.clone(),
                    row,
                    sum,
                });
            }
        }
        let unassigned = node.cpt.unassigned_rows();
        if unassigned > 0 {
            diagnostics.push(Diagnostic::UnparameterizedRows {
                node: node.name.clone(),
                rows: unassigned,
                total: node.cpt.row_count(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builder::NetworkBuilder;

    const SOURCE: &str = r#"
        network Demo {
            node a { no, yes };
            node b { low, mid, high };
            node c { good, bad } given (a, b);
        }
    "#;

    fn built() -> BuiltNetwork {
        NetworkBuilder::from_source(SOURCE).unwrap().build().unwrap()
    }

    fn full_records() -> Vec<ElicitationRecord> {
        let mut records = Vec::new();
        for a in 0..2 {
            for b in 0..3 {
                records.push(ElicitationRecord::new("c", vec![a, b], 0, 0.1 + 0.1 * (a * 3 + b) as f64));
            }
        }
        records
    }

    fn priors() -> RootPriors {
        let mut priors = RootPriors::new();
        priors.insert("a".into(), vec![0.25, 0.75]);
        priors.insert("b".into(), vec![2.0, 1.0, 1.0]);
        priors
    }

    #[test]
    fn binary_complement_fills_the_other_state() {
        let records = vec![ElicitationRecord::new("c", vec![1, 2], 0, 0.7)];
        let net = CptParameterizer::default().parameterize(built(), &priors(), &records);
        let c = net.network().by_name("c").unwrap();
        let row = c.cpt.row(c.cpt.row_index(&[1, 2]).unwrap());
        assert!((row[0] - 0.7).abs() < 1e-12);
        assert!((row[1] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn complete_input_leaves_no_diagnostics() {
        let net = CptParameterizer::default().parameterize(built(), &priors(), &full_records());
        assert!(net.is_clean(), "{:?}", net.diagnostics());
        let b = net.network().by_name("b").unwrap();
        assert_eq!(b.cpt.row(0), &[0.5, 0.25, 0.25]);
        for node in net.network().nodes() {
            for sum in node.cpt.row_sums() {
                assert!((sum - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn wrong_arity_is_rejected_not_guessed() {
        let records = vec![ElicitationRecord::new("c", vec![1], 0, 0.4)];
        let net = CptParameterizer::default().parameterize(built(), &priors(), &records);
        assert!(net.diagnostics().iter().any(|d| matches!(
            d,
            Diagnostic::UnresolvableConditionOrdering { expected_arity: 2, .. }
        )));
    }

    #[test]
    fn out_of_range_and_unknown_records_are_reported() {
        let records = vec![
            ElicitationRecord::new("c", vec![2, 0], 0, 0.4),
            ElicitationRecord::new("c", vec![0, 0], 5, 0.4),
            ElicitationRecord::new("zzz", vec![], 0, 0.4),
        ];
        let net = CptParameterizer::default().parameterize(built(), &priors(), &records);
        let d = net.diagnostics().as_slice();
        assert!(d.iter().any(|d| matches!(d, Diagnostic::ConditionOutOfRange { .. })));
        assert!(d.iter().any(|d| matches!(d, Diagnostic::StateOutOfRange { state: 5, .. })));
        assert!(d.iter().any(|d| matches!(d, Diagnostic::UnknownNode { node } if node == "zzz")));
    }

    #[test]
    fn zero_groups_are_dropped_and_rows_stay_unparameterized() {
        let records = vec![
            ElicitationRecord::new("c", vec![0, 0], 0, 0.0),
            ElicitationRecord::new("c", vec![0, 0], 1, 0.0),
        ];
        let net = CptParameterizer::default().parameterize(built(), &priors(), &records);
        let d = net.diagnostics().as_slice();
        assert!(d
            .iter()
            .any(|d| matches!(d, Diagnostic::NonPositiveNormalizationGroup { .. })));
        assert!(d.iter().any(|d| matches!(
            d,
            Diagnostic::UnparameterizedRows { node, rows: 6, total: 6 } if node == "c"
        )));
    }

    #[test]
    fn duplicates_keep_the_last_value() {
        let records = vec![
            ElicitationRecord::new("c", vec![0, 1], 0, 0.2),
            ElicitationRecord::new("c", vec![0, 1], 0, 0.6),
        ];
        let net = CptParameterizer::default().parameterize(built(), &priors(), &records);
        let c = net.network().by_name("c").unwrap();
        assert!((c.cpt.row(1)[0] - 0.6).abs() < 1e-12);
        assert!(net
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::DuplicateRecord { .. })));
    }

    #[test]
    fn non_binary_missing_states_count_as_zero() {
        let source = r#"
            network W {
                node p { a, b };
                node q { x, y, z } given (p);
            }
        "#;
        let built = NetworkBuilder::from_source(source).unwrap().build().unwrap();
        let records = vec![
            ElicitationRecord::new("q", vec![0], 0, 0.2),
            ElicitationRecord::new("q", vec![0], 2, 0.6),
        ];
        let net = CptParameterizer::default().parameterize(built, &RootPriors::new(), &records);
        let q = net.network().by_name("q").unwrap();
        let row = q.cpt.row(0);
        assert!((row[0] - 0.25).abs() < 1e-12);
        assert_eq!(row[1], 0.0);
        assert!((row[2] - 0.75).abs() < 1e-12);
        assert!(net.diagnostics().iter().any(|d| matches!(
            d,
            Diagnostic::IncompleteGroup { missing, .. } if missing == &vec![1]
        )));
    }
}
