//! Recoverable pipeline diagnostics.
//!
//! Every stage degrades gracefully: a problem with one table row, one prior
//! column, or one evidence map is logged, recorded here, and skipped. A
//! consumer should treat an empty [`Diagnostics`] as the precondition for
//! trusting the output.

use std::fmt;

use tracing::warn;

/// A recovered problem found while building, parameterizing, or querying a network.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// No historical sample column (or no usable sample) for a root node.
    MissingSampleData { node: String },
    /// A historical sample matched none of the node's states.
    UnknownCategory { node: String, value: String },
    /// A linguistic grade outside the five-point vocabulary.
    UnknownGrade {
        node: String,
        expert: String,
        value: String,
    },
    /// A grade from an expert missing from the weighting table.
    UnknownExpert { node: String, expert: String },
    /// An elicitation item without any usable grade.
    NoExpertData {
        node: String,
        condition: Vec<usize>,
        state: usize,
    },
    /// An elicitation record for a node the network does not contain.
    UnknownNode { node: String },
    /// Condition arity does not match the node's declared parent count.
    UnresolvableConditionOrdering {
        node: String,
        condition: Vec<usize>,
        expected_arity: usize,
    },
    /// A condition index outside its parent's domain.
    ConditionOutOfRange {
        node: String,
        condition: Vec<usize>,
    },
    /// A target state outside the node's domain.
    StateOutOfRange { node: String, state: usize },
    /// The same (node, condition, state) was supplied twice; the last one wins.
    DuplicateRecord {
        node: String,
        condition: Vec<usize>,
        state: usize,
    },
    /// A non-binary group was missing some states; they were taken as 0.
    IncompleteGroup {
        node: String,
        condition: Vec<usize>,
        missing: Vec<usize>,
    },
    /// A (node, condition) group whose probabilities sum to zero or less.
    NonPositiveNormalizationGroup {
        node: String,
        condition: Vec<usize>,
        sum: f64,
    },
    /// An estimated root prior whose length differs from the node's domain.
    PriorShapeMismatch {
        node: String,
        expected: usize,
        found: usize,
    },
    /// A network's actual parent order differs from the declared one.
    ParentOrderMismatch {
        node: String,
        declared: Vec<String>,
        actual: Vec<String>,
    },
    /// A CPT row that does not sum to 1 within tolerance.
    UnnormalizedRow { node: String, row: usize, sum: f64 },
    /// CPT rows that were never written by priors or elicitation.
    UnparameterizedRows { node: String, rows: usize, total: usize },
    /// The inference engine rejected the evidence; an evidence-free pass was used.
    InferenceFailure { reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSampleData { node } => {
                write!(f, "no historical samples for root node '{}'", node)
            }
            Self::UnknownCategory { node, value } => {
                write!(f, "sample '{}' matches no state of '{}'", value, node)
            }
            Self::UnknownGrade {
                node,
                expert,
                value,
            } => write!(
                f,
                "unrecognized grade '{}' from expert '{}' for '{}'",
                value, expert, node
            ),
            Self::UnknownExpert { node, expert } => {
                write!(f, "expert '{}' grading '{}' has no weight", expert, node)
            }
            Self::NoExpertData {
                node,
                condition,
                state,
            } => write!(
                f,
                "no expert grades for '{}' {:?} state {}",
                node, condition, state
            ),
            Self::UnknownNode { node } => write!(f, "unknown node '{}'", node),
            Self::UnresolvableConditionOrdering {
                node,
                condition,
                expected_arity,
            } => write!(
                f,
                "condition {:?} for '{}' has arity {}, expected {}",
                condition,
                node,
                condition.len(),
                expected_arity
            ),
            Self::ConditionOutOfRange { node, condition } => {
                write!(f, "condition {:?} out of range for '{}'", condition, node)
            }
            Self::StateOutOfRange { node, state } => {
                write!(f, "state {} out of range for '{}'", state, node)
            }
            Self::DuplicateRecord {
                node,
                condition,
                state,
            } => write!(
                f,
                "duplicate record for '{}' {:?} state {}",
                node, condition, state
            ),
            Self::IncompleteGroup {
                node,
                condition,
                missing,
            } => write!(
                f,
                "'{}' {:?} has no probability for states {:?}",
                node, condition, missing
            ),
            Self::NonPositiveNormalizationGroup {
                node,
                condition,
                sum,
            } => write!(
                f,
                "'{}' {:?} sums to {} and cannot be normalized",
                node, condition, sum
            ),
            Self::PriorShapeMismatch {
                node,
                expected,
                found,
            } => write!(
                f,
                "prior for '{}' has {} values, expected {}",
                node, found, expected
            ),
            Self::ParentOrderMismatch {
                node,
                declared,
                actual,
            } => write!(
                f,
                "'{}' parents {:?} differ from declared {:?}",
                node, actual, declared
            ),
            Self::UnnormalizedRow { node, row, sum } => {
                write!(f, "'{}' row {} sums to {}", node, row, sum)
            }
            Self::UnparameterizedRows { node, rows, total } => write!(
                f,
                "'{}' has {} of {} rows without parameters",
                node, rows, total
            ),
            Self::InferenceFailure { reason } => {
                write!(f, "evidence rejected, fell back to no evidence: {}", reason)
            }
        }
    }
}

/// Ordered collection of diagnostics; every push is also logged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!(diagnostic = %diagnostic, "recovered pipeline problem");
        self.entries.push(diagnostic);
    }

    /// Records `diagnostic` unless an identical entry is already present.
    /// Returns whether it was added.
    pub fn push_unique(&mut self, diagnostic: Diagnostic) -> bool {
        if self.entries.contains(&diagnostic) {
            return false;
        }
        self.push(diagnostic);
        true
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
