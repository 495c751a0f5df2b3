//! # Abstract Syntax Tree
//!
//! A network definition declares every random variable of a scenario network:
//! its ordered state labels, its ordered parent list, and (for root nodes) how
//! its prior distribution is estimated from historical samples.
//!
//! The parent list order is significant. It fixes the axis order of the
//! node's conditional probability table and the meaning of every elicited
//! condition tuple.

/// Default bin edges for duration priors, in minutes.
pub const DEFAULT_DURATION_EDGES: [f64; 4] = [0.0, 15.0, 30.0, 60.0];

/// The root of a parsed network definition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkAst {
    /// The network name
    pub name: String,
    /// Node declarations in source order
    pub nodes: Vec<NodeDecl>,
}

impl NetworkAst {
    /// Looks up a node declaration by name.
    pub fn node(&self, name: &str) -> Option<&NodeDecl> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Iterates over declarations without parents.
    pub fn roots(&self) -> impl Iterator<Item = &NodeDecl> {
        self.nodes.iter().filter(|n| n.is_root())
    }
}

/// A single random variable declaration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeDecl {
    /// Unique node name
    pub name: String,
    /// Ordered state labels
    pub states: Vec<String>,
    /// Ordered parent names (canonical CPT axis order)
    pub parents: Vec<String>,
    /// Prior estimation strategy for root nodes
    pub prior: Option<PriorDecl>,
}

impl NodeDecl {
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn cardinality(&self) -> usize {
        self.states.len()
    }

    /// The prior strategy, defaulting to categorical frequencies.
    pub fn prior_or_default(&self) -> PriorDecl {
        self.prior.clone().unwrap_or(PriorDecl::Categorical)
    }
}

/// How a root node's prior distribution is estimated.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PriorDecl {
    /// Relative frequency of raw category labels.
    Categorical,
    /// Truncated-normal fit discretized into ordered bins.
    ///
    /// Bin `i` covers `[edges[i], edges[i + 1])`; the last bin is open-ended.
    Duration { edges: Vec<f64> },
}
