//! # Discrete Bayesian Network
//!
//! Nodes are finite random variables with ordered state labels and an
//! ordered parent list. Each node owns a conditional probability table whose
//! rows are indexed by parent-state combinations.
//!
//! ## Layout
//!
//! CPT values are stored row-major: the row index is a mixed-radix number over
//! the parent states with the **first** parent most significant, and within a
//! row the node's own state varies fastest. The flat index of
//! `(condition, state)` is therefore `row(condition) * cardinality + state`.
//!
//! ## Design
//!
//! - O(1) name lookups via an `FxHashMap` index
//! - `add_node` and `add_arc` are idempotent, so re-applying a network
//!   definition never duplicates structure
//! - arcs are appended to the child's parent list in call order

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::errors::ResilienceError;

/// Dense index of a node inside a [`BayesianNetwork`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A conditional probability table.
#[derive(Debug, Clone, PartialEq)]
pub struct Cpt {
    cardinality: usize,
    parent_cardinalities: Vec<usize>,
    values: Vec<f64>,
    assigned: Vec<bool>,
}

impl Cpt {
    /// A uniform table with no row marked as assigned.
    pub fn uniform(cardinality: usize, parent_cardinalities: Vec<usize>) -> Self {
        let rows = parent_cardinalities.iter().product::<usize>();
        Self {
            cardinality,
            values: vec![1.0 / cardinality as f64; rows * cardinality],
            assigned: vec![false; rows],
            parent_cardinalities,
        }
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn parent_cardinalities(&self) -> &[usize] {
        &self.parent_cardinalities
    }

    pub fn row_count(&self) -> usize {
        self.assigned.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Row index for an ordered parent-state tuple, `None` if the arity or any
    /// index is out of range.
    pub fn row_index(&self, condition: &[usize]) -> Option<usize> {
        if condition.len() != self.parent_cardinalities.len() {
            return None;
        }
        let mut row = 0;
        for (&state, &card) in condition.iter().zip(&self.parent_cardinalities) {
            if state >= card {
                return None;
            }
            row = row * card + state;
        }
        Some(row)
    }

    /// Inverse of [`Cpt::row_index`].
    pub fn condition_of(&self, mut row: usize) -> Vec<usize> {
        let mut condition = vec![0; self.parent_cardinalities.len()];
        for (slot, &card) in condition
            .iter_mut()
            .zip(&self.parent_cardinalities)
            .rev()
        {
            *slot = row % card;
            row /= card;
        }
        condition
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.cardinality;
        &self.values[start..start + self.cardinality]
    }

    pub fn is_assigned(&self, row: usize) -> bool {
        self.assigned[row]
    }

    pub fn unassigned_rows(&self) -> usize {
        self.assigned.iter().filter(|a| !**a).count()
    }

    /// Replaces one row and marks it as assigned.
    pub fn set_row(&mut self, row: usize, probabilities: &[f64]) -> Result<(), ResilienceError> {
        if row >= self.row_count() || probabilities.len() != self.cardinality {
            return Err(ResilienceError::Internal(format!(
                "row {} with {} values does not fit a {}x{} table",
                row,
                probabilities.len(),
                self.row_count(),
                self.cardinality
            )));
        }
        let start = row * self.cardinality;
        self.values[start..start + self.cardinality].copy_from_slice(probabilities);
        self.assigned[row] = true;
        Ok(())
    }

    /// Per-row assignment flags, in row order.
    pub fn assigned(&self) -> &[bool] {
        &self.assigned
    }

    /// Replaces every value and marks all rows assigned.
    pub fn fill_with(&mut self, values: &[f64]) -> Result<(), ResilienceError> {
        let all = vec![true; self.row_count()];
        self.restore(values, &all)
    }

    /// Replaces every value and the per-row assignment flags, as stored in a
    /// persisted artifact.
    pub fn restore(&mut self, values: &[f64], assigned: &[bool]) -> Result<(), ResilienceError> {
        if values.len() != self.values.len() {
            return Err(ResilienceError::Format(format!(
                "expected {} table values, found {}",
                self.values.len(),
                values.len()
            )));
        }
        if assigned.len() != self.assigned.len() {
            return Err(ResilienceError::Format(format!(
                "expected {} row flags, found {}",
                self.assigned.len(),
                assigned.len()
            )));
        }
        self.values.copy_from_slice(values);
        self.assigned.copy_from_slice(assigned);
        Ok(())
    }

    pub fn row_sums(&self) -> impl Iterator<Item = f64> + '_ {
        self.values
            .chunks(self.cardinality)
            .map(|row| row.iter().sum::<f64>())
    }
}

/// A finite random variable.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomVariable {
    pub name: String,
    pub states: Vec<String>,
    parents: SmallVec<[NodeIndex; 8]>,
    pub cpt: Cpt,
}

impl RandomVariable {
    pub fn parents(&self) -> &[NodeIndex] {
        &self.parents
    }

    pub fn cardinality(&self) -> usize {
        self.states.len()
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn state_index(&self, label: &str) -> Option<usize> {
        self.states.iter().position(|s| s == label)
    }
}

/// A discrete Bayesian network.
#[derive(Debug, Clone, Default)]
pub struct BayesianNetwork {
    name: String,
    nodes: Vec<RandomVariable>,
    index: FxHashMap<String, NodeIndex>,
}

impl PartialEq for BayesianNetwork {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.nodes == other.nodes
    }
}

impl BayesianNetwork {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[RandomVariable] {
        &self.nodes
    }

    pub fn node(&self, idx: NodeIndex) -> &RandomVariable {
        &self.nodes[idx.index()]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut RandomVariable {
        &mut self.nodes[idx.index()]
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&RandomVariable> {
        self.index_of(name).map(|idx| self.node(idx))
    }

    pub fn require(&self, name: &str) -> Result<NodeIndex, ResilienceError> {
        self.index_of(name)
            .ok_or_else(|| ResilienceError::UnknownNode(name.to_string()))
    }

    /// Adds a node, or returns the existing one with the same name.
    ///
    /// Re-adding with a different state domain is an error rather than a
    /// silent redefinition.
    pub fn add_node(
        &mut self,
        name: &str,
        states: Vec<String>,
    ) -> Result<NodeIndex, ResilienceError> {
        if let Some(existing) = self.index_of(name) {
            if self.node(existing).states != states {
                return Err(ResilienceError::ValidationError(format!(
                    "node '{}' already exists with states {:?}",
                    name,
                    self.node(existing).states
                )));
            }
            return Ok(existing);
        }
        if states.is_empty() {
            return Err(ResilienceError::ValidationError(format!(
                "node '{}' needs at least one state",
                name
            )));
        }
        let idx = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(RandomVariable {
            name: name.to_string(),
            cpt: Cpt::uniform(states.len(), Vec::new()),
            states,
            parents: SmallVec::new(),
        });
        self.index.insert(name.to_string(), idx);
        Ok(idx)
    }

    /// Appends `parent` to `child`'s parent list. Existing arcs are left untouched.
    ///
    /// Returns `true` if a new arc was added. Adding an arc resets the child's
    /// table to uniform, since its shape changes.
    pub fn add_arc(&mut self, parent: NodeIndex, child: NodeIndex) -> Result<bool, ResilienceError> {
        if parent.index() >= self.nodes.len() || child.index() >= self.nodes.len() {
            return Err(ResilienceError::Internal(format!(
                "arc {:?} -> {:?} references a missing node",
                parent, child
            )));
        }
        if parent == child {
            return Err(ResilienceError::ValidationError(format!(
                "node '{}' cannot be its own parent",
                self.node(child).name
            )));
        }
        if self.node(child).parents.contains(&parent) {
            return Ok(false);
        }
        if self.reaches(child, parent) {
            return Err(ResilienceError::ValidationError(format!(
                "arc '{}' -> '{}' would create a cycle",
                self.node(parent).name,
                self.node(child).name
            )));
        }
        self.nodes[child.index()].parents.push(parent);
        self.reset_cpt(child);
        Ok(true)
    }

    /// Whether `to` is reachable from `from` following parent -> child arcs.
    fn reaches(&self, from: NodeIndex, to: NodeIndex) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if std::mem::replace(&mut seen[current.index()], true) {
                continue;
            }
            for (i, node) in self.nodes.iter().enumerate() {
                if node.parents.contains(&current) {
                    stack.push(NodeIndex(i as u32));
                }
            }
        }
        false
    }

    fn reset_cpt(&mut self, idx: NodeIndex) {
        let parent_cards: Vec<usize> = self.nodes[idx.index()]
            .parents
            .iter()
            .map(|p| self.nodes[p.index()].cardinality())
            .collect();
        let node = &mut self.nodes[idx.index()];
        node.cpt = Cpt::uniform(node.cardinality(), parent_cards);
    }

    pub fn parent_names(&self, idx: NodeIndex) -> Vec<String> {
        self.node(idx)
            .parents
            .iter()
            .map(|p| self.node(*p).name.clone())
            .collect()
    }

    /// All `(parent, child)` arcs in node order, then parent order.
    pub fn arcs(&self) -> Vec<(NodeIndex, NodeIndex)> {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(i, node)| node.parents.iter().map(move |p| (*p, NodeIndex(i as u32))))
            .collect()
    }

    /// Nodes ordered so that every parent precedes its children.
    pub fn topological_order(&self) -> Vec<NodeIndex> {
        let mut indegree: Vec<usize> = self.nodes.iter().map(|n| n.parents.len()).collect();
        let mut ready: Vec<NodeIndex> = (0..self.nodes.len())
            .filter(|&i| indegree[i] == 0)
            .map(|i| NodeIndex(i as u32))
            .rev()
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(idx) = ready.pop() {
            order.push(idx);
            for (i, node) in self.nodes.iter().enumerate() {
                let arcs = node.parents.iter().filter(|p| **p == idx).count();
                if arcs > 0 {
                    indegree[i] -= arcs;
                    if indegree[i] == 0 {
                        ready.push(NodeIndex(i as u32));
                    }
                }
            }
        }
        order
    }
}
