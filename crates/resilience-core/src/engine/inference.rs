//! # Exact Inference
//!
//! Inference is hidden behind the narrow [`InferenceEngine`] interface:
//! a parameterized network and an evidence map go in, one marginal per node
//! comes out. [`VariableElimination`] is the built-in exact engine.
//!
//! ## Variable elimination
//!
//! Each CPT becomes a factor over `(parents..., node)`. Evidence reduces
//! every factor that mentions an observed node. For each query node the
//! remaining variables are summed out one at a time, always choosing the
//! variable whose elimination creates the smallest intermediate factor
//! (greedy min-weight). The product of what is left is normalized into the
//! node's posterior.
//!
//! Evidence is rejected, not repaired: unknown nodes, state indices outside a
//! node's domain, and evidence of probability zero are all errors.

use std::collections::BTreeMap;

use tracing::debug;

use crate::engine::errors::ResilienceError;
use crate::engine::evidence::Evidence;
use crate::engine::network::BayesianNetwork;

/// Posterior marginals keyed by node name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Posteriors {
    marginals: BTreeMap<String, Vec<f64>>,
}

impl Posteriors {
    pub fn get(&self, node: &str) -> Option<&[f64]> {
        self.marginals.get(node).map(Vec::as_slice)
    }

    pub fn insert(&mut self, node: impl Into<String>, marginal: Vec<f64>) {
        self.marginals.insert(node.into(), marginal);
    }

    pub fn len(&self) -> usize {
        self.marginals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marginals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.marginals
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// `infer(network, evidence) -> {node: distribution}`.
pub trait InferenceEngine {
    fn infer(
        &self,
        network: &BayesianNetwork,
        evidence: &Evidence,
    ) -> Result<Posteriors, ResilienceError>;
}

/// A table over discrete variables; the last variable varies fastest.
#[derive(Debug, Clone, PartialEq)]
struct Factor {
    vars: Vec<usize>,
    cards: Vec<usize>,
    values: Vec<f64>,
}

impl Factor {
    fn scalar(value: f64) -> Self {
        Self {
            vars: Vec::new(),
            cards: Vec::new(),
            values: vec![value],
        }
    }

    fn strides(cards: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; cards.len()];
        for i in (0..cards.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * cards[i + 1];
        }
        strides
    }

    fn contains(&self, var: usize) -> bool {
        self.vars.contains(&var)
    }

    /// Advances a mixed-radix counter, last digit fastest.
    fn advance(assignment: &mut [usize], cards: &[usize]) {
        for i in (0..assignment.len()).rev() {
            assignment[i] += 1;
            if assignment[i] < cards[i] {
                return;
            }
            assignment[i] = 0;
        }
    }

    fn product(&self, other: &Factor) -> Factor {
        let mut vars = self.vars.clone();
        let mut cards = self.cards.clone();
        for (v, c) in other.vars.iter().zip(&other.cards) {
            if !vars.contains(v) {
                vars.push(*v);
                cards.push(*c);
            }
        }
        let positions = |f: &Factor| -> Vec<usize> {
            f.vars
                .iter()
                .map(|v| vars.iter().position(|x| x == v).unwrap_or(0))
                .collect()
        };
        let (self_pos, other_pos) = (positions(self), positions(other));
        let (self_strides, other_strides) = (Self::strides(&self.cards), Self::strides(&other.cards));

        let size: usize = cards.iter().product();
        let mut values = Vec::with_capacity(size);
        let mut assignment = vec![0; vars.len()];
        for _ in 0..size {
            let a: usize = self_pos
                .iter()
                .zip(&self_strides)
                .map(|(p, s)| assignment[*p] * s)
                .sum();
            let b: usize = other_pos
                .iter()
                .zip(&other_strides)
                .map(|(p, s)| assignment[*p] * s)
                .sum();
            values.push(self.values[a] * other.values[b]);
            Self::advance(&mut assignment, &cards);
        }
        Factor { vars, cards, values }
    }

    /// Keeps only entries where `var == state` and drops `var`.
    fn reduce(&self, var: usize, state: usize) -> Factor {
        let Some(pos) = self.vars.iter().position(|v| *v == var) else {
            return self.clone();
        };
        self.project(pos, |values, _| values[state])
    }

    fn sum_out(&self, var: usize) -> Factor {
        let Some(pos) = self.vars.iter().position(|v| *v == var) else {
            return self.clone();
        };
        self.project(pos, |values, _| values.iter().sum())
    }

    /// Removes axis `pos`, collapsing each fibre along it with `collapse`.
    fn project(&self, pos: usize, collapse: impl Fn(&[f64], usize) -> f64) -> Factor {
        let mut vars = self.vars.clone();
        let mut cards = self.cards.clone();
        vars.remove(pos);
        let card = cards.remove(pos);
        let strides = Self::strides(&self.cards);

        let size: usize = cards.iter().product();
        let mut values = Vec::with_capacity(size);
        let mut assignment = vec![0; vars.len()];
        let mut fibre = vec![0.0; card];
        for _ in 0..size {
            let base: usize = assignment
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    let original = if i < pos { i } else { i + 1 };
                    a * strides[original]
                })
                .sum();
            for (s, slot) in fibre.iter_mut().enumerate() {
                *slot = self.values[base + s * strides[pos]];
            }
            values.push(collapse(&fibre, card));
            Self::advance(&mut assignment, &cards);
        }
        Factor { vars, cards, values }
    }
}

/// Exact sum-product variable elimination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableElimination;

impl VariableElimination {
    fn factors(network: &BayesianNetwork, evidence: &[(usize, usize)]) -> Vec<Factor> {
        network
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let mut vars: Vec<usize> = node.parents().iter().map(|p| p.index()).collect();
                vars.push(i);
                let mut cards = node.cpt.parent_cardinalities().to_vec();
                cards.push(node.cardinality());
                let mut factor = Factor {
                    vars,
                    cards,
                    values: node.cpt.values().to_vec(),
                };
                for &(var, state) in evidence {
                    if factor.contains(var) {
                        factor = factor.reduce(var, state);
                    }
                }
                factor
            })
            .collect()
    }

    /// Sums out `eliminate` from `factors` and returns the product of what remains.
    fn eliminate(mut factors: Vec<Factor>, mut eliminate: Vec<usize>) -> Factor {
        while !eliminate.is_empty() {
            let (pick, _) = eliminate
                .iter()
                .enumerate()
                .map(|(i, &var)| (i, Self::elimination_weight(&factors, var)))
                .min_by_key(|(_, weight)| *weight)
                .unwrap_or((0, 0));
            let var = eliminate.swap_remove(pick);

            let (touching, rest): (Vec<Factor>, Vec<Factor>) =
                factors.into_iter().partition(|f| f.contains(var));
            factors = rest;
            if let Some(joint) = touching.into_iter().reduce(|a, b| a.product(&b)) {
                factors.push(joint.sum_out(var));
            }
        }
        factors
            .into_iter()
            .reduce(|a, b| a.product(&b))
            .unwrap_or_else(|| Factor::scalar(1.0))
    }

    /// Size of the factor created by eliminating `var`.
    fn elimination_weight(factors: &[Factor], var: usize) -> usize {
        let mut scope: Vec<(usize, usize)> = Vec::new();
        for f in factors.iter().filter(|f| f.contains(var)) {
            for (v, c) in f.vars.iter().zip(&f.cards) {
                if !scope.iter().any(|(x, _)| x == v) {
                    scope.push((*v, *c));
                }
            }
        }
        scope.iter().map(|(_, c)| c).product()
    }

    fn resolve_evidence(
        network: &BayesianNetwork,
        evidence: &Evidence,
    ) -> Result<Vec<(usize, usize)>, ResilienceError> {
        evidence
            .iter()
            .map(|(name, state)| {
                let idx = network.require(name)?;
                let node = network.node(idx);
                if state >= node.cardinality() {
                    return Err(ResilienceError::Inference(format!(
                        "state {} out of range for '{}' ({} states)",
                        state,
                        name,
                        node.cardinality()
                    )));
                }
                Ok((idx.index(), state))
            })
            .collect()
    }
}

impl InferenceEngine for VariableElimination {
    fn infer(
        &self,
        network: &BayesianNetwork,
        evidence: &Evidence,
    ) -> Result<Posteriors, ResilienceError> {
        let observed = Self::resolve_evidence(network, evidence)?;
        let factors = Self::factors(network, &observed);
        let hidden: Vec<usize> = (0..network.len())
            .filter(|i| !observed.iter().any(|(v, _)| v == i))
            .collect();

        let likelihood = Self::eliminate(factors.clone(), hidden.clone())
            .values
            .iter()
            .sum::<f64>();
        if !likelihood.is_finite() || likelihood <= 0.0 {
            return Err(ResilienceError::Inference(format!(
                "evidence has probability {}",
                likelihood
            )));
        }
        debug!(likelihood, observed = observed.len(), "evidence likelihood");

        let mut posteriors = Posteriors::default();
        for (i, node) in network.nodes().iter().enumerate() {
            if let Some(&(_, state)) = observed.iter().find(|(v, _)| *v == i) {
                let mut one_hot = vec![0.0; node.cardinality()];
                one_hot[state] = 1.0;
                posteriors.insert(node.name.clone(), one_hot);
                continue;
            }
            let others: Vec<usize> = hidden.iter().copied().filter(|v| *v != i).collect();
            let marginal = Self::eliminate(factors.clone(), others);
            let total: f64 = marginal.values.iter().sum();
            if !total.is_finite() || total <= 0.0 {
                return Err(ResilienceError::Numerical(format!(
                    "marginal of '{}' does not normalize ({})",
                    node.name, total
                )));
            }
            posteriors.insert(
                node.name.clone(),
                marginal.values.iter().map(|v| v / total).collect(),
            );
        }
        Ok(posteriors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// rain -> wet <- sprinkler
    fn sprinkler() -> BayesianNetwork {
        let mut net = BayesianNetwork::new("s");
        let rain = net.add_node("rain", vec!["no".into(), "yes".into()]).unwrap();
        let spr = net
            .add_node("sprinkler", vec!["off".into(), "on".into()])
            .unwrap();
        let wet = net.add_node("wet", vec!["dry".into(), "wet".into()]).unwrap();
        net.add_arc(rain, wet).unwrap();
        net.add_arc(spr, wet).unwrap();
        net.node_mut(rain).cpt.fill_with(&[0.8, 0.2]).unwrap();
        net.node_mut(spr).cpt.fill_with(&[0.6, 0.4]).unwrap();
        // rows: (rain, sprinkler) = (0,0) (0,1) (1,0) (1,1)
        net.node_mut(wet)
            .cpt
            .fill_with(&[1.0, 0.0, 0.1, 0.9, 0.2, 0.8, 0.01, 0.99])
            .unwrap();
        net
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn prior_marginals_without_evidence() {
        let post = VariableElimination
            .infer(&sprinkler(), &Evidence::new())
            .unwrap();
        let p_wet = 0.8 * 0.6 * 0.0 + 0.8 * 0.4 * 0.9 + 0.2 * 0.6 * 0.8 + 0.2 * 0.4 * 0.99;
        assert!(close(post.get("wet").unwrap()[1], p_wet));
        assert!(close(post.get("rain").unwrap()[1], 0.2));
    }

    #[test]
    fn diagnostic_reasoning_from_evidence() {
        let ev: Evidence = [("wet", 1)].into_iter().collect();
        let post = VariableElimination.infer(&sprinkler(), &ev).unwrap();
        let joint_rain = 0.2 * 0.6 * 0.8 + 0.2 * 0.4 * 0.99;
        let p_wet = 0.8 * 0.4 * 0.9 + joint_rain;
        assert!(close(post.get("rain").unwrap()[1], joint_rain / p_wet));
        assert_eq!(post.get("wet").unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn rejects_bad_evidence() {
        let net = sprinkler();
        let out_of_range: Evidence = [("wet", 2)].into_iter().collect();
        assert!(VariableElimination.infer(&net, &out_of_range).is_err());
        let unknown: Evidence = [("snow", 0)].into_iter().collect();
        assert!(matches!(
            VariableElimination.infer(&net, &unknown),
            Err(ResilienceError::UnknownNode(_))
        ));
        let impossible: Evidence = [("rain", 0), ("sprinkler", 0), ("wet", 1)]
            .into_iter()
            .collect();
        assert!(VariableElimination.infer(&net, &impossible).is_err());
    }

    #[test]
    fn factor_product_and_sum_out() {
        let a = Factor {
            vars: vec![0],
            cards: vec![2],
            values: vec![0.3, 0.7],
        };
        let b = Factor {
            vars: vec![0, 1],
            cards: vec![2, 3],
            values: vec![0.2, 0.3, 0.5, 0.1, 0.1, 0.8],
        };
        let joint = a.product(&b);
        assert_eq!(joint.vars, vec![0, 1]);
        let summed = joint.sum_out(0);
        let expected = [0.3 * 0.2 + 0.7 * 0.1, 0.3 * 0.3 + 0.7 * 0.1, 0.3 * 0.5 + 0.7 * 0.8];
        for (got, want) in summed.values.iter().zip(expected) {
            assert!(close(*got, want));
        }
        let reduced = b.reduce(1, 2);
        assert_eq!(reduced.values, vec![0.5, 0.8]);
    }
}
