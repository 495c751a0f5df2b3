//! Network construction from a validated network definition.
//!
//! Building is the first phase transition: a [`NetworkBuilder`] is consumed
//! and yields a [`BuiltNetwork`], the only handle the parameterizer accepts.

use tracing::{debug, info};

use crate::engine::diagnostics::{Diagnostic, Diagnostics};
use crate::engine::errors::ResilienceError;
use crate::engine::network::BayesianNetwork;
use crate::NetworkSpec;

/// Unbuilt phase: holds the definition the network will be created from.
#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    spec: NetworkSpec,
}

impl NetworkBuilder {
    pub fn new(spec: NetworkSpec) -> Self {
        Self { spec }
    }

    /// Parses and validates a network definition.
    pub fn from_source(source: &str) -> Result<Self, ResilienceError> {
        Ok(Self::new(crate::load_network_spec(source)?))
    }

    pub fn spec(&self) -> &NetworkSpec {
        &self.spec
    }

    /// Builds a fresh network.
    pub fn build(self) -> Result<BuiltNetwork, ResilienceError> {
        let network = BayesianNetwork::new(self.spec.name.clone());
        self.build_into(network)
    }

    /// Applies the definition to an existing network.
    ///
    /// Nodes and arcs that already exist are reused, so applying the same
    /// definition twice yields the same structure. Parent order is verified
    /// afterwards; a mismatch is reported, not repaired.
    pub fn build_into(self, mut network: BayesianNetwork) -> Result<BuiltNetwork, ResilienceError> {
        for decl in &self.spec.nodes {
            network.add_node(&decl.name, decl.states.clone())?;
        }
        for decl in &self.spec.nodes {
            let child = network.require(&decl.name)?;
            for parent in &decl.parents {
                let parent = network.require(parent)?;
                if network.add_arc(parent, child)? {
                    debug!(
                        parent = %network.node(parent).name,
                        child = %decl.name,
                        "added arc"
                    );
                }
            }
        }

        let mut diagnostics = Diagnostics::new();
        verify_parent_order(&self.spec, &network, &mut diagnostics);
        info!(
            network = %network.name(),
            nodes = network.len(),
            arcs = network.arcs().len(),
            "network built"
        );
        Ok(BuiltNetwork {
            spec: self.spec,
            network,
            diagnostics,
        })
    }
}

/// Compares each node's actual parent order with its declaration.
pub fn verify_parent_order(
    spec: &NetworkSpec,
    network: &BayesianNetwork,
    diagnostics: &mut Diagnostics,
) {
    for decl in &spec.nodes {
        let Some(idx) = network.index_of(&decl.name) else {
            diagnostics.push(Diagnostic::UnknownNode {
                node: decl.name.clone(),
            });
            continue;
        };
        let actual = network.parent_names(idx);
        if actual != decl.parents {
            diagnostics.push(Diagnostic::ParentOrderMismatch {
                node: decl.name.clone(),
                declared: decl.parents.clone(),
                actual,
            });
        }
    }
}

/// Built phase: structure complete, tables still default.
#[derive(Debug, Clone)]
pub struct BuiltNetwork {
    spec: NetworkSpec,
    network: BayesianNetwork,
    diagnostics: Diagnostics,
}

impl BuiltNetwork {
    pub fn spec(&self) -> &NetworkSpec {
        &self.spec
    }

    pub fn network(&self) -> &BayesianNetwork {
        &self.network
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Records problems found while preparing parameterization inputs
    /// (priors, elicitation) against this network.
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub(crate) fn into_parts(self) -> (NetworkSpec, BayesianNetwork, Diagnostics) {
        (self.spec, self.network, self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_network_spec;

    const SOURCE: &str = r#"
        network Demo {
            node a { x, y };
            node b { p, q, r };
            node c { good, bad } given (b, a);
        }
    "#;

    #[test]
    fn build_follows_declared_parent_order() {
        let built = NetworkBuilder::from_source(SOURCE).unwrap().build().unwrap();
        let net = built.network();
        let c = net.index_of("c").unwrap();
        assert_eq!(net.parent_names(c), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(net.node(c).cpt.parent_cardinalities(), &[3, 2]);
        assert!(built.diagnostics().is_empty());
    }

    #[test]
    fn build_into_is_idempotent() {
        let spec = load_network_spec(SOURCE).unwrap();
        let first = NetworkBuilder::new(spec.clone()).build().unwrap();
        let (_, net, _) = first.clone().into_parts();
        let second = NetworkBuilder::new(spec).build_into(net).unwrap();
        assert_eq!(first.network(), second.network());
        assert_eq!(second.network().arcs().len(), 2);
    }

    #[test]
    fn preexisting_arcs_in_other_order_are_reported() {
        let spec = load_network_spec(SOURCE).unwrap();
        let mut net = BayesianNetwork::new("Demo");
        let a = net.add_node("a", vec!["x".into(), "y".into()]).unwrap();
        let b = net
            .add_node("b", vec!["p".into(), "q".into(), "r".into()])
            .unwrap();
        let c = net.add_node("c", vec!["good".into(), "bad".into()]).unwrap();
        net.add_arc(a, c).unwrap();
        net.add_arc(b, c).unwrap();

        let built = NetworkBuilder::new(spec).build_into(net).unwrap();
        assert!(matches!(
            built.diagnostics().as_slice(),
            [Diagnostic::ParentOrderMismatch { node, .. }] if node == "c"
        ));
    }
}
