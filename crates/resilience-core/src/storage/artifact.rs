//! Versioned network artifact.
//!
//! Structure and parameters live in one JSON document so they can never be
//! reloaded out of step. Loading rebuilds the network from the stored
//! structure, checks every table's size against it, restores which rows
//! were actually parameterized, and re-runs row verification.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::builder::NetworkBuilder;
use crate::engine::cpt::{verify_tables, ParameterizedNetwork};
use crate::engine::errors::ResilienceError;
use resilience_frontend::{validate_network, NetworkAst, NodeDecl, PriorDecl};

/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkArtifact {
    pub format_version: u32,
    pub engine_version: String,
    pub name: String,
    pub nodes: Vec<NodeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub states: Vec<String>,
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<PriorDecl>,
    /// Row-major table values, first parent most significant.
    pub cpt: Vec<f64>,
    /// Rows that received a prior or elicited value. Rows left at the uniform
    /// default are `false`.
    pub assigned: Vec<bool>,
}

impl NetworkArtifact {
    pub fn from_network(network: &ParameterizedNetwork) -> Self {
        let spec = network.spec();
        let net = network.network();
        let nodes = net
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, node)| NodeRecord {
                name: node.name.clone(),
                states: node.states.clone(),
                parents: net.parent_names(crate::engine::network::NodeIndex(i as u32)),
                prior: spec.node(&node.name).and_then(|decl| decl.prior.clone()),
                cpt: node.cpt.values().to_vec(),
                assigned: node.cpt.assigned().to_vec(),
            })
            .collect();
        Self {
            format_version: FORMAT_VERSION,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            name: net.name().to_string(),
            nodes,
        }
    }

    /// Rebuilds the parameterized network.
    pub fn into_network(self, row_tolerance: f64) -> Result<ParameterizedNetwork, ResilienceError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ResilienceError::VersionMismatch {
                expected: FORMAT_VERSION,
                found: self.format_version,
            });
        }

        let spec = NetworkAst {
            name: self.name,
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeDecl {
                    name: n.name.clone(),
                    states: n.states.clone(),
                    parents: n.parents.clone(),
                    prior: n.prior.clone(),
                })
                .collect(),
        };
        validate_network(&spec)?;

        let (spec, mut network, mut diagnostics) = NetworkBuilder::new(spec).build()?.into_parts();
        for record in &self.nodes {
            let idx = network.require(&record.name)?;
            network
                .node_mut(idx)
                .cpt
                .restore(&record.cpt, &record.assigned)
                .map_err(|e| ResilienceError::Format(format!("node '{}': {}", record.name, e)))?;
        }
        verify_tables(&network, row_tolerance, &mut diagnostics);
        Ok(ParameterizedNetwork::from_parts(spec, network, diagnostics))
    }
}

pub fn save_network(
    network: &ParameterizedNetwork,
    path: impl AsRef<Path>,
) -> Result<(), ResilienceError> {
    let path = path.as_ref();
    let artifact = NetworkArtifact::from_network(network);
    let json = serde_json::to_string_pretty(&artifact)
        .map_err(|e| ResilienceError::Format(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| ResilienceError::io(path, e))?;
    info!(path = %path.display(), nodes = artifact.nodes.len(), "saved network artifact");
    Ok(())
}

pub fn load_network(
    path: impl AsRef<Path>,
    row_tolerance: f64,
) -> Result<ParameterizedNetwork, ResilienceError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| ResilienceError::io(path, e))?;
    let artifact: NetworkArtifact =
        serde_json::from_str(&json).map_err(|e| ResilienceError::Format(e.to_string()))?;
    let network = artifact.into_network(row_tolerance)?;
    info!(path = %path.display(), nodes = network.network().len(), "loaded network artifact");
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cpt::CptParameterizer;
    use crate::engine::diagnostics::Diagnostic;
    use crate::engine::elicitation::ElicitationRecord;
    use crate::engine::prior::RootPriors;

    fn parameterized() -> ParameterizedNetwork {
        let built = NetworkBuilder::from_source(
            "network A { node r { x, y } prior categorical; node c { good, bad } given (r); }",
        )
        .unwrap()
        .build()
        .unwrap();
        let mut priors = RootPriors::new();
        priors.insert("r".into(), vec![0.35, 0.65]);
        let records = vec![
            ElicitationRecord::new("c", vec![0], 0, 0.55),
            ElicitationRecord::new("c", vec![1], 1, 0.8),
        ];
        CptParameterizer::default().parameterize(built, &priors, &records)
    }

    #[test]
    fn version_is_checked() {
        let mut artifact = NetworkArtifact::from_network(&parameterized());
        artifact.format_version = 99;
        assert!(matches!(
            artifact.into_network(1e-9),
            Err(ResilienceError::VersionMismatch {
                expected: FORMAT_VERSION,
                found: 99
            })
        ));
    }

    #[test]
    fn table_size_is_checked() {
        let mut artifact = NetworkArtifact::from_network(&parameterized());
        artifact.nodes[1].cpt.pop();
        assert!(matches!(
            artifact.into_network(1e-9),
            Err(ResilienceError::Format(_))
        ));
    }

    #[test]
    fn file_round_trip_preserves_tables() {
        let original = parameterized();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");
        save_network(&original, &path).unwrap();
        let loaded = load_network(&path, 1e-9).unwrap();
        assert_eq!(loaded.network(), original.network());
        assert!(loaded.is_clean());
    }

    #[test]
    fn default_rows_are_reported_after_reload() {
        let built = NetworkBuilder::from_source(
            "network A { node r { x, y } prior categorical; node c { good, bad } given (r); }",
        )
        .unwrap()
        .build()
        .unwrap();
        let mut priors = RootPriors::new();
        priors.insert("r".into(), vec![0.35, 0.65]);
        let records = vec![ElicitationRecord::new("c", vec![0], 0, 0.55)];
        let partial = CptParameterizer::default().parameterize(built, &priors, &records);
        assert!(!partial.is_clean());

        let artifact = NetworkArtifact::from_network(&partial);
        assert_eq!(artifact.nodes[1].assigned, vec![true, false]);
        let loaded = artifact.into_network(1e-9).unwrap();
        assert!(!loaded.is_clean());
        assert!(loaded.diagnostics().iter().any(|d| matches!(
            d,
            Diagnostic::UnparameterizedRows { node, rows: 1, total: 2 } if node == "c"
        )));
    }

    #[test]
    fn mismatched_row_flags_are_rejected() {
        let mut artifact = NetworkArtifact::from_network(&parameterized());
        artifact.nodes[1].assigned.push(true);
        assert!(matches!(
            artifact.into_network(1e-9),
            Err(ResilienceError::Format(_))
        ));
    }

    #[test]
    fn edited_table_values_are_reverified() {
        let mut artifact = NetworkArtifact::from_network(&parameterized());
        artifact.nodes[1].cpt[2] += 0.25;
        let loaded = artifact.into_network(1e-9).unwrap();
        let unnormalized: Vec<_> = loaded
            .diagnostics()
            .iter()
            .filter_map(|d| match d {
                Diagnostic::UnnormalizedRow { node, row, sum } => Some((node.as_str(), *row, *sum)),
                _ => None,
            })
            .collect();
        assert_eq!(unnormalized.len(), 1);
        assert_eq!(unnormalized[0].0, "c");
        assert_eq!(unnormalized[0].1, 1);
        assert!((unnormalized[0].2 - 1.25).abs() < 1e-12);
    }
}
