//! Persistence and reporting.
//!
//! - **artifact**: versioned network artifact (structure + parameters)
//! - **audit**: append-only evidence audit log
//! - **tables**: CSV input tables (priors, elicitation, expert weights)
//!
//! Report writers for posteriors and CPT dumps live here.

pub mod artifact;
pub mod audit;
pub mod tables;

use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use crate::engine::coordinator::PosteriorReport;
use crate::engine::errors::ResilienceError;
use crate::engine::network::{BayesianNetwork, NodeIndex};

pub use artifact::{load_network, save_network, NetworkArtifact, FORMAT_VERSION};
pub use audit::{AuditEntry, EvidenceAuditLog};

pub fn write_posterior_report(
    report: &PosteriorReport,
    path: impl AsRef<Path>,
) -> Result<(), ResilienceError> {
    let path = path.as_ref();
    let json =
        serde_json::to_string_pretty(report).map_err(|e| ResilienceError::Format(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| ResilienceError::io(path, e))?;
    info!(path = %path.display(), nodes = report.nodes.len(), "wrote posterior report");
    Ok(())
}

pub fn read_posterior_report(path: impl AsRef<Path>) -> Result<PosteriorReport, ResilienceError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| ResilienceError::io(path, e))?;
    serde_json::from_str(&json).map_err(|e| ResilienceError::Format(e.to_string()))
}

/// Human-readable dump of every table, one line per parent combination.
pub fn cpt_report(network: &BayesianNetwork) -> String {
    let mut out = String::new();
    for (i, node) in network.nodes().iter().enumerate() {
        let parents = network.parent_names(NodeIndex(i as u32));
        let _ = writeln!(out, "Node: {}", node.name);
        let _ = writeln!(out, "States: {}", node.states.join(", "));
        if parents.is_empty() {
            let _ = writeln!(out, "Parents: (none)");
        } else {
            let _ = writeln!(out, "Parents: {}", parents.join(", "));
        }

        for row in 0..node.cpt.row_count() {
            let condition = node.cpt.condition_of(row);
            let label = if parents.is_empty() {
                "prior".to_string()
            } else {
                parents
                    .iter()
                    .zip(&condition)
                    .zip(node.parents())
                    .map(|((name, state), idx)| {
                        format!("{}={}", name, network.node(*idx).states[*state])
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let probs = node
                .states
                .iter()
                .zip(node.cpt.row(row))
                .map(|(s, p)| format!("{}={:.6}", s, p))
                .collect::<Vec<_>>()
                .join(" ");
            let marker = if node.cpt.is_assigned(row) { "" } else { "  (default)" };
            let _ = writeln!(out, "  {}: {}{}", label, probs, marker);
        }
        out.push('\n');
    }
    out
}

pub fn write_cpt_report(network: &BayesianNetwork, path: impl AsRef<Path>) -> Result<(), ResilienceError> {
    let path = path.as_ref();
    std::fs::write(path, cpt_report(network)).map_err(|e| ResilienceError::io(path, e))
}
