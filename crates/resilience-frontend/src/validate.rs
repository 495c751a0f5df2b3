//! # Semantic Validation
//!
//! Checks a parsed network definition beyond syntax:
//!
//! - node names are unique and every node has at least two unique states
//! - every parent is declared, listed once, and is not the node itself
//! - the parent relation is acyclic
//! - priors are only declared on root nodes
//! - duration priors have strictly increasing edges, one per state
//!
//! Validation is separate from parsing to provide clear, actionable error messages.

use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::errors::{FrontendError, ValidationContext};

/// Performs semantic validation on a parsed network definition.
pub fn validate_network(ast: &NetworkAst) -> Result<(), FrontendError> {
    if ast.nodes.is_empty() {
        return Err(FrontendError::validation(
            "network declares no nodes",
            Some(ValidationContext::Network {
                network: ast.name.clone(),
            }),
        ));
    }

    let mut names = HashSet::new();
    for node in &ast.nodes {
        if !names.insert(node.name.as_str()) {
            return Err(FrontendError::validation(
                "duplicate node name",
                Some(node_ctx(node)),
            ));
        }
    }

    for node in &ast.nodes {
        validate_states(node)?;
        validate_parents(node, &names)?;
        validate_prior(node)?;
    }

    validate_acyclic(ast)
}

fn node_ctx(node: &NodeDecl) -> ValidationContext {
    ValidationContext::Node {
        node: node.name.clone(),
    }
}

fn validate_states(node: &NodeDecl) -> Result<(), FrontendError> {
    if node.states.len() < 2 {
        return Err(FrontendError::validation(
            format!("expected at least 2 states, found {}", node.states.len()),
            Some(node_ctx(node)),
        ));
    }
    let mut seen = HashSet::new();
    for state in &node.states {
        if !seen.insert(state.as_str()) {
            return Err(FrontendError::validation(
                format!("duplicate state label '{}'", state),
                Some(node_ctx(node)),
            ));
        }
    }
    Ok(())
}

fn validate_parents(node: &NodeDecl, declared: &HashSet<&str>) -> Result<(), FrontendError> {
    let mut seen = HashSet::new();
    for parent in &node.parents {
        if parent == &node.name {
            return Err(FrontendError::validation(
                "node lists itself as a parent",
                Some(node_ctx(node)),
            ));
        }
        if !declared.contains(parent.as_str()) {
            return Err(FrontendError::validation(
                format!("unknown parent '{}'", parent),
                Some(node_ctx(node)),
            ));
        }
        if !seen.insert(parent.as_str()) {
            return Err(FrontendError::validation(
                format!("parent '{}' listed more than once", parent),
                Some(node_ctx(node)),
            ));
        }
    }
    Ok(())
}

fn validate_prior(node: &NodeDecl) -> Result<(), FrontendError> {
    let Some(prior) = &node.prior else {
        return Ok(());
    };
    let ctx = ValidationContext::Prior {
        node: node.name.clone(),
    };
    if !node.is_root() {
        return Err(FrontendError::validation(
            "priors can only be declared on root nodes",
            Some(ctx),
        ));
    }
    if let PriorDecl::Duration { edges } = prior {
        if edges.len() != node.states.len() {
            return Err(FrontendError::validation(
                format!(
                    "duration prior has {} bin edges but the node has {} states",
                    edges.len(),
                    node.states.len()
                ),
                Some(ctx),
            ));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(FrontendError::validation(
                "bin edges must be finite",
                Some(ctx),
            ));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FrontendError::validation(
                "bin edges must be strictly increasing",
                Some(ctx),
            ));
        }
    }
    Ok(())
}

/// Depth-first search over the parent relation with three-color marking.
fn validate_acyclic(ast: &NetworkAst) -> Result<(), FrontendError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let by_name: HashMap<&str, &NodeDecl> =
        ast.nodes.iter().map(|n| (n.name.as_str(), n)).collect();
    let mut marks: HashMap<&str, Mark> = ast
        .nodes
        .iter()
        .map(|n| (n.name.as_str(), Mark::Unvisited))
        .collect();

    for start in &ast.nodes {
        if marks[start.name.as_str()] != Mark::Unvisited {
            continue;
        }
        // (node, next parent index to visit)
        let mut stack: Vec<(&str, usize)> = vec![(start.name.as_str(), 0)];
        marks.insert(start.name.as_str(), Mark::InProgress);

        while let Some((name, next)) = stack.pop() {
            let node = by_name[name];
            if next < node.parents.len() {
                stack.push((name, next + 1));
                let parent = node.parents[next].as_str();
                match marks[parent] {
                    Mark::InProgress => {
                        return Err(FrontendError::validation(
                            format!("cycle through parent '{}'", parent),
                            Some(node_ctx(node)),
                        ));
                    }
                    Mark::Unvisited => {
                        marks.insert(parent, Mark::InProgress);
                        stack.push((parent, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks.insert(name, Mark::Done);
            }
        }
    }
    Ok(())
}
