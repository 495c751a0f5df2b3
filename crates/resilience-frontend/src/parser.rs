//! # Network Definition Parser
//!
//! Transforms network definition source into a [`NetworkAst`] using the Pest
//! parser generator. Parsing is purely syntactic: duplicate names, unknown
//! parents, and cycles are reported by [`crate::validate::validate_network`].
//!
//! Numbers are parsed at parse time so later stages never re-parse text.
//!
//! ## Grammar
//!
//! The grammar is defined in `grammar.pest` at the crate root.

use crate::ast::*;
use crate::errors::FrontendError;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "../grammar.pest"]
pub struct NetworkParser;

/// Parses network definition source into an AST.
///
/// # Example
///
/// ```rust,ignore
/// use resilience_frontend::parse_network;
///
/// let ast = parse_network("network N { node a { Lo, Hi } }")?;
/// assert_eq!(ast.nodes.len(), 1);
/// ```
pub fn parse_network(source: &str) -> Result<NetworkAst, FrontendError> {
    let mut pairs = NetworkParser::parse(Rule::program, source)
        .map_err(|e| FrontendError::ParseError(e.to_string()))?;

    let program = pairs
        .next()
        .ok_or_else(|| FrontendError::ParseError("empty input".into()))?;
    debug_assert_eq!(program.as_rule(), Rule::program);

    for inner in program.into_inner() {
        if inner.as_rule() == Rule::network_decl {
            return build_network(inner);
        }
    }
    Err(FrontendError::ParseError("missing network declaration".into()))
}

fn build_network(pair: pest::iterators::Pair<Rule>) -> Result<NetworkAst, FrontendError> {
    let mut name = String::new();
    let mut nodes = Vec::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = p.as_str().to_string(),
            Rule::network_body => {
                for decl in p.into_inner() {
                    if decl.as_rule() == Rule::node_decl {
                        nodes.push(build_node(decl)?);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(NetworkAst { name, nodes })
}

fn build_node(pair: pest::iterators::Pair<Rule>) -> Result<NodeDecl, FrontendError> {
    let mut name = String::new();
    let mut states = Vec::new();
    let mut parents = Vec::new();
    let mut prior = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::ident => name = p.as_str().to_string(),
            Rule::state_list => {
                for label in p.into_inner() {
                    states.push(build_label(label)?);
                }
            }
            Rule::given_clause => {
                for list in p.into_inner() {
                    for parent in list.into_inner() {
                        parents.push(parent.as_str().to_string());
                    }
                }
            }
            Rule::prior_clause => prior = Some(build_prior(p)?),
            _ => {}
        }
    }

    Ok(NodeDecl {
        name,
        states,
        parents,
        prior,
    })
}

fn build_label(pair: pest::iterators::Pair<Rule>) -> Result<String, FrontendError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| FrontendError::ParseError("empty state label".into()))?;
    match inner.as_rule() {
        Rule::string => Ok(unquote(inner.as_str())),
        _ => Ok(inner.as_str().to_string()),
    }
}

fn build_prior(pair: pest::iterators::Pair<Rule>) -> Result<PriorDecl, FrontendError> {
    let kind = pair
        .into_inner()
        .next()
        .ok_or_else(|| FrontendError::ParseError("prior clause without a kind".into()))?;
    match kind.as_rule() {
        Rule::prior_categorical => Ok(PriorDecl::Categorical),
        Rule::prior_duration => {
            let mut edges = Vec::new();
            for list in kind.into_inner() {
                for n in list.into_inner() {
                    edges.push(parse_number(n.as_str())?);
                }
            }
            if edges.is_empty() {
                edges = DEFAULT_DURATION_EDGES.to_vec();
            }
            Ok(PriorDecl::Duration { edges })
        }
        other => Err(FrontendError::ParseError(format!(
            "unexpected prior kind: {:?}",
            other
        ))),
    }
}

fn parse_number(text: &str) -> Result<f64, FrontendError> {
    text.parse::<f64>()
        .map_err(|e| FrontendError::ParseError(format!("invalid number '{}': {}", text, e)))
}

fn unquote(text: &str) -> String {
    text.trim_start_matches('"')
        .trim_end_matches('"')
        .to_string()
}
