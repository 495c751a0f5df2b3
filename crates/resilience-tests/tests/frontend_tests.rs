//! Network definition parsing and validation.

use resilience_core::{load_network_spec, NetworkBuilder, ResilienceError};
use resilience_frontend::{parse_network, validate_network, FrontendError, PriorDecl};

fn validation_message(source: &str) -> String {
    let ast = parse_network(source).expect("source parses");
    match validate_network(&ast) {
        Err(FrontendError::ValidationDiagnostic(diag)) => diag.to_string(),
        other => panic!("expected a validation diagnostic, got {:?}", other),
    }
}

#[test]
fn quoted_labels_and_default_duration_edges() {
    let ast = parse_network(
        r#"
        network Road {
            node wait { "0-15min", "15-30min", "30-60min", "60min+" } prior duration;
            node ok { Yes, No } given (wait);
        }
        "#,
    )
    .unwrap();
    validate_network(&ast).unwrap();
    let wait = ast.node("wait").unwrap();
    assert_eq!(wait.states[0], "0-15min");
    assert_eq!(
        wait.prior,
        Some(PriorDecl::Duration {
            edges: vec![0.0, 15.0, 30.0, 60.0]
        })
    );
    assert_eq!(ast.roots().count(), 1);
}

#[test]
fn syntax_errors_are_parse_errors() {
    let err = load_network_spec("network Broken { node a { x, y } prior }").unwrap_err();
    assert!(matches!(err, ResilienceError::ParseError(_)), "{:?}", err);
    assert!(NetworkBuilder::from_source("node a { x, y };").is_err());
}

#[test]
fn unknown_parent_is_rejected() {
    let msg = validation_message("network N { node a { x, y } given (ghost); }");
    assert!(msg.contains("unknown parent 'ghost'"), "{}", msg);
    assert!(msg.contains("node 'a'"), "{}", msg);
}

#[test]
fn cycles_are_rejected() {
    let msg = validation_message(
        "network N { node a { x, y } given (c); node b { x, y } given (a); node c { x, y } given (b); }",
    );
    assert!(msg.contains("cycle"), "{}", msg);
}

#[test]
fn priors_on_child_nodes_are_rejected() {
    let msg = validation_message(
        "network N { node a { x, y } prior categorical; node b { x, y } given (a) prior categorical; }",
    );
    assert!(msg.contains("root nodes"), "{}", msg);
}

#[test]
fn duration_edges_must_match_states_and_increase() {
    let msg = validation_message("network N { node d { s, m, l } prior duration [0, 15]; }");
    assert!(msg.contains("2 bin edges"), "{}", msg);
    let msg = validation_message("network N { node d { s, m, l } prior duration [0, 30, 15]; }");
    assert!(msg.contains("strictly increasing"), "{}", msg);
}

#[test]
fn single_state_and_duplicate_labels_are_rejected() {
    let msg = validation_message("network N { node a { only }; }");
    assert!(msg.contains("at least 2 states"), "{}", msg);
    let msg = validation_message("network N { node a { x, x }; }");
    assert!(msg.contains("duplicate state"), "{}", msg);
}

#[test]
fn validation_errors_surface_through_the_engine() {
    let err = load_network_spec("network N { node a { x, y }; node a { x, y }; }").unwrap_err();
    match err {
        ResilienceError::ValidationError(msg) => assert!(msg.contains("duplicate node name")),
        other => panic!("expected validation error, got {:?}", other),
    }
}
