//! Artifacts, reports, audit logs and CSV inputs on disk.

use std::fmt::Write as _;

use resilience_core::engine::evidence::Evidence;
use resilience_core::engine::prior::PriorTable;
use resilience_core::pipeline::{parameterize, AssessmentInputs};
use resilience_core::scenario::{nodes, scenario_spec};
use resilience_core::storage::tables::{
    load_elicitation_table, load_expert_panel, load_prior_table,
};
use resilience_core::storage::{
    load_network, read_posterior_report, save_network, write_cpt_report, write_posterior_report,
    EvidenceAuditLog, NetworkArtifact, FORMAT_VERSION,
};
use resilience_core::{Diagnostic, InferenceCoordinator, ResilienceConfig, ResilienceError};
use resilience_tests::{
    elicitation_items, prior_table, scenario_inputs, scenario_network, EXPERTS,
};

fn t2_evidence() -> Evidence {
    [
        (nodes::ROAD_PASSIBILITY, 0),
        (nodes::ROAD_LOSS, 1),
        (nodes::CASUALTIES, 1),
        (nodes::TOW_RESOURCE, 1),
        (nodes::RESPONSE_DURATION, 2),
    ]
    .into_iter()
    .collect()
}

#[test]
fn saved_network_reproduces_posteriors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");
    let original = scenario_network();
    save_network(&original, &path).unwrap();
    let loaded = load_network(&path, 1e-9).unwrap();
    assert!(loaded.is_clean(), "{:?}", loaded.diagnostics());

    for node in original.network().nodes() {
        let restored = loaded.network().by_name(&node.name).unwrap();
        assert_eq!(restored.states, node.states);
        assert_eq!(restored.cpt.values(), node.cpt.values(), "{}", node.name);
    }

    let mut before = InferenceCoordinator::new(original);
    let mut after = InferenceCoordinator::new(loaded);
    assert_eq!(before.infer().unwrap(), after.infer().unwrap());
    assert_eq!(
        before.set_evidence(t2_evidence()).unwrap(),
        after.set_evidence(t2_evidence()).unwrap()
    );
}

#[test]
fn default_rows_stay_reported_after_reload() {
    let mut inputs = scenario_inputs();
    let full = inputs.prior_table.clone();
    let mut table = PriorTable::new();
    for name in full.column_names().filter(|n| *n != nodes::CASUALTIES) {
        table.insert_column(name, full.column(name).unwrap().to_vec());
    }
    inputs.prior_table = table;
    let partial =
        parameterize(scenario_spec().unwrap(), &inputs, &ResilienceConfig::default()).unwrap();
    assert!(!partial.is_clean());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");
    save_network(&partial, &path).unwrap();
    let loaded = load_network(&path, 1e-9).unwrap();

    assert!(!loaded.is_clean());
    let unparameterized: Vec<_> = loaded
        .diagnostics()
        .iter()
        .filter(|d| matches!(d, Diagnostic::UnparameterizedRows { .. }))
        .collect();
    assert_eq!(
        unparameterized,
        vec![&Diagnostic::UnparameterizedRows {
            node: nodes::CASUALTIES.to_string(),
            rows: 1,
            total: 1,
        }]
    );
    let casualties = loaded.network().by_name(nodes::CASUALTIES).unwrap();
    assert!(!casualties.cpt.is_assigned(0));
}

#[test]
fn edited_artifact_values_are_reported_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");
    let mut artifact = NetworkArtifact::from_network(&scenario_network());
    let record = artifact
        .nodes
        .iter_mut()
        .find(|n| n.name == nodes::ROAD_PASSIBILITY)
        .unwrap();
    record.cpt[0] += 0.375;
    std::fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();

    let loaded = load_network(&path, 1e-9).unwrap();
    assert!(!loaded.is_clean());
    let diags = loaded.diagnostics().as_slice();
    assert_eq!(diags.len(), 1, "{:?}", diags);
    match &diags[0] {
        Diagnostic::UnnormalizedRow { node, row, sum } => {
            assert_eq!(node, nodes::ROAD_PASSIBILITY);
            assert_eq!(*row, 0);
            assert!((sum - 1.375).abs() < 1e-9, "{}", sum);
        }
        other => panic!("expected an unnormalized row, got {:?}", other),
    }
}

#[test]
fn artifact_from_another_format_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");
    let mut artifact = NetworkArtifact::from_network(&scenario_network());
    artifact.format_version = FORMAT_VERSION + 1;
    std::fs::write(&path, serde_json::to_string(&artifact).unwrap()).unwrap();

    match load_network(&path, 1e-9) {
        Err(ResilienceError::VersionMismatch { expected, found }) => {
            assert_eq!(expected, FORMAT_VERSION);
            assert_eq!(found, FORMAT_VERSION + 1);
        }
        other => panic!("expected version mismatch, got {:?}", other),
    }
}

#[test]
fn missing_artifact_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_network(dir.path().join("absent.json"), 1e-9).unwrap_err();
    assert!(matches!(err, ResilienceError::Io { .. }));
}

#[test]
fn posterior_report_survives_a_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posteriors.json");
    let mut coord = InferenceCoordinator::new(scenario_network());
    coord.set_evidence(t2_evidence()).unwrap();
    let report = coord.posterior_report().unwrap();

    write_posterior_report(&report, &path).unwrap();
    let restored = read_posterior_report(&path).unwrap();
    assert_eq!(restored, report);
    assert_eq!(restored.evidence.get(nodes::ROAD_LOSS).map(String::as_str), Some("Loss"));
    assert_eq!(restored.nodes.len(), 15);
}

#[test]
fn coordinator_records_evidence_in_the_audit_log() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("evidence.log");
    let mut coord = InferenceCoordinator::new(scenario_network())
        .with_evidence_sink(EvidenceAuditLog::new(&log_path));

    coord.set_evidence(t2_evidence()).unwrap();
    let mut rejected = Evidence::new();
    rejected.insert(nodes::CASUALTIES, 5);
    coord.set_evidence(rejected.clone()).unwrap();

    let entries = EvidenceAuditLog::new(&log_path).entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].evidence, t2_evidence());
    assert_eq!(entries[1].evidence, rejected);
    assert!(entries[0].timestamp <= entries[1].timestamp);
}

#[test]
fn cpt_report_lists_every_node() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cpts.txt");
    let net = scenario_network();
    write_cpt_report(net.network(), &path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    for node in net.network().nodes() {
        assert!(text.contains(&format!("Node: {}", node.name)), "{}", node.name);
    }
    assert!(!text.contains("(default)"));
}

#[test]
fn csv_inputs_match_in_memory_inputs() {
    let dir = tempfile::tempdir().unwrap();

    let table = prior_table();
    let names: Vec<&str> = table.column_names().collect();
    let depth = names
        .iter()
        .map(|n| table.column(n).map_or(0, <[String]>::len))
        .max()
        .unwrap_or(0);
    let mut priors = names.join(",");
    priors.push('\n');
    for row in 0..depth {
        let cells: Vec<&str> = names
            .iter()
            .map(|n| {
                table
                    .column(n)
                    .and_then(|c| c.get(row))
                    .map_or("", String::as_str)
            })
            .collect();
        writeln!(priors, "{}", cells.join(",")).unwrap();
    }

    let mut elicitation = format!("Node,Condition,State,{}\n", EXPERTS.join(","));
    for item in elicitation_items() {
        let condition = item
            .condition
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let grades: Vec<&str> = item.grades.iter().map(|(_, g)| g.as_str()).collect();
        writeln!(
            elicitation,
            "{},\"[{}]\",{},{}",
            item.node,
            condition,
            item.state,
            grades.join(",")
        )
        .unwrap();
    }
    let experts = "Expert,Title,Experience,Education\ne1,3,5,2\ne2,2,4,1\ne3,1,2,0\n";

    let prior_path = dir.path().join("priors.csv");
    let elicitation_path = dir.path().join("elicitation.csv");
    let expert_path = dir.path().join("experts.csv");
    std::fs::write(&prior_path, priors).unwrap();
    std::fs::write(&elicitation_path, elicitation).unwrap();
    std::fs::write(&expert_path, experts).unwrap();

    let inputs = AssessmentInputs {
        prior_table: load_prior_table(&prior_path).unwrap(),
        panel: load_expert_panel(&expert_path).unwrap(),
        items: load_elicitation_table(&elicitation_path).unwrap(),
    };
    let from_disk =
        parameterize(scenario_spec().unwrap(), &inputs, &ResilienceConfig::default()).unwrap();
    assert!(from_disk.is_clean(), "{:?}", from_disk.diagnostics());

    let mut disk = InferenceCoordinator::new(from_disk);
    let mut memory = InferenceCoordinator::new(scenario_network());
    assert_eq!(disk.infer().unwrap(), memory.infer().unwrap());
}
