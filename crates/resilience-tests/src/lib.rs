//! Shared fixtures for the integration tests.
//!
//! Everything is generated deterministically from the scenario network, so
//! tests do not depend on files on disk.

use resilience_core::engine::elicitation::ElicitationItem;
use resilience_core::engine::prior::PriorTable;
use resilience_core::pipeline::{parameterize, AssessmentInputs};
use resilience_core::scenario::scenario_spec;
use resilience_core::{ExpertPanel, LinguisticGrade, NetworkBuilder, ParameterizedNetwork, ResilienceConfig};
use resilience_frontend::PriorDecl;

pub const EXPERTS: [&str; 3] = ["e1", "e2", "e3"];

/// Deterministic pseudo-random stream in `[0, 1)`.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_unit(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 11) as f64) / ((1_u64 << 53) as f64)
    }
}

pub fn expert_panel() -> ExpertPanel {
    ExpertPanel::from_scores(vec![
        ("e1", vec![3.0, 5.0, 2.0]),
        ("e2", vec![2.0, 4.0, 1.0]),
        ("e3", vec![1.0, 2.0, 0.0]),
    ])
    .expect("valid panel")
}

/// One column per scenario root; every state occurs at least once.
pub fn prior_table() -> PriorTable {
    let spec = scenario_spec().expect("template parses");
    let mut rng = Lcg::new(11);
    let mut table = PriorTable::new();
    for node in spec.roots() {
        let cells: Vec<String> = match node.prior_or_default() {
            PriorDecl::Duration { .. } => (0..400)
                .map(|_| format!("{:.1}", 5.0 + 70.0 * rng.next_unit()))
                .collect(),
            PriorDecl::Categorical => (0..240)
                .map(|i| {
                    let state = if i < node.states.len() {
                        i
                    } else {
                        (rng.next_unit() * node.states.len() as f64) as usize
                    };
                    node.states[state.min(node.states.len() - 1)].clone()
                })
                .collect(),
        };
        table.insert_column(node.name.clone(), cells);
    }
    table
}

/// A state-0 item for every row of every non-root node; `e3` skips some rows.
pub fn elicitation_items() -> Vec<ElicitationItem> {
    let built = NetworkBuilder::new(scenario_spec().expect("template parses"))
        .build()
        .expect("template builds");
    let mut items = Vec::new();
    for (n, node) in built.network().nodes().iter().enumerate() {
        if node.is_root() {
            continue;
        }
        for row in 0..node.cpt.row_count() {
            let grades = EXPERTS
                .iter()
                .enumerate()
                .map(|(e, expert)| {
                    let grade = if e == 2 && row % 4 == 0 {
                        String::new()
                    } else {
                        LinguisticGrade::ALL[(row + n + e) % 5].code().to_string()
                    };
                    (expert.to_string(), grade)
                })
                .collect();
            items.push(ElicitationItem {
                node: node.name.clone(),
                condition: node.cpt.condition_of(row),
                state: 0,
                grades,
            });
        }
    }
    items
}

pub fn scenario_inputs() -> AssessmentInputs {
    AssessmentInputs {
        prior_table: prior_table(),
        panel: expert_panel(),
        items: elicitation_items(),
    }
}

/// The scenario network parameterized from the synthetic inputs.
pub fn scenario_network() -> ParameterizedNetwork {
    parameterize(
        scenario_spec().expect("template parses"),
        &scenario_inputs(),
        &ResilienceConfig::default(),
    )
    .expect("parameterization succeeds")
}
