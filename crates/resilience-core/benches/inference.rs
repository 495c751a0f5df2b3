//! Benchmarks for exact inference on the scenario resilience network.
//!
//! Run with `cargo bench --bench inference`.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use resilience_core::engine::elicitation::ElicitationRecord;
use resilience_core::engine::evidence::{CaseFacts, ResponseBehavior};
use resilience_core::engine::prior::RootPriors;
use resilience_core::scenario::SCENARIO_RESILIENCE_SOURCE;
use resilience_core::{
    CptParameterizer, EvidenceMapper, InferenceEngine, NetworkBuilder, ParameterizedNetwork,
    TimeStage, VariableElimination,
};

fn unit(state: &mut u64) -> f64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    ((*state >> 11) as f64) / ((u64::MAX >> 11) as f64)
}

fn scenario_network() -> ParameterizedNetwork {
    let built = NetworkBuilder::from_source(SCENARIO_RESILIENCE_SOURCE)
        .expect("template parses")
        .build()
        .expect("template builds");

    let mut seed = 7_u64;
    let mut records = Vec::new();
    let net = built.network();
    for node in net.nodes().iter().filter(|n| !n.is_root()) {
        for row in 0..node.cpt.row_count() {
            records.push(ElicitationRecord::new(
                node.name.clone(),
                node.cpt.condition_of(row),
                0,
                0.05 + 0.9 * unit(&mut seed),
            ));
        }
    }
    CptParameterizer::default().parameterize(built, &RootPriors::new(), &records)
}

fn bench_inference(c: &mut Criterion) {
    let network = scenario_network();
    let facts = CaseFacts {
        road_impassable: true,
        road_damaged: true,
        casualties: true,
        emergency_type: 1,
        emergency_period: Some("Morning".into()),
        implemented_behaviors: vec![ResponseBehavior::Repair, ResponseBehavior::Tow],
        worst_travel_minutes: Some(25.0),
        disposal_minutes: vec![20.0],
    };
    let mapper = EvidenceMapper::default();

    let mut group = c.benchmark_group("variable_elimination");
    for stage in [TimeStage::T0, TimeStage::T3] {
        let evidence = mapper.map(&facts, stage);
        group.bench_function(stage.label(), |b| {
            b.iter(|| {
                black_box(
                    VariableElimination
                        .infer(black_box(network.network()), black_box(&evidence))
                        .expect("inference succeeds"),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_inference);
criterion_main!(benches);
