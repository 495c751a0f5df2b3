//! Property tests for aggregation, table normalization and prior discretization.

use proptest::prelude::*;
use resilience_core::engine::elicitation::ElicitationRecord;
use resilience_core::engine::fuzzy::Opinion;
use resilience_core::engine::prior::{PriorEstimator, RootPriors};
use resilience_core::{CptParameterizer, FuzzyEvaluator, LinguisticGrade, NetworkBuilder};

const THREE_STATE_CHILD: &str = r#"
network Prop {
    node a { x, y } prior categorical;
    node b { u, v, w } prior categorical;
    node c { low, mid, high } given (a, b);
}
"#;

fn opinions() -> impl Strategy<Value = Vec<Opinion>> {
    prop::collection::vec(
        (prop::sample::select(LinguisticGrade::ALL.to_vec()), 0f64..1.0),
        1..8,
    )
    .prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(grade, prior_weight)| Opinion {
                grade,
                prior_weight,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn aggregated_fuzzy_number_stays_ordered(ops in opinions(), beta in 0f64..=1.0) {
        let evaluator = FuzzyEvaluator::new(beta).unwrap();
        let result = evaluator.evaluate(&ops).unwrap();
        let [a1, a2, a3, a4] = result.aggregated.components();
        prop_assert!(a1 <= a2 + 1e-12);
        prop_assert!(a2 <= a3 + 1e-12);
        prop_assert!(a3 <= a4 + 1e-12);
        prop_assert!(a1 >= -1e-12 && a4 <= 1.0 + 1e-12);
    }

    #[test]
    fn defuzzified_probability_is_in_unit_interval(ops in opinions()) {
        let result = FuzzyEvaluator::default().evaluate(&ops).unwrap();
        prop_assert!((0.0..=1.0).contains(&result.probability));
        let raw = result.aggregated.defuzzify();
        prop_assert!(raw >= -1e-9 && raw <= 1.0 + 1e-9, "centroid {}", raw);
    }

    #[test]
    fn similarity_and_combined_weights_are_normalized(ops in opinions(), beta in 0f64..=1.0) {
        let result = FuzzyEvaluator::new(beta).unwrap().evaluate(&ops).unwrap();
        prop_assert_eq!(result.relative_similarity.len(), ops.len());
        prop_assert_eq!(result.weights.len(), ops.len());
        let rel: f64 = result.relative_similarity.iter().sum();
        let combined: f64 = result.weights.iter().sum();
        prop_assert!((rel - 1.0).abs() < 1e-9);
        prop_assert!((combined - 1.0).abs() < 1e-9);
        prop_assert!(result.weights.iter().all(|w| *w >= 0.0));
    }

    #[test]
    fn elicited_rows_sum_to_one(probs in prop::collection::vec(0.001f64..1.0, 18)) {
        let built = NetworkBuilder::from_source(THREE_STATE_CHILD)
            .unwrap()
            .build()
            .unwrap();
        let mut records = Vec::new();
        for a in 0..2 {
            for b in 0..3 {
                for state in 0..3 {
                    let p = probs[(a * 3 + b) * 3 + state];
                    records.push(ElicitationRecord::new("c", vec![a, b], state, p));
                }
            }
        }
        let net = CptParameterizer::default().parameterize(built, &RootPriors::new(), &records);
        let c = net.network().by_name("c").unwrap();
        prop_assert_eq!(c.cpt.unassigned_rows(), 0);
        for sum in c.cpt.row_sums() {
            prop_assert!((sum - 1.0).abs() <= 1e-9, "row sums to {}", sum);
        }
    }

    #[test]
    fn duration_bins_always_sum_to_one(
        samples in prop::collection::vec(0f64..180.0, 1..1000),
        lower in 0f64..20.0,
        upper in 80f64..100.0,
    ) {
        let estimator = PriorEstimator {
            lower_percentile: lower,
            upper_percentile: upper,
        };
        let bins = estimator
            .duration_prior(&samples, &[0.0, 15.0, 30.0, 60.0])
            .unwrap();
        prop_assert_eq!(bins.len(), 4);
        prop_assert!(bins.iter().all(|p| *p >= 0.0));
        prop_assert!((bins.iter().sum::<f64>() - 1.0).abs() <= 1e-9);
    }
}
