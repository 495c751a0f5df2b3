//! Group decision aggregation over linguistic grades.
//!
//! Each expert grades an elicitation item on a five-point vocabulary. Grades
//! map to fixed trapezoidal fuzzy numbers; experts are re-weighted by how much
//! they agree with the rest of the participating group, blended with their
//! prior (competence) weight, and the weighted fuzzy average is defuzzified
//! with the trapezoid centroid.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashSet;

use crate::engine::errors::ResilienceError;

/// Absolute slack used when comparing fuzzy components and weight sums.
const EPSILON: f64 = 1e-12;

/// Default blend between prior expert weight and relative similarity.
pub const DEFAULT_BETA: f64 = 0.5;

/// The fixed five-point linguistic vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinguisticGrade {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl LinguisticGrade {
    pub const ALL: [LinguisticGrade; 5] = [
        LinguisticGrade::VeryLow,
        LinguisticGrade::Low,
        LinguisticGrade::Medium,
        LinguisticGrade::High,
        LinguisticGrade::VeryHigh,
    ];

    /// The trapezoidal fuzzy number this grade stands for.
    pub fn fuzzy_number(self) -> FuzzyNumber {
        let [a1, a2, a3, a4] = match self {
            LinguisticGrade::VeryLow => [0.0, 0.0, 0.1, 0.2],
            LinguisticGrade::Low => [0.1, 0.2, 0.2, 0.3],
            LinguisticGrade::Medium => [0.2, 0.3, 0.4, 0.5],
            LinguisticGrade::High => [0.5, 0.6, 0.7, 0.8],
            LinguisticGrade::VeryHigh => [0.8, 0.9, 1.0, 1.0],
        };
        FuzzyNumber { a1, a2, a3, a4 }
    }

    pub fn code(self) -> &'static str {
        match self {
            LinguisticGrade::VeryLow => "VL",
            LinguisticGrade::Low => "L",
            LinguisticGrade::Medium => "M",
            LinguisticGrade::High => "H",
            LinguisticGrade::VeryHigh => "VH",
        }
    }
}

impl fmt::Display for LinguisticGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LinguisticGrade {
    type Err = ResilienceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VL" => Ok(LinguisticGrade::VeryLow),
            "L" => Ok(LinguisticGrade::Low),
            "M" => Ok(LinguisticGrade::Medium),
            "H" => Ok(LinguisticGrade::High),
            "VH" => Ok(LinguisticGrade::VeryHigh),
            other => Err(ResilienceError::ValidationError(format!(
                "unknown linguistic grade '{}'",
                other
            ))),
        }
    }
}

/// A trapezoidal fuzzy number `(a1 <= a2 <= a3 <= a4)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyNumber {
    a1: f64,
    a2: f64,
    a3: f64,
    a4: f64,
}

impl FuzzyNumber {
    pub fn new(a1: f64, a2: f64, a3: f64, a4: f64) -> Result<Self, ResilienceError> {
        let parts = [a1, a2, a3, a4];
        if parts.iter().any(|v| !v.is_finite()) {
            return Err(ResilienceError::Numerical(format!(
                "fuzzy number components must be finite: {:?}",
                parts
            )));
        }
        if parts.windows(2).any(|w| w[0] > w[1] + EPSILON) {
            return Err(ResilienceError::ValidationError(format!(
                "fuzzy number components must be ordered: {:?}",
                parts
            )));
        }
        Ok(Self { a1, a2, a3, a4 })
    }

    pub fn components(&self) -> [f64; 4] {
        [self.a1, self.a2, self.a3, self.a4]
    }

    /// `1 - mean(|self_k - other_k|)` over the four components.
    pub fn agreement(&self, other: &FuzzyNumber) -> f64 {
        let diff: f64 = self
            .components()
            .iter()
            .zip(other.components().iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        1.0 - diff / 4.0
    }

    /// Centroid of the trapezoid.
    ///
    /// When `a4 + a3 == a2 + a1` the trapezoid collapses to a single point
    /// (components are ordered), so the shared value is returned directly.
    pub fn defuzzify(&self) -> f64 {
        let FuzzyNumber { a1, a2, a3, a4 } = *self;
        let denominator = 3.0 * (a4 + a3 - a2 - a1);
        if denominator.abs() < EPSILON {
            return (a1 + a2 + a3 + a4) / 4.0;
        }
        ((a4 + a3).powi(2) - a4 * a3 - (a1 + a2).powi(2) + a1 * a2) / denominator
    }

    /// Componentwise weighted sum. Weights are expected to be non-negative.
    fn weighted_sum(numbers: &[FuzzyNumber], weights: &[f64]) -> FuzzyNumber {
        let mut acc = [0.0_f64; 4];
        for (number, weight) in numbers.iter().zip(weights.iter()) {
            for (slot, value) in acc.iter_mut().zip(number.components()) {
                *slot += value * weight;
            }
        }
        FuzzyNumber {
            a1: acc[0],
            a2: acc[1],
            a3: acc[2],
            a4: acc[3],
        }
    }
}

impl From<LinguisticGrade> for FuzzyNumber {
    fn from(grade: LinguisticGrade) -> Self {
        grade.fuzzy_number()
    }
}

/// Normalized competence weights for the full expert pool.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpertPanel {
    experts: Vec<(String, f64)>,
}

impl ExpertPanel {
    /// Builds the panel from raw per-expert sub-scores.
    ///
    /// Each expert's raw weight is the sum of its sub-scores; weights are
    /// normalized across the whole pool to sum to 1.
    pub fn from_scores<I, S>(rows: I) -> Result<Self, ResilienceError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let raw: Vec<(String, f64)> = rows
            .into_iter()
            .map(|(id, scores)| (id.into(), scores.iter().sum::<f64>()))
            .collect();
        Self::from_raw_weights(raw)
    }

    pub fn from_raw_weights(raw: Vec<(String, f64)>) -> Result<Self, ResilienceError> {
        if raw.is_empty() {
            return Err(ResilienceError::ValidationError(
                "expert panel is empty".into(),
            ));
        }
        if let Some((id, w)) = raw.iter().find(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(ResilienceError::ValidationError(format!(
                "expert '{}' has invalid raw weight {}",
                id, w
            )));
        }
        let mut seen = FxHashSet::default();
        if let Some((id, _)) = raw.iter().find(|(id, _)| !seen.insert(id.as_str())) {
            return Err(ResilienceError::ValidationError(format!(
                "expert '{}' is listed more than once",
                id
            )));
        }
        let total: f64 = raw.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(ResilienceError::ValidationError(
                "expert raw weights sum to zero".into(),
            ));
        }
        let experts = raw.into_iter().map(|(id, w)| (id, w / total)).collect();
        Ok(Self { experts })
    }

    pub fn weight(&self, expert: &str) -> Option<f64> {
        self.experts
            .iter()
            .find(|(id, _)| id == expert)
            .map(|(_, w)| *w)
    }

    pub fn len(&self) -> usize {
        self.experts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.experts.iter().map(|(id, w)| (id.as_str(), *w))
    }
}

/// One participating expert's grade together with its pool-level prior weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opinion {
    pub grade: LinguisticGrade,
    pub prior_weight: f64,
}

/// The aggregation outcome for one elicitation item.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyAssessment {
    /// Relative similarity per participant (sums to 1).
    pub relative_similarity: Vec<f64>,
    /// Combined, renormalized weight per participant (sums to 1).
    pub weights: Vec<f64>,
    /// Weighted fuzzy average.
    pub aggregated: FuzzyNumber,
    /// Defuzzified probability.
    pub probability: f64,
}

/// Similarity-weighted fuzzy aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyEvaluator {
    beta: f64,
}

impl Default for FuzzyEvaluator {
    fn default() -> Self {
        Self { beta: DEFAULT_BETA }
    }
}

impl FuzzyEvaluator {
    pub fn new(beta: f64) -> Result<Self, ResilienceError> {
        if !(0.0..=1.0).contains(&beta) {
            return Err(ResilienceError::ValidationError(format!(
                "fuzzy beta must be in [0, 1], got {}",
                beta
            )));
        }
        Ok(Self { beta })
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Average agreement of each participant with every other participant.
    ///
    /// A lone participant has nobody to disagree with and scores 1.
    pub fn average_similarity(numbers: &[FuzzyNumber]) -> Vec<f64> {
        let n = numbers.len();
        if n == 1 {
            return vec![1.0];
        }
        (0..n)
            .map(|i| {
                let total: f64 = (0..n)
                    .filter(|&j| j != i)
                    .map(|j| numbers[i].agreement(&numbers[j]))
                    .sum();
                total / (n - 1) as f64
            })
            .collect()
    }

    /// Average similarity normalized to sum to 1 across participants.
    pub fn relative_similarity(numbers: &[FuzzyNumber]) -> Vec<f64> {
        let average = Self::average_similarity(numbers);
        normalize_or_uniform(&average)
    }

    /// `beta * prior + (1 - beta) * relative`, renormalized over participants.
    ///
    /// Prior weights come from the full expert pool, so participants' priors
    /// alone generally do not sum to 1.
    pub fn combined_weights(&self, prior_weights: &[f64], relative: &[f64]) -> Vec<f64> {
        let combined: Vec<f64> = prior_weights
            .iter()
            .zip(relative.iter())
            .map(|(p, r)| self.beta * p + (1.0 - self.beta) * r)
            .collect();
        normalize_or_uniform(&combined)
    }

    /// Aggregates the opinions on one item. Returns `None` for an empty list,
    /// which callers must treat as "no data" rather than probability 0.
    pub fn evaluate(&self, opinions: &[Opinion]) -> Option<FuzzyAssessment> {
        if opinions.is_empty() {
            return None;
        }
        let numbers: Vec<FuzzyNumber> = opinions.iter().map(|o| o.grade.into()).collect();
        let priors: Vec<f64> = opinions.iter().map(|o| o.prior_weight).collect();

        let relative_similarity = Self::relative_similarity(&numbers);
        let weights = self.combined_weights(&priors, &relative_similarity);
        let aggregated = FuzzyNumber::weighted_sum(&numbers, &weights);
        let probability = aggregated.defuzzify().clamp(0.0, 1.0);

        Some(FuzzyAssessment {
            relative_similarity,
            weights,
            aggregated,
            probability,
        })
    }
}

fn normalize_or_uniform(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > EPSILON && total.is_finite() {
        values.iter().map(|v| v / total).collect()
    } else {
        let n = values.len().max(1) as f64;
        vec![1.0 / n; values.len()]
    }
}
