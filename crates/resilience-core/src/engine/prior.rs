//! Root-node prior estimation from historical samples.
//!
//! Two strategies, chosen per root by its declaration:
//! - **Categorical**: relative frequency of each state among raw labels.
//! - **Duration**: a normal fit truncated to the empirical percentile range,
//!   discretized into ordered bins by differencing its CDF.

use std::collections::BTreeMap;

use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{debug, info};

use crate::engine::diagnostics::{Diagnostic, Diagnostics};
use crate::engine::errors::ResilienceError;
use crate::NetworkSpec;
use resilience_frontend::ast::PriorDecl;

/// Default percentile bounds for truncation.
pub const DEFAULT_LOWER_PERCENTILE: f64 = 5.0;
pub const DEFAULT_UPPER_PERCENTILE: f64 = 95.0;

/// Truncation ranges narrower than this collapse to a point mass.
const MIN_RANGE: f64 = 1e-12;

/// Historical prior table: one column of raw cells per root variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorTable {
    columns: BTreeMap<String, Vec<String>>,
}

impl PriorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a column. Blank cells are dropped.
    pub fn insert_column<I, S>(&mut self, name: impl Into<String>, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cells = cells
            .into_iter()
            .map(Into::into)
            .filter(|c: &String| !c.trim().is_empty())
            .collect();
        self.columns.insert(name.into(), cells);
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

/// Estimated root distributions keyed by node name.
pub type RootPriors = BTreeMap<String, Vec<f64>>;

/// Relative frequency of each state, indexed by the canonical state order.
///
/// A cell counts for a state when it equals the state's label or parses as
/// the state's index. Unmatched cells are reported and skipped. Returns
/// `None` when no cell matched.
pub fn categorical_prior(
    node: &str,
    states: &[String],
    samples: &[String],
    diagnostics: &mut Diagnostics,
) -> Option<Vec<f64>> {
    let mut counts = vec![0_usize; states.len()];
    for raw in samples {
        let cell = raw.trim();
        let idx = states.iter().position(|s| s == cell).or_else(|| {
            parse_index(cell).filter(|&i| i < states.len())
        });
        match idx {
            Some(i) => counts[i] += 1,
            None => diagnostics.push(Diagnostic::UnknownCategory {
                node: node.to_string(),
                value: cell.to_string(),
            }),
        }
    }
    let total: usize = counts.iter().sum();
    if total == 0 {
        return None;
    }
    Some(counts.iter().map(|&c| c as f64 / total as f64).collect())
}

/// Accepts `"2"` and spreadsheet-style `"2.0"`.
fn parse_index(cell: &str) -> Option<usize> {
    if let Ok(i) = cell.parse::<usize>() {
        return Some(i);
    }
    let f = cell.parse::<f64>().ok()?;
    (f >= 0.0 && f.fract() == 0.0).then_some(f as usize)
}

/// Percentile with linear interpolation between closest ranks.
///
/// `sorted` must be non-empty and ascending.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// A normal distribution truncated to `[lower, upper]`.
#[derive(Debug, Clone)]
pub struct TruncatedNormal {
    pub mean: f64,
    pub std_dev: f64,
    pub lower: f64,
    pub upper: f64,
    normal: Option<Normal>,
    base_lower: f64,
    mass: f64,
}

impl TruncatedNormal {
    /// Fits a normal by maximum likelihood (population standard deviation)
    /// and truncates it to the samples' percentile range.
    pub fn fit(
        samples: &[f64],
        lower_percentile: f64,
        upper_percentile: f64,
    ) -> Result<Self, ResilienceError> {
        let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return Err(ResilienceError::Numerical(
                "cannot fit a distribution to zero finite samples".into(),
            ));
        }
        if !(0.0..=100.0).contains(&lower_percentile)
            || !(0.0..=100.0).contains(&upper_percentile)
            || lower_percentile > upper_percentile
        {
            return Err(ResilienceError::ValidationError(format!(
                "invalid percentile range [{}, {}]",
                lower_percentile, upper_percentile
            )));
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        let lower = percentile(&sorted, lower_percentile);
        let upper = percentile(&sorted, upper_percentile);

        Self::new(mean, std_dev, lower, upper)
    }

    /// Builds the truncated distribution. A zero spread or an empty interval
    /// yields a point mass at the mean clamped into `[lower, upper]`.
    pub fn new(mean: f64, std_dev: f64, lower: f64, upper: f64) -> Result<Self, ResilienceError> {
        let mut dist = Self {
            mean,
            std_dev,
            lower,
            upper,
            normal: None,
            base_lower: 0.0,
            mass: 0.0,
        };
        if std_dev <= 0.0 || upper - lower <= MIN_RANGE {
            return Ok(dist);
        }
        let normal = Normal::new(mean, std_dev)
            .map_err(|e| ResilienceError::Numerical(format!("normal fit failed: {}", e)))?;
        let base_lower = normal.cdf(lower);
        let mass = normal.cdf(upper) - base_lower;
        if mass > MIN_RANGE {
            dist.normal = Some(normal);
            dist.base_lower = base_lower;
            dist.mass = mass;
        }
        Ok(dist)
    }

    pub fn is_point_mass(&self) -> bool {
        self.normal.is_none()
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match &self.normal {
            None => {
                let point = self.mean.clamp(self.lower, self.upper.max(self.lower));
                if x >= point {
                    1.0
                } else {
                    0.0
                }
            }
            Some(normal) => {
                if x <= self.lower {
                    0.0
                } else if x >= self.upper {
                    1.0
                } else {
                    ((normal.cdf(x) - self.base_lower) / self.mass).clamp(0.0, 1.0)
                }
            }
        }
    }

    /// Probability per ordered bin.
    ///
    /// Bin `i` covers `[edges[i], edges[i + 1])`; the first bin also absorbs
    /// any mass below `edges[0]` and the last bin is `1 - CDF(edges[last])`,
    /// so the result always sums to 1.
    pub fn discretize(&self, edges: &[f64]) -> Vec<f64> {
        let k = edges.len();
        let mut probs = Vec::with_capacity(k);
        let mut prev = 0.0;
        for i in 0..k {
            let upper_cdf = if i + 1 < k { self.cdf(edges[i + 1]) } else { 1.0 };
            probs.push((upper_cdf - prev).max(0.0));
            prev = upper_cdf.max(prev);
        }
        probs
    }
}

/// Estimates root priors from a historical table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorEstimator {
    pub lower_percentile: f64,
    pub upper_percentile: f64,
}

impl Default for PriorEstimator {
    fn default() -> Self {
        Self {
            lower_percentile: DEFAULT_LOWER_PERCENTILE,
            upper_percentile: DEFAULT_UPPER_PERCENTILE,
        }
    }
}

impl PriorEstimator {
    /// Discretized truncated-normal prior for a duration-like column.
    pub fn duration_prior(&self, samples: &[f64], edges: &[f64]) -> Result<Vec<f64>, ResilienceError> {
        let dist = TruncatedNormal::fit(samples, self.lower_percentile, self.upper_percentile)?;
        debug!(
            mean = dist.mean,
            std_dev = dist.std_dev,
            lower = dist.lower,
            upper = dist.upper,
            "fitted truncated normal"
        );
        Ok(dist.discretize(edges))
    }

    /// Estimates every root node of `spec` that has a column in `table`.
    ///
    /// Roots without a column (or without usable samples) are skipped with
    /// [`Diagnostic::MissingSampleData`] and keep their default table.
    pub fn estimate_roots(
        &self,
        spec: &NetworkSpec,
        table: &PriorTable,
        diagnostics: &mut Diagnostics,
    ) -> RootPriors {
        let mut priors = RootPriors::new();
        for node in spec.roots() {
            let Some(cells) = table.column(&node.name) else {
                diagnostics.push(Diagnostic::MissingSampleData {
                    node: node.name.clone(),
                });
                continue;
            };

            let estimate = match node.prior_or_default() {
                PriorDecl::Categorical => {
                    categorical_prior(&node.name, &node.states, cells, diagnostics)
                }
                PriorDecl::Duration { edges } => {
                    let samples: Vec<f64> = cells
                        .iter()
                        .filter_map(|c| match c.trim().parse::<f64>() {
                            Ok(v) => Some(v),
                            Err(_) => {
                                diagnostics.push(Diagnostic::UnknownCategory {
                                    node: node.name.clone(),
                                    value: c.clone(),
                                });
                                None
                            }
                        })
                        .collect();
                    if samples.is_empty() {
                        None
                    } else {
                        self.duration_prior(&samples, &edges).ok()
                    }
                }
            };

            match estimate {
                Some(probs) => {
                    info!(node = %node.name, prior = ?probs, "estimated root prior");
                    priors.insert(node.name.clone(), probs);
                }
                None => diagnostics.push(Diagnostic::MissingSampleData {
                    node: node.name.clone(),
                }),
            }
        }
        priors
    }
}
