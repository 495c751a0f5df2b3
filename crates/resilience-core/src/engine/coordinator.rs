//! Evidence management and posterior queries over a parameterized network.
//!
//! The coordinator is the Ready phase. It owns the [`ParameterizedNetwork`],
//! so tables can no longer change, and keeps the most recent posteriors
//! together with the evidence that produced them.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{info, warn};

use crate::engine::cpt::ParameterizedNetwork;
use crate::engine::diagnostics::{Diagnostic, Diagnostics};
use crate::engine::errors::ResilienceError;
use crate::engine::evidence::Evidence;
use crate::engine::inference::{InferenceEngine, Posteriors, VariableElimination};

/// Where the coordinator is in its evidence cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceState {
    /// No inference pass has run.
    NotRun,
    /// Posteriors reflect priors and tables only.
    EvidenceFree,
    /// Posteriors are conditioned on the current evidence.
    EvidenceSet,
}

/// Receives every evidence map the coordinator applies.
pub trait EvidenceSink {
    fn record(&mut self, evidence: &Evidence) -> Result<(), ResilienceError>;
}

/// One state's posterior probability.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateProbability {
    pub state: String,
    pub probability: f64,
}

/// Posteriors by state label, with the evidence they were computed under.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PosteriorReport {
    pub network: String,
    /// Evidence as node -> state label.
    pub evidence: BTreeMap<String, String>,
    pub nodes: BTreeMap<String, Vec<StateProbability>>,
}

pub struct InferenceCoordinator<E: InferenceEngine = VariableElimination> {
    network: ParameterizedNetwork,
    engine: E,
    evidence: Evidence,
    posteriors: Option<Posteriors>,
    state: InferenceState,
    sink: Option<Box<dyn EvidenceSink>>,
}

impl<E: InferenceEngine> fmt::Debug for InferenceCoordinator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceCoordinator")
            .field("network", &self.network.network().name())
            .field("evidence", &self.evidence)
            .field("state", &self.state)
            .field("audited", &self.sink.is_some())
            .finish()
    }
}

impl InferenceCoordinator<VariableElimination> {
    pub fn new(network: ParameterizedNetwork) -> Self {
        Self::with_engine(network, VariableElimination)
    }
}

impl<E: InferenceEngine> InferenceCoordinator<E> {
    pub fn with_engine(network: ParameterizedNetwork, engine: E) -> Self {
        Self {
            network,
            engine,
            evidence: Evidence::new(),
            posteriors: None,
            state: InferenceState::NotRun,
            sink: None,
        }
    }

    /// Records every applied evidence map to `sink`.
    pub fn with_evidence_sink(mut self, sink: impl EvidenceSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn network(&self) -> &ParameterizedNetwork {
        &self.network
    }

    pub fn state(&self) -> InferenceState {
        self.state
    }

    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    /// Diagnostics from every phase, including inference fallbacks.
    pub fn diagnostics(&self) -> &Diagnostics {
        self.network.diagnostics()
    }

    /// Replaces the current evidence and reruns inference.
    pub fn set_evidence(&mut self, evidence: Evidence) -> Result<&Posteriors, ResilienceError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.record(&evidence)?;
        }
        self.evidence = evidence;
        self.infer()
    }

    /// Drops all evidence and restores the baseline posteriors.
    pub fn clear_evidence(&mut self) -> Result<&Posteriors, ResilienceError> {
        self.evidence = Evidence::new();
        self.infer()
    }

    /// Runs inference under the current evidence.
    ///
    /// If the engine rejects non-empty evidence, the evidence is cleared and
    /// the evidence-free baseline is returned instead. Each distinct failure
    /// is recorded once as a [`Diagnostic::InferenceFailure`].
    pub fn infer(&mut self) -> Result<&Posteriors, ResilienceError> {
        let result = self.engine.infer(self.network.network(), &self.evidence);
        let posteriors = match result {
            Ok(posteriors) => {
                self.state = if self.evidence.is_empty() {
                    InferenceState::EvidenceFree
                } else {
                    InferenceState::EvidenceSet
                };
                posteriors
            }
            Err(err) if !self.evidence.is_empty() => {
                warn!(error = %err, evidence = ?self.evidence, "evidence rejected, using baseline");
                self.network
                    .diagnostics_mut()
                    .push_unique(Diagnostic::InferenceFailure {
                        reason: err.to_string(),
                    });
                self.evidence = Evidence::new();
                let baseline = self.engine.infer(self.network.network(), &self.evidence)?;
                self.state = InferenceState::EvidenceFree;
                baseline
            }
            Err(err) => return Err(err),
        };
        info!(state = ?self.state, evidence = self.evidence.len(), "inference complete");
        Ok(self.posteriors.insert(posteriors))
    }

    /// The most recent posterior of `node`.
    pub fn posterior(&self, node: &str) -> Result<&[f64], ResilienceError> {
        let posteriors = self.posteriors.as_ref().ok_or(ResilienceError::NoInference)?;
        posteriors
            .get(node)
            .ok_or_else(|| ResilienceError::UnknownNode(node.to_string()))
    }

    pub fn posteriors(&self) -> Result<&Posteriors, ResilienceError> {
        self.posteriors.as_ref().ok_or(ResilienceError::NoInference)
    }

    /// The most recent posteriors keyed by state label.
    pub fn posterior_report(&self) -> Result<PosteriorReport, ResilienceError> {
        let posteriors = self.posteriors()?;
        let network = self.network.network();

        let mut nodes = BTreeMap::new();
        for node in network.nodes() {
            let marginal = posteriors
                .get(&node.name)
                .ok_or_else(|| ResilienceError::UnknownNode(node.name.clone()))?;
            let states = node
                .states
                .iter()
                .zip(marginal)
                .map(|(state, p)| StateProbability {
                    state: state.clone(),
                    probability: *p,
                })
                .collect();
            nodes.insert(node.name.clone(), states);
        }

        let evidence = self
            .evidence
            .iter()
            .filter_map(|(name, state)| {
                let node = network.by_name(name)?;
                Some((name.to_string(), node.states.get(state)?.clone()))
            })
            .collect();

        Ok(PosteriorReport {
            network: network.name().to_string(),
            evidence,
            nodes,
        })
    }
}
