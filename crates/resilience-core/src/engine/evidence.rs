//! # Evidence
//!
//! An [`Evidence`] map asserts a fixed state index for some nodes. It is
//! transient: each inference call receives a whole map and a new map replaces
//! the old one rather than merging with it.
//!
//! [`EvidenceMapper`] derives such a map from [`CaseFacts`] at one of four
//! incident stages:
//!
//! - **T0** before the incident: normal baseline, no negative evidence
//! - **T1** at the incident: road, loss and casualty facts
//! - **T2** resources on site: resource flags and response duration bucket
//! - **T3** after disposal: disposal duration bucket, and implemented
//!   behaviors reverse the negative facts they address

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::engine::errors::ResilienceError;
use crate::scenario::nodes;

/// Node name -> asserted state index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Evidence {
    entries: BTreeMap<String, usize>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a node's state, returning the state it replaces.
    pub fn insert(&mut self, node: impl Into<String>, state: usize) -> Option<usize> {
        self.entries.insert(node.into(), state)
    }

    pub fn get(&self, node: &str) -> Option<usize> {
        self.entries.get(node).copied()
    }

    pub fn remove(&mut self, node: &str) -> Option<usize> {
        self.entries.remove(node)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.entries.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for Evidence {
    fn from_iter<T: IntoIterator<Item = (S, usize)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Incident stage an evidence map describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeStage {
    T0,
    T1,
    T2,
    T3,
}

impl TimeStage {
    pub const ALL: [TimeStage; 4] = [TimeStage::T0, TimeStage::T1, TimeStage::T2, TimeStage::T3];

    pub fn label(self) -> &'static str {
        match self {
            TimeStage::T0 => "t0",
            TimeStage::T1 => "t1",
            TimeStage::T2 => "t2",
            TimeStage::T3 => "t3",
        }
    }
}

impl fmt::Display for TimeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeStage {
    type Err = ResilienceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "t0" => Ok(TimeStage::T0),
            "t1" => Ok(TimeStage::T1),
            "t2" => Ok(TimeStage::T2),
            "t3" => Ok(TimeStage::T3),
            other => Err(ResilienceError::ValidationError(format!(
                "unknown time stage '{}'",
                other
            ))),
        }
    }
}

/// An emergency response behavior from the response plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResponseBehavior {
    Repair,
    Tow,
    Aid,
    Firefighting,
}

impl ResponseBehavior {
    /// The resource node this behavior deploys.
    pub fn resource_node(self) -> &'static str {
        match self {
            ResponseBehavior::Repair => nodes::RESCUE_RESOURCE,
            ResponseBehavior::Tow => nodes::TOW_RESOURCE,
            ResponseBehavior::Aid => nodes::AID_RESOURCE,
            ResponseBehavior::Firefighting => nodes::FIREFIGHTING_RESOURCE,
        }
    }
}

impl FromStr for ResponseBehavior {
    type Err = ResilienceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Repair" | "repair" | "抢修" => Ok(ResponseBehavior::Repair),
            "Tow" | "tow" | "牵引" => Ok(ResponseBehavior::Tow),
            "Aid" | "aid" | "救助" => Ok(ResponseBehavior::Aid),
            "Firefighting" | "firefighting" | "消防" => Ok(ResponseBehavior::Firefighting),
            other => Err(ResilienceError::ValidationError(format!(
                "unknown response behavior '{}'",
                other
            ))),
        }
    }
}

/// Facts about one incident, gathered by an external collector.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct CaseFacts {
    pub road_impassable: bool,
    pub road_damaged: bool,
    pub casualties: bool,
    /// State index of the emergency type node.
    pub emergency_type: usize,
    /// Period label, e.g. `Morning`.
    pub emergency_period: Option<String>,
    /// Behaviors the response plan actually implemented.
    pub implemented_behaviors: Vec<ResponseBehavior>,
    /// Longest travel time of any deployed resource, in minutes.
    pub worst_travel_minutes: Option<f64>,
    /// Planned disposal durations, in minutes.
    pub disposal_minutes: Vec<f64>,
}

impl CaseFacts {
    fn implemented(&self, behavior: ResponseBehavior) -> bool {
        self.implemented_behaviors.contains(&behavior)
    }
}

/// Upper bounds (inclusive) of the first three duration buckets.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct EvidenceThresholds {
    pub response_minutes: [f64; 3],
    pub disposal_minutes: [f64; 3],
}

impl Default for EvidenceThresholds {
    fn default() -> Self {
        Self {
            response_minutes: [15.0, 40.0, 60.0],
            disposal_minutes: [15.0, 30.0, 60.0],
        }
    }
}

impl EvidenceThresholds {
    pub fn validate(self) -> Result<Self, ResilienceError> {
        for (name, bounds) in [
            ("response_minutes", self.response_minutes),
            ("disposal_minutes", self.disposal_minutes),
        ] {
            if bounds.iter().any(|b| !b.is_finite())
                || bounds.windows(2).any(|w| w[0] >= w[1])
            {
                return Err(ResilienceError::ValidationError(format!(
                    "{} must be finite and strictly increasing, got {:?}",
                    name, bounds
                )));
            }
        }
        Ok(self)
    }
}

/// Index of the first bucket whose bound is `>= minutes`; 3 past the last bound.
pub fn duration_bucket(minutes: f64, bounds: &[f64; 3]) -> usize {
    bounds
        .iter()
        .position(|b| minutes <= *b)
        .unwrap_or(bounds.len())
}

/// Maps a period label to its state index.
pub fn period_index(label: &str) -> Option<usize> {
    match label.trim() {
        "凌晨" | "Earlymorning" | "Early_Morning" | "EarlyMorning" => Some(0),
        "上午" | "Morning" => Some(1),
        "下午" | "Afternoon" => Some(2),
        "晚上" | "Evening" => Some(3),
        _ => None,
    }
}

/// Deterministic classification of case facts into evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvidenceMapper {
    thresholds: EvidenceThresholds,
}

impl EvidenceMapper {
    pub fn new(thresholds: EvidenceThresholds) -> Result<Self, ResilienceError> {
        Ok(Self {
            thresholds: thresholds.validate()?,
        })
    }

    pub fn thresholds(&self) -> &EvidenceThresholds {
        &self.thresholds
    }

    pub fn map(&self, facts: &CaseFacts, stage: TimeStage) -> Evidence {
        let mut evidence = Evidence::new();
        evidence.insert(nodes::EMERGENCY_TYPE, facts.emergency_type);
        if let Some(label) = &facts.emergency_period {
            match period_index(label) {
                Some(idx) => {
                    evidence.insert(nodes::EMERGENCY_PERIOD, idx);
                }
                None => debug!(period = %label, "unrecognized emergency period left unset"),
            }
        }
        for node in nodes::RESOURCES {
            evidence.insert(node, 0);
        }

        if stage == TimeStage::T0 {
            evidence.insert(nodes::ROAD_PASSIBILITY, 1);
            evidence.insert(nodes::ROAD_LOSS, 0);
            evidence.insert(nodes::CASUALTIES, 0);
            info!(stage = %stage, entries = evidence.len(), "mapped case facts");
            return evidence;
        }

        evidence.insert(nodes::ROAD_PASSIBILITY, usize::from(!facts.road_impassable));
        evidence.insert(nodes::ROAD_LOSS, usize::from(facts.road_damaged));
        evidence.insert(nodes::CASUALTIES, usize::from(facts.casualties));

        if stage >= TimeStage::T2 {
            for behavior in &facts.implemented_behaviors {
                evidence.insert(behavior.resource_node(), 1);
            }
            match facts.worst_travel_minutes {
                Some(minutes) if minutes > 0.0 => {
                    let bucket = duration_bucket(minutes, &self.thresholds.response_minutes);
                    evidence.insert(nodes::RESPONSE_DURATION, bucket);
                }
                _ => debug!("no travel time, response duration left unset"),
            }
        }

        if stage == TimeStage::T3 {
            let bucket = if facts.implemented_behaviors.is_empty() {
                0
            } else {
                facts
                    .disposal_minutes
                    .iter()
                    .filter(|m| m.is_finite())
                    .map(|m| duration_bucket(*m, &self.thresholds.disposal_minutes))
                    .max()
                    .unwrap_or(0)
            };
            evidence.insert(nodes::DISPOSAL_DURATION, bucket);

            if facts.implemented(ResponseBehavior::Repair) {
                evidence.insert(nodes::ROAD_LOSS, 0);
            }
            if facts.implemented(ResponseBehavior::Tow) {
                evidence.insert(nodes::ROAD_PASSIBILITY, 1);
            }
            if facts.implemented(ResponseBehavior::Aid) {
                evidence.insert(nodes::CASUALTIES, 0);
            }
        }

        info!(stage = %stage, entries = evidence.len(), "mapped case facts");
        evidence
    }
}
