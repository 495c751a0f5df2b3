//! Append-only evidence audit log.
//!
//! One line per applied evidence map: `<RFC 3339 timestamp>\t<evidence JSON>`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};

use crate::engine::coordinator::EvidenceSink;
use crate::engine::errors::ResilienceError;
use crate::engine::evidence::Evidence;

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceAuditLog {
    path: PathBuf,
}

impl EvidenceAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, evidence: &Evidence) -> Result<(), ResilienceError> {
        let json =
            serde_json::to_string(evidence).map_err(|e| ResilienceError::Format(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ResilienceError::io(&self.path, e))?;
        writeln!(file, "{}\t{}", Utc::now().to_rfc3339(), json)
            .map_err(|e| ResilienceError::io(&self.path, e))
    }

    /// Reads every entry back, oldest first.
    pub fn entries(&self) -> Result<Vec<AuditEntry>, ResilienceError> {
        let text =
            std::fs::read_to_string(&self.path).map_err(|e| ResilienceError::io(&self.path, e))?;
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(n, line)| {
                let (stamp, json) = line.split_once('\t').ok_or_else(|| {
                    ResilienceError::Format(format!("audit line {} has no separator", n + 1))
                })?;
                let timestamp = DateTime::parse_from_rfc3339(stamp)
                    .map_err(|e| ResilienceError::Format(format!("audit line {}: {}", n + 1, e)))?;
                let evidence = serde_json::from_str(json)
                    .map_err(|e| ResilienceError::Format(format!("audit line {}: {}", n + 1, e)))?;
                Ok(AuditEntry {
                    timestamp,
                    evidence,
                })
            })
            .collect()
    }
}

impl EvidenceSink for EvidenceAuditLog {
    fn record(&mut self, evidence: &Evidence) -> Result<(), ResilienceError> {
        self.append(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = EvidenceAuditLog::new(dir.path().join("evidence.log"));
        let first: Evidence = [("roadLoss", 1)].into_iter().collect();
        let second: Evidence = [("roadLoss", 0), ("casualties", 1)].into_iter().collect();
        log.append(&first).unwrap();
        log.append(&second).unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].evidence, first);
        assert_eq!(entries[1].evidence, second);
        assert!(entries[0].timestamp <= entries[1].timestamp);

        let raw = std::fs::read_to_string(log.path()).unwrap();
        assert!(raw.lines().next().unwrap().contains("\t{\"roadLoss\":1}"));
    }
}
