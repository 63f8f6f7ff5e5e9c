//! Rule match statistics
//!
//! Match frequencies drive dispatch planning: rules that almost never
//! fire get folded behind covering pre-checks. Counts are keyed by the
//! rule's content hash so they survive reordering and edits of the
//! authored documents; an edited rule simply starts from zero.
//!
//! [`RuleStats`] is an immutable snapshot. Workers accumulate into their
//! own [`StatsDelta`] and deltas are merged into a new snapshot after the
//! batch, so counting involves no shared mutable state.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Immutable statistics snapshot from previous runs.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RuleStats {
    /// Packages processed by all runs counted so far.
    pub total_packages: u64,
    /// Match counts keyed by rule content hash.
    pub match_counts: HashMap<String, u64>,
}

impl RuleStats {
    /// Fraction of processed packages this rule matched, or 1.0 when
    /// nothing has been counted yet so no rule looks rare prematurely.
    pub fn frequency(&self, rule_hash: &str) -> f64 {
        if self.total_packages == 0 {
            return 1.0;
        }
        let matches = self.match_counts.get(rule_hash).copied().unwrap_or(0);
        matches as f64 / self.total_packages as f64
    }

    /// Fold a batch delta into a new snapshot.
    pub fn merged(&self, delta: &StatsDelta) -> RuleStats {
        let mut match_counts = self.match_counts.clone();
        for (hash, count) in &delta.matches {
            *match_counts.entry(hash.clone()).or_insert(0) += count;
        }
        RuleStats {
            total_packages: self.total_packages + delta.packages,
            match_counts,
        }
    }

    /// Load persisted statistics. Absence or corruption is not fatal:
    /// the pipeline runs unoptimized and rewrites the file on save.
    pub fn load(path: &Path) -> RuleStats {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return RuleStats::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read rule statistics");
                return RuleStats::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(stats) => stats,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding corrupt rule statistics");
                RuleStats::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, text)
    }
}

/// Per-worker accumulator, merged after the batch.
#[derive(Debug, Default)]
pub struct StatsDelta {
    packages: u64,
    matches: HashMap<String, u64>,
}

impl StatsDelta {
    pub fn count_package(&mut self) {
        self.packages += 1;
    }

    pub fn count_match(&mut self, rule_hash: &str) {
        *self.matches.entry(rule_hash.to_string()).or_insert(0) += 1;
    }

    /// Combine two worker deltas; used as the parallel reduce step.
    pub fn merge(mut self, other: StatsDelta) -> StatsDelta {
        self.packages += other.packages;
        for (hash, count) in other.matches {
            *self.matches.entry(hash).or_insert(0) += count;
        }
        self
    }

    pub fn packages(&self) -> u64 {
        self.packages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_stats_report_full_frequency() {
        let stats = RuleStats::default();
        assert_eq!(stats.frequency("deadbeef"), 1.0);
    }

    #[test]
    fn frequency_is_matches_over_packages() {
        let mut delta = StatsDelta::default();
        for _ in 0..1000 {
            delta.count_package();
        }
        delta.count_match("aa");
        delta.count_match("aa");

        let stats = RuleStats::default().merged(&delta);
        assert_eq!(stats.frequency("aa"), 0.002);
        assert_eq!(stats.frequency("bb"), 0.0);
    }

    #[test]
    fn deltas_merge_associatively() {
        let mut a = StatsDelta::default();
        a.count_package();
        a.count_match("x");

        let mut b = StatsDelta::default();
        b.count_package();
        b.count_match("x");
        b.count_match("y");

        let merged = a.merge(b);
        let stats = RuleStats::default().merged(&merged);
        assert_eq!(stats.total_packages, 2);
        assert_eq!(stats.match_counts["x"], 2);
        assert_eq!(stats.match_counts["y"], 1);
    }

    #[test]
    fn snapshot_merge_does_not_mutate_the_source() {
        let mut delta = StatsDelta::default();
        delta.count_package();
        delta.count_match("x");

        let base = RuleStats::default().merged(&delta);
        let next = base.merged(&delta);

        assert_eq!(base.total_packages, 1);
        assert_eq!(next.total_packages, 2);
        assert_eq!(next.match_counts["x"], 2);
    }

    #[test]
    fn load_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let mut delta = StatsDelta::default();
        delta.count_package();
        delta.count_match("cafe");
        let stats = RuleStats::default().merged(&delta);

        stats.save(&path).unwrap();
        let loaded = RuleStats::load(&path);
        assert_eq!(loaded.total_packages, 1);
        assert_eq!(loaded.match_counts["cafe"], 1);
    }

    #[test]
    fn missing_or_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = RuleStats::load(&dir.path().join("nope.json"));
        assert_eq!(missing.total_packages, 0);

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let corrupt = RuleStats::load(&path);
        assert_eq!(corrupt.total_packages, 0);
    }
}
