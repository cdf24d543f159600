//! Repetition — which bar patterns recur, and where they run back to back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::fingerprint::BarFingerprint;

/// Most frequent patterns kept in a report.
pub const TOP_PATTERNS: usize = 10;

/// Every bar a pattern occurs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternOccurrence {
    pub hash: u64,
    pub bars: Vec<u32>,
}

impl PatternOccurrence {
    pub fn count(&self) -> usize {
        self.bars.len()
    }
}

/// Consecutive bars with the same pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRun {
    pub hash: u64,
    pub start_bar: u32,
    pub length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionReport {
    /// Up to [`TOP_PATTERNS`], most frequent first, ties by first bar.
    pub patterns: Vec<PatternOccurrence>,
    pub runs: Vec<PatternRun>,
    /// Distinct non-empty patterns.
    pub unique_patterns: usize,
}

impl RepetitionReport {
    pub fn occurrences(&self, hash: u64) -> usize {
        self.patterns
            .iter()
            .find(|p| p.hash == hash)
            .map(PatternOccurrence::count)
            .unwrap_or(0)
    }
}

/// Repetition over non-empty bars.
pub fn repetition(fingerprints: &[BarFingerprint]) -> RepetitionReport {
    let mut bars_by_hash: BTreeMap<u64, Vec<u32>> = BTreeMap::new();
    for fp in fingerprints.iter().filter(|f| !f.is_empty()) {
        bars_by_hash.entry(fp.hash).or_default().push(fp.bar);
    }
    let unique_patterns = bars_by_hash.len();

    let mut patterns: Vec<PatternOccurrence> = bars_by_hash
        .into_iter()
        .map(|(hash, bars)| PatternOccurrence { hash, bars })
        .collect();
    patterns.sort_by(|a, b| {
        b.count()
            .cmp(&a.count())
            .then_with(|| a.bars.first().cmp(&b.bars.first()))
    });
    patterns.truncate(TOP_PATTERNS);

    let mut runs = Vec::new();
    let mut i = 0;
    while i < fingerprints.len() {
        let head = &fingerprints[i];
        let mut j = i + 1;
        while !head.is_empty()
            && j < fingerprints.len()
            && fingerprints[j].hash == head.hash
            && fingerprints[j].bar == fingerprints[j - 1].bar + 1
        {
            j += 1;
        }
        if j - i >= 2 {
            runs.push(PatternRun {
                hash: head.hash,
                start_bar: head.bar,
                length: j - i,
            });
        }
        i = j;
    }

    RepetitionReport {
        patterns,
        runs,
        unique_patterns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fingerprint::RoleFingerprint;
    use crate::groove::PercussionRole;

    fn bar(number: u32, mask: u64) -> BarFingerprint {
        let mut roles = BTreeMap::new();
        if mask != 0 {
            roles.insert(
                PercussionRole::Kick,
                RoleFingerprint {
                    mask,
                    velocities: vec![],
                    count: mask.count_ones() as usize,
                },
            );
        }
        BarFingerprint::new(number, roles)
    }

    #[test]
    fn counts_and_ordering() {
        let fps = vec![bar(1, 1), bar(2, 2), bar(3, 1), bar(4, 1), bar(5, 2), bar(6, 4)];
        let report = repetition(&fps);
        assert_eq!(report.unique_patterns, 3);
        assert_eq!(report.patterns[0].bars, vec![1, 3, 4]);
        assert_eq!(report.patterns[1].bars, vec![2, 5]);
        assert_eq!(report.occurrences(fps[0].hash), 3);
    }

    #[test]
    fn runs_of_two_or_more() {
        let fps = vec![bar(1, 1), bar(2, 1), bar(3, 1), bar(4, 2), bar(5, 1), bar(6, 2), bar(7, 2)];
        let report = repetition(&fps);
        assert_eq!(
            report.runs,
            vec![
                PatternRun { hash: fps[0].hash, start_bar: 1, length: 3 },
                PatternRun { hash: fps[3].hash, start_bar: 6, length: 2 },
            ]
        );
    }

    #[test]
    fn empty_bars_ignored() {
        let fps = vec![bar(1, 0), bar(2, 0), bar(3, 0)];
        let report = repetition(&fps);
        assert!(report.patterns.is_empty());
        assert!(report.runs.is_empty());
    }

    #[test]
    fn top_ten_only() {
        let fps: Vec<_> = (0..12).map(|i| bar(i + 1, 1 << i)).collect();
        assert_eq!(repetition(&fps).patterns.len(), TOP_PATTERNS);
    }
}
