//! Sequences — recurring multi-bar phrases and gradually evolving passages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::fingerprint::BarFingerprint;

/// Phrase lengths searched for recurrence, in bars.
pub const SEQUENCE_LENGTHS: [usize; 2] = [2, 4];
/// Minimum bars in an evolving passage, base bar included.
pub const MIN_EVOLVING_BARS: usize = 3;

/// A multi-bar hash sequence that occurs at least twice without overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringSequence {
    pub length: usize,
    pub hashes: Vec<u64>,
    /// First bar of each non-overlapping occurrence.
    pub start_bars: Vec<u32>,
}

/// Consecutive bars drifting steadily away from a base bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolvingSequence {
    pub base_bar: u32,
    /// Base bar first.
    pub bars: Vec<u32>,
    /// Similarity of each bar after the base to the base.
    pub similarities: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub recurring: Vec<RecurringSequence>,
    pub evolving: Vec<EvolvingSequence>,
}

/// Windows of `len` consecutive, non-empty bars.
fn windows(fingerprints: &[BarFingerprint], len: usize) -> impl Iterator<Item = &[BarFingerprint]> {
    fingerprints.windows(len).filter(|w| {
        w.iter().all(|f| !f.is_empty()) && w.windows(2).all(|p| p[1].bar == p[0].bar + 1)
    })
}

fn recurring(fingerprints: &[BarFingerprint], len: usize) -> Vec<RecurringSequence> {
    let mut starts: BTreeMap<Vec<u64>, Vec<u32>> = BTreeMap::new();
    for w in windows(fingerprints, len) {
        let hashes: Vec<u64> = w.iter().map(|f| f.hash).collect();
        // a single repeated pattern is a run, not a phrase
        if hashes.iter().all(|&h| h == hashes[0]) {
            continue;
        }
        starts.entry(hashes).or_default().push(w[0].bar);
    }
    starts
        .into_iter()
        .filter_map(|(hashes, all)| {
            let mut taken: Vec<u32> = Vec::new();
            for start in all {
                if taken.last().map_or(true, |&t| start >= t + len as u32) {
                    taken.push(start);
                }
            }
            (taken.len() >= 2).then_some(RecurringSequence {
                length: len,
                hashes,
                start_bars: taken,
            })
        })
        .collect()
}

fn evolving(fingerprints: &[BarFingerprint], tolerance: f64) -> Vec<EvolvingSequence> {
    let mut found = Vec::new();
    let mut i = 0;
    while i < fingerprints.len() {
        let base = &fingerprints[i];
        if base.is_empty() {
            i += 1;
            continue;
        }
        let mut bars = vec![base.bar];
        let mut similarities: Vec<f64> = Vec::new();
        let mut prev = 1.0;
        for (j, next) in fingerprints.iter().enumerate().skip(i + 1) {
            if next.is_empty() || next.bar != fingerprints[j - 1].bar + 1 {
                break;
            }
            let s = base.similarity(next);
            if s >= 1.0 || s <= 0.0 || s > prev + tolerance {
                break;
            }
            bars.push(next.bar);
            similarities.push(s);
            prev = s;
        }
        let drifted = similarities.len() >= 2
            && similarities.last() < similarities.first();
        if bars.len() >= MIN_EVOLVING_BARS && drifted {
            i += bars.len() - 1;
            found.push(EvolvingSequence {
                base_bar: base.bar,
                bars,
                similarities,
            });
        } else {
            i += 1;
        }
    }
    found
}

/// Recurring 2- and 4-bar phrases plus evolving passages.
pub fn sequences(fingerprints: &[BarFingerprint], tolerance: f64) -> SequenceReport {
    let mut recurring_all: Vec<RecurringSequence> = SEQUENCE_LENGTHS
        .iter()
        .flat_map(|&len| recurring(fingerprints, len))
        .collect();
    recurring_all.sort_by(|a, b| {
        b.start_bars
            .len()
            .cmp(&a.start_bars.len())
            .then_with(|| b.length.cmp(&a.length))
            .then_with(|| a.start_bars.first().cmp(&b.start_bars.first()))
    });
    SequenceReport {
        recurring: recurring_all,
        evolving: evolving(fingerprints, tolerance),
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
                PercussionRole::ClosedHat,
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
    fn two_bar_phrase_recurs() {
        let masks = [1, 2, 1, 2, 1, 2];
        let fps: Vec<_> = masks.iter().enumerate().map(|(i, &m)| bar(i as u32 + 1, m)).collect();
        let report = sequences(&fps, 0.05);
        let ab = report
            .recurring
            .iter()
            .find(|s| s.length == 2 && s.hashes == vec![fps[0].hash, fps[1].hash])
            .unwrap();
        assert_eq!(ab.start_bars, vec![1, 3, 5]);
    }

    #[test]
    fn four_bar_phrase_needs_non_overlapping_occurrences() {
        let masks = [1, 2, 4, 8, 1, 2, 4, 8];
        let fps: Vec<_> = masks.iter().enumerate().map(|(i, &m)| bar(i as u32 + 1, m)).collect();
        let report = sequences(&fps, 0.05);
        let four: Vec<_> = report.recurring.iter().filter(|s| s.length == 4).collect();
        assert_eq!(four.len(), 1);
        assert_eq!(four[0].start_bars, vec![1, 5]);
    }

    #[test]
    fn uniform_loop_is_not_a_phrase() {
        let fps: Vec<_> = (1..=8).map(|b| bar(b, 0x5555)).collect();
        assert!(sequences(&fps, 0.05).recurring.is_empty());
    }

    #[test]
    fn evolving_passage() {
        // bits drop one by one from an eight-hit base
        let fps = vec![
            bar(1, 0xff),
            bar(2, 0x7f),
            bar(3, 0x3f),
            bar(4, 0x1f),
            bar(5, 0xff00),
        ];
        let report = sequences(&fps, 0.05);
        assert_eq!(report.evolving.len(), 1);
        let e = &report.evolving[0];
        assert_eq!(e.base_bar, 1);
        assert_eq!(e.bars, vec![1, 2, 3, 4]);
        assert!(e.similarities.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn empty_bar_breaks_sequences() {
        let fps = vec![bar(1, 0xff), bar(2, 0x7f), bar(3, 0), bar(4, 0x3f)];
        assert!(sequences(&fps, 0.05).evolving.is_empty());
    }
}
