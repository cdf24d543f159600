//! Similarity — near-identical bar patterns and the families they form.
//!
//! Only distinct patterns are compared, so identical bars are never reported
//! as merely similar; they are the same pattern.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::fingerprint::BarFingerprint;
use crate::error::{Error, Result};

/// Default minimum similarity for a pair or family member.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Two distinct patterns above the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarPair {
    pub a: u64,
    pub b: u64,
    /// First bar of each pattern.
    pub bar_a: u32,
    pub bar_b: u32,
    pub similarity: f64,
}

/// Patterns grouped around the most frequent one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternFamily {
    pub anchor: u64,
    pub members: Vec<u64>,
    /// Every bar of the anchor and its members, ascending.
    pub bars: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub threshold: f64,
    pub pairs: Vec<SimilarPair>,
    pub families: Vec<PatternFamily>,
}

/// Similarity of two bars by number.
pub fn bar_similarity(fingerprints: &[BarFingerprint], a: u32, b: u32) -> Result<f64> {
    let find = |bar: u32| {
        fingerprints
            .iter()
            .find(|f| f.bar == bar)
            .ok_or_else(|| Error::out_of_range("bar", bar as usize, fingerprints.len()))
    };
    Ok(find(a)?.similarity(find(b)?))
}

struct Pattern<'a> {
    representative: &'a BarFingerprint,
    bars: Vec<u32>,
}

/// Pairs and families among distinct non-empty patterns.
pub fn similarity(fingerprints: &[BarFingerprint], threshold: f64) -> SimilarityReport {
    let mut by_hash: BTreeMap<u64, Pattern<'_>> = BTreeMap::new();
    for fp in fingerprints.iter().filter(|f| !f.is_empty()) {
        by_hash
            .entry(fp.hash)
            .or_insert_with(|| Pattern {
                representative: fp,
                bars: Vec::new(),
            })
            .bars
            .push(fp.bar);
    }
    let mut patterns: Vec<Pattern<'_>> = by_hash.into_values().collect();
    patterns.sort_by(|a, b| {
        b.bars
            .len()
            .cmp(&a.bars.len())
            .then_with(|| a.bars.first().cmp(&b.bars.first()))
    });

    let mut pairs = Vec::new();
    for (i, p) in patterns.iter().enumerate() {
        for q in &patterns[i + 1..] {
            let s = p.representative.similarity(q.representative);
            if s >= threshold {
                pairs.push(SimilarPair {
                    a: p.representative.hash,
                    b: q.representative.hash,
                    bar_a: p.representative.bar,
                    bar_b: q.representative.bar,
                    similarity: s,
                });
            }
        }
    }

    let mut assigned = vec![false; patterns.len()];
    let mut families = Vec::new();
    for i in 0..patterns.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let anchor = &patterns[i];
        let mut members = Vec::new();
        let mut bars = anchor.bars.clone();
        for j in i + 1..patterns.len() {
            if !assigned[j]
                && anchor.representative.similarity(patterns[j].representative) >= threshold
            {
                assigned[j] = true;
                members.push(patterns[j].representative.hash);
                bars.extend(&patterns[j].bars);
            }
        }
        if !members.is_empty() {
            bars.sort_unstable();
            families.push(PatternFamily {
                anchor: anchor.representative.hash,
                members,
                bars,
            });
        }
    }

    SimilarityReport {
        threshold,
        pairs,
        families,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fingerprint::RoleFingerprint;
    use crate::groove::PercussionRole;

    fn bar(number: u32, hat: u64) -> BarFingerprint {
        let mut roles = BTreeMap::new();
        roles.insert(
            PercussionRole::ClosedHat,
            RoleFingerprint {
                mask: hat,
                velocities: vec![],
                count: hat.count_ones() as usize,
            },
        );
        BarFingerprint::new(number, roles)
    }

    const EIGHTHS: u64 = 0x5555;

    #[test]
    fn identical_bars_are_not_pairs() {
        let fps = vec![bar(1, EIGHTHS), bar(2, EIGHTHS)];
        let report = similarity(&fps, DEFAULT_THRESHOLD);
        assert!(report.pairs.is_empty());
        assert_eq!(bar_similarity(&fps, 1, 2).unwrap(), 1.0);
    }

    #[test]
    fn near_identical_pair_and_family() {
        // eight hats vs. seven of them: 7/8
        let fps = vec![
            bar(1, EIGHTHS),
            bar(2, EIGHTHS),
            bar(3, EIGHTHS & !0x4000),
            bar(4, 0x8888),
        ];
        let report = similarity(&fps, DEFAULT_THRESHOLD);
        assert_eq!(report.pairs.len(), 1);
        assert!((report.pairs[0].similarity - 0.875).abs() < 1e-12);
        assert_eq!(report.families.len(), 1);
        let family = &report.families[0];
        assert_eq!(family.anchor, fps[0].hash);
        assert_eq!(family.members, vec![fps[2].hash]);
        assert_eq!(family.bars, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_bar_is_out_of_range() {
        let fps = vec![bar(1, 1)];
        assert!(bar_similarity(&fps, 1, 9).is_err());
    }
}
