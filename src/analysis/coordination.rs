//! Cross-role coordination — how often two roles land on the same grid slot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::extract::DrumEvent;
use crate::groove::PercussionRole;

/// Pairs reported even when they never coincide.
///
/// The `ClosedHat` side of a key pair stands for every timekeeper, so open hat
/// and ride hits count toward it.
pub const KEY_PAIRS: [(PercussionRole, PercussionRole); 5] = [
    (PercussionRole::Kick, PercussionRole::Snare),
    (PercussionRole::Kick, PercussionRole::ClosedHat),
    (PercussionRole::Snare, PercussionRole::ClosedHat),
    (PercussionRole::Kick, PercussionRole::Bass),
    (PercussionRole::ClosedHat, PercussionRole::Crash),
];

/// Coincidence counts for one role pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePairLock {
    pub a: PercussionRole,
    pub b: PercussionRole,
    /// Slots occupied by both roles.
    pub coincidences: usize,
    pub hits_a: usize,
    pub hits_b: usize,
    /// `coincidences / min(hits_a, hits_b)`, zero when either role is silent.
    pub lock_score: f64,
    pub is_key_pair: bool,
}

/// Lock scores for the key pairs plus every other pair that ever coincides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinationReport {
    pub pairs: Vec<RolePairLock>,
}

impl CoordinationReport {
    /// Lookup in either order.
    pub fn pair(&self, a: PercussionRole, b: PercussionRole) -> Option<&RolePairLock> {
        self.pairs
            .iter()
            .find(|p| (p.a == a && p.b == b) || (p.a == b && p.b == a))
    }
}

type SlotSet = BTreeSet<(u32, u32)>;

fn key_side(role: PercussionRole, slots: &BTreeMap<PercussionRole, SlotSet>) -> SlotSet {
    if role != PercussionRole::ClosedHat {
        return slots.get(&role).cloned().unwrap_or_default();
    }
    slots
        .iter()
        .filter(|(r, _)| r.is_timekeeper())
        .flat_map(|(_, s)| s.iter().copied())
        .collect()
}

fn lock(a: PercussionRole, b: PercussionRole, sa: &SlotSet, sb: &SlotSet, key: bool) -> RolePairLock {
    let coincidences = sa.intersection(sb).count();
    let smaller = sa.len().min(sb.len());
    RolePairLock {
        a,
        b,
        coincidences,
        hits_a: sa.len(),
        hits_b: sb.len(),
        lock_score: if smaller == 0 {
            0.0
        } else {
            coincidences as f64 / smaller as f64
        },
        is_key_pair: key,
    }
}

/// Coordination across all roles in `events`.
pub fn coordination(events: &[DrumEvent]) -> CoordinationReport {
    let mut slots: BTreeMap<PercussionRole, SlotSet> = BTreeMap::new();
    for e in events {
        slots.entry(e.role).or_default().insert((e.bar, e.slot));
    }

    let mut pairs: Vec<RolePairLock> = KEY_PAIRS
        .iter()
        .map(|&(a, b)| lock(a, b, &key_side(a, &slots), &key_side(b, &slots), true))
        .collect();

    let roles: Vec<PercussionRole> = slots.keys().copied().collect();
    for (i, &a) in roles.iter().enumerate() {
        for &b in &roles[i + 1..] {
            let is_key = KEY_PAIRS
                .iter()
                .any(|&(x, y)| (x == a && y == b) || (x == b && y == a));
            if is_key {
                continue;
            }
            let pair = lock(a, b, &slots[&a], &slots[&b], false);
            if pair.coincidences > 0 {
                pairs.push(pair);
            }
        }
    }
    CoordinationReport { pairs }
}
