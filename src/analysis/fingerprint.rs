//! Pattern fingerprints — per-bar, per-role slot bitmasks with a content hash.
//!
//! The hash covers the occupied slots of every role and nothing else, so two
//! bars with the same rhythm but different dynamics share a pattern.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::extract::DrumEvent;
use crate::error::{Error, Result};
use crate::event::BarGrid;
use crate::groove::PercussionRole;
use crate::stream::Fnv1a;

/// Fingerprint masks are 64 bits wide.
pub const MAX_RESOLUTION: u32 = 64;

/// One role's hits in one bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFingerprint {
    /// Bit `i` set when slot `i` has a hit.
    pub mask: u64,
    /// Velocities in time order.
    pub velocities: Vec<u8>,
    /// Number of hits, including several in one slot.
    pub count: usize,
}

/// One bar's fingerprint across all roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarFingerprint {
    pub bar: u32,
    pub roles: BTreeMap<PercussionRole, RoleFingerprint>,
    pub hash: u64,
}

impl BarFingerprint {
    /// Build from role entries, computing the hash.
    pub fn new(bar: u32, roles: BTreeMap<PercussionRole, RoleFingerprint>) -> Self {
        let hash = pattern_hash(&roles);
        Self { bar, roles, hash }
    }

    pub fn is_empty(&self) -> bool {
        self.roles.values().all(|r| r.mask == 0)
    }

    pub fn hit_count(&self) -> usize {
        self.roles.values().map(|r| r.count).sum()
    }

    pub fn mask(&self, role: PercussionRole) -> u64 {
        self.roles.get(&role).map(|r| r.mask).unwrap_or(0)
    }

    /// Jaccard similarity over `(role, slot)` occupancy. Two empty bars are identical.
    pub fn similarity(&self, other: &BarFingerprint) -> f64 {
        let roles: BTreeSet<PercussionRole> =
            self.roles.keys().chain(other.roles.keys()).copied().collect();
        let (mut intersection, mut union) = (0u32, 0u32);
        for role in roles {
            let (a, b) = (self.mask(role), other.mask(role));
            intersection += (a & b).count_ones();
            union += (a | b).count_ones();
        }
        if union == 0 {
            1.0
        } else {
            intersection as f64 / union as f64
        }
    }
}

/// Content hash over the non-empty role masks.
pub fn pattern_hash(roles: &BTreeMap<PercussionRole, RoleFingerprint>) -> u64 {
    let mut h = Fnv1a::new();
    for (role, fp) in roles.iter().filter(|(_, fp)| fp.mask != 0) {
        h.write_str(&role.label());
        h.write(&fp.mask.to_le_bytes());
    }
    h.finish()
}

/// One fingerprint per grid bar, in bar order.
pub fn fingerprint_bars(
    events: &[DrumEvent],
    grid: &BarGrid,
    resolution: u32,
) -> Result<Vec<BarFingerprint>> {
    if resolution == 0 || resolution > MAX_RESOLUTION {
        return Err(Error::invalid(format!(
            "fingerprint resolution {resolution} outside 1..={MAX_RESOLUTION}"
        )));
    }
    let mut rows: BTreeMap<u32, BTreeMap<PercussionRole, RoleFingerprint>> = grid
        .bars()
        .iter()
        .map(|b| (b.number, BTreeMap::new()))
        .collect();
    for e in events {
        let Some(row) = rows.get_mut(&e.bar) else {
            continue;
        };
        let fp = row.entry(e.role).or_default();
        fp.mask |= 1u64 << e.slot.min(resolution - 1);
        fp.velocities.push(e.velocity);
        fp.count += 1;
    }
    Ok(rows
        .into_iter()
        .map(|(bar, roles)| BarFingerprint::new(bar, roles))
        .collect())
}
