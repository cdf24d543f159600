//! Percussion roles — semantic labels for raw General MIDI drum notes.
//!
//! Many raw note ids map to one role: both acoustic and electric snare are
//! `Snare`, the pedal hi-hat groups with the closed hat, china and splash
//! cymbals group with the crash. The [`RoleMap`] is a 128-entry table filled
//! once; every note id resolves to exactly one role, and ids without a mapping
//! resolve to a stable `Unknown:<id>` label.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A semantic percussion role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PercussionRole {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
    Ride,
    Crash,
    Tom1,
    Tom2,
    FloorTom,
    /// Hand percussion, claps, cowbell and the like.
    Percussion,
    /// Any non-percussion-channel note; used to measure kick/bass lock.
    Bass,
    /// A drum note id with no mapping.
    Unknown(u8),
}

impl PercussionRole {
    /// Every fixed role, in canonical order (excludes `Unknown`).
    pub const ALL: [PercussionRole; 11] = [
        PercussionRole::Kick,
        PercussionRole::Snare,
        PercussionRole::ClosedHat,
        PercussionRole::OpenHat,
        PercussionRole::Ride,
        PercussionRole::Crash,
        PercussionRole::Tom1,
        PercussionRole::Tom2,
        PercussionRole::FloorTom,
        PercussionRole::Percussion,
        PercussionRole::Bass,
    ];

    /// The General MIDI note the generator emits for this role.
    pub fn default_note(self) -> u8 {
        match self {
            PercussionRole::Kick => 36,
            PercussionRole::Snare => 38,
            PercussionRole::ClosedHat => 42,
            PercussionRole::OpenHat => 46,
            PercussionRole::Ride => 51,
            PercussionRole::Crash => 49,
            PercussionRole::Tom1 => 50,
            PercussionRole::Tom2 => 47,
            PercussionRole::FloorTom => 43,
            PercussionRole::Percussion => 56,
            PercussionRole::Bass => 36,
            PercussionRole::Unknown(id) => id,
        }
    }

    /// Closed or open hi-hat.
    pub fn is_hat(self) -> bool {
        matches!(self, PercussionRole::ClosedHat | PercussionRole::OpenHat)
    }

    /// Roles that carry the pulse: hats and ride.
    pub fn is_timekeeper(self) -> bool {
        self.is_hat() || self == PercussionRole::Ride
    }

    pub fn is_tom(self) -> bool {
        matches!(
            self,
            PercussionRole::Tom1 | PercussionRole::Tom2 | PercussionRole::FloorTom
        )
    }

    /// Kit pieces used for backbeat and timekeeping analysis.
    pub fn is_primary(self) -> bool {
        matches!(
            self,
            PercussionRole::Kick
                | PercussionRole::Snare
                | PercussionRole::ClosedHat
                | PercussionRole::OpenHat
                | PercussionRole::Ride
                | PercussionRole::Crash
                | PercussionRole::Tom1
                | PercussionRole::Tom2
                | PercussionRole::FloorTom
        )
    }

    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PercussionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PercussionRole::Kick => f.write_str("Kick"),
            PercussionRole::Snare => f.write_str("Snare"),
            PercussionRole::ClosedHat => f.write_str("ClosedHat"),
            PercussionRole::OpenHat => f.write_str("OpenHat"),
            PercussionRole::Ride => f.write_str("Ride"),
            PercussionRole::Crash => f.write_str("Crash"),
            PercussionRole::Tom1 => f.write_str("Tom1"),
            PercussionRole::Tom2 => f.write_str("Tom2"),
            PercussionRole::FloorTom => f.write_str("FloorTom"),
            PercussionRole::Percussion => f.write_str("Percussion"),
            PercussionRole::Bass => f.write_str("Bass"),
            PercussionRole::Unknown(id) => write!(f, "Unknown:{id}"),
        }
    }
}

impl FromStr for PercussionRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("Unknown:") {
            return id
                .parse::<u8>()
                .map(PercussionRole::Unknown)
                .map_err(|_| Error::invalid(format!("bad unknown-role id in '{s}'")));
        }
        PercussionRole::ALL
            .iter()
            .copied()
            .find(|r| r.to_string() == s)
            .ok_or_else(|| Error::invalid(format!("unknown percussion role '{s}'")))
    }
}

impl From<PercussionRole> for String {
    fn from(role: PercussionRole) -> String {
        role.to_string()
    }
}

impl TryFrom<String> for PercussionRole {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Raw note id → role assignments. Ids not listed map to `Unknown(id)`.
const NOTE_ROLES: &[(u8, PercussionRole)] = &[
    (35, PercussionRole::Kick),
    (36, PercussionRole::Kick),
    (37, PercussionRole::Snare),
    (38, PercussionRole::Snare),
    (40, PercussionRole::Snare),
    (39, PercussionRole::Percussion),
    (41, PercussionRole::FloorTom),
    (43, PercussionRole::FloorTom),
    (42, PercussionRole::ClosedHat),
    (44, PercussionRole::ClosedHat),
    (46, PercussionRole::OpenHat),
    (45, PercussionRole::Tom2),
    (47, PercussionRole::Tom2),
    (48, PercussionRole::Tom1),
    (50, PercussionRole::Tom1),
    (49, PercussionRole::Crash),
    (52, PercussionRole::Crash),
    (55, PercussionRole::Crash),
    (57, PercussionRole::Crash),
    (51, PercussionRole::Ride),
    (53, PercussionRole::Ride),
    (59, PercussionRole::Ride),
    (54, PercussionRole::Percussion),
    (56, PercussionRole::Percussion),
    (58, PercussionRole::Percussion),
    (60, PercussionRole::Percussion),
    (61, PercussionRole::Percussion),
    (62, PercussionRole::Percussion),
    (63, PercussionRole::Percussion),
    (64, PercussionRole::Percussion),
    (65, PercussionRole::Percussion),
    (66, PercussionRole::Percussion),
    (67, PercussionRole::Percussion),
    (68, PercussionRole::Percussion),
    (69, PercussionRole::Percussion),
    (70, PercussionRole::Percussion),
    (71, PercussionRole::Percussion),
    (72, PercussionRole::Percussion),
    (73, PercussionRole::Percussion),
    (74, PercussionRole::Percussion),
    (75, PercussionRole::Percussion),
    (76, PercussionRole::Percussion),
    (77, PercussionRole::Percussion),
    (78, PercussionRole::Percussion),
    (79, PercussionRole::Percussion),
    (80, PercussionRole::Percussion),
    (81, PercussionRole::Percussion),
];

/// Total note-id → role table.
#[derive(Debug, Clone)]
pub struct RoleMap {
    table: [PercussionRole; 128],
}

impl RoleMap {
    /// Build the table. Every slot starts as `Unknown(id)` so the map is total.
    ///
    /// Panics if the assignment list maps one id twice or if a role's
    /// canonical note does not map back to the role; both are table bugs.
    pub fn new() -> Self {
        let mut table = [PercussionRole::Kick; 128];
        for (id, slot) in table.iter_mut().enumerate() {
            *slot = PercussionRole::Unknown(id as u8);
        }
        let mut assigned = [false; 128];
        for &(id, role) in NOTE_ROLES {
            let idx = id as usize;
            assert!(!assigned[idx], "note {id} mapped twice");
            assigned[idx] = true;
            table[idx] = role;
        }
        let map = Self { table };
        for role in PercussionRole::ALL {
            if role != PercussionRole::Bass {
                assert_eq!(
                    map.role(role.default_note()),
                    role,
                    "canonical note for {role} does not map back"
                );
            }
        }
        map
    }

    /// Role for a drum-channel note id. Ids above 127 are masked to 7 bits.
    pub fn role(&self, note: u8) -> PercussionRole {
        self.table[(note & 0x7F) as usize]
    }
}

impl Default for RoleMap {
    fn default() -> Self {
        Self::new()
    }
}

fn shared_map() -> &'static RoleMap {
    static MAP: OnceLock<RoleMap> = OnceLock::new();
    MAP.get_or_init(RoleMap::new)
}

/// Map a drum-channel note id to its role.
pub fn map_role(note: u8) -> PercussionRole {
    shared_map().role(note)
}

/// Whether a note id belongs to the core kit used for backbeat/timekeeping analysis.
pub fn is_primary_role(note: u8) -> bool {
    map_role(note).is_primary()
}
