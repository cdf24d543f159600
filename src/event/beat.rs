//! In-bar beat positions using integer sub-beat ticks.
//!
//! Positions are 1-based (beat 1 is the downbeat) and stored at a fixed
//! [`SUBTICKS_PER_BEAT`] resolution so that sorting, hashing and equality are
//! exact. Conversion to absolute MIDI ticks happens only at the bar-grid
//! boundary, where the grid's own ticks-per-beat applies.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sub-beat resolution. 960 divides cleanly by 2, 3, 4, 6, 8, 12, 16, etc.
pub const SUBTICKS_PER_BEAT: u32 = 960;

/// Default time signature: 4 beats per bar.
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// A position within a bar, 1-based, measured in sub-beat ticks from the downbeat.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "f64", from = "f64")]
pub struct BeatPos {
    subticks: u32,
}

impl BeatPos {
    /// The downbeat of the bar (beat 1).
    pub const DOWNBEAT: BeatPos = BeatPos { subticks: 0 };

    /// Create a position from sub-beat ticks past the downbeat.
    pub fn from_subticks(subticks: u32) -> Self {
        Self { subticks }
    }

    /// Create a position from a 1-based beat value (e.g. 2.5 = the "and" of two).
    ///
    /// Values below 1.0 clamp to the downbeat.
    pub fn from_beat(beat: f64) -> Self {
        let offset = ((beat - 1.0) * SUBTICKS_PER_BEAT as f64).round().max(0.0);
        Self {
            subticks: offset as u32,
        }
    }

    /// Create a position from a 0-based slot index on an even grid.
    pub fn from_slot(slot: u32, slots_per_beat: u32) -> Self {
        let per_slot = SUBTICKS_PER_BEAT / slots_per_beat.max(1);
        Self {
            subticks: slot * per_slot,
        }
    }

    /// Raw sub-beat ticks past the downbeat.
    pub fn subticks(self) -> u32 {
        self.subticks
    }

    /// The 1-based beat value as a float.
    pub fn beat(self) -> f64 {
        1.0 + self.subticks as f64 / SUBTICKS_PER_BEAT as f64
    }

    /// The 1-based beat this position falls in (2.75 → 2).
    pub fn whole_beat(self) -> u32 {
        1 + self.subticks / SUBTICKS_PER_BEAT
    }

    /// Fraction of the way through the current beat, in `[0, 1)`.
    pub fn fraction(self) -> f64 {
        (self.subticks % SUBTICKS_PER_BEAT) as f64 / SUBTICKS_PER_BEAT as f64
    }

    /// Whether this position sits exactly on an integer beat.
    pub fn is_on_beat(self) -> bool {
        self.subticks % SUBTICKS_PER_BEAT == 0
    }

    /// Strong beats get tighter timing tolerance and are never skipped.
    pub fn is_strong(self) -> bool {
        self.is_on_beat()
    }

    /// Whether this is an even-numbered beat (2, 4, ...), the backbeat in 4/4.
    pub fn is_backbeat(self) -> bool {
        self.is_on_beat() && self.whole_beat() % 2 == 0
    }

    /// Offset this position by `delta` sub-beat ticks, saturating at the downbeat.
    pub fn shifted(self, delta: i64) -> Self {
        let moved = (self.subticks as i64 + delta).max(0);
        Self {
            subticks: moved as u32,
        }
    }

    /// Absolute-tick offset from the bar start at the given grid resolution.
    pub fn to_ticks(self, ticks_per_beat: u32) -> u64 {
        let num = self.subticks as u64 * ticks_per_beat as u64;
        (num + SUBTICKS_PER_BEAT as u64 / 2) / SUBTICKS_PER_BEAT as u64
    }
}

impl Ord for BeatPos {
    fn cmp(&self, other: &Self) -> Ordering {
        self.subticks.cmp(&other.subticks)
    }
}

impl PartialOrd for BeatPos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<BeatPos> for f64 {
    fn from(pos: BeatPos) -> f64 {
        pos.beat()
    }
}

impl From<f64> for BeatPos {
    fn from(beat: f64) -> Self {
        BeatPos::from_beat(beat)
    }
}

impl fmt::Display for BeatPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.beat())
    }
}
