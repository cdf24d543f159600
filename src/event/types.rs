//! Note-level data model — the contract with MIDI export and import.
//!
//! [`NoteEvent`] is what the track generator emits. [`RawNote`] is what the
//! analysis side consumes; it additionally carries the MIDI channel so that
//! percussion can be told apart from a bass line.

use serde::{Deserialize, Serialize};

/// General MIDI percussion channel (channel 10, zero-based 9).
pub const DRUM_CHANNEL: u8 = 9;

/// A timed note emitted by the track generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Percussion instrument id (General MIDI drum note).
    pub note: u8,
    /// Absolute start time in ticks.
    pub start_tick: u64,
    pub duration_ticks: u64,
    /// Velocity in `[1, 127]`.
    pub velocity: u8,
}

impl NoteEvent {
    pub fn new(note: u8, start_tick: u64, duration_ticks: u64, velocity: u8) -> Self {
        Self {
            note,
            start_tick,
            duration_ticks,
            velocity: velocity.clamp(1, 127),
        }
    }

    /// Exclusive end tick.
    pub fn end_tick(&self) -> u64 {
        self.start_tick + self.duration_ticks
    }
}

/// A note-on read from an imported or generated sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNote {
    pub note: u8,
    /// Zero-based MIDI channel.
    pub channel: u8,
    pub start_tick: u64,
    pub duration_ticks: u64,
    /// Raw velocity; 0 means a note-off and is ignored by extraction.
    pub velocity: u8,
}

impl RawNote {
    /// A percussion-channel note.
    pub fn drum(note: u8, start_tick: u64, duration_ticks: u64, velocity: u8) -> Self {
        Self {
            note,
            channel: DRUM_CHANNEL,
            start_tick,
            duration_ticks,
            velocity,
        }
    }

    pub fn is_percussion(&self) -> bool {
        self.channel == DRUM_CHANNEL
    }
}

impl From<NoteEvent> for RawNote {
    fn from(e: NoteEvent) -> Self {
        RawNote::drum(e.note, e.start_tick, e.duration_ticks, e.velocity)
    }
}
