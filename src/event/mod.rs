//! Musical time and note data shared by generation and analysis.
//!
//! In-bar positions are [`BeatPos`] values; absolute placement goes through the
//! externally supplied [`BarGrid`]. Generated output is a list of
//! [`NoteEvent`]s assembled in a [`NoteTrack`], which enforces same-pitch
//! overlap prevention as notes are appended bar by bar.

pub mod bar;
pub mod beat;
pub mod track;
pub mod types;

pub use bar::{BarContext, BarGrid};
pub use beat::{BeatPos, DEFAULT_BEATS_PER_BAR, SUBTICKS_PER_BEAT};
pub use track::NoteTrack;
pub use types::{NoteEvent, RawNote, DRUM_CHANNEL};
