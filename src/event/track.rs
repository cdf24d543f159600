//! Append-only note storage with same-pitch overlap prevention.
//!
//! Notes are kept in per-pitch lanes sorted by start tick. Inserting a note
//! trims the sustain of the previous same-pitch note so it ends no later than
//! the new note starts, and trims the new note against any later neighbour.
//! Two notes of one pitch never sound at once.

use std::collections::BTreeMap;

use super::types::NoteEvent;

/// A track of note events under construction.
#[derive(Debug, Clone, Default)]
pub struct NoteTrack {
    lanes: BTreeMap<u8, Vec<NoteEvent>>,
    trimmed: usize,
    merged: usize,
}

impl NoteTrack {
    /// Create an empty track.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a note, trimming overlaps with same-pitch neighbours.
    ///
    /// A note starting on exactly the same tick as an existing same-pitch note
    /// is merged into it (the louder velocity and longer sustain win) and
    /// `false` is returned.
    pub fn insert(&mut self, mut event: NoteEvent) -> bool {
        let lane = self.lanes.entry(event.note).or_default();
        let idx = lane.partition_point(|e| e.start_tick < event.start_tick);

        if lane
            .get(idx)
            .is_some_and(|e| e.start_tick == event.start_tick)
        {
            let limit = lane
                .get(idx + 1)
                .map(|next| next.start_tick - event.start_tick)
                .unwrap_or(u64::MAX);
            let existing = &mut lane[idx];
            existing.velocity = existing.velocity.max(event.velocity);
            existing.duration_ticks = existing
                .duration_ticks
                .max(event.duration_ticks)
                .min(limit);
            self.merged += 1;
            return false;
        }

        if idx > 0 {
            let prev = &mut lane[idx - 1];
            if prev.end_tick() > event.start_tick {
                prev.duration_ticks = event.start_tick - prev.start_tick;
                self.trimmed += 1;
            }
        }

        if let Some(next) = lane.get(idx) {
            if event.end_tick() > next.start_tick {
                event.duration_ticks = next.start_tick - event.start_tick;
                self.trimmed += 1;
            }
        }

        lane.insert(idx, event);
        true
    }

    /// Insert a batch of notes in order.
    pub fn insert_batch(&mut self, events: impl IntoIterator<Item = NoteEvent>) {
        for event in events {
            self.insert(event);
        }
    }

    /// Total number of stored notes.
    pub fn len(&self) -> usize {
        self.lanes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.values().all(Vec::is_empty)
    }

    /// How many sustains were shortened by overlap prevention.
    pub fn trimmed_count(&self) -> usize {
        self.trimmed
    }

    /// How many notes were merged into an identical-start neighbour.
    pub fn merged_count(&self) -> usize {
        self.merged
    }

    /// Consume the track, returning all notes sorted by start tick, then pitch.
    pub fn into_events(self) -> Vec<NoteEvent> {
        let mut events: Vec<NoteEvent> = self.lanes.into_values().flatten().collect();
        events.sort_by_key(|e| (e.start_tick, e.note));
        events
    }
}
