//! Event extraction — raw notes to bar-located, role-tagged drum events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::{BarContext, BarGrid, RawNote};
use crate::groove::{map_role, PercussionRole};

/// One analysed hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrumEvent {
    pub role: PercussionRole,
    /// 1-based bar number from the grid.
    pub bar: u32,
    /// Fractional 1-based beat within the bar.
    pub beat: f64,
    pub note: u8,
    pub velocity: u8,
    pub duration_ticks: u64,
    /// Absolute start tick; authoritative for ordering.
    pub tick: u64,
    /// Signed deviation from the nearest grid slot, when known.
    pub timing_offset: Option<i64>,
    /// Nearest grid slot, `0..resolution`.
    pub slot: u32,
}

impl DrumEvent {
    pub fn offset(&self) -> i64 {
        self.timing_offset.unwrap_or(0)
    }
}

/// Role for a raw note: percussion uses the role map, anything else is bass.
pub fn role_of(note: &RawNote) -> PercussionRole {
    if note.is_percussion() {
        map_role(note.note)
    } else {
        PercussionRole::Bass
    }
}

/// Nearest slot and signed deviation from it for a tick inside `bar`.
///
/// A tick past the last slot's midpoint stays in the last slot; its deviation
/// is measured against that slot.
pub fn quantize(bar: &BarContext, tick: u64, resolution: u32) -> (u32, i64) {
    let per_slot = bar.ticks_per_slot(resolution);
    let offset = tick.saturating_sub(bar.start_tick) as f64;
    let last = resolution.saturating_sub(1);
    let slot = ((offset / per_slot).round() as u32).min(last);
    let deviation = (offset - slot as f64 * per_slot).round() as i64;
    (slot, deviation)
}

/// Bar, slot and deviation for a tick.
///
/// A hit that rounds onto the end of its bar belongs to the downbeat of the
/// next grid bar when that bar starts exactly there.
fn place(grid: &BarGrid, tick: u64, resolution: u32) -> Option<(&BarContext, u32, i64)> {
    let bar = grid.locate(tick)?;
    let per_slot = bar.ticks_per_slot(resolution);
    let offset = tick.saturating_sub(bar.start_tick) as f64;
    if (offset / per_slot).round() as u32 >= resolution {
        if let Some(next) = grid.locate(bar.end_tick).filter(|n| n.start_tick == bar.end_tick) {
            return Some((next, 0, tick as i64 - next.start_tick as i64));
        }
    }
    let (slot, deviation) = quantize(bar, tick, resolution);
    Some((bar, slot, deviation))
}

/// Extract drum events from a note sequence.
///
/// Notes outside every bar and zero-velocity note-offs are dropped. Output is
/// sorted by absolute tick, then note.
pub fn extract(notes: &[RawNote], grid: &BarGrid, resolution: u32) -> Result<Vec<DrumEvent>> {
    if resolution == 0 {
        return Err(Error::invalid("grid resolution must be positive"));
    }
    let mut events: Vec<DrumEvent> = notes
        .iter()
        .filter(|n| n.velocity > 0)
        .filter_map(|n| {
            let (bar, slot, deviation) = place(grid, n.start_tick, resolution)?;
            Some(DrumEvent {
                role: role_of(n),
                bar: bar.number,
                beat: bar.beat_of(n.start_tick),
                note: n.note,
                velocity: n.velocity.min(127),
                duration_ticks: n.duration_ticks,
                tick: n.start_tick,
                timing_offset: Some(deviation),
                slot,
            })
        })
        .collect();
    let dropped = notes.len() - events.len();
    if dropped > 0 {
        log::debug!("extraction dropped {dropped} notes outside the grid or silent");
    }
    events.sort_by_key(|e| (e.tick, e.note));
    Ok(events)
}

/// Events grouped by bar.
pub fn by_bar(events: &[DrumEvent]) -> BTreeMap<u32, Vec<&DrumEvent>> {
    let mut map: BTreeMap<u32, Vec<&DrumEvent>> = BTreeMap::new();
    for e in events {
        map.entry(e.bar).or_default().push(e);
    }
    map
}

/// Events grouped by role.
pub fn by_role(events: &[DrumEvent]) -> BTreeMap<PercussionRole, Vec<&DrumEvent>> {
    let mut map: BTreeMap<PercussionRole, Vec<&DrumEvent>> = BTreeMap::new();
    for e in events {
        map.entry(e.role).or_default().push(e);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DRUM_CHANNEL;

    fn grid() -> BarGrid {
        BarGrid::common_time(2, 480)
    }

    #[test]
    fn locates_bar_and_beat() {
        let notes = [RawNote::drum(38, 1920 + 480, 100, 90)];
        let events = extract(&notes, &grid(), 16).unwrap();
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.bar, 2);
        assert_eq!(e.role, PercussionRole::Snare);
        assert!((e.beat - 2.0).abs() < 1e-9);
        assert_eq!(e.slot, 4);
        assert_eq!(e.timing_offset, Some(0));
    }

    #[test]
    fn signed_offset_from_nearest_slot() {
        // 16 slots of 120 ticks; 250 is 10 past slot 2, 230 is 10 before it
        let notes = [RawNote::drum(36, 250, 10, 100), RawNote::drum(42, 230, 10, 100)];
        let events = extract(&notes, &grid(), 16).unwrap();
        assert_eq!(events[0].tick, 230);
        assert_eq!(events[0].timing_offset, Some(-10));
        assert_eq!(events[0].slot, 2);
        assert_eq!(events[1].timing_offset, Some(10));
        assert_eq!(events[1].slot, 2);
    }

    #[test]
    fn early_downbeat_belongs_to_next_bar() {
        let notes = [RawNote::drum(36, 0, 10, 100), RawNote::drum(36, 1918, 10, 100)];
        let events = extract(&notes, &grid(), 16).unwrap();
        assert_eq!(events[1].bar, 2);
        assert_eq!(events[1].slot, 0);
        assert_eq!(events[1].timing_offset, Some(-2));
        assert!(events.iter().all(|e| e.slot == 0));
    }

    #[test]
    fn late_hit_in_final_bar_stays_in_last_slot() {
        let notes = [RawNote::drum(36, 1920 + 1915, 10, 100)];
        let events = extract(&notes, &grid(), 16).unwrap();
        assert_eq!(events[0].bar, 2);
        assert_eq!(events[0].slot, 15);
        // measured against slot 15 at 1800
        assert_eq!(events[0].timing_offset, Some(115));
    }

    #[test]
    fn quantize_keeps_slot_and_offset_consistent() {
        let bar = *grid().bar(1).unwrap();
        let (slot, deviation) = quantize(&bar, 1915, 16);
        assert_eq!(slot, 15);
        assert_eq!(slot as i64 * 120 + deviation, 1915);
    }

    #[test]
    fn drops_outside_and_silent() {
        let notes = [
            RawNote::drum(36, 5000, 10, 100),
            RawNote::drum(36, 0, 10, 0),
            RawNote::drum(36, 0, 10, 64),
        ];
        assert_eq!(extract(&notes, &grid(), 16).unwrap().len(), 1);
    }

    #[test]
    fn non_drum_channel_is_bass() {
        let mut n = RawNote::drum(36, 0, 100, 90);
        n.channel = 1;
        assert_ne!(n.channel, DRUM_CHANNEL);
        let events = extract(&[n], &grid(), 16).unwrap();
        assert_eq!(events[0].role, PercussionRole::Bass);
    }

    #[test]
    fn zero_resolution_rejected() {
        assert!(matches!(extract(&[], &grid(), 0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn grouping_views() {
        let notes = [
            RawNote::drum(36, 0, 10, 100),
            RawNote::drum(38, 480, 10, 100),
            RawNote::drum(36, 1920, 10, 100),
        ];
        let events = extract(&notes, &grid(), 16).unwrap();
        let bars = by_bar(&events);
        assert_eq!(bars[&1].len(), 2);
        assert_eq!(bars[&2].len(), 1);
        let roles = by_role(&events);
        assert_eq!(roles[&PercussionRole::Kick].len(), 2);
    }
}
