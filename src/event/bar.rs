//! Bar grid — the externally supplied bar/tempo layout both halves work against.

use serde::{Deserialize, Serialize};

use super::beat::{BeatPos, DEFAULT_BEATS_PER_BAR};
use crate::error::{Error, Result};

/// One bar of the grid. Read-only input to generation and analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarContext {
    /// 1-based bar number.
    pub number: u32,
    pub beats_per_bar: u32,
    pub start_tick: u64,
    /// Exclusive end tick.
    pub end_tick: u64,
    pub ticks_per_beat: u32,
}

impl BarContext {
    /// Length of the bar in ticks.
    pub fn length_ticks(&self) -> u64 {
        self.end_tick.saturating_sub(self.start_tick)
    }

    /// Whether an absolute tick falls inside `[start, end)`.
    pub fn contains(&self, tick: u64) -> bool {
        tick >= self.start_tick && tick < self.end_tick
    }

    /// Absolute tick of an in-bar position, shifted by a signed micro-timing offset.
    ///
    /// Saturates at zero for hits pushed ahead of the very first tick.
    pub fn tick_at(&self, pos: BeatPos, timing_offset: i64) -> u64 {
        let base = self.start_tick + pos.to_ticks(self.ticks_per_beat);
        (base as i64 + timing_offset).max(0) as u64
    }

    /// Ticks per slot when the bar is divided into `resolution` equal slots.
    pub fn ticks_per_slot(&self, resolution: u32) -> f64 {
        self.length_ticks() as f64 / resolution.max(1) as f64
    }

    /// Fractional 1-based beat for an absolute tick inside this bar.
    pub fn beat_of(&self, tick: u64) -> f64 {
        let offset = tick.saturating_sub(self.start_tick) as f64;
        1.0 + offset / self.ticks_per_beat.max(1) as f64
    }
}

/// An ordered, contiguous sequence of bars.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarGrid {
    bars: Vec<BarContext>,
}

impl BarGrid {
    /// Build a grid from explicit bar records, validating numbering and ordering.
    ///
    /// Bar numbers must start at 1 and increase by one; each bar must end after
    /// it starts and no bar may start before the previous one ends.
    pub fn new(bars: Vec<BarContext>) -> Result<Self> {
        for (idx, bar) in bars.iter().enumerate() {
            if bar.number as usize != idx + 1 {
                return Err(Error::invalid(format!(
                    "bar {} at position {} (bar numbers must be 1-based and consecutive)",
                    bar.number,
                    idx + 1
                )));
            }
            if bar.end_tick <= bar.start_tick {
                return Err(Error::invalid(format!("bar {} has no length", bar.number)));
            }
            if bar.beats_per_bar == 0 || bar.ticks_per_beat == 0 {
                return Err(Error::invalid(format!(
                    "bar {} has a zero meter or resolution",
                    bar.number
                )));
            }
            if idx > 0 && bar.start_tick < bars[idx - 1].end_tick {
                return Err(Error::invalid(format!(
                    "bar {} starts before bar {} ends",
                    bar.number,
                    bar.number - 1
                )));
            }
        }
        Ok(Self { bars })
    }

    /// A grid of `count` bars in a constant meter starting at tick 0.
    pub fn uniform(count: u32, beats_per_bar: u32, ticks_per_beat: u32) -> Self {
        let bar_len = beats_per_bar as u64 * ticks_per_beat as u64;
        let bars = (0..count)
            .map(|i| BarContext {
                number: i + 1,
                beats_per_bar,
                start_tick: i as u64 * bar_len,
                end_tick: (i as u64 + 1) * bar_len,
                ticks_per_beat,
            })
            .collect();
        Self { bars }
    }

    /// A 4/4 grid of `count` bars.
    pub fn common_time(count: u32, ticks_per_beat: u32) -> Self {
        Self::uniform(count, DEFAULT_BEATS_PER_BAR, ticks_per_beat)
    }

    pub fn bars(&self) -> &[BarContext] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Look up a bar by its 1-based number.
    pub fn bar(&self, number: u32) -> Result<&BarContext> {
        number
            .checked_sub(1)
            .and_then(|i| self.bars.get(i as usize))
            .ok_or_else(|| Error::out_of_range("bar", number as usize, self.bars.len()))
    }

    /// Find the bar containing an absolute tick, if any.
    pub fn locate(&self, tick: u64) -> Option<&BarContext> {
        let idx = self.bars.partition_point(|b| b.end_tick <= tick);
        self.bars.get(idx).filter(|b| b.contains(tick))
    }

    /// Number of the last bar, or 0 for an empty grid.
    pub fn last_bar(&self) -> u32 {
        self.bars.last().map(|b| b.number).unwrap_or(0)
    }
}
