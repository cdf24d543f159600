//! Per-bar statistics — hit counts, velocity and timing ranges, beat histogram.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::extract::DrumEvent;
use crate::event::{BarContext, BarGrid};
use crate::groove::PercussionRole;

/// Min / max / mean of a set of velocities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityStats {
    pub min: u8,
    pub max: u8,
    pub mean: f64,
}

impl VelocityStats {
    pub fn from_values(values: impl IntoIterator<Item = u8>) -> Option<Self> {
        let (mut min, mut max, mut sum, mut n) = (u8::MAX, 0u8, 0u64, 0u64);
        for v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v as u64;
            n += 1;
        }
        (n > 0).then(|| Self {
            min,
            max,
            mean: sum as f64 / n as f64,
        })
    }
}

/// Min / max / mean timing offset in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingRange {
    pub min: i64,
    pub max: i64,
    pub mean: f64,
}

/// Aggregates for one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarStats {
    pub bar: u32,
    pub hit_count: usize,
    pub role_counts: BTreeMap<PercussionRole, usize>,
    pub velocity: Option<VelocityStats>,
    pub role_velocity: BTreeMap<PercussionRole, VelocityStats>,
    pub timing: Option<TimingRange>,
    /// Hits per beat of the bar, by quantized position.
    pub beat_histogram: Vec<usize>,
    /// Fraction of hits whose quantized position is not an integer beat.
    pub offbeat_ratio: f64,
}

/// Quantized 0-based beat position of an event's grid slot.
fn quantized_beat(ctx: &BarContext, event: &DrumEvent, resolution: u32) -> f64 {
    let ticks = event.slot as f64 * ctx.ticks_per_slot(resolution);
    ticks / ctx.ticks_per_beat.max(1) as f64
}

fn stats_for(ctx: &BarContext, events: &[&DrumEvent], resolution: u32) -> BarStats {
    let mut role_counts = BTreeMap::new();
    let mut role_values: BTreeMap<PercussionRole, Vec<u8>> = BTreeMap::new();
    for e in events {
        *role_counts.entry(e.role).or_insert(0) += 1;
        role_values.entry(e.role).or_default().push(e.velocity);
    }
    let role_velocity = role_values
        .into_iter()
        .filter_map(|(role, values)| VelocityStats::from_values(values).map(|s| (role, s)))
        .collect();

    let offsets: Vec<i64> = events.iter().filter_map(|e| e.timing_offset).collect();
    let timing = (!offsets.is_empty()).then(|| TimingRange {
        min: offsets.iter().copied().min().unwrap_or(0),
        max: offsets.iter().copied().max().unwrap_or(0),
        mean: offsets.iter().sum::<i64>() as f64 / offsets.len() as f64,
    });

    let beats = ctx.beats_per_bar.max(1) as usize;
    let mut beat_histogram = vec![0; beats];
    let mut offbeat = 0usize;
    for e in events {
        let q = quantized_beat(ctx, e, resolution);
        let index = ((q + 1e-9).floor() as usize).min(beats - 1);
        beat_histogram[index] += 1;
        if (q - q.round()).abs() > 1e-6 {
            offbeat += 1;
        }
    }

    BarStats {
        bar: ctx.number,
        hit_count: events.len(),
        role_counts,
        velocity: VelocityStats::from_values(events.iter().map(|e| e.velocity)),
        role_velocity,
        timing,
        beat_histogram,
        offbeat_ratio: if events.is_empty() {
            0.0
        } else {
            offbeat as f64 / events.len() as f64
        },
    }
}

/// Statistics for every grid bar, in bar order.
pub fn bar_stats(events: &[DrumEvent], grid: &BarGrid, resolution: u32) -> Vec<BarStats> {
    let mut per_bar: BTreeMap<u32, Vec<&DrumEvent>> = BTreeMap::new();
    for e in events {
        per_bar.entry(e.bar).or_default().push(e);
    }
    grid.bars()
        .iter()
        .map(|ctx| {
            let hits = per_bar.get(&ctx.number).map(Vec::as_slice).unwrap_or(&[]);
            stats_for(ctx, hits, resolution)
        })
        .collect()
}
