//! Timing feel — per-role micro-timing distributions, swing and consistency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::extract::{by_role, DrumEvent};
use crate::event::BarGrid;
use crate::groove::PercussionRole;

/// Standard deviation (ticks) at which consistency reaches zero.
pub const CONSISTENCY_SPREAD: f64 = 15.0;
/// Default histogram bucket width in ticks.
pub const DEFAULT_BUCKET: i64 = 5;

/// Micro-timing distribution of one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleTiming {
    pub role: PercussionRole,
    pub count: usize,
    pub mean: f64,
    pub stdev: f64,
    /// Bucket lower bound (ticks) → hits.
    pub histogram: BTreeMap<i64, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingFeel {
    pub roles: Vec<RoleTiming>,
    /// Long/short ratio of eighth-note pairs; 1.0 is straight, 2.0 triplet swing.
    pub swing_ratio: f64,
    /// Signed mean offset over all hits; negative is ahead of the grid.
    pub ahead_behind: f64,
    /// `max(0, 1 - stdev / 15)` over all hits.
    pub consistency: f64,
}

impl Default for TimingFeel {
    fn default() -> Self {
        Self {
            roles: Vec::new(),
            swing_ratio: 1.0,
            ahead_behind: 0.0,
            consistency: 1.0,
        }
    }
}

fn mean_and_stdev(values: &[i64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<i64>() as f64 / n;
    let variance = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn histogram(values: &[i64], bucket: i64) -> BTreeMap<i64, usize> {
    let bucket = bucket.max(1);
    let mut map = BTreeMap::new();
    for &v in values {
        *map.entry(v.div_euclid(bucket) * bucket).or_insert(0) += 1;
    }
    map
}

/// Swing from beats that hold exactly one hit between two on-beat hits.
///
/// Uses hats and ride when present, otherwise every role.
pub fn swing_ratio(events: &[DrumEvent], grid: &BarGrid) -> f64 {
    let timekeepers: Vec<u64> = events
        .iter()
        .filter(|e| e.role.is_timekeeper())
        .map(|e| e.tick)
        .collect();
    let mut ticks = if timekeepers.is_empty() {
        events.iter().map(|e| e.tick).collect()
    } else {
        timekeepers
    };
    ticks.sort_unstable();
    ticks.dedup();

    let mut ratios = Vec::new();
    for bar in grid.bars() {
        let beat = bar.ticks_per_beat as u64;
        let window = (beat / 8).max(1);
        for k in 0..bar.beats_per_bar as u64 {
            let start = bar.start_tick + k * beat;
            let end = start + beat;
            let near = |target: u64| {
                let lo = ticks.partition_point(|&t| t + window < target);
                ticks.get(lo).copied().filter(|&t| t <= target + window)
            };
            let (Some(on), Some(next)) = (near(start), near(end)) else {
                continue;
            };
            let inside: Vec<u64> = ticks
                .iter()
                .copied()
                .filter(|&t| t > on + window && t + window < next)
                .collect();
            if let [mid] = inside[..] {
                let (long, short) = (mid - on, next - mid);
                if short > 0 {
                    ratios.push(long as f64 / short as f64);
                }
            }
        }
    }
    if ratios.is_empty() {
        1.0
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    }
}

/// Timing feel of a track.
pub fn timing_feel(events: &[DrumEvent], grid: &BarGrid, bucket: i64) -> TimingFeel {
    let roles = by_role(events)
        .into_iter()
        .map(|(role, hits)| {
            let offsets: Vec<i64> = hits.iter().filter_map(|e| e.timing_offset).collect();
            let (mean, stdev) = mean_and_stdev(&offsets);
            RoleTiming {
                role,
                count: offsets.len(),
                mean,
                stdev,
                histogram: histogram(&offsets, bucket),
            }
        })
        .collect();

    let all: Vec<i64> = events.iter().filter_map(|e| e.timing_offset).collect();
    let (mean, stdev) = mean_and_stdev(&all);
    TimingFeel {
        roles,
        swing_ratio: swing_ratio(events, grid),
        ahead_behind: mean,
        consistency: (1.0 - stdev / CONSISTENCY_SPREAD).max(0.0),
    }
}
