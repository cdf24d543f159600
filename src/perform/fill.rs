//! Fill engine — decides which bars fill and generates the fill's onsets.
//!
//! A fill replaces the end of a bar with a snare or tom figure whose shape and
//! hit count follow a per-section density. Section-boundary fills are floored
//! at [`MIN_TRANSITION_FILL_DENSITY`]; the song's final bar never fills.

use rand::Rng;

use super::onset::Onset;
use super::variation::micro_timing;
use crate::event::{BeatPos, SUBTICKS_PER_BEAT};
use crate::groove::PercussionRole;
use crate::section::SectionType;
use crate::stream::StreamKey;

/// Fills at a section boundary carry at least this many hits.
pub const MIN_TRANSITION_FILL_DENSITY: u32 = 4;

/// Whether `bar` should fill: it ends a section and is not the song's last bar.
pub fn should_fill(bar: u32, total_bars: u32, boundaries: &[u32]) -> bool {
    bar != total_bars && boundaries.contains(&bar)
}

/// What a style allows its fills to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillStyle {
    pub supports_sixteenth_roll: bool,
    pub supports_tom_movement: bool,
    pub max_density: u32,
    pub prefers_crash_on_downbeat: bool,
}

impl FillStyle {
    /// The fill style for a groove style; unknown styles get the default.
    pub fn resolve(style: &str) -> Self {
        let (roll, toms, max, crash) = match style {
            "Rock" => (true, true, 8, true),
            "Metal" => (true, true, 12, true),
            "Funk" => (true, false, 8, false),
            "Pop" => (true, true, 6, true),
            "HipHop" => (false, false, 4, false),
            "Jazz" => (false, true, 6, false),
            _ => return Self::default(),
        };
        Self {
            supports_sixteenth_roll: roll,
            supports_tom_movement: toms,
            max_density: max,
            prefers_crash_on_downbeat: crash,
        }
    }
}

impl Default for FillStyle {
    fn default() -> Self {
        Self {
            supports_sixteenth_roll: true,
            supports_tom_movement: true,
            max_density: 8,
            prefers_crash_on_downbeat: true,
        }
    }
}

/// Rhythmic figure of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillShape {
    SixteenthRoll,
    EighthRoll,
    Pickup,
}

/// Typical hit count of a fill in a section.
pub fn base_density(section: SectionType) -> u32 {
    match section {
        SectionType::Intro => 3,
        SectionType::Verse => 4,
        SectionType::Chorus => 6,
        SectionType::Solo => 6,
        SectionType::Bridge => 7,
        SectionType::Outro => 2,
    }
}

/// Inputs for one fill.
#[derive(Debug, Clone)]
pub struct FillRequest<'a> {
    pub style: &'a str,
    pub section: SectionType,
    pub bar: u32,
    pub seed: u64,
    pub beats_per_bar: u32,
    pub density_multiplier: f64,
    /// Fill sits on a section boundary.
    pub is_transition: bool,
}

/// A generated fill.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub shape: FillShape,
    pub density: u32,
    /// Sorted by beat.
    pub onsets: Vec<Onset>,
}

impl Fill {
    /// First fill position, if any.
    pub fn start(&self) -> Option<BeatPos> {
        self.onsets.iter().map(|o| o.beat).min()
    }

    /// Whether the fill plays a role.
    pub fn uses_role(&self, role: PercussionRole) -> bool {
        self.onsets.iter().any(|o| o.role == role)
    }
}

/// Final hit count: section base ±1 jitter, scaled, clamped to the style maximum,
/// then floored for transitions.
pub fn resolve_density(req: &FillRequest<'_>, style: &FillStyle) -> u32 {
    let jitter = StreamKey::new(req.seed, "fill.density")
        .part(req.style)
        .part(req.section)
        .bar(req.bar)
        .stream()
        .gen_range(-1i64..=1);
    let raw = (base_density(req.section) as i64 + jitter) as f64 * req.density_multiplier.clamp(0.0, 3.0);
    let density = (raw.round() as i64).clamp(0, style.max_density as i64) as u32;
    if req.is_transition {
        density.max(MIN_TRANSITION_FILL_DENSITY)
    } else {
        density
    }
}

fn pick_shape(density: u32, style: &FillStyle) -> FillShape {
    if density >= 6 && style.supports_sixteenth_roll {
        FillShape::SixteenthRoll
    } else if density >= 4 {
        FillShape::EighthRoll
    } else {
        FillShape::Pickup
    }
}

/// Tom for a position through the fill: high, then mid, then floor.
fn tom_at(fraction: f64) -> PercussionRole {
    if fraction < 1.0 / 3.0 {
        PercussionRole::Tom1
    } else if fraction < 2.0 / 3.0 {
        PercussionRole::Tom2
    } else {
        PercussionRole::FloorTom
    }
}

/// Generate the fill for one bar.
pub fn generate_fill(req: &FillRequest<'_>) -> Fill {
    let style = FillStyle::resolve(req.style);
    let density = resolve_density(req, &style);
    let beats_per_bar = req.beats_per_bar.max(1);
    let span_beats = beats_per_bar.min(2);
    let mut shape = pick_shape(density, &style);
    // too few eighths in a short bar to reach the transition floor
    if shape == FillShape::EighthRoll && req.is_transition && 2 * span_beats < MIN_TRANSITION_FILL_DENSITY {
        shape = FillShape::SixteenthRoll;
    }
    let (step, count) = match shape {
        FillShape::SixteenthRoll => (SUBTICKS_PER_BEAT / 4, density.min(4 * span_beats)),
        FillShape::EighthRoll => (SUBTICKS_PER_BEAT / 2, density.min(2 * span_beats)),
        FillShape::Pickup => (SUBTICKS_PER_BEAT / 4, density.min(2)),
    };
    let bar_end = beats_per_bar * SUBTICKS_PER_BEAT;
    let first = bar_end - count * step;
    let toms = style.supports_tom_movement && density >= 4 && shape != FillShape::Pickup;

    let onsets = (0..count)
        .map(|i| {
            let beat = BeatPos::from_subticks(first + i * step);
            let fraction = i as f64 / count as f64;
            let role = if toms {
                tom_at(fraction)
            } else {
                PercussionRole::Snare
            };
            let offset = micro_timing(req.seed, role, req.style, req.section, req.bar, beat);
            let mut onset = Onset::main(role, beat, offset);
            onset.is_in_fill = true;
            onset.fill_progress = if count > 1 {
                i as f64 / (count - 1) as f64
            } else {
                1.0
            };
            onset
        })
        .collect();

    log::debug!(
        "fill bar {} {:?} density {} ({} {})",
        req.bar,
        shape,
        density,
        req.style,
        req.section
    );
    Fill {
        shape,
        density,
        onsets,
    }
}
