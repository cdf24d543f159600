//! Velocity shaping — base level per role, accents, section energy and humanization.

use crate::event::BeatPos;
use crate::groove::PercussionRole;
use crate::section::SectionType;
use crate::stream::StreamKey;

/// Ghost strokes sit at roughly this fraction of the reference velocity.
pub const GHOST_RATIO: f64 = 0.30;
/// Flam grace notes sit at roughly this fraction of the main stroke.
pub const FLAM_RATIO: f64 = 0.60;
/// Maximum crescendo added at the end of a fill.
pub const FILL_CRESCENDO: f64 = 15.0;
/// Relative humanization jitter (±).
pub const HUMANIZE: f64 = 0.05;

/// Inputs for shaping one hit's velocity.
#[derive(Debug, Clone, Copy)]
pub struct VelocityContext {
    pub role: PercussionRole,
    pub base_velocity: u8,
    pub bar: u32,
    pub beat: BeatPos,
    pub seed: u64,
    pub section: SectionType,
    pub is_strong_beat: bool,
    pub is_ghost: bool,
    pub is_in_fill: bool,
    pub fill_progress: f64,
}

/// Default base velocity for a role.
pub fn base_velocity(role: PercussionRole) -> u8 {
    use PercussionRole::*;
    match role {
        Kick => 100,
        Snare => 98,
        ClosedHat => 78,
        OpenHat => 84,
        Ride => 80,
        Crash => 105,
        Tom1 | Tom2 | FloorTom => 92,
        Percussion => 70,
        Bass => 90,
        Unknown(_) => 80,
    }
}

/// Energy offset a section applies to a role.
pub fn section_boost(section: SectionType, role: PercussionRole) -> i32 {
    use PercussionRole::*;
    match section {
        SectionType::Verse => 0,
        SectionType::Chorus => match role {
            Kick | Snare => 6,
            Crash => 8,
            ClosedHat | OpenHat | Ride => 4,
            _ => 3,
        },
        SectionType::Bridge => match role {
            Kick | Snare => 4,
            Crash => 5,
            _ => 2,
        },
        SectionType::Solo => match role {
            Kick | Snare => 5,
            Crash => 6,
            _ => 3,
        },
        SectionType::Intro => match role {
            Crash => -4,
            _ => -6,
        },
        SectionType::Outro => match role {
            Crash => -6,
            _ => -8,
        },
    }
}

fn clamp_velocity(v: f64) -> u8 {
    v.round().clamp(1.0, 127.0) as u8
}

/// Ghost velocity: about 30% of the reference, ±2.
pub fn ghost_velocity(reference: u8, seed: u64, bar: u32, beat: BeatPos) -> u8 {
    let jitter = StreamKey::new(seed, "velocity.ghost")
        .bar(bar)
        .beat(beat)
        .signed_unit()
        * 2.0;
    clamp_velocity(reference as f64 * GHOST_RATIO + jitter)
}

/// Flam grace-note velocity: about 60% of the main stroke, ±3.
pub fn flam_velocity(reference: u8, seed: u64, bar: u32, beat: BeatPos) -> u8 {
    let jitter = StreamKey::new(seed, "velocity.flam")
        .bar(bar)
        .beat(beat)
        .signed_unit()
        * 3.0;
    clamp_velocity(reference as f64 * FLAM_RATIO + jitter)
}

/// Shape a hit's velocity. Always in `1..=127`.
pub fn shape_velocity(ctx: &VelocityContext) -> u8 {
    if ctx.is_ghost {
        return ghost_velocity(ctx.base_velocity, ctx.seed, ctx.bar, ctx.beat);
    }

    let mut v = ctx.base_velocity as f64;
    if ctx.is_in_fill {
        v += FILL_CRESCENDO * ctx.fill_progress.clamp(0.0, 1.0);
    }
    if ctx.role.is_timekeeper() {
        if ctx.is_strong_beat && ctx.beat.is_backbeat() {
            v += 12.0;
        } else if ctx.is_strong_beat && ctx.beat == BeatPos::DOWNBEAT {
            v += 8.0;
        } else if ctx.section == SectionType::Chorus && !ctx.beat.is_on_beat() {
            v += 5.0;
        }
    }
    v += section_boost(ctx.section, ctx.role) as f64;

    let jitter = StreamKey::new(ctx.seed, "velocity.humanize")
        .part(ctx.role)
        .part(ctx.section)
        .bar(ctx.bar)
        .beat(ctx.beat)
        .signed_unit();
    v *= 1.0 + HUMANIZE * jitter;
    clamp_velocity(v)
}
