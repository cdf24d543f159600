//! Variation engine — turns a groove template into one bar of humanized onsets.
//!
//! Anchor onsets always play. Tension-layer onsets are included by a capped
//! probability driven by density, busy probability and micro tension. On top
//! of that the engine adds snare ghosts and flams, picks hat or ride for the
//! bar, opens the odd hat, and very occasionally drops or adds one hat for
//! flow. Every choice is drawn from a stream keyed by role, style, section and
//! bar, so roles never influence each other's randomness.

use std::borrow::Cow;
use std::collections::BTreeSet;

use rand::Rng;

use super::onset::{sort_onsets, Onset};
use super::params::PerformanceParams;
use crate::event::{BeatPos, SUBTICKS_PER_BEAT};
use crate::groove::{preset, GrooveTemplate, PercussionRole};
use crate::section::SectionType;
use crate::stream::StreamKey;

/// Tension-layer inclusion probability never exceeds this.
pub const MAX_TENSION_INCLUSION: f64 = 0.85;
/// At most this many snare ghosts and flams combined per bar.
pub const MAX_SNARE_EXTRAS: usize = 2;
/// Flam grace-note lead, in ticks ahead of the main stroke.
pub const FLAM_LEAD_TICKS: (i64, i64) = (8, 18);

const TENSION_BASE: f64 = 0.35;
const HAT_SKIP_CHANCE: f64 = 0.08;
const HAT_ADD_CHANCE: f64 = 0.06;
const SIXTEENTH: u32 = SUBTICKS_PER_BEAT / 4;

/// Everything the engine needs to vary one bar.
#[derive(Debug, Clone)]
pub struct VariationRequest<'a> {
    pub template: &'a GrooveTemplate,
    pub style: &'a str,
    pub section: SectionType,
    /// 1-based bar number.
    pub bar: u32,
    pub seed: u64,
    pub params: &'a PerformanceParams,
    /// Micro tension for this bar, `[0, 1]`.
    pub micro_tension: f64,
}

impl VariationRequest<'_> {
    fn key(&self, namespace: &'static str, role: PercussionRole) -> StreamKey {
        StreamKey::new(self.seed, namespace)
            .part(role)
            .part(self.style)
            .part(self.section)
            .bar(self.bar)
    }
}

/// Maximum micro-timing deviation in ticks for a role in a style.
///
/// Strong beats get half the tolerance.
pub fn timing_tolerance(style: &str, role: PercussionRole, strong: bool) -> i64 {
    use PercussionRole::*;
    let base = match role {
        Kick => 4.0,
        Snare => 6.0,
        ClosedHat | OpenHat | Ride => 8.0,
        Crash => 3.0,
        _ => 6.0,
    };
    let feel = match style {
        "Jazz" | "HipHop" => 1.5,
        "Funk" => 1.25,
        "Metal" => 0.5,
        _ => 1.0,
    };
    let tolerance = (base * feel) as i64;
    if strong {
        (tolerance / 2).max(1)
    } else {
        tolerance
    }
}

/// Deterministic micro-timing for one onset, within `±timing_tolerance`.
pub fn micro_timing(
    seed: u64,
    role: PercussionRole,
    style: &str,
    section: SectionType,
    bar: u32,
    beat: BeatPos,
) -> i64 {
    let tolerance = timing_tolerance(style, role, beat.is_strong());
    let draw = StreamKey::new(seed, "variation.timing")
        .part(role)
        .part(style)
        .part(section)
        .bar(bar)
        .beat(beat)
        .signed_unit();
    ((draw * tolerance as f64).round() as i64).clamp(-tolerance, tolerance)
}

/// Chance of a tension-layer onset playing, capped at [`MAX_TENSION_INCLUSION`].
pub fn tension_inclusion(density: f64, busy: f64, micro_tension: f64) -> f64 {
    ((TENSION_BASE + 0.5 * busy + 0.25 * micro_tension) * density)
        .clamp(0.0, MAX_TENSION_INCLUSION)
}

fn ride_chance(style: &str, section: SectionType) -> f64 {
    let base = match style {
        "Jazz" => return 0.0,
        "Metal" => 0.25,
        _ => 0.08,
    };
    if section.is_high_energy() {
        base + 0.22
    } else {
        base
    }
}

fn open_hat_chance(beat: BeatPos, beats_per_bar: u32, micro_tension: f64) -> f64 {
    let base = if beat.whole_beat() == beats_per_bar && beat.fraction() == 0.5 {
        0.25
    } else if beat.is_strong() {
        0.02
    } else {
        0.06
    };
    base + 0.1 * micro_tension
}

/// The template to play: the given one, or the style preset if its anchor is empty.
fn effective_template<'a>(template: &'a GrooveTemplate, style: &str) -> Option<Cow<'a, GrooveTemplate>> {
    if template.has_anchor() {
        return Some(Cow::Borrowed(template));
    }
    match preset(style).filter(GrooveTemplate::has_anchor) {
        Some(fallback) => {
            log::warn!("template '{}' has an empty anchor, using the {style} preset", template.style);
            Some(Cow::Owned(fallback))
        }
        None => {
            log::warn!("template '{}' has an empty anchor and no preset for {style}", template.style);
            None
        }
    }
}

/// Vary one bar. Output is sorted by `(role, beat, timing_offset)`.
pub fn vary_bar(req: &VariationRequest<'_>) -> Vec<Onset> {
    let Some(template) = effective_template(req.template, req.style) else {
        return Vec::new();
    };
    let beats_per_bar = template.beats_per_bar.max(1);

    let use_ride = StreamKey::new(req.seed, "variation.timekeeper")
        .part(req.style)
        .part(req.section)
        .bar(req.bar)
        .chance(ride_chance(req.style, req.section));
    let timekeeper = if use_ride {
        PercussionRole::Ride
    } else {
        PercussionRole::ClosedHat
    };
    let swap = |role: PercussionRole| {
        if use_ride && role == PercussionRole::ClosedHat {
            PercussionRole::Ride
        } else {
            role
        }
    };

    let mut onsets = Vec::new();
    for (&role, positions) in &template.anchor {
        let role = swap(role);
        for &beat in positions {
            let offset = micro_timing(req.seed, role, req.style, req.section, req.bar, beat);
            let mut onset = Onset::main(role, beat, offset);
            if role == PercussionRole::ClosedHat {
                onset.is_open = req
                    .key("variation.open_hat", role)
                    .beat(beat)
                    .chance(open_hat_chance(beat, beats_per_bar, req.micro_tension));
            }
            onsets.push(onset);
        }
    }

    for (&role, positions) in &template.tension {
        let played = swap(role);
        let p = tension_inclusion(
            req.params.density_for(role),
            req.params.busy(),
            req.micro_tension,
        );
        for &beat in positions {
            if onsets.iter().any(|o| o.role == played && o.beat == beat) {
                continue;
            }
            if req.key("variation.tension", role).beat(beat).chance(p) {
                let offset = micro_timing(req.seed, played, req.style, req.section, req.bar, beat);
                onsets.push(Onset::extra(played, beat, offset));
            }
        }
    }

    add_snare_extras(req, beats_per_bar, &mut onsets);
    hat_flow(req, timekeeper, beats_per_bar, &mut onsets);

    sort_onsets(&mut onsets);
    if let Some(max) = template.max_extras {
        cap_extras(&mut onsets, max);
    }
    onsets
}

/// Keep at most `max` non-anchor hits, snare ghosts and flams first, then in order.
fn cap_extras(onsets: &mut Vec<Onset>, max: usize) {
    let mut extras: Vec<usize> = onsets
        .iter()
        .enumerate()
        .filter(|(_, o)| !o.is_main)
        .map(|(i, _)| i)
        .collect();
    if extras.len() <= max {
        return;
    }
    extras.sort_by_key(|&i| !(onsets[i].is_ghost || onsets[i].is_flam));
    let dropped: BTreeSet<usize> = extras[max..].iter().copied().collect();
    let mut index = 0;
    onsets.retain(|_| {
        let keep = !dropped.contains(&index);
        index += 1;
        keep
    });
}

/// Ghost notes off the strong beats plus an optional flam, at most two in total.
fn add_snare_extras(req: &VariationRequest<'_>, beats_per_bar: u32, onsets: &mut Vec<Onset>) {
    let snare = PercussionRole::Snare;
    let mains: Vec<(BeatPos, i64)> = onsets
        .iter()
        .filter(|o| o.role == snare && o.is_main)
        .map(|o| (o.beat, o.timing_offset))
        .collect();
    if mains.is_empty() {
        return;
    }

    let density = req.params.density_for(snare);
    let ghost_chance = ((0.25 + 0.5 * req.params.busy() + 0.3 * req.micro_tension) * density)
        .clamp(0.0, 0.9);
    let mut candidates: Vec<BeatPos> = (0..beats_per_bar * 4)
        .map(|i| BeatPos::from_subticks(i * SIXTEENTH))
        .filter(|b| !b.is_strong() && b.fraction() != 0.5)
        .filter(|b| !onsets.iter().any(|o| o.role == snare && o.beat == *b))
        .collect();

    let mut rng = req.key("variation.ghost", snare).stream();
    let mut extras = 0;
    for attempt in 0..MAX_SNARE_EXTRAS {
        let threshold = if attempt == 0 { ghost_chance } else { ghost_chance * 0.5 };
        if candidates.is_empty() || rng.gen::<f64>() >= threshold {
            break;
        }
        let beat = candidates.remove(rng.gen_range(0..candidates.len()));
        let offset = micro_timing(req.seed, snare, req.style, req.section, req.bar, beat);
        let mut ghost = Onset::extra(snare, beat, offset);
        ghost.is_ghost = true;
        onsets.push(ghost);
        extras += 1;
    }

    if extras >= MAX_SNARE_EXTRAS {
        return;
    }
    let mut rng = req.key("variation.flam", snare).stream();
    let energy = if req.section.is_high_energy() { 0.08 } else { 0.0 };
    let flam_chance = ((0.10 + energy + 0.1 * req.micro_tension) * density).clamp(0.0, 0.5);
    if rng.gen::<f64>() < flam_chance {
        let (beat, offset) = mains[rng.gen_range(0..mains.len())];
        let lead = rng.gen_range(FLAM_LEAD_TICKS.0..=FLAM_LEAD_TICKS.1);
        let mut flam = Onset::extra(snare, beat, offset - lead);
        flam.is_flam = true;
        onsets.push(flam);
    }
}

/// Rarely skip one non-strong timekeeper hit, or add one on a free sixteenth.
fn hat_flow(
    req: &VariationRequest<'_>,
    timekeeper: PercussionRole,
    beats_per_bar: u32,
    onsets: &mut Vec<Onset>,
) {
    if !onsets.iter().any(|o| o.role == timekeeper) {
        return;
    }
    let mut rng = req.key("variation.hat_flow", timekeeper).stream();

    if rng.gen::<f64>() < HAT_SKIP_CHANCE {
        let skippable: Vec<usize> = onsets
            .iter()
            .enumerate()
            .filter(|(_, o)| o.role == timekeeper && !o.beat.is_strong())
            .map(|(i, _)| i)
            .collect();
        if !skippable.is_empty() {
            onsets.remove(skippable[rng.gen_range(0..skippable.len())]);
        }
    }

    let add_chance = HAT_ADD_CHANCE + 0.1 * req.micro_tension;
    if rng.gen::<f64>() < add_chance * req.params.density_for(timekeeper).min(1.0) {
        let free: Vec<BeatPos> = (0..beats_per_bar * 4)
            .map(|i| BeatPos::from_subticks(i * SIXTEENTH))
            .filter(|b| !onsets.iter().any(|o| o.role == timekeeper && o.beat == *b))
            .collect();
        if !free.is_empty() {
            let beat = free[rng.gen_range(0..free.len())];
            let offset = micro_timing(req.seed, timekeeper, req.style, req.section, req.bar, beat);
            onsets.push(Onset::extra(timekeeper, beat, offset));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PercussionRole::*;

    fn request<'a>(
        template: &'a GrooveTemplate,
        params: &'a PerformanceParams,
        bar: u32,
        seed: u64,
    ) -> VariationRequest<'a> {
        VariationRequest {
            template,
            style: "Rock",
            section: SectionType::Verse,
            bar,
            seed,
            params,
            micro_tension: 0.0,
        }
    }

    #[test]
    fn deterministic() {
        let t = preset("Rock").unwrap();
        let p = PerformanceParams::default();
        for bar in 1..=16 {
            assert_eq!(vary_bar(&request(&t, &p, bar, 42)), vary_bar(&request(&t, &p, bar, 42)));
        }
    }

    #[test]
    fn anchor_onsets_always_present() {
        let t = preset("Rock").unwrap();
        let p = PerformanceParams::default();
        for seed in 0..20 {
            for bar in 1..=8 {
                let onsets = vary_bar(&request(&t, &p, bar, seed));
                for (&role, positions) in &t.anchor {
                    for &beat in positions {
                        if role.is_hat() && !beat.is_strong() {
                            continue;
                        }
                        assert!(
                            onsets.iter().any(|o| o.is_main
                                && o.beat == beat
                                && (o.role == role || (role == ClosedHat && o.role == Ride))),
                            "missing {role} at {beat} (seed {seed}, bar {bar})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn strong_beats_never_skipped() {
        let t = preset("Basic").unwrap();
        let p = PerformanceParams::default();
        for seed in 0..50 {
            let onsets = vary_bar(&request(&t, &p, 3, seed));
            for beat in [1.0, 2.0, 3.0, 4.0] {
                let pos = BeatPos::from_beat(beat);
                assert!(onsets.iter().any(|o| o.role.is_timekeeper() && o.beat == pos));
            }
        }
    }

    #[test]
    fn timing_within_tolerance() {
        let t = preset("Funk").unwrap();
        let p = PerformanceParams::default();
        for seed in 0..20 {
            let mut req = request(&t, &p, 5, seed);
            req.style = "Funk";
            for o in vary_bar(&req).iter().filter(|o| !o.is_flam) {
                let tol = timing_tolerance("Funk", o.role, o.beat.is_strong());
                assert!(o.timing_offset.abs() <= tol, "{o:?} exceeds {tol}");
            }
        }
    }

    #[test]
    fn snare_extras_bounded() {
        let t = preset("Funk").unwrap();
        let p = PerformanceParams {
            busy_probability: 1.0,
            ..Default::default()
        };
        for seed in 0..50 {
            let mut req = request(&t, &p, 2, seed);
            req.micro_tension = 1.0;
            let extras = vary_bar(&req)
                .iter()
                .filter(|o| o.is_ghost || o.is_flam)
                .count();
            assert!(extras <= MAX_SNARE_EXTRAS);
        }
    }

    #[test]
    fn capped_template_keeps_extras_per_bar_in_budget() {
        let t = preset("Basic").unwrap();
        let p = PerformanceParams {
            busy_probability: 1.0,
            density_multiplier: 2.0,
            ..Default::default()
        };
        let mut saw_cap = false;
        for seed in 0..40 {
            for bar in 1..=8 {
                let mut req = request(&t, &p, bar, seed);
                req.style = "Basic";
                req.micro_tension = 1.0;
                let onsets = vary_bar(&req);
                let extras = onsets.iter().filter(|o| !o.is_main).count();
                assert!(extras <= 2, "seed {seed} bar {bar}: {extras}");
                saw_cap |= extras == 2;
                assert_eq!(onsets.iter().filter(|o| o.is_main && o.role == Snare).count(), 2);
            }
        }
        assert!(saw_cap);
    }

    #[test]
    fn cap_prefers_snare_extras() {
        let mut ghost = Onset::extra(Snare, BeatPos::from_beat(3.75), 0);
        ghost.is_ghost = true;
        let mut onsets = vec![
            Onset::main(Kick, BeatPos::DOWNBEAT, 0),
            Onset::extra(ClosedHat, BeatPos::from_beat(1.75), 0),
            Onset::extra(ClosedHat, BeatPos::from_beat(2.75), 0),
            ghost,
        ];
        cap_extras(&mut onsets, 2);
        assert_eq!(onsets.len(), 3);
        assert!(onsets[0].is_main);
        assert_eq!(onsets[1].beat, BeatPos::from_beat(1.75));
        assert!(onsets[2].is_ghost);
    }

    #[test]
    fn ghosts_are_off_strong_beats_and_flams_lead() {
        let t = preset("Funk").unwrap();
        let p = PerformanceParams {
            busy_probability: 1.0,
            ..Default::default()
        };
        let mut saw_flam = false;
        for seed in 0..200 {
            let onsets = vary_bar(&request(&t, &p, 1, seed));
            for o in &onsets {
                if o.is_ghost {
                    assert!(!o.beat.is_strong());
                }
                if o.is_flam {
                    saw_flam = true;
                    let main = onsets
                        .iter()
                        .find(|m| m.role == Snare && m.is_main && m.beat == o.beat)
                        .unwrap();
                    let lead = main.timing_offset - o.timing_offset;
                    assert!((FLAM_LEAD_TICKS.0..=FLAM_LEAD_TICKS.1).contains(&lead));
                }
            }
        }
        assert!(saw_flam);
    }

    #[test]
    fn inclusion_probability_capped() {
        assert_eq!(tension_inclusion(3.0, 1.0, 1.0), MAX_TENSION_INCLUSION);
        assert_eq!(tension_inclusion(0.0, 1.0, 1.0), 0.0);
        assert!(tension_inclusion(1.0, 0.0, 0.0) < MAX_TENSION_INCLUSION);
    }

    #[test]
    fn zero_density_drops_tension_layer() {
        let t = preset("Rock").unwrap();
        let p = PerformanceParams::default().with_role_density(Kick, 0.0);
        for seed in 0..30 {
            let onsets = vary_bar(&request(&t, &p, 1, seed));
            assert!(onsets.iter().filter(|o| o.role == Kick).all(|o| o.is_main));
        }
    }

    #[test]
    fn role_density_is_isolated() {
        let t = preset("Rock").unwrap();
        let base = PerformanceParams::default();
        let busy_kick = PerformanceParams::default().with_role_density(Kick, 3.0);
        for bar in 1..=8 {
            let a: Vec<_> = vary_bar(&request(&t, &base, bar, 7))
                .into_iter()
                .filter(|o| o.role != Kick)
                .collect();
            let b: Vec<_> = vary_bar(&request(&t, &busy_kick, bar, 7))
                .into_iter()
                .filter(|o| o.role != Kick)
                .collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn empty_anchor_falls_back_to_preset() {
        let t = GrooveTemplate::new("Custom");
        let p = PerformanceParams::default();
        let onsets = vary_bar(&request(&t, &p, 1, 1));
        assert!(onsets.iter().any(|o| o.role == Snare && o.is_main));
    }

    #[test]
    fn empty_anchor_without_preset_yields_nothing() {
        let t = GrooveTemplate::new("Custom");
        let p = PerformanceParams::default();
        let mut req = request(&t, &p, 1, 1);
        req.style = "Polka";
        assert!(vary_bar(&req).is_empty());
    }

    #[test]
    fn output_sorted() {
        let t = preset("Pop").unwrap();
        let p = PerformanceParams::default();
        let onsets = vary_bar(&request(&t, &p, 4, 3));
        let keys: Vec<_> = onsets.iter().map(Onset::sort_key).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn jazz_tolerance_wider_than_metal() {
        assert!(timing_tolerance("Jazz", Snare, false) > timing_tolerance("Metal", Snare, false));
        assert!(timing_tolerance("Rock", Kick, true) < timing_tolerance("Rock", Kick, false));
    }
}
