//! Track generator — runs the per-bar engines over a whole song and emits notes.
//!
//! For every bar of the grid the generator looks up the section, decides on a
//! fill, asks the variation and fill engines for onsets, adds planned cymbal
//! hits and the crash after a boundary fill, thins hats under a lead motif,
//! and converts the result into absolute-tick notes. Notes go through a
//! [`NoteTrack`] so the same instrument never overlaps itself.

use std::collections::BTreeSet;

use super::fill::{generate_fill, should_fill, Fill, FillRequest, FillShape, FillStyle};
use super::onset::{has_timekeeping, sort_onsets, Onset};
use super::variation::{vary_bar, VariationRequest};
use super::velocity::{base_velocity, flam_velocity, shape_velocity, VelocityContext};
use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::event::{BarContext, BarGrid, BeatPos, NoteEvent, NoteTrack};
use crate::groove::{GrooveCatalog, GrooveTemplate, PercussionRole};
use crate::section::{SectionPlan, SectionPosition, SectionType, TensionSignals};
use crate::stream::StreamKey;

/// Probability of thinning a late non-anchor hat at a phrase end.
const PHRASE_END_DROPOUT: f64 = 0.5;
/// Fill bias from tension signals is capped at this.
const MAX_FILL_BIAS: f64 = 0.20;

/// A crash or ride accent planned by the arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CymbalHit {
    pub bar: u32,
    pub beat: BeatPos,
    pub role: PercussionRole,
    /// Choke immediately after the hit.
    pub choke: bool,
}

impl CymbalHit {
    pub fn crash(bar: u32, beat: f64) -> Self {
        Self {
            bar,
            beat: BeatPos::from_beat(beat),
            role: PercussionRole::Crash,
            choke: false,
        }
    }

    pub fn choked(mut self) -> Self {
        self.choke = true;
        self
    }
}

/// Inputs for one generation run. Grid and section plan are required.
#[derive(Debug, Clone, Default)]
pub struct TrackRequest<'a> {
    pub style: String,
    pub seed: u64,
    pub grid: Option<&'a BarGrid>,
    pub sections: Option<&'a SectionPlan>,
    pub tension: Option<&'a TensionSignals>,
    pub cymbals: Vec<CymbalHit>,
    /// Bars where a lead motif is playing.
    pub lead_motif_bars: BTreeSet<u32>,
}

impl<'a> TrackRequest<'a> {
    pub fn new(style: &str, seed: u64) -> Self {
        Self {
            style: style.to_string(),
            seed,
            ..Default::default()
        }
    }

    pub fn grid(mut self, grid: &'a BarGrid) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn sections(mut self, plan: &'a SectionPlan) -> Self {
        self.sections = Some(plan);
        self
    }

    pub fn tension(mut self, signals: &'a TensionSignals) -> Self {
        self.tension = Some(signals);
        self
    }

    pub fn cymbal(mut self, hit: CymbalHit) -> Self {
        self.cymbals.push(hit);
        self
    }

    pub fn lead_motif(mut self, bars: impl IntoIterator<Item = u32>) -> Self {
        self.lead_motif_bars.extend(bars);
        self
    }
}

/// The plan for one bar before conversion to notes.
#[derive(Debug, Clone, PartialEq)]
pub struct BarPlan {
    pub bar: u32,
    pub position: SectionPosition,
    /// Shape of the fill, if this bar filled.
    pub fill: Option<FillShape>,
    /// Whether the fill sits on a section boundary.
    pub boundary_fill: bool,
    pub onsets: Vec<Onset>,
}

/// Song-level driver for the performance engines.
#[derive(Debug, Clone)]
pub struct TrackGenerator {
    catalog: GrooveCatalog,
    settings: GenerationConfig,
}

impl TrackGenerator {
    /// The configured default style replaces the catalog's own fallback.
    pub fn new(mut catalog: GrooveCatalog, settings: GenerationConfig) -> Self {
        catalog.default_style = settings.default_style.clone();
        Self { catalog, settings }
    }

    /// Built-in presets with default settings.
    pub fn with_presets() -> Self {
        Self::new(GrooveCatalog::with_presets(), GenerationConfig::default())
    }

    pub fn settings(&self) -> &GenerationConfig {
        &self.settings
    }

    /// Plan every bar of the grid without converting to notes.
    pub fn plan(&self, req: &TrackRequest<'_>) -> Result<Vec<BarPlan>> {
        let (grid, plan) = required(req)?;
        if grid.is_empty() {
            return Ok(Vec::new());
        }
        let template = self.catalog.resolve(&req.style)?;
        let neutral = TensionSignals::neutral();
        let tension = req.tension.unwrap_or(&neutral);
        let boundaries = plan.boundaries();
        let total = grid.last_bar();
        let fill_style = FillStyle::resolve(&req.style);

        for hit in &req.cymbals {
            if grid.bar(hit.bar).is_err() {
                log::warn!("cymbal hit in bar {} is outside the grid, skipping", hit.bar);
            }
        }

        let mut plans = Vec::with_capacity(grid.len());
        let mut crash_next = false;
        for ctx in grid.bars() {
            let position = plan.position_of(ctx.number)?;
            let mut bar_plan = self.plan_bar(req, template, tension, ctx, position, &boundaries, total);
            if crash_next {
                add_crash_on_downbeat(&mut bar_plan.onsets);
            }
            crash_next = bar_plan.boundary_fill && fill_style.prefers_crash_on_downbeat;
            plans.push(bar_plan);
        }
        Ok(plans)
    }

    /// Generate the whole track. Output is sorted by start tick.
    pub fn generate(&self, req: &TrackRequest<'_>) -> Result<Vec<NoteEvent>> {
        let plans = self.plan(req)?;
        let (grid, _) = required(req)?;
        let mut track = NoteTrack::new();
        for bar_plan in &plans {
            let ctx = grid.bar(bar_plan.bar)?;
            for onset in &bar_plan.onsets {
                track.insert(self.render(req.seed, ctx, bar_plan.position, onset));
            }
        }
        if track.trimmed_count() > 0 || track.merged_count() > 0 {
            log::debug!(
                "overlap prevention trimmed {} and merged {} notes",
                track.trimmed_count(),
                track.merged_count()
            );
        }
        Ok(track.into_events())
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_bar(
        &self,
        req: &TrackRequest<'_>,
        template: &GrooveTemplate,
        tension: &TensionSignals,
        ctx: &BarContext,
        position: SectionPosition,
        boundaries: &[u32],
        total_bars: u32,
    ) -> BarPlan {
        let bar = ctx.number;
        let params = &self.settings.params;
        let micro_tension = tension.micro_for(bar);
        let variation = VariationRequest {
            template,
            style: &req.style,
            section: position.kind,
            bar,
            seed: req.seed,
            params,
            micro_tension,
        };

        let boundary = should_fill(bar, total_bars, boundaries);
        let bias = tension.fill_bias(&position).clamp(0.0, MAX_FILL_BIAS);
        let random = bar != total_bars
            && StreamKey::new(req.seed, "track.fill")
                .part(&req.style)
                .part(position.kind)
                .bar(bar)
                .chance(params.fill_chance() + bias);

        let mut fill_shape = None;
        let mut onsets = if boundary || random {
            let fill = generate_fill(&FillRequest {
                style: &req.style,
                section: position.kind,
                bar,
                seed: req.seed,
                beats_per_bar: ctx.beats_per_bar,
                density_multiplier: params.density(),
                is_transition: boundary,
            });
            fill_shape = Some(fill.shape);
            if has_timekeeping(&fill.onsets) {
                fill.onsets
            } else {
                merge_fill(fill, vary_bar(&variation))
            }
        } else {
            let mut groove = vary_bar(&variation);
            if self.settings.phrase_end_dropout && position.is_last_bar() {
                phrase_end_dropout(&mut groove, template, req, bar, position.kind, ctx.beats_per_bar);
            }
            groove
        };

        for hit in req.cymbals.iter().filter(|h| h.bar == bar) {
            if hit.beat.whole_beat() > ctx.beats_per_bar {
                log::warn!(
                    "{} at beat {} is past the end of bar {bar} ({} beats), skipping",
                    hit.role,
                    hit.beat,
                    ctx.beats_per_bar
                );
                continue;
            }
            let mut onset = Onset::main(hit.role, hit.beat, 0);
            onset.is_choke = hit.choke;
            onsets.push(onset);
        }

        if req.lead_motif_bars.contains(&bar) {
            duck_for_lead(&mut onsets, self.settings.lead_duck_factor, req, bar);
        }

        sort_onsets(&mut onsets);
        log::debug!(
            "bar {bar} {} {}/{}: {} onsets{}",
            position.kind,
            position.bar_in_section,
            position.section_length,
            onsets.len(),
            if fill_shape.is_some() { " (fill)" } else { "" }
        );
        BarPlan {
            bar,
            position,
            fill: fill_shape,
            boundary_fill: boundary,
            onsets,
        }
    }

    fn render(&self, seed: u64, ctx: &BarContext, position: SectionPosition, onset: &Onset) -> NoteEvent {
        let role = onset.sounding_role();
        let start = ctx.tick_at(onset.beat, onset.timing_offset);
        let base = base_velocity(role);
        let velocity = if onset.is_flam {
            flam_velocity(base, seed, ctx.number, onset.beat)
        } else {
            shape_velocity(&VelocityContext {
                role,
                base_velocity: base,
                bar: ctx.number,
                beat: onset.beat,
                seed,
                section: position.kind,
                is_strong_beat: onset.beat.is_strong(),
                is_ghost: onset.is_ghost,
                is_in_fill: onset.is_in_fill,
                fill_progress: onset.fill_progress,
            })
        };
        let velocity = (velocity as i32 + self.settings.params.velocity_bias).clamp(1, 127) as u8;
        NoteEvent::new(role.default_note(), start, duration_for(onset, ctx), velocity)
    }
}

fn required<'a>(req: &TrackRequest<'a>) -> Result<(&'a BarGrid, &'a SectionPlan)> {
    let grid = req.grid.ok_or(Error::MissingInput("bar grid"))?;
    let plan = req.sections.ok_or(Error::MissingInput("section plan"))?;
    Ok((grid, plan))
}

/// Hats and choked cymbals are short, crashes ring for the bar, the rest a beat.
fn duration_for(onset: &Onset, ctx: &BarContext) -> u64 {
    let beat = ctx.ticks_per_beat as u64;
    let ticks = if onset.is_choke || onset.role.is_hat() {
        beat / 4
    } else if onset.role == PercussionRole::Crash {
        beat * ctx.beats_per_bar as u64
    } else {
        beat
    };
    ticks.max(1)
}

/// Keep the groove's pulse under a fill that has none.
///
/// Fill hits win on identical `(role, beat, offset)`; groove hits of a role
/// the fill plays are dropped from the fill's start onward, as are main
/// snare strokes inside the fill window.
fn merge_fill(fill: Fill, groove: Vec<Onset>) -> Vec<Onset> {
    let Some(start) = fill.start() else {
        return groove;
    };
    let mut merged = Vec::with_capacity(fill.onsets.len() + groove.len());
    for g in groove {
        let clashes = fill.onsets.iter().any(|f| f.sort_key() == g.sort_key());
        let replaced = g.beat >= start
            && !g.role.is_timekeeper()
            && (fill.uses_role(g.role) || g.role == PercussionRole::Snare);
        if !clashes && !replaced {
            merged.push(g);
        }
    }
    merged.extend(fill.onsets);
    merged
}

fn add_crash_on_downbeat(onsets: &mut Vec<Onset>) {
    let present = onsets
        .iter()
        .any(|o| o.role == PercussionRole::Crash && o.beat == BeatPos::DOWNBEAT);
    if !present {
        onsets.push(Onset::main(PercussionRole::Crash, BeatPos::DOWNBEAT, 0));
        sort_onsets(onsets);
    }
}

/// Thin late-bar hats that are neither anchor nor main at a phrase end.
fn phrase_end_dropout(
    onsets: &mut Vec<Onset>,
    template: &GrooveTemplate,
    req: &TrackRequest<'_>,
    bar: u32,
    section: SectionType,
    beats_per_bar: u32,
) {
    onsets.retain(|o| {
        let candidate = o.role.is_hat()
            && !o.is_main
            && o.beat.whole_beat() == beats_per_bar
            && !template.anchor_positions(o.role).contains(&o.beat);
        !candidate
            || !StreamKey::new(req.seed, "track.phrase_end")
                .part(o.role)
                .part(&req.style)
                .part(section)
                .bar(bar)
                .beat(o.beat)
                .chance(PHRASE_END_DROPOUT)
    });
}

/// Drop non-main hat hits with probability `factor` while a lead motif plays.
fn duck_for_lead(onsets: &mut Vec<Onset>, factor: f64, req: &TrackRequest<'_>, bar: u32) {
    let factor = factor.clamp(0.0, 1.0);
    onsets.retain(|o| {
        !(o.role.is_hat() && !o.is_main)
            || !StreamKey::new(req.seed, "track.duck")
                .part(o.role)
                .part(&req.style)
                .bar(bar)
                .beat(o.beat)
                .chance(factor)
    });
}
