//! Feature bundle — the full analysis snapshot of one track.

use std::collections::{BTreeMap, BTreeSet};

use super::coordination::{coordination, CoordinationReport};
use super::extract::{extract, DrumEvent};
use super::fingerprint::{fingerprint_bars, BarFingerprint};
use super::matrix::{build_matrices, BeatPositionMatrix};
use super::repetition::{repetition, RepetitionReport};
use super::sequence::{sequences, SequenceReport};
use super::similarity::{similarity, SimilarityReport};
use super::stats::{bar_stats, BarStats};
use super::timing::{timing_feel, TimingFeel};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::event::{BarGrid, RawNote};
use crate::groove::PercussionRole;

/// Events, fingerprints, statistics and matrices for one track.
///
/// Fingerprint and statistics rows always match the grid's bar count.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBundle {
    pub resolution: u32,
    pub grid: BarGrid,
    pub events: Vec<DrumEvent>,
    pub fingerprints: Vec<BarFingerprint>,
    pub stats: Vec<BarStats>,
    pub matrices: BTreeMap<PercussionRole, BeatPositionMatrix>,
    pub active_roles: BTreeSet<PercussionRole>,
}

/// Derived reports over a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub coordination: CoordinationReport,
    pub repetition: RepetitionReport,
    pub similarity: SimilarityReport,
    pub sequences: SequenceReport,
    pub timing: TimingFeel,
}

impl FeatureBundle {
    /// A bundle with no bars.
    pub fn empty(resolution: u32) -> Self {
        Self {
            resolution,
            grid: BarGrid::default(),
            events: Vec::new(),
            fingerprints: Vec::new(),
            stats: Vec::new(),
            matrices: BTreeMap::new(),
            active_roles: BTreeSet::new(),
        }
    }

    pub fn bar_count(&self) -> usize {
        self.grid.len()
    }

    pub fn fingerprint(&self, bar: u32) -> Option<&BarFingerprint> {
        self.fingerprints.iter().find(|f| f.bar == bar)
    }

    pub fn matrix(&self, role: PercussionRole) -> Option<&BeatPositionMatrix> {
        self.matrices.get(&role)
    }

    /// Run every report over this snapshot.
    pub fn report(&self, config: &AnalysisConfig) -> AnalysisReport {
        AnalysisReport {
            coordination: coordination(&self.events),
            repetition: repetition(&self.fingerprints),
            similarity: similarity(&self.fingerprints, config.similarity_threshold),
            sequences: sequences(&self.fingerprints, config.sequence_tolerance),
            timing: timing_feel(&self.events, &self.grid, config.timing_histogram_bucket),
        }
    }
}

/// Analyse a note sequence against a bar grid.
pub fn analyze(notes: &[RawNote], grid: &BarGrid, config: &AnalysisConfig) -> Result<FeatureBundle> {
    let resolution = config.grid_resolution;
    if grid.is_empty() {
        return Ok(FeatureBundle::empty(resolution));
    }
    let events = extract(notes, grid, resolution)?;
    let fingerprints = fingerprint_bars(&events, grid, resolution)?;
    let stats = bar_stats(&events, grid, resolution);
    let matrices = build_matrices(&events, grid, resolution)?;
    let active_roles = events.iter().map(|e| e.role).collect();
    log::debug!(
        "analysed {} events over {} bars at {} slots",
        events.len(),
        grid.len(),
        resolution
    );
    Ok(FeatureBundle {
        resolution,
        grid: grid.clone(),
        events,
        fingerprints,
        stats,
        matrices,
        active_roles,
    })
}
