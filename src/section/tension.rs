//! Tension signals from the song-structure planner.
//!
//! A macro value per section, a micro value per bar, and a transition hint per
//! section describing the tension change into the next section. Signals only
//! bias probabilities; absent values behave as neutral (zero).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::SectionPosition;

/// Tension delta into the next section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransitionHint {
    Build,
    Drop,
    Release,
    Sustain,
    #[default]
    None,
}

impl TransitionHint {
    /// Extra fill likelihood this hint contributes at the very end of a section.
    pub fn fill_weight(self) -> f64 {
        match self {
            TransitionHint::Build => 0.20,
            TransitionHint::Release => 0.10,
            TransitionHint::Drop => 0.05,
            TransitionHint::Sustain => 0.02,
            TransitionHint::None => 0.0,
        }
    }
}

/// Read-only tension input for one song.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TensionSignals {
    /// Macro tension per section index, `[0, 1]`.
    #[serde(default)]
    pub section_macro: Vec<f64>,
    /// Micro tension per 1-based bar, `[0, 1]`.
    #[serde(default)]
    pub bar_micro: BTreeMap<u32, f64>,
    /// Transition hint per section index.
    #[serde(default)]
    pub hints: Vec<TransitionHint>,
}

impl TensionSignals {
    /// Neutral signals: every lookup returns zero / `None`.
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, macro_tension: f64, hint: TransitionHint) -> Self {
        self.section_macro.push(macro_tension);
        self.hints.push(hint);
        self
    }

    pub fn with_bar(mut self, bar: u32, micro_tension: f64) -> Self {
        self.bar_micro.insert(bar, micro_tension);
        self
    }

    /// Macro tension for a section, clamped to `[0, 1]`.
    pub fn macro_for(&self, section_index: usize) -> f64 {
        self.section_macro
            .get(section_index)
            .copied()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
    }

    /// Micro tension for a bar, clamped to `[0, 1]`.
    pub fn micro_for(&self, bar: u32) -> f64 {
        self.bar_micro
            .get(&bar)
            .copied()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
    }

    pub fn hint_for(&self, section_index: usize) -> TransitionHint {
        self.hints.get(section_index).copied().unwrap_or_default()
    }

    /// Unclamped fill bias for a bar: grows toward the end of a section whose
    /// transition hint calls for it, scaled by the section's macro tension.
    pub fn fill_bias(&self, position: &SectionPosition) -> f64 {
        let weight = self.hint_for(position.index).fill_weight();
        let macro_tension = self.macro_for(position.index);
        weight * position.progress() * (0.5 + 0.5 * macro_tension)
    }
}
