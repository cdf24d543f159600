//! Groove templates — per-role onset lists in an Anchor and a Tension layer.
//!
//! The Anchor layer is the backbone that always plays; the Tension layer is an
//! optional denser layer the variation engine includes probabilistically.
//! Templates are static input: loaded once per style (built-in presets or a
//! YAML catalog) and never mutated during generation.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::role::PercussionRole;
use crate::error::{Error, Result};
use crate::event::{BeatPos, DEFAULT_BEATS_PER_BAR};

/// Role → sorted onset positions.
pub type Layer = BTreeMap<PercussionRole, Vec<BeatPos>>;

/// Name of the style every catalog falls back to.
pub const DEFAULT_STYLE: &str = "Basic";

/// A groove for one named style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrooveTemplate {
    pub style: String,
    #[serde(default = "default_beats_per_bar")]
    pub beats_per_bar: u32,
    #[serde(default)]
    pub anchor: Layer,
    #[serde(default)]
    pub tension: Layer,
    /// Cap on non-anchor hits per bar, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_extras: Option<usize>,
}

fn default_beats_per_bar() -> u32 {
    DEFAULT_BEATS_PER_BAR
}

impl GrooveTemplate {
    /// An empty 4/4 template for the named style.
    pub fn new(style: &str) -> Self {
        Self {
            style: style.to_string(),
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            anchor: Layer::new(),
            tension: Layer::new(),
            max_extras: None,
        }
    }

    /// Add anchor onsets for a role (1-based beats).
    pub fn with_anchor(mut self, role: PercussionRole, beats: &[f64]) -> Self {
        insert_positions(&mut self.anchor, role, beats);
        self
    }

    /// Add tension-layer onsets for a role (1-based beats).
    pub fn with_tension(mut self, role: PercussionRole, beats: &[f64]) -> Self {
        insert_positions(&mut self.tension, role, beats);
        self
    }

    pub fn with_max_extras(mut self, max: usize) -> Self {
        self.max_extras = Some(max);
        self
    }

    /// Whether the anchor layer has any onsets at all.
    pub fn has_anchor(&self) -> bool {
        self.anchor.values().any(|v| !v.is_empty())
    }

    /// Anchor positions for one role (empty if the role is absent).
    pub fn anchor_positions(&self, role: PercussionRole) -> &[BeatPos] {
        self.anchor.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every role named in either layer, in canonical order.
    pub fn roles(&self) -> Vec<PercussionRole> {
        let mut roles: Vec<PercussionRole> =
            self.anchor.keys().chain(self.tension.keys()).copied().collect();
        roles.sort();
        roles.dedup();
        roles
    }
}

fn insert_positions(layer: &mut Layer, role: PercussionRole, beats: &[f64]) {
    let entry = layer.entry(role).or_default();
    entry.extend(beats.iter().map(|&b| BeatPos::from_beat(b)));
    entry.sort();
    entry.dedup();
}

const EIGHTHS: [f64; 8] = [1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5];
const SIXTEENTHS: [f64; 16] = [
    1.0, 1.25, 1.5, 1.75, 2.0, 2.25, 2.5, 2.75, 3.0, 3.25, 3.5, 3.75, 4.0, 4.25, 4.5, 4.75,
];

/// Built-in preset templates by style name.
pub fn preset(style: &str) -> Option<GrooveTemplate> {
    use PercussionRole::*;
    let t = match style {
        "Basic" => GrooveTemplate::new("Basic")
            .with_anchor(Kick, &[1.0, 3.0])
            .with_anchor(Snare, &[2.0, 4.0])
            .with_anchor(ClosedHat, &EIGHTHS)
            .with_tension(ClosedHat, &[2.75, 4.75])
            .with_max_extras(2),
        "Rock" => GrooveTemplate::new("Rock")
            .with_anchor(Kick, &[1.0, 3.0, 3.5])
            .with_anchor(Snare, &[2.0, 4.0])
            .with_anchor(ClosedHat, &EIGHTHS)
            .with_tension(Kick, &[2.5, 4.5])
            .with_tension(ClosedHat, &[4.75]),
        "Funk" => GrooveTemplate::new("Funk")
            .with_anchor(Kick, &[1.0, 1.75, 3.5])
            .with_anchor(Snare, &[2.0, 4.0])
            .with_anchor(ClosedHat, &SIXTEENTHS)
            .with_tension(Kick, &[2.75, 4.25])
            .with_tension(Percussion, &[2.5, 4.5]),
        "HipHop" => GrooveTemplate::new("HipHop")
            .with_anchor(Kick, &[1.0, 1.75, 3.25])
            .with_anchor(Snare, &[2.0, 4.0])
            .with_anchor(ClosedHat, &EIGHTHS)
            .with_tension(Kick, &[3.75])
            .with_tension(ClosedHat, &[2.75, 4.75]),
        "Jazz" => GrooveTemplate::new("Jazz")
            .with_anchor(Ride, &[1.0, 2.0, 2.0 + 2.0 / 3.0, 3.0, 4.0, 4.0 + 2.0 / 3.0])
            .with_anchor(ClosedHat, &[2.0, 4.0])
            .with_anchor(Kick, &[1.0])
            .with_tension(Snare, &[2.0 + 2.0 / 3.0, 4.0 + 2.0 / 3.0])
            .with_tension(Kick, &[3.0 + 2.0 / 3.0]),
        "Metal" => GrooveTemplate::new("Metal")
            .with_anchor(Kick, &EIGHTHS)
            .with_anchor(Snare, &[2.0, 4.0])
            .with_anchor(ClosedHat, &[1.0, 2.0, 3.0, 4.0])
            .with_tension(Kick, &[1.25, 1.75, 3.25, 3.75]),
        "Pop" => GrooveTemplate::new("Pop")
            .with_anchor(Kick, &[1.0, 2.5, 3.0])
            .with_anchor(Snare, &[2.0, 4.0])
            .with_anchor(ClosedHat, &EIGHTHS)
            .with_tension(Kick, &[4.5])
            .with_tension(ClosedHat, &[1.75, 3.75]),
        _ => return None,
    };
    Some(t)
}

/// Names of every built-in preset.
pub const PRESET_STYLES: [&str; 7] = ["Basic", "Rock", "Funk", "HipHop", "Jazz", "Metal", "Pop"];

/// Style name → template, with one default fallback style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrooveCatalog {
    #[serde(default = "default_style_name")]
    pub default_style: String,
    pub templates: Vec<GrooveTemplate>,
}

fn default_style_name() -> String {
    DEFAULT_STYLE.to_string()
}

impl GrooveCatalog {
    /// An empty catalog falling back to `default_style`.
    pub fn new(default_style: &str) -> Self {
        Self {
            default_style: default_style.to_string(),
            templates: Vec::new(),
        }
    }

    /// A catalog holding every built-in preset, defaulting to "Basic".
    pub fn with_presets() -> Self {
        let mut catalog = Self::new(DEFAULT_STYLE);
        for style in PRESET_STYLES {
            if let Some(t) = preset(style) {
                catalog.insert(t);
            }
        }
        catalog
    }

    /// Add or replace the template for its style.
    pub fn insert(&mut self, template: GrooveTemplate) {
        match self.templates.iter_mut().find(|t| t.style == template.style) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    /// Exact-name lookup.
    pub fn get(&self, style: &str) -> Option<&GrooveTemplate> {
        self.templates.iter().find(|t| t.style == style)
    }

    /// Exact-name lookup falling back to the default style.
    pub fn resolve(&self, style: &str) -> Result<&GrooveTemplate> {
        if let Some(t) = self.get(style) {
            return Ok(t);
        }
        log::warn!(
            "no groove template for style '{style}', using '{}'",
            self.default_style
        );
        self.get(&self.default_style)
            .ok_or(Error::MissingInput("groove template"))
    }

    /// Parse a catalog from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::invalid(format!("groove catalog: {e}")))
    }

    /// Load a catalog from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for GrooveCatalog {
    fn default() -> Self {
        Self::with_presets()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PercussionRole::*;

    #[test]
    fn builder_sorts_and_dedups() {
        let t = GrooveTemplate::new("X").with_anchor(Kick, &[3.0, 1.0, 3.0]);
        assert_eq!(
            t.anchor_positions(Kick),
            &[BeatPos::from_beat(1.0), BeatPos::from_beat(3.0)]
        );
    }

    #[test]
    fn empty_template_has_no_anchor() {
        let t = GrooveTemplate::new("Empty");
        assert!(!t.has_anchor());
        assert!(t.anchor_positions(Snare).is_empty());
    }

    #[test]
    fn all_presets_have_backbone() {
        for style in PRESET_STYLES {
            let t = preset(style).unwrap();
            assert_eq!(t.style, style);
            assert!(t.has_anchor(), "{style} has no anchor");
            assert!(!t.anchor_positions(Kick).is_empty(), "{style} has no kick");
        }
    }

    #[test]
    fn basic_preset_matches_reference_groove() {
        let t = preset("Basic").unwrap();
        assert_eq!(t.anchor_positions(Kick).len(), 2);
        assert_eq!(t.anchor_positions(Snare).len(), 2);
        assert_eq!(t.anchor_positions(ClosedHat).len(), 8);
        assert_eq!(t.max_extras, Some(2));
    }

    #[test]
    fn unknown_preset() {
        assert!(preset("Polka").is_none());
    }

    #[test]
    fn catalog_resolves_exact_then_default() {
        let catalog = GrooveCatalog::with_presets();
        assert_eq!(catalog.resolve("Funk").unwrap().style, "Funk");
        assert_eq!(catalog.resolve("Polka").unwrap().style, "Basic");
    }

    #[test]
    fn catalog_without_default_errors() {
        let mut catalog = GrooveCatalog::new("Basic");
        catalog.insert(GrooveTemplate::new("Rock").with_anchor(Kick, &[1.0]));
        assert!(catalog.resolve("Rock").is_ok());
        assert!(matches!(
            catalog.resolve("Jazz"),
            Err(Error::MissingInput("groove template"))
        ));
    }

    #[test]
    fn insert_replaces_same_style() {
        let mut catalog = GrooveCatalog::with_presets();
        let before = catalog.len();
        catalog.insert(GrooveTemplate::new("Rock"));
        assert_eq!(catalog.len(), before);
        assert!(!catalog.get("Rock").unwrap().has_anchor());
    }

    #[test]
    fn catalog_yaml_round_trip() {
        let catalog = GrooveCatalog::with_presets();
        let yaml = serde_yaml::to_string(&catalog).unwrap();
        let back = GrooveCatalog::from_yaml(&yaml).unwrap();
        assert_eq!(catalog, back);
    }

    #[test]
    fn catalog_from_hand_written_yaml() {
        let yaml = r#"
templates:
  - style: Shuffle
    anchor:
      Kick: [1.0, 3.0]
      Snare: [2.0, 4.0]
    tension:
      Kick: [2.5]
"#;
        let catalog = GrooveCatalog::from_yaml(yaml).unwrap();
        assert_eq!(catalog.default_style, "Basic");
        let t = catalog.get("Shuffle").unwrap();
        assert_eq!(t.beats_per_bar, 4);
        assert_eq!(t.anchor_positions(Snare).len(), 2);
        assert_eq!(t.roles(), vec![Kick, Snare]);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = GrooveCatalog::load(Path::new("/nonexistent/backbeat/grooves.yaml"));
        assert!(matches!(err, Err(Error::Io(_))));
    }
}
