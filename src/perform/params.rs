//! Performance parameters — density and probability knobs for one track.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::groove::PercussionRole;

/// Upper bound on any density multiplier.
pub const MAX_DENSITY_MULTIPLIER: f64 = 3.0;

/// Knobs the owning application may set; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceParams {
    /// Scales tension-layer inclusion and fill density.
    pub density_multiplier: f64,
    /// Extra likelihood of optional hits (tension layer, ghosts).
    pub busy_probability: f64,
    /// Base chance of a mid-section fill on any bar.
    pub fill_probability: f64,
    /// Added to every final velocity.
    pub velocity_bias: i32,
    /// Per-role density overrides; roles not listed use `density_multiplier`.
    pub role_density: BTreeMap<PercussionRole, f64>,
}

impl PerformanceParams {
    /// Effective density multiplier for a role, clamped to `[0, 3]`.
    pub fn density_for(&self, role: PercussionRole) -> f64 {
        self.role_density
            .get(&role)
            .copied()
            .unwrap_or(self.density_multiplier)
            .clamp(0.0, MAX_DENSITY_MULTIPLIER)
    }

    /// Global density multiplier, clamped to `[0, 3]`.
    pub fn density(&self) -> f64 {
        self.density_multiplier.clamp(0.0, MAX_DENSITY_MULTIPLIER)
    }

    pub fn busy(&self) -> f64 {
        self.busy_probability.clamp(0.0, 1.0)
    }

    pub fn fill_chance(&self) -> f64 {
        self.fill_probability.clamp(0.0, 1.0)
    }

    /// Override the density of one role.
    pub fn with_role_density(mut self, role: PercussionRole, density: f64) -> Self {
        self.role_density.insert(role, density);
        self
    }
}

impl Default for PerformanceParams {
    fn default() -> Self {
        Self {
            density_multiplier: 1.0,
            busy_probability: 0.15,
            fill_probability: 0.05,
            velocity_bias: 0,
            role_density: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = PerformanceParams::default();
        assert_eq!(p.density_for(PercussionRole::Kick), 1.0);
        assert_eq!(p.velocity_bias, 0);
    }

    #[test]
    fn role_override_only_affects_that_role() {
        let p = PerformanceParams::default().with_role_density(PercussionRole::Kick, 2.0);
        assert_eq!(p.density_for(PercussionRole::Kick), 2.0);
        assert_eq!(p.density_for(PercussionRole::Snare), 1.0);
    }

    #[test]
    fn values_clamped() {
        let p = PerformanceParams {
            density_multiplier: 9.0,
            busy_probability: -1.0,
            fill_probability: 4.0,
            ..Default::default()
        };
        assert_eq!(p.density(), MAX_DENSITY_MULTIPLIER);
        assert_eq!(p.busy(), 0.0);
        assert_eq!(p.fill_chance(), 1.0);
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let p: PerformanceParams = serde_yaml::from_str("density_multiplier: 1.5\n").unwrap();
        assert_eq!(p.density_multiplier, 1.5);
        assert_eq!(p.busy_probability, 0.15);
        assert!(p.role_density.is_empty());
    }

    #[test]
    fn role_density_yaml_keys_are_labels() {
        let p: PerformanceParams =
            serde_yaml::from_str("role_density:\n  Snare: 0.5\n").unwrap();
        assert_eq!(p.density_for(PercussionRole::Snare), 0.5);
    }
}
