//! Performance engines — variation, fills, velocity shaping and the track generator.
//!
//! The per-bar engines are pure functions of their inputs plus the seed; the
//! [`TrackGenerator`] drives them over a bar grid and a section plan.

pub mod fill;
pub mod onset;
pub mod params;
pub mod track;
pub mod variation;
pub mod velocity;

pub use fill::{
    generate_fill, should_fill, Fill, FillRequest, FillShape, FillStyle,
    MIN_TRANSITION_FILL_DENSITY,
};
pub use onset::Onset;
pub use params::PerformanceParams;
pub use track::{BarPlan, CymbalHit, TrackGenerator, TrackRequest};
pub use variation::{timing_tolerance, vary_bar, VariationRequest, MAX_TENSION_INCLUSION};
pub use velocity::{flam_velocity, ghost_velocity, shape_velocity, VelocityContext};
