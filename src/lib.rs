//! Backbeat — deterministic drum performance generation and groove analysis.
//!
//! Generation expands a groove template into a humanized hit list bar by bar
//! ([`perform::TrackGenerator`]). Analysis reads a note sequence back into
//! events, fingerprints, statistics and matrices ([`analysis::analyze`]).
//! Both halves share one role, bar and event model, and every random choice
//! comes from a stream keyed by seed, context and position ([`stream`]).

pub mod analysis;
pub mod config;
pub mod error;
pub mod event;
pub mod groove;
pub mod perform;
pub mod section;
pub mod stream;

pub use analysis::{analyze, FeatureBundle};
pub use config::BackbeatConfig;
pub use error::{Error, Result};
pub use groove::PercussionRole;
pub use perform::{TrackGenerator, TrackRequest};
