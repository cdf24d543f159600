//! Performance analysis — the inverse of generation.
//!
//! [`extract`] turns a note sequence plus a bar grid into [`DrumEvent`]s; every
//! other module is a pure reduction over those events. [`analyze`] builds the
//! whole [`FeatureBundle`] snapshot and [`persist`] stores it.

pub mod bundle;
pub mod coordination;
pub mod extract;
pub mod fingerprint;
pub mod matrix;
pub mod persist;
pub mod repetition;
pub mod sequence;
pub mod similarity;
pub mod stats;
pub mod timing;

pub use bundle::{analyze, AnalysisReport, FeatureBundle};
pub use coordination::{coordination, CoordinationReport, RolePairLock, KEY_PAIRS};
pub use extract::{by_bar, by_role, extract, quantize, role_of, DrumEvent};
pub use fingerprint::{fingerprint_bars, BarFingerprint, RoleFingerprint, MAX_RESOLUTION};
pub use matrix::{build_matrices, BarDiff, BeatPositionMatrix, MatrixCell};
pub use persist::{
    decode, encode, load_bundle, save_bundle, BundleDocument, Encoding, SCHEMA_VERSION,
    SUPPORTED_MAJOR,
};
pub use repetition::{repetition, PatternOccurrence, PatternRun, RepetitionReport, TOP_PATTERNS};
pub use sequence::{sequences, EvolvingSequence, RecurringSequence, SequenceReport};
pub use similarity::{bar_similarity, similarity, PatternFamily, SimilarPair, SimilarityReport};
pub use stats::{bar_stats, BarStats, TimingRange, VelocityStats};
pub use timing::{swing_ratio, timing_feel, RoleTiming, TimingFeel};
