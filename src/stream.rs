//! Deterministic stream factory — one independent random stream per decision key.
//!
//! Every probabilistic choice in the performance engines draws from a stream
//! derived from a structured [`StreamKey`]: the global seed, a namespace, an
//! ordered list of context parts (role, style, section...), the bar number and
//! an optional in-bar position. The key is hashed with a fixed, length-prefixed
//! FNV-1a pass plus a SplitMix64 finaliser and used to seed a `ChaCha8Rng`.
//!
//! There is no shared generator: the same key always yields the same stream,
//! and keys that differ in any component are decorrelated. Changing one role's
//! parameters therefore never perturbs another role's draws.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::event::BeatPos;

/// The random stream handed to a single decision.
pub type PerformanceRng = ChaCha8Rng;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Structured key identifying one family of random decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamKey {
    seed: u64,
    namespace: &'static str,
    parts: Vec<String>,
    bar: u32,
    beat: Option<BeatPos>,
}

impl StreamKey {
    /// Start a key for the given seed and decision namespace (e.g. `"variation.tension"`).
    pub fn new(seed: u64, namespace: &'static str) -> Self {
        Self {
            seed,
            namespace,
            parts: Vec::new(),
            bar: 0,
            beat: None,
        }
    }

    /// Append a free-form context component (role, style, section...).
    pub fn part(mut self, part: impl ToString) -> Self {
        self.parts.push(part.to_string());
        self
    }

    /// Set the 1-based bar number.
    pub fn bar(mut self, bar: u32) -> Self {
        self.bar = bar;
        self
    }

    /// Set the in-bar position for per-onset decisions.
    pub fn beat(mut self, beat: BeatPos) -> Self {
        self.beat = Some(beat);
        self
    }

    /// Stable 64-bit digest of the full key.
    pub fn digest(&self) -> u64 {
        let mut h = Fnv1a::new();
        h.write(&self.seed.to_le_bytes());
        h.write_str(self.namespace);
        h.write(&(self.parts.len() as u32).to_le_bytes());
        for part in &self.parts {
            h.write_str(part);
        }
        h.write(&self.bar.to_le_bytes());
        match self.beat {
            Some(pos) => {
                h.write(&[1]);
                h.write(&pos.subticks().to_le_bytes());
            }
            None => h.write(&[0]),
        }
        let mut state = h.finish();
        splitmix64(&mut state)
    }

    /// Open the stream for this key.
    pub fn stream(&self) -> PerformanceRng {
        log::trace!(
            "stream {}:{:?} bar {} beat {:?}",
            self.namespace,
            self.parts,
            self.bar,
            self.beat
        );
        ChaCha8Rng::seed_from_u64(self.digest())
    }

    /// First uniform draw in `[0, 1)` from this key's stream.
    pub fn unit(&self) -> f64 {
        self.stream().gen::<f64>()
    }

    /// First uniform draw in `[-1, 1)` from this key's stream.
    pub fn signed_unit(&self) -> f64 {
        self.unit() * 2.0 - 1.0
    }

    /// Whether the first draw lands below `p`.
    pub fn chance(&self, p: f64) -> bool {
        self.unit() < p
    }
}

/// Open a stream from the bare `(seed, context, bar, beat)` tuple.
pub fn stream(seed: u64, context: &str, bar: u32, beat: Option<BeatPos>) -> PerformanceRng {
    let mut key = StreamKey::new(seed, "context").part(context).bar(bar);
    if let Some(pos) = beat {
        key = key.beat(pos);
    }
    key.stream()
}

/// Fixed 64-bit FNV-1a hasher, stable across runs and platforms.
pub(crate) struct Fnv1a(u64);

impl Fnv1a {
    pub(crate) fn new() -> Self {
        Self(FNV_OFFSET)
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    // Length prefix keeps ("ab", "c") and ("a", "bc") apart.
    pub(crate) fn write_str(&mut self, s: &str) {
        self.write(&(s.len() as u32).to_le_bytes());
        self.write(s.as_bytes());
    }

    pub(crate) fn finish(&self) -> u64 {
        self.0
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
