//! Onsets — transient per-bar hit plans produced by the variation and fill engines.

use crate::event::BeatPos;
use crate::groove::PercussionRole;

/// One planned hit inside a bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Onset {
    pub role: PercussionRole,
    pub beat: BeatPos,
    /// Signed micro-timing in ticks; negative is ahead of the grid.
    pub timing_offset: i64,
    /// Backbone hit from the anchor layer (or a fill/cymbal hit that must play).
    pub is_main: bool,
    pub is_ghost: bool,
    pub is_flam: bool,
    /// Open hi-hat articulation on a hat onset.
    pub is_open: bool,
    pub is_in_fill: bool,
    /// Cymbal choked right after the hit.
    pub is_choke: bool,
    /// Position through the fill in `[0, 1]`; zero outside fills.
    pub fill_progress: f64,
}

impl Onset {
    /// A must-play hit.
    pub fn main(role: PercussionRole, beat: BeatPos, timing_offset: i64) -> Self {
        Self {
            role,
            beat,
            timing_offset,
            is_main: true,
            is_ghost: false,
            is_flam: false,
            is_open: false,
            is_in_fill: false,
            is_choke: false,
            fill_progress: 0.0,
        }
    }

    /// An optional hit (tension layer, flow additions).
    pub fn extra(role: PercussionRole, beat: BeatPos, timing_offset: i64) -> Self {
        Self {
            is_main: false,
            ..Self::main(role, beat, timing_offset)
        }
    }

    /// Deterministic ordering key.
    pub fn sort_key(&self) -> (PercussionRole, BeatPos, i64) {
        (self.role, self.beat, self.timing_offset)
    }

    /// The role whose note is actually struck (open articulation on a closed hat).
    pub fn sounding_role(&self) -> PercussionRole {
        if self.is_open && self.role == PercussionRole::ClosedHat {
            PercussionRole::OpenHat
        } else {
            self.role
        }
    }
}

/// Stable-sort onsets by `(role, beat, timing_offset)`.
pub fn sort_onsets(onsets: &mut [Onset]) {
    onsets.sort_by_key(Onset::sort_key);
}

/// Whether the hits keep the pulse: any hat/ride, or a kick on a strong beat.
pub fn has_timekeeping(onsets: &[Onset]) -> bool {
    onsets.iter().any(|o| {
        o.role.is_timekeeper() || (o.role == PercussionRole::Kick && o.beat.is_strong())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use PercussionRole::*;

    #[test]
    fn extra_is_not_main() {
        let o = Onset::extra(Kick, BeatPos::from_beat(2.5), 3);
        assert!(!o.is_main);
        assert_eq!(o.timing_offset, 3);
    }

    #[test]
    fn sort_by_role_beat_offset() {
        let mut v = vec![
            Onset::main(Snare, BeatPos::from_beat(2.0), 0),
            Onset::main(Kick, BeatPos::from_beat(3.0), 0),
            Onset::main(Kick, BeatPos::from_beat(1.0), 2),
            Onset::main(Kick, BeatPos::from_beat(1.0), -2),
        ];
        sort_onsets(&mut v);
        let keys: Vec<_> = v.iter().map(|o| (o.role, o.beat.beat(), o.timing_offset)).collect();
        assert_eq!(
            keys,
            vec![(Kick, 1.0, -2), (Kick, 1.0, 2), (Kick, 3.0, 0), (Snare, 2.0, 0)]
        );
    }

    #[test]
    fn open_hat_sounds_as_open_hat() {
        let mut o = Onset::main(ClosedHat, BeatPos::from_beat(4.5), 0);
        assert_eq!(o.sounding_role(), ClosedHat);
        o.is_open = true;
        assert_eq!(o.sounding_role(), OpenHat);
    }

    #[test]
    fn timekeeping_detection() {
        let snare_only = vec![Onset::main(Snare, BeatPos::from_beat(3.0), 0)];
        assert!(!has_timekeeping(&snare_only));
        let offbeat_kick = vec![Onset::main(Kick, BeatPos::from_beat(3.5), 0)];
        assert!(!has_timekeeping(&offbeat_kick));
        let strong_kick = vec![Onset::main(Kick, BeatPos::from_beat(3.0), 0)];
        assert!(has_timekeeping(&strong_kick));
        let ride = vec![Onset::extra(Ride, BeatPos::from_beat(1.5), 0)];
        assert!(has_timekeeping(&ride));
    }
}
