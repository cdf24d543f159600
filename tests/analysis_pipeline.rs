//! Analysis pipeline integration tests — fabricated loops and generated tracks.

use backbeat::analysis::{analyze, bar_similarity};
use backbeat::config::AnalysisConfig;
use backbeat::event::{BarGrid, RawNote};
use backbeat::groove::PercussionRole;
use backbeat::perform::{TrackGenerator, TrackRequest};
use backbeat::section::{Section, SectionPlan, SectionType};

/// Kick/snare backbeat with eighth hats, one bar starting at `start`.
fn backbeat_bar(start: u64, offbeat: u64) -> Vec<RawNote> {
    let mut notes = vec![
        RawNote::drum(36, start, 100, 100),
        RawNote::drum(38, start + 480, 100, 96),
        RawNote::drum(36, start + 960, 100, 100),
        RawNote::drum(38, start + 1440, 100, 96),
    ];
    for beat in 0..4 {
        notes.push(RawNote::drum(42, start + beat * 480, 40, 80));
        notes.push(RawNote::drum(42, start + beat * 480 + offbeat, 40, 62));
    }
    notes
}

/// A 4-bar loop whose fourth bar adds a kick pickup.
fn four_bar_loop(first_bar: u64) -> Vec<RawNote> {
    let mut notes = Vec::new();
    for i in 0..4 {
        let start = (first_bar + i) * 1920;
        notes.extend(backbeat_bar(start, 240));
        if i == 3 {
            notes.push(RawNote::drum(36, start + 1680, 100, 90));
        }
    }
    notes
}

#[test]
fn identical_loops_repeat_and_are_not_merely_similar() {
    let grid = BarGrid::common_time(8, 480);
    let mut notes = four_bar_loop(0);
    notes.extend(four_bar_loop(4));
    let config = AnalysisConfig::default();
    let bundle = analyze(&notes, &grid, &config).unwrap();
    let report = bundle.report(&config);

    let first = bundle.fingerprint(1).unwrap().hash;
    assert_eq!(bundle.fingerprint(5).unwrap().hash, first);
    assert!(report.repetition.occurrences(first) >= 2);
    assert_eq!(bar_similarity(&bundle.fingerprints, 1, 5).unwrap(), 1.0);
    assert_eq!(bar_similarity(&bundle.fingerprints, 4, 8).unwrap(), 1.0);
    assert!(report
        .similarity
        .pairs
        .iter()
        .all(|p| p.a != p.b && p.similarity < 1.0));

    // the three plain bars form a run; bar 4's pickup breaks it
    assert_eq!(report.repetition.runs[0].start_bar, 1);
    assert_eq!(report.repetition.runs[0].length, 3);

    let four = report
        .sequences
        .recurring
        .iter()
        .find(|s| s.length == 4)
        .unwrap();
    assert_eq!(four.start_bars, vec![1, 5]);
}

#[test]
fn pickup_bar_is_a_near_neighbour() {
    let grid = BarGrid::common_time(4, 480);
    let config = AnalysisConfig::default();
    let bundle = analyze(&four_bar_loop(0), &grid, &config).unwrap();
    let report = bundle.report(&config);
    assert_eq!(report.similarity.pairs.len(), 1);
    assert_eq!(report.similarity.families.len(), 1);
    assert_eq!(report.similarity.families[0].bars, vec![1, 2, 3, 4]);
}

#[test]
fn swung_hats_are_measured() {
    let mut notes: Vec<RawNote> = (0..4).flat_map(|b| backbeat_bar(b * 1920, 320)).collect();
    // closing downbeat so the last beat has a partner
    notes.push(RawNote::drum(42, 4 * 1920, 40, 80));
    let grid = BarGrid::common_time(5, 480);
    let config = AnalysisConfig::default();
    let report = analyze(&notes, &grid, &config).unwrap().report(&config);
    assert!((report.timing.swing_ratio - 2.0).abs() < 1e-9);
    // a swung offbeat lands ahead of the nearest sixteenth
    let hats = report
        .timing
        .roles
        .iter()
        .find(|r| r.role == PercussionRole::ClosedHat)
        .unwrap();
    assert!(hats.mean < 0.0);
}

#[test]
fn bass_line_locks_with_the_kick() {
    let grid = BarGrid::common_time(2, 480);
    let mut notes: Vec<RawNote> = (0..2).flat_map(|b| backbeat_bar(b * 1920, 240)).collect();
    for bar in 0..2u64 {
        for beat in [0u64, 960] {
            notes.push(RawNote {
                note: 40,
                channel: 1,
                start_tick: bar * 1920 + beat,
                duration_ticks: 400,
                velocity: 90,
            });
        }
    }
    let report = analyze(&notes, &grid, &AnalysisConfig::default())
        .unwrap()
        .report(&AnalysisConfig::default());
    let lock = report
        .coordination
        .pair(PercussionRole::Bass, PercussionRole::Kick)
        .unwrap();
    assert!(lock.is_key_pair);
    assert_eq!(lock.coincidences, 4);
    assert_eq!(lock.lock_score, 1.0);
}

#[test]
fn generated_track_reads_back() {
    let grid = BarGrid::common_time(16, 480);
    let plan = SectionPlan::new(vec![
        Section::new(SectionType::Verse, 8),
        Section::new(SectionType::Chorus, 8),
    ])
    .unwrap();
    let req = TrackRequest::new("Basic", 42).grid(&grid).sections(&plan);
    let notes = TrackGenerator::with_presets().generate(&req).unwrap();
    let raw: Vec<RawNote> = notes.iter().copied().map(RawNote::from).collect();

    let config = AnalysisConfig::default();
    let bundle = analyze(&raw, &grid, &config).unwrap();
    assert_eq!(bundle.events.len(), notes.len());
    assert_eq!(bundle.fingerprints.len(), 16);
    assert_eq!(bundle.stats.len(), 16);
    assert!(bundle.active_roles.contains(&PercussionRole::Kick));
    assert!(bundle.active_roles.contains(&PercussionRole::Snare));
    for e in &bundle.events {
        assert!((1..=16).contains(&e.bar));
        assert!((1..=127).contains(&e.velocity));
        assert!(e.offset().abs() <= 30, "{e:?}");
    }

    let kick = bundle.matrix(PercussionRole::Kick).unwrap();
    assert_eq!(kick.bar_count(), 16);
    assert!(kick.get(1, 0).unwrap().is_some());

    let report = bundle.report(&config);
    assert!(report.repetition.unique_patterns >= 1);
    assert!(report.timing.consistency > 0.0);
}

#[test]
fn early_downbeat_kicks_stay_on_their_own_bar() {
    let grid = BarGrid::common_time(16, 480);
    let plan = SectionPlan::new(vec![
        Section::new(SectionType::Verse, 8),
        Section::new(SectionType::Chorus, 8),
    ])
    .unwrap();
    let req = TrackRequest::new("Basic", 42).grid(&grid).sections(&plan);
    let gen = TrackGenerator::with_presets();
    let plans = gen.plan(&req).unwrap();
    let raw: Vec<RawNote> = gen
        .generate(&req)
        .unwrap()
        .into_iter()
        .map(RawNote::from)
        .collect();

    let bundle = analyze(&raw, &grid, &AnalysisConfig::default()).unwrap();
    for p in plans.iter().filter(|p| p.fill.is_none()) {
        let mask = bundle.fingerprint(p.bar).unwrap().mask(PercussionRole::Kick);
        assert_ne!(mask & 1, 0, "bar {} lost its downbeat kick", p.bar);
        assert_eq!(mask & (1 << 15), 0, "bar {} has a kick on its last sixteenth", p.bar);
    }
    for e in bundle.events.iter().filter(|e| e.slot == 0) {
        let start = grid.bar(e.bar).unwrap().start_tick as i64;
        assert_eq!(e.tick as i64 - start, e.offset());
    }
}
