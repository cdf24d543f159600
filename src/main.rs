//! Backbeat demo — generate a drum track, analyse it, optionally store the bundle.
//!
//! ```bash
//! backbeat --style Rock --seed 42 --bars 16 --out bundle.yaml
//! RUST_LOG=debug backbeat --style Funk
//! ```

use std::path::PathBuf;

use clap::Parser;

use backbeat::analysis::{analyze, save_bundle};
use backbeat::config::BackbeatConfig;
use backbeat::event::{BarGrid, RawNote};
use backbeat::groove::GrooveCatalog;
use backbeat::perform::{TrackGenerator, TrackRequest};
use backbeat::section::{Section, SectionPlan, SectionType, TensionSignals, TransitionHint};

const TICKS_PER_BEAT: u32 = 480;

#[derive(Parser)]
#[command(name = "backbeat")]
#[command(about = "Generate and analyse a deterministic drum performance")]
#[command(version)]
struct Cli {
    /// Groove style (Basic, Rock, Funk, HipHop, Jazz, Metal, Pop)
    #[arg(long, default_value = "Basic")]
    style: String,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Bars in the song, split evenly into verse and chorus
    #[arg(long, default_value_t = 16)]
    bars: u32,

    /// Write the feature bundle here (.yaml or .json)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Configuration file (defaults to ~/.backbeat/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn song_plan(bars: u32) -> backbeat::Result<SectionPlan> {
    let verse = bars / 2;
    let chorus = bars - verse;
    if verse == 0 {
        return SectionPlan::single(SectionType::Verse, chorus);
    }
    SectionPlan::new(vec![
        Section::new(SectionType::Verse, verse),
        Section::new(SectionType::Chorus, chorus),
    ])
}

fn run(cli: Cli) -> backbeat::Result<()> {
    let config = match &cli.config {
        Some(path) => BackbeatConfig::load(path)?,
        None => BackbeatConfig::load_or_default(),
    };

    let grid = BarGrid::common_time(cli.bars, TICKS_PER_BEAT);
    let plan = song_plan(cli.bars)?;
    let tension = TensionSignals::neutral()
        .with_section(0.4, TransitionHint::Build)
        .with_section(0.8, TransitionHint::None);

    let generator = TrackGenerator::new(GrooveCatalog::with_presets(), config.generation.clone());
    let request = TrackRequest::new(&cli.style, cli.seed)
        .grid(&grid)
        .sections(&plan)
        .tension(&tension);
    let notes = generator.generate(&request)?;
    println!(
        "generated {} notes over {} bars ({}, seed {})",
        notes.len(),
        cli.bars,
        cli.style,
        cli.seed
    );

    let raw: Vec<RawNote> = notes.into_iter().map(RawNote::from).collect();
    let bundle = analyze(&raw, &grid, &config.analysis)?;
    let report = bundle.report(&config.analysis);

    println!("active roles: {}", bundle.active_roles.len());
    for role in &bundle.active_roles {
        let hits = bundle.events.iter().filter(|e| e.role == *role).count();
        println!("  {:<10} {hits:>4} hits", role.label());
    }
    println!(
        "patterns: {} unique, most frequent x{}",
        report.repetition.unique_patterns,
        report.repetition.patterns.first().map_or(0, |p| p.count())
    );
    println!(
        "similar pairs: {}, families: {}",
        report.similarity.pairs.len(),
        report.similarity.families.len()
    );
    println!("recurring phrases: {}", report.sequences.recurring.len());
    for pair in report.coordination.pairs.iter().filter(|p| p.is_key_pair) {
        println!(
            "  lock {:>9}/{:<9} {:.2}",
            pair.a.label(),
            pair.b.label(),
            pair.lock_score
        );
    }
    println!(
        "timing: swing {:.2}, ahead/behind {:+.1} ticks, consistency {:.2}",
        report.timing.swing_ratio, report.timing.ahead_behind, report.timing.consistency
    );

    if let Some(path) = &cli.out {
        save_bundle(path, &bundle)?;
        println!("bundle written to {}", path.display());
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(e) = run(Cli::parse()) {
        eprintln!("backbeat: {e}");
        std::process::exit(1);
    }
}
