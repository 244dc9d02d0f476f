//! Command-line driver for the morphology bend engine.
//!
//! Grows random morphologies inside a spherical volume, bends them away
//! from the border, then replays one of them under a new placement from
//! its rotation chains. All interesting output goes through `tracing`.

mod runner;
mod synthetic;

use bend_core::config::BendConfig;
use clap::Parser;
use glam::DVec3;
use runner::Runner;
use synthetic::Shape;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bend-run")]
#[command(about = "Bend random neuron morphologies to keep them inside a sphere")]
struct Args {
    /// Seed for morphology generation and bending.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Number of morphologies.
    #[arg(long, default_value_t = 8)]
    trees: usize,

    /// Radius of the tissue volume, in micrometres.
    #[arg(long, default_value_t = 300.0)]
    radius: f64,

    /// Child sections per branch point.
    #[arg(long, default_value_t = 2)]
    branches: usize,

    /// Branching levels below the soma.
    #[arg(long, default_value_t = 4)]
    depth: usize,

    /// Points per section, excluding the shared anchor.
    #[arg(long, default_value_t = 5)]
    points_per_section: usize,

    /// Segment length, in micrometres.
    #[arg(long, default_value_t = 12.0)]
    segment_length: f64,

    /// Steepness of the distance-to-probability curve, per micrometre.
    #[arg(long, default_value_t = BendConfig::default().decay_constant)]
    decay_constant: f64,

    /// Candidate rotations tried per corrected point.
    #[arg(long, default_value_t = BendConfig::default().n_candidates)]
    candidates: usize,

    /// Largest Euler angle per axis, in radians.
    #[arg(long, default_value_t = BendConfig::default().angle_limit)]
    angle_limit: f64,
}

/// Runs one bend-and-retarget pass.
///
/// ### Returns
/// - `Ok(())` if the configuration is valid and the replay succeeds.
/// - `Err` for an invalid configuration or a failed replay; individual
///   morphologies that fail to bend are only logged.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("bend_core=info,bend_run=info")
            }),
        )
        .init();

    let args = Args::parse();
    let cfg = BendConfig {
        decay_constant: args.decay_constant,
        n_candidates: args.candidates,
        angle_limit: args.angle_limit,
    };
    cfg.validate()?;

    let shape = Shape {
        branches: args.branches,
        depth: args.depth,
        points_per_section: args.points_per_section,
        segment_length: args.segment_length,
    };
    let mut run = Runner::new(args.trees, args.radius, shape, cfg, args.seed);

    let summary = run.bend_all()?;
    info!(
        bent = summary.bent,
        failed = summary.failed,
        corrected = summary.corrected,
        outside_before = summary.outside_before,
        outside_after = summary.outside_after,
        "bend pass finished"
    );

    if run.trees().is_empty() {
        return Ok(());
    }

    let error = run.round_trip_error(0)?;
    let turn = run.largest_turn(0)?;
    info!(max_error = error, largest_turn = turn, "rotation chain round trip");

    // Replay the first morphology with its soma at the centre, turned a
    // quarter turn about z.
    let quarter_turn = DVec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2);
    let (coords, outside) = run.retarget(0, DVec3::ZERO, quarter_turn)?;
    info!(points = coords.len(), outside, "replayed at volume centre");

    Ok(())
}
