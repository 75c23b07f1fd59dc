//! Ember CLI - headless runner for particle scene files

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{run, validate};
use ember_particles::UpdateMode;

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Run and validate Ember particle scenes without a renderer", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Step a scene for a number of frames and report counts
    Run {
        /// Path to scene file
        scene: String,

        /// Number of frames to simulate
        #[arg(long, default_value = "60")]
        frames: u32,

        /// Seconds per frame
        #[arg(long, default_value = "0.016666")]
        dt: f32,

        /// Override the scene's update mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Use the fixed worker pool for parallel modes
        #[arg(long)]
        thread_pool: bool,

        /// Print counts every K frames (0 = only at the end)
        #[arg(long, default_value = "0")]
        report_every: u32,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Parse a scene and report problems
    Validate {
        /// Path to scene file
        scene: String,

        /// Reject out-of-range values instead of correcting them
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Synchronous,
    ParallelAsync,
    ParallelSync,
}

impl From<ModeArg> for UpdateMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Synchronous => UpdateMode::Synchronous,
            ModeArg::ParallelAsync => UpdateMode::ParallelAsync,
            ModeArg::ParallelSync => UpdateMode::ParallelSync,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Run {
            scene,
            frames,
            dt,
            mode,
            thread_pool,
            report_every,
            format,
        } => run::run(run::RunArgs {
            scene,
            frames,
            dt,
            mode: mode.map(UpdateMode::from),
            thread_pool,
            report_every,
            format,
        }),
        Commands::Validate { scene, strict } => validate::run(&scene, strict),
    }
}
