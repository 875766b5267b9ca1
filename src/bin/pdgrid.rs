use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use spatial_dilemma::config::{DEFAULT_GRID_SIZE, DEFAULT_STEPS};
use spatial_dilemma::{init_tracing, BackendKind, Initializer, RunConfig, Simulation, StepReport};

#[derive(Parser)]
#[command(name = "pdgrid")]
#[command(about = "Spatial prisoner's dilemma on an N x N grid")]
struct Cli {
    /// Grid side length
    #[arg(default_value_t = DEFAULT_GRID_SIZE)]
    grid_size: usize,

    /// Number of steps to run
    #[arg(default_value_t = DEFAULT_STEPS)]
    steps: usize,

    /// Worker count for parallel backends (default: available parallelism)
    workers: Option<usize>,

    /// Execution backend
    #[arg(long, value_enum, default_value_t = BackendKind::Sequential)]
    backend: BackendKind,

    /// Initializer ids to run, comma separated (0 = random)
    #[arg(long, value_delimiter = ',', default_value = "1,2,3,4")]
    init: Vec<Initializer>,

    /// Seed for the random initializer
    #[arg(long)]
    seed: Option<u64>,

    /// Directory the dumps are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Dump file suffix (default: the backend's tag)
    #[arg(long)]
    tag: Option<String>,

    /// Suppress per-step progress lines
    #[arg(long)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(cli: Cli) -> Result<()> {
    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating output directory {}", cli.out_dir.display()))?;

    let tag = cli.tag.as_deref().unwrap_or(cli.backend.tag());
    let stdout = std::io::stdout();

    for &init in &cli.init {
        let mut config = RunConfig::new(cli.grid_size, cli.steps, init)
            .with_backend(cli.backend)
            .with_seed(cli.seed);
        if let Some(workers) = cli.workers {
            config = config.with_workers(workers);
        }

        let mut out = stdout.lock();
        if !cli.quiet {
            let _ = writeln!(out, "initializer {init}");
        }
        let quiet = cli.quiet;
        let mut progress = |report: StepReport| {
            if !quiet {
                let _ = writeln!(out, "{report}");
            }
        };

        let outcome = Simulation::new(config)
            .with_context(|| format!("initializer {init}"))?
            .run_to_dump(&cli.out_dir, tag, &mut progress)
            .with_context(|| format!("{} run of initializer {init}", cli.backend))?;

        if let Some(path) = &outcome.dump {
            tracing::info!(path = %path.display(), "dump written");
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
