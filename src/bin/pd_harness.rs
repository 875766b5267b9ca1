use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use spatial_dilemma::config::{available_workers, HarnessConfig};
use spatial_dilemma::harness::{Harness, HarnessReport, ProgramSpec};
use spatial_dilemma::{init_tracing, BackendKind};

#[derive(Parser)]
#[command(name = "pd-harness")]
#[command(about = "Compare a parallel backend against the sequential one")]
struct Cli {
    /// Backend under test
    #[arg(value_enum)]
    parallel: BackendKind,

    /// Reference backend
    #[arg(value_enum, default_value_t = BackendKind::Sequential)]
    sequential: BackendKind,

    /// Simulator executable (default: pdgrid next to this binary)
    #[arg(long)]
    program: Option<PathBuf>,

    /// Executable for the reference side (default: the --program executable)
    #[arg(long)]
    sequential_program: Option<PathBuf>,

    /// Steps per run (overrides the configuration)
    #[arg(long)]
    steps: Option<usize>,

    /// Run the small-grid correctness suite (the default)
    #[arg(long)]
    quick: bool,

    /// Run the large-grid correctness and speedup suite
    #[arg(long)]
    full: bool,

    /// Harness configuration (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed; also adds the random initializer to the comparison
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for dumps produced during the runs
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Write the full report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn default_program() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("locating the harness executable")?;
    let dir = exe
        .parent()
        .context("harness executable has no parent directory")?;
    Ok(dir.join(format!("pdgrid{}", std::env::consts::EXE_SUFFIX)))
}

/// Suites to run as `(quick, full)`. Without `--full` the quick suite runs.
fn selected_suites(quick: bool, full: bool) -> (bool, bool) {
    (quick || !full, full)
}

/// Programs for the `(parallel, sequential)` sides.
fn programs(cli: &Cli) -> Result<(PathBuf, PathBuf)> {
    let parallel = match &cli.program {
        Some(program) => program.clone(),
        None => default_program()?,
    };
    let sequential = cli
        .sequential_program
        .clone()
        .unwrap_or_else(|| parallel.clone());
    Ok((parallel, sequential))
}

fn run(cli: Cli) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(steps) = cli.steps {
        config.steps = steps;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    config.validate()?;

    let (parallel_program, sequential_program) = programs(&cli)?;
    let work_dir = cli.work_dir.clone().unwrap_or_else(|| {
        std::env::temp_dir().join(format!("pd_harness_{}", std::process::id()))
    });

    let harness = Harness::new(
        config,
        ProgramSpec::new(parallel_program, cli.parallel),
        ProgramSpec::new(sequential_program, cli.sequential),
        work_dir,
        available_workers(),
    )?;

    let (quick, full) = selected_suites(cli.quick, cli.full);

    let mut report = HarnessReport::default();
    if quick {
        let suite = harness.run_quick();
        print!("{suite}");
        report.suites.push(suite);
    }
    if full {
        let suite = harness.run_full();
        print!("{suite}");
        report.suites.push(suite);
    }
    println!("\nDone.");

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report).context("serializing report")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }

    Ok(report.passed())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_is_the_default_suite() {
        assert_eq!(selected_suites(false, false), (true, false));
        assert_eq!(selected_suites(true, false), (true, false));
        assert_eq!(selected_suites(false, true), (false, true));
        assert_eq!(selected_suites(true, true), (true, true));
    }

    #[test]
    fn test_sequential_program_override() {
        let cli = Cli::try_parse_from([
            "pd-harness",
            "shared",
            "--program",
            "/opt/par/pdgrid",
            "--sequential-program",
            "/opt/seq/pdgrid",
        ])
        .unwrap();
        let (parallel, sequential) = programs(&cli).unwrap();
        assert_eq!(parallel, PathBuf::from("/opt/par/pdgrid"));
        assert_eq!(sequential, PathBuf::from("/opt/seq/pdgrid"));

        let cli = Cli::try_parse_from(["pd-harness", "snapshot", "--program", "/opt/pd"]).unwrap();
        let (parallel, sequential) = programs(&cli).unwrap();
        assert_eq!(parallel, sequential);
        assert_eq!(cli.sequential, BackendKind::Sequential);
    }
}
