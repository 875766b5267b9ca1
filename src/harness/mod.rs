//! Sequential-vs-parallel consistency and speedup checks.
//!
//! Both sides run as separate processes. Each run writes one dump per
//! initializer into the harness work directory; the harness compares those
//! byte for byte and times each process from spawn to exit.

pub mod report;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::automaton::Initializer;
use crate::config::{ConfigError, HarnessConfig};
use crate::dump::dump_file_name;
use crate::engine::BackendKind;

pub use report::{Comparison, ConfigResult, HarnessReport, SpeedupCheck, SuiteReport};

/// Lines of child stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{backend} run failed ({status}) for size={size}, steps={steps}{}:\n{stderr}",
        .workers.map(|w| format!(", workers={w}")).unwrap_or_default())]
    RunFailure {
        backend: BackendKind,
        status: String,
        size: usize,
        steps: usize,
        workers: Option<usize>,
        stderr: String,
    },

    #[error("expected output {path} is missing")]
    MissingOutput { path: PathBuf },

    #[error("failed to prepare work directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// How to invoke one side of the comparison.
#[derive(Clone, Debug)]
pub struct ProgramSpec {
    pub program: PathBuf,
    pub backend: BackendKind,
}

impl ProgramSpec {
    pub fn new(program: impl Into<PathBuf>, backend: BackendKind) -> Self {
        ProgramSpec {
            program: program.into(),
            backend,
        }
    }

    pub fn tag(&self) -> &'static str {
        self.backend.tag()
    }

    fn command(
        &self,
        out_dir: &Path,
        size: usize,
        steps: usize,
        workers: Option<usize>,
        inits: &[Initializer],
        seed: Option<u64>,
    ) -> Command {
        let ids: Vec<String> = inits.iter().map(|i| i.id().to_string()).collect();

        let mut cmd = Command::new(&self.program);
        cmd.arg("--backend")
            .arg(self.backend.to_string())
            .arg("--quiet")
            .arg("--init")
            .arg(ids.join(","))
            .arg("--out-dir")
            .arg(out_dir);
        if let Some(seed) = seed {
            cmd.arg("--seed").arg(seed.to_string());
        }
        cmd.arg(size.to_string()).arg(steps.to_string());
        if let Some(workers) = workers {
            cmd.arg(workers.to_string());
        }
        cmd
    }
}

/// Wall time and dumps of one program run.
#[derive(Clone, Debug)]
pub struct Measurement {
    pub seconds: f64,
    pub dumps: BTreeMap<u8, String>,
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Run one program to completion and read back its dumps.
///
/// Stale dumps with the same names are removed first so that a run that exits
/// cleanly without writing is reported as [`HarnessError::MissingOutput`].
pub fn run_program(
    spec: &ProgramSpec,
    work_dir: &Path,
    size: usize,
    steps: usize,
    workers: Option<usize>,
    inits: &[Initializer],
    seed: Option<u64>,
) -> Result<Measurement, HarnessError> {
    let paths: Vec<(Initializer, PathBuf)> = inits
        .iter()
        .map(|&init| {
            let name = dump_file_name(init, size, steps, spec.tag());
            (init, work_dir.join(name))
        })
        .collect();
    for (_, path) in &paths {
        let _ = fs::remove_file(path);
    }

    let mut cmd = spec.command(work_dir, size, steps, workers, inits, seed);
    debug!(?cmd, "spawning");

    let started = Instant::now();
    let output = cmd.output().map_err(|source| HarnessError::Spawn {
        program: spec.program.clone(),
        source,
    })?;
    let seconds = started.elapsed().as_secs_f64();

    if !output.status.success() {
        return Err(HarnessError::RunFailure {
            backend: spec.backend,
            status: output.status.to_string(),
            size,
            steps,
            workers,
            stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES),
        });
    }

    let mut dumps = BTreeMap::new();
    for (init, path) in paths {
        let text = fs::read_to_string(&path)
            .map_err(|_| HarnessError::MissingOutput { path })?;
        dumps.insert(init.id(), text);
    }

    Ok(Measurement { seconds, dumps })
}

/// Compare dumps per initializer; an initializer missing on either side fails.
pub fn compare_dumps(
    sequential: &BTreeMap<u8, String>,
    parallel: &BTreeMap<u8, String>,
) -> Comparison {
    let per_init: BTreeMap<u8, bool> = sequential
        .keys()
        .chain(parallel.keys())
        .map(|&id| {
            let same = matches!(
                (sequential.get(&id), parallel.get(&id)),
                (Some(a), Some(b)) if a == b
            );
            (id, same)
        })
        .collect();
    let overall = per_init.values().all(|&ok| ok);
    Comparison { per_init, overall }
}

/// `sequential / parallel`, infinite when the parallel run took no measurable time.
pub fn speedup(sequential_seconds: f64, parallel_seconds: f64) -> f64 {
    if parallel_seconds > 0.0 {
        sequential_seconds / parallel_seconds
    } else {
        f64::INFINITY
    }
}

pub struct Harness {
    config: HarnessConfig,
    parallel: ProgramSpec,
    sequential: ProgramSpec,
    work_dir: PathBuf,
    available: usize,
}

impl Harness {
    pub fn new(
        config: HarnessConfig,
        parallel: ProgramSpec,
        sequential: ProgramSpec,
        work_dir: PathBuf,
        available: usize,
    ) -> Result<Self, HarnessError> {
        fs::create_dir_all(&work_dir).map_err(|source| HarnessError::WorkDir {
            path: work_dir.clone(),
            source,
        })?;
        Ok(Harness {
            config,
            parallel,
            sequential,
            work_dir,
            available: available.max(1),
        })
    }

    fn cap(&self, requested: usize, size: usize) -> usize {
        self.config.cap_workers(requested, size, self.available)
    }

    /// Capped worker counts, first occurrence order, without duplicates.
    pub fn effective_workers(&self, requested: &[usize], size: usize) -> Vec<usize> {
        let mut out = Vec::new();
        for &r in requested {
            let n = self.cap(r, size);
            if !out.contains(&n) {
                out.push(n);
            }
        }
        out
    }

    fn run_sequential(&self, size: usize) -> Result<Measurement, HarnessError> {
        let steps = self.config.steps;
        run_program(
            &self.sequential,
            &self.work_dir,
            size,
            steps,
            None,
            &self.config.compared_initializers(),
            self.config.seed,
        )
    }

    fn measure_parallel(
        &self,
        size: usize,
        workers: usize,
        baseline: &Measurement,
    ) -> ConfigResult {
        let outcome = run_program(
            &self.parallel,
            &self.work_dir,
            size,
            self.config.steps,
            Some(workers),
            &self.config.compared_initializers(),
            self.config.seed,
        );

        match outcome {
            Ok(m) => {
                let comparison = compare_dumps(&baseline.dumps, &m.dumps);
                let sp = speedup(baseline.seconds, m.seconds);
                info!(
                    workers,
                    seconds = m.seconds,
                    speedup = sp,
                    overall = comparison.overall,
                    "parallel run compared"
                );
                ConfigResult {
                    workers,
                    comparison: Some(comparison),
                    seconds: Some(m.seconds),
                    speedup: Some(sp),
                    error: None,
                }
            }
            Err(err) => {
                warn!(workers, %err, "parallel configuration failed");
                ConfigResult {
                    workers,
                    comparison: None,
                    seconds: None,
                    speedup: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Run the sequential baseline, then every worker count in `requested`.
    fn correctness(
        &self,
        name: &str,
        size: usize,
        requested: &[usize],
    ) -> (SuiteReport, Option<Measurement>) {
        let mut suite = SuiteReport::new(name, size, self.config.steps);

        let baseline = match self.run_sequential(size) {
            Ok(m) => m,
            Err(err) => {
                warn!(size, %err, "sequential baseline failed");
                suite.aborted = Some(err.to_string());
                return (suite, None);
            }
        };
        suite.sequential_seconds = Some(baseline.seconds);
        info!(size, seconds = baseline.seconds, "sequential baseline finished");

        for workers in self.effective_workers(requested, size) {
            suite.results.push(self.measure_parallel(size, workers, &baseline));
        }

        (suite, Some(baseline))
    }

    /// Small-grid correctness at the configured correctness worker counts.
    pub fn run_quick(&self) -> SuiteReport {
        let size = self.config.quick_grid_size;
        self.correctness("Correctness", size, &self.config.correctness_workers)
            .0
    }

    /// Large-grid correctness plus the speedup sweep and thresholds.
    pub fn run_full(&self) -> SuiteReport {
        let size = self.config.full_grid_size;
        let (mut suite, baseline) =
            self.correctness("Correctness and speedup", size, &self.config.correctness_workers);
        let Some(baseline) = baseline else {
            return suite;
        };

        for workers in self.effective_workers(&self.config.speedup_workers, size) {
            if suite.result_for(workers).is_none() {
                suite.results.push(self.measure_parallel(size, workers, &baseline));
            }
        }

        for &requested in &self.config.correctness_workers {
            let workers = self.cap(requested, size);
            let measured = suite.result_for(workers).and_then(|r| r.speedup);
            suite.checks.push(SpeedupCheck {
                label: format!("workers={workers}"),
                speedup: measured,
                threshold: self.config.min_speedup,
                passed: measured.is_some_and(|s| s >= self.config.min_speedup),
            });
        }

        let best = suite
            .results
            .iter()
            .filter_map(|r| r.speedup)
            .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))));
        suite.checks.push(SpeedupCheck {
            label: "best of any worker count".to_string(),
            speedup: best,
            threshold: self.config.target_speedup,
            passed: best.is_some_and(|s| s >= self.config.target_speedup),
        });

        suite
    }
}
