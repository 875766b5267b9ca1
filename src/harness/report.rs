//! Harness results and their human-readable rendering.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Per-initializer byte equality of two sets of dumps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub per_init: BTreeMap<u8, bool>,
    pub overall: bool,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details: Vec<String> = self
            .per_init
            .iter()
            .map(|(id, ok)| format!("init{}={}", id, if *ok { "ok" } else { "x" }))
            .collect();
        write!(f, "{}", details.join(", "))
    }
}

/// One parallel configuration of a suite.
#[derive(Clone, Debug, Serialize)]
pub struct ConfigResult {
    /// Worker count actually passed to the program, after capping.
    pub workers: usize,
    pub comparison: Option<Comparison>,
    pub seconds: Option<f64>,
    pub speedup: Option<f64>,
    /// Set when the program failed; the configuration counts as failed.
    pub error: Option<String>,
}

impl ConfigResult {
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.comparison.as_ref().is_some_and(|c| c.overall)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SpeedupCheck {
    pub label: String,
    pub speedup: Option<f64>,
    pub threshold: f64,
    pub passed: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SuiteReport {
    pub name: String,
    pub size: usize,
    pub steps: usize,
    pub sequential_seconds: Option<f64>,
    pub results: Vec<ConfigResult>,
    pub checks: Vec<SpeedupCheck>,
    /// Set when the sequential baseline failed and nothing was compared.
    pub aborted: Option<String>,
}

impl SuiteReport {
    pub fn new(name: impl Into<String>, size: usize, steps: usize) -> Self {
        SuiteReport {
            name: name.into(),
            size,
            steps,
            sequential_seconds: None,
            results: Vec::new(),
            checks: Vec::new(),
            aborted: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.aborted.is_none()
            && self.results.iter().all(ConfigResult::passed)
            && self.checks.iter().all(|c| c.passed)
    }

    pub fn result_for(&self, workers: usize) -> Option<&ConfigResult> {
        self.results.iter().find(|r| r.workers == workers)
    }
}

fn pass_fail(ok: bool) -> &'static str {
    if ok {
        "PASS"
    } else {
        "FAIL"
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "\n== {}: {}x{}, steps={} ==",
            self.name, self.size, self.size, self.steps
        )?;

        if let Some(reason) = &self.aborted {
            return writeln!(f, "aborted: {reason}");
        }
        if let Some(seconds) = self.sequential_seconds {
            writeln!(f, "sequential time: {seconds:.3}s")?;
        }

        for result in &self.results {
            match (&result.error, &result.comparison) {
                (Some(err), _) => writeln!(f, "workers={}: FAIL; {}", result.workers, err)?,
                (None, Some(cmp)) => {
                    write!(f, "workers={}: overall={}", result.workers, pass_fail(cmp.overall))?;
                    if let Some(speedup) = result.speedup {
                        write!(f, "; speedup={speedup:.2}x")?;
                    }
                    writeln!(f, "; details={cmp}")?;
                }
                (None, None) => writeln!(f, "workers={}: no result", result.workers)?,
            }
        }

        for check in &self.checks {
            match check.speedup {
                Some(speedup) => writeln!(
                    f,
                    "{}: speedup={:.2}x -> {} (>={:.2}x)",
                    check.label,
                    speedup,
                    pass_fail(check.passed),
                    check.threshold
                )?,
                None => writeln!(
                    f,
                    "{}: no measurement available -> FAIL (>={:.2}x)",
                    check.label, check.threshold
                )?,
            }
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct HarnessReport {
    pub suites: Vec<SuiteReport>,
}

impl HarnessReport {
    pub fn passed(&self) -> bool {
        self.suites.iter().all(SuiteReport::passed)
    }
}
