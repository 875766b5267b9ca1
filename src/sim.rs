//! The run driver: owns the action grid for one run and hands it to a backend.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::automaton::{ActionGrid, Census};
use crate::config::RunConfig;
use crate::dump::write_dump;
use crate::engine::StepReport;
use crate::error::SimError;

/// Summary of a completed run.
#[derive(Clone, Debug, Serialize)]
pub struct RunOutcome {
    pub config: RunConfig,
    pub census: Census,
    pub elapsed: Duration,
    pub dump: Option<PathBuf>,
}

pub struct Simulation {
    config: RunConfig,
    actions: ActionGrid,
}

impl Simulation {
    /// Validate `config` and build the initial grid from its initializer.
    pub fn new(config: RunConfig) -> Result<Self, SimError> {
        config.validate()?;
        let actions = config.initializer.initialize(config.grid_size, config.seed);
        Ok(Simulation { config, actions })
    }

    /// Start from an explicit grid instead of the configured initializer.
    pub fn from_grid(config: RunConfig, actions: ActionGrid) -> Result<Self, SimError> {
        config.validate()?;
        if actions.size() != config.grid_size {
            return Err(SimError::InvalidConfig(format!(
                "grid is {}x{}, configuration says {}",
                actions.size(),
                actions.size(),
                config.grid_size
            )));
        }
        Ok(Simulation { config, actions })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn actions(&self) -> &ActionGrid {
        &self.actions
    }

    /// Run every configured step on the configured backend.
    ///
    /// Any backend error aborts the run; the grid is then in an unspecified
    /// state and must not be dumped.
    pub fn run(&mut self, progress: &mut dyn FnMut(StepReport)) -> Result<RunOutcome, SimError> {
        let config = &self.config;
        let mut engine = config
            .backend
            .build(config.grid_size, config.effective_workers())?;

        info!(
            backend = %config.backend,
            initializer = %config.initializer,
            size = config.grid_size,
            steps = config.steps,
            workers = config.effective_workers(),
            "run starting"
        );

        let started = Instant::now();
        engine.run(&mut self.actions, config.steps, progress)?;
        let elapsed = started.elapsed();

        let census = Census::of(self.actions.cells());
        info!(elapsed_ms = elapsed.as_millis() as u64, %census, "run finished");

        Ok(RunOutcome {
            config: config.clone(),
            census,
            elapsed,
            dump: None,
        })
    }

    /// Run, then write the final grid to `out_dir` under `tag`.
    pub fn run_to_dump(
        mut self,
        out_dir: &Path,
        tag: &str,
        progress: &mut dyn FnMut(StepReport),
    ) -> Result<RunOutcome, SimError> {
        let mut outcome = self.run(progress)?;
        let path = write_dump(
            out_dir,
            &self.actions,
            self.config.initializer,
            self.config.steps,
            tag,
        )?;
        outcome.dump = Some(path);
        Ok(outcome)
    }

    pub fn into_grid(self) -> ActionGrid {
        self.actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{Action, Initializer};
    use crate::dump::render;
    use crate::engine::BackendKind;

    #[test]
    fn test_scenario_center_defector() {
        let mut grid = ActionGrid::filled(3, Action::Cooperate);
        grid.set(1, 1, Action::Defect);
        let config = RunConfig::new(3, 1, Initializer::CenterDefector);

        let mut sim = Simulation::from_grid(config, grid).unwrap();
        let outcome = sim.run(&mut |_| {}).unwrap();

        assert_eq!(render(sim.actions()), "0: [0, 1, 0]\n1: [1, 1, 1]\n2: [0, 1, 0]\n");
        assert_eq!(outcome.census.defectors, 5);
    }

    #[test]
    fn test_every_backend_agrees_on_diagonal() {
        let reference = {
            let mut sim = Simulation::new(RunConfig::new(10, 20, Initializer::Diagonal)).unwrap();
            sim.run(&mut |_| {}).unwrap();
            render(sim.actions())
        };

        for backend in BackendKind::PARALLEL {
            for workers in [1, 2, 4] {
                let config = RunConfig::new(10, 20, Initializer::Diagonal)
                    .with_backend(backend)
                    .with_workers(workers);
                let mut sim = Simulation::new(config).unwrap();
                sim.run(&mut |_| {}).unwrap();
                assert_eq!(render(sim.actions()), reference, "{backend} x{workers}");
            }
        }
    }

    #[test]
    fn test_more_workers_than_rows() {
        let reference = {
            let mut sim = Simulation::new(RunConfig::new(3, 5, Initializer::HalfSplit)).unwrap();
            sim.run(&mut |_| {}).unwrap();
            sim.into_grid()
        };

        for backend in BackendKind::PARALLEL {
            let config = RunConfig::new(3, 5, Initializer::HalfSplit)
                .with_backend(backend)
                .with_workers(16);
            assert_eq!(config.effective_workers(), 3);

            let mut sim = Simulation::new(config).unwrap();
            sim.run(&mut |_| {}).unwrap();
            assert_eq!(sim.into_grid(), reference, "{backend}");
        }
    }

    #[test]
    fn test_zero_steps_keeps_initial_grid() {
        let config = RunConfig::new(5, 0, Initializer::NearOriginDefector);
        let mut sim = Simulation::new(config).unwrap();
        let before = sim.actions().clone();
        let mut reports = 0;
        sim.run(&mut |_| reports += 1).unwrap();
        assert_eq!(reports, 0);
        assert_eq!(sim.actions(), &before);
    }

    #[test]
    fn test_from_grid_rejects_size_mismatch() {
        let config = RunConfig::new(4, 1, Initializer::Diagonal);
        let grid = ActionGrid::filled(3, Action::Cooperate);
        assert!(Simulation::from_grid(config, grid).is_err());
    }

    #[test]
    fn test_run_to_dump() {
        let dir = std::env::temp_dir().join(format!("pd_sim_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let config = RunConfig::new(4, 2, Initializer::CenterDefector)
            .with_backend(BackendKind::Shared)
            .with_workers(2);
        let outcome = Simulation::new(config)
            .unwrap()
            .run_to_dump(&dir, "shared", &mut |_| {})
            .unwrap();

        let path = outcome.dump.unwrap();
        assert!(path.ends_with("output_grid3_4_2_shared.txt"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
