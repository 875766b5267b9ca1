use proptest::prelude::*;
use spatial_dilemma::parallel::partition;
use spatial_dilemma::{Action, ActionGrid, BackendKind, Census, SequentialEngine};

fn grid_strategy() -> impl Strategy<Value = ActionGrid> {
    (1usize..=12).prop_flat_map(|size| {
        proptest::collection::vec(any::<bool>(), size * size).prop_map(move |bits| {
            let cells = bits
                .into_iter()
                .map(|d| if d { Action::Defect } else { Action::Cooperate })
                .collect();
            ActionGrid::from_cells(size, cells).unwrap()
        })
    })
}

fn run_sequential(mut grid: ActionGrid, steps: usize) -> (ActionGrid, Vec<Census>) {
    let mut engine = SequentialEngine::new(grid.size());
    let censuses = (0..steps).map(|_| engine.step(&mut grid)).collect();
    (grid, censuses)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn proptest_backends_match_sequential(
        grid in grid_strategy(),
        steps in 0usize..6,
        workers in 1usize..20,
    ) {
        let (expected, expected_censuses) = run_sequential(grid.clone(), steps);

        for backend in BackendKind::PARALLEL {
            let mut engine = backend.build(grid.size(), workers).unwrap();
            let mut actual = grid.clone();
            let mut censuses = Vec::new();
            engine
                .run(&mut actual, steps, &mut |report| censuses.push(report.census))
                .unwrap();

            prop_assert_eq!(&actual, &expected, "{} with {} workers", backend, workers);
            prop_assert_eq!(&censuses, &expected_censuses);
        }
    }

    #[test]
    fn proptest_census_covers_every_cell(grid in grid_strategy(), steps in 1usize..5) {
        let size = grid.size();
        let (_, censuses) = run_sequential(grid, steps);
        prop_assert!(censuses.iter().all(|c| c.total() == size * size));
    }

    #[test]
    fn proptest_partition_covers_rows_once(rows in 0usize..300, workers in 0usize..40) {
        let ranges = partition(rows, workers);

        prop_assert!(ranges.len() <= workers.max(1));
        prop_assert!(ranges.iter().all(|r| !r.is_empty()));

        let mut next = 0;
        for range in &ranges {
            prop_assert_eq!(range.start, next);
            next = range.end;
        }
        prop_assert_eq!(next, rows);
    }
}
