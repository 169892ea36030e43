//! The step driver: advances the grid one step at a time, evaluating
//! every transition per step either inline or fanned out over the worker
//! pool.
//!
//! Steps are strictly sequential; the scope barrier at the end of each
//! step is the only blocking point. The per-step population total is
//! captured once after the copy-forward, so every transition in a step
//! sees the same total. Updates are additive and commute, so concurrent
//! evaluation order is not observable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::ThreadPool;

use crate::error::{Error, NumericError};
use crate::flow::{self, Cells};
use crate::grid::{PlainCells, StateGrid, WindowCells};
use crate::progress::ProgressReporter;
use crate::task::ResolvedTransition;

/// Cooperative cancellation handle for an in-flight run.
///
/// Cancellation is absorbed, not raised: a transition task that observes
/// a cancelled token commits nothing, the step completes with the
/// partial composition of the remaining tasks, and the run finishes
/// normally.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub(crate) fn run_normal(
    grid: &StateGrid,
    transitions: &[ResolvedTransition],
    steps_count: usize,
    pool: Option<&ThreadPool>,
    cancel: &CancelToken,
    progress: &mut ProgressReporter<'_>,
) -> Result<(), Error> {
    progress.report(0);
    for step in 1..steps_count {
        grid.begin_step(step);
        let total = grid.total(step);
        evaluate_step(&PlainCells { grid, step }, &total, transitions, pool, cancel)?;
        progress.report(step);
    }
    Ok(())
}

pub(crate) fn run_big(
    grid: &StateGrid,
    transitions: &[ResolvedTransition],
    steps_count: usize,
    pool: Option<&ThreadPool>,
    cancel: &CancelToken,
    progress: &mut ProgressReporter<'_>,
) -> Result<(), Error> {
    progress.report(0);
    for step in 1..steps_count {
        grid.begin_step_big(step);
        let total = grid.total_big();
        evaluate_step(&WindowCells { grid, step }, &total, transitions, pool, cancel)?;
        progress.report(step);
    }
    Ok(())
}

/// Evaluate every transition for one step. With a pool, one task per
/// transition; the scope blocks until all have finished. The first
/// kernel error wins and aborts the run once the step has joined.
fn evaluate_step<C: Cells>(
    cells: &C,
    total: &C::Value,
    transitions: &[ResolvedTransition],
    pool: Option<&ThreadPool>,
    cancel: &CancelToken,
) -> Result<(), Error> {
    match pool {
        Some(pool) => {
            let failure: Mutex<Option<NumericError>> = Mutex::new(None);
            pool.scope(|scope| {
                for transition in transitions {
                    let failure = &failure;
                    scope.spawn(move |_| {
                        if cancel.is_cancelled() {
                            return;
                        }
                        if let Err(e) = flow::apply_transition(cells, transition, total) {
                            failure.lock().get_or_insert(e);
                        }
                    });
                }
            });
            match failure.into_inner() {
                Some(e) => Err(e.into()),
                None => Ok(()),
            }
        }
        None => {
            for transition in transitions {
                if cancel.is_cancelled() {
                    continue;
                }
                flow::apply_transition(cells, transition, total)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use crate::transition::{Transition, TransitionMode};
    use crate::state::{State, StateId};

    fn pump_task(steps: usize) -> (Task, Vec<ResolvedTransition>) {
        let task = Task::new(
            vec![State::new(0, "a", 100.0), State::new(1, "b", 0.0)],
            vec![Transition {
                source: StateId(0),
                result: StateId(1),
                probability: 0.1,
                mode: TransitionMode::Removing,
                ..Transition::default()
            }],
            steps,
        );
        let resolved = task.resolve().unwrap();
        (task, resolved)
    }

    #[test]
    fn sequential_run_advances_every_step() {
        let (task, transitions) = pump_task(3);
        let grid = StateGrid::new(&task.initial_counts(), task.steps_count, None);
        let mut progress = ProgressReporter::new(task.steps_count, None);
        run_normal(
            &grid,
            &transitions,
            task.steps_count,
            None,
            &CancelToken::new(),
            &mut progress,
        )
        .unwrap();
        assert_eq!(grid.get(1, 0), 90.0);
        assert_eq!(grid.get(1, 1), 10.0);
        assert_eq!(grid.get(2, 0), 81.0);
        assert_eq!(grid.get(2, 1), 19.0);
    }

    #[test]
    fn decimal_lane_projects_into_the_grid() {
        let (task, transitions) = pump_task(3);
        let grid = StateGrid::new(&task.initial_counts(), task.steps_count, Some(0));
        let mut progress = ProgressReporter::new(task.steps_count, None);
        run_big(
            &grid,
            &transitions,
            task.steps_count,
            None,
            &CancelToken::new(),
            &mut progress,
        )
        .unwrap();
        assert!((grid.get(2, 0) - 81.0).abs() < 1e-12);
        assert!((grid.get(2, 1) - 19.0).abs() < 1e-12);
    }

    #[test]
    fn cancelled_token_freezes_the_population() {
        let (task, transitions) = pump_task(5);
        let grid = StateGrid::new(&task.initial_counts(), task.steps_count, None);
        let mut progress = ProgressReporter::new(task.steps_count, None);
        let cancel = CancelToken::new();
        cancel.cancel();
        run_normal(
            &grid,
            &transitions,
            task.steps_count,
            None,
            &cancel,
            &mut progress,
        )
        .unwrap();
        // every row is a plain copy of row 0
        for step in 0..5 {
            assert_eq!(grid.get(step, 0), 100.0);
            assert_eq!(grid.get(step, 1), 0.0);
        }
    }

    #[test]
    fn pooled_run_matches_sequential() {
        let (task, transitions) = pump_task(10);
        let sequential = StateGrid::new(&task.initial_counts(), task.steps_count, None);
        let mut progress = ProgressReporter::new(task.steps_count, None);
        run_normal(
            &sequential,
            &transitions,
            task.steps_count,
            None,
            &CancelToken::new(),
            &mut progress,
        )
        .unwrap();

        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let pooled = StateGrid::new(&task.initial_counts(), task.steps_count, None);
        let mut progress = ProgressReporter::new(task.steps_count, None);
        run_normal(
            &pooled,
            &transitions,
            task.steps_count,
            Some(&pool),
            &CancelToken::new(),
            &mut progress,
        )
        .unwrap();

        for step in 0..task.steps_count {
            assert_eq!(sequential.get(step, 0), pooled.get(step, 0));
            assert_eq!(sequential.get(step, 1), pooled.get(step, 1));
        }
    }
}
