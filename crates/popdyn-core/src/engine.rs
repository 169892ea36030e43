//! The engine facade: build from a task, run synchronously or on a
//! background worker, observe progress and the finished result.
//!
//! # Usage
//!
//! ```
//! use popdyn_core::engine::Engine;
//! use popdyn_core::result::ResultShape;
//! use popdyn_core::state::{State, StateId};
//! use popdyn_core::task::Task;
//! use popdyn_core::transition::{Transition, TransitionMode};
//!
//! let task = Task::new(
//!     vec![State::new(0, "a", 100.0), State::new(1, "b", 0.0)],
//!     vec![Transition {
//!         source: StateId(0),
//!         result: StateId(1),
//!         probability: 0.1,
//!         mode: TransitionMode::Removing,
//!         ..Transition::default()
//!     }],
//!     10,
//! );
//! let result = Engine::new(task)
//!     .unwrap()
//!     .with_shape(ResultShape::chart())
//!     .run()
//!     .unwrap();
//! assert_eq!(result.steps_count(), 10);
//! ```

use std::thread::{self, JoinHandle};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::driver::{self, CancelToken};
use crate::error::Error;
use crate::grid::StateGrid;
use crate::progress::ProgressReporter;
use crate::result::{ResultShape, SimulationResult};
use crate::task::{ResolvedTransition, Task};

/// Sink receiving the completed result before `run` returns.
pub type ResultSink = dyn Fn(&SimulationResult) + Send + Sync;

/// A validated, ready-to-run simulation.
pub struct Engine {
    task: Task,
    transitions: Vec<ResolvedTransition>,
    grid: StateGrid,
    pool: Option<ThreadPool>,
    cancel: CancelToken,
    shape: ResultShape,
    progress_sink: Option<Box<dyn Fn(f64) + Send + Sync>>,
    result_sink: Option<Box<ResultSink>>,
}

impl Engine {
    /// Validate the task and build the run state: the grid, the decimal
    /// window when higher accuracy is on, and the worker pool when
    /// parallel evaluation is on.
    pub fn new(task: Task) -> Result<Self, Error> {
        let transitions = task.resolve()?;
        let window_depth = task.higher_accuracy.then(|| task.max_delay());
        let grid = StateGrid::new(&task.initial_counts(), task.steps_count, window_depth);
        let pool = if task.parallel {
            let pool = ThreadPoolBuilder::new()
                .thread_name(|i| format!("popdyn-worker-{i}"))
                .build()
                .map_err(|e| Error::Worker(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            task,
            transitions,
            grid,
            pool,
            cancel: CancelToken::new(),
            shape: ResultShape::default(),
            progress_sink: None,
            result_sink: None,
        })
    }

    /// Select which prepared shapes the result should carry.
    pub fn with_shape(mut self, shape: ResultShape) -> Self {
        self.shape = shape;
        self
    }

    /// Register a progress sink. Called inline on the driver thread.
    pub fn on_progress(mut self, sink: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.progress_sink = Some(Box::new(sink));
        self
    }

    /// Register a result sink, invoked with the completed result before
    /// `run` returns it.
    pub fn on_result(mut self, sink: impl Fn(&SimulationResult) + Send + Sync + 'static) -> Self {
        self.result_sink = Some(Box::new(sink));
        self
    }

    /// A handle that absorbs in-flight transition tasks when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run in the calling thread. The worker pool (if any) is torn down
    /// and the decimal window released before the result is packaged.
    pub fn run(self) -> Result<SimulationResult, Error> {
        let Self {
            task,
            transitions,
            grid,
            pool,
            cancel,
            shape,
            progress_sink,
            result_sink,
        } = self;
        let mut progress = ProgressReporter::new(task.steps_count, progress_sink.as_deref());
        let outcome = if task.higher_accuracy {
            driver::run_big(
                &grid,
                &transitions,
                task.steps_count,
                pool.as_ref(),
                &cancel,
                &mut progress,
            )
        } else {
            driver::run_normal(
                &grid,
                &transitions,
                task.steps_count,
                pool.as_ref(),
                &cancel,
                &mut progress,
            )
        };
        drop(pool);
        outcome?;
        let result = SimulationResult::package(
            grid.into_rows(),
            &task.states,
            task.start_point,
            shape,
            !task.allow_negative,
        );
        if let Some(sink) = &result_sink {
            sink(&result);
        }
        Ok(result)
    }

    /// Run on a named background worker. The handle joins to the same
    /// outcome `run` would have produced; sinks fire on the worker.
    pub fn spawn(self) -> Result<JoinHandle<Result<SimulationResult, Error>>, Error> {
        thread::Builder::new()
            .name("popdyn-engine".into())
            .spawn(move || self.run())
            .map_err(|e| Error::Worker(e.to_string()))
    }
}
