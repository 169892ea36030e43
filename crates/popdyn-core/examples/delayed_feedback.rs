//! Delayed feedback example: a decaying reservoir feeding a collector
//! through a three-step-old reading, run in the high-accuracy lane on a
//! background worker.
//!
//! Run with: `cargo run -p popdyn-core --example delayed_feedback`

use popdyn_core::engine::Engine;
use popdyn_core::state::{State, StateId};
use popdyn_core::task::Task;
use popdyn_core::transition::{Transition, TransitionMode};

fn main() {
    let mut task = Task::new(
        vec![
            State::new(0, "reservoir", 100.0),
            State::new(1, "collector", 0.0),
        ],
        vec![
            Transition {
                source: StateId(0),
                probability: 0.5,
                mode: TransitionMode::Removing,
                ..Transition::default()
            },
            Transition {
                source: StateId(0),
                result: StateId(1),
                source_delay: 3,
                probability: 0.1,
                ..Transition::default()
            },
        ],
        10,
    );
    task.higher_accuracy = true;

    let handle = Engine::new(task)
        .expect("task is valid")
        .spawn()
        .expect("worker starts");
    let result = handle
        .join()
        .expect("worker completed")
        .expect("run succeeds");

    for step in 0..result.steps_count() {
        println!(
            "step {step}: reservoir {:>10.4}  collector {:>8.4}",
            result.value(step, 0),
            result.value(step, 1)
        );
    }
}
