//! Epidemic example: SOLUTE mass-action infection with LINEAR recovery,
//! run in parallel with progress reporting.
//!
//! Run with: `cargo run -p popdyn-core --example epidemic`

use popdyn_core::engine::Engine;
use popdyn_core::result::ResultShape;
use popdyn_core::state::{State, StateId};
use popdyn_core::task::Task;
use popdyn_core::transition::{Transition, TransitionKind, TransitionMode};

fn main() {
    let mut task = Task::new(
        vec![
            State::new(0, "susceptible", 990.0),
            State::new(1, "infected", 10.0),
            State::new(2, "recovered", 0.0),
        ],
        vec![
            // infection: contact between S and I, normalized by the total
            Transition {
                source: StateId(0),
                operand: StateId(1),
                result: StateId(1),
                kind: TransitionKind::Solute,
                mode: TransitionMode::Removing,
                probability: 0.4,
                ..Transition::default()
            },
            // recovery: 8% of the infected per step
            Transition {
                source: StateId(1),
                result: StateId(2),
                probability: 0.08,
                mode: TransitionMode::Removing,
                ..Transition::default()
            },
        ],
        200,
    );
    task.parallel = true;

    let result = Engine::new(task)
        .expect("task is valid")
        .with_shape(ResultShape::chart())
        .on_progress(|p| {
            if p == 0.0 || p == 1.0 {
                println!("progress: {:.0}%", p * 100.0);
            }
        })
        .run()
        .expect("run succeeds");

    for series in result.downsampled_chart(10) {
        print!("{:>12}:", series.name);
        for (_, value) in &series.points {
            print!(" {value:>8.1}");
        }
        println!();
    }
}
