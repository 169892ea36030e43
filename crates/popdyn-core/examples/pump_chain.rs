//! Pump chain example: an open source state feeding a two-stage chain.
//!
//! A pumps 10% of itself into B each step without draining (SIMPLE);
//! B drains completely into C one step behind (REMOVING).
//!
//! Run with: `cargo run -p popdyn-core --example pump_chain`

use popdyn_core::engine::Engine;
use popdyn_core::result::ResultShape;
use popdyn_core::state::{State, StateId};
use popdyn_core::task::Task;
use popdyn_core::transition::{Transition, TransitionMode};

fn main() {
    let task = Task::new(
        vec![
            State::new(0, "reservoir", 100.0),
            State::new(1, "buffer", 0.0),
            State::new(2, "sink", 0.0),
        ],
        vec![
            Transition {
                source: StateId(0),
                result: StateId(1),
                probability: 0.1,
                ..Transition::default()
            },
            Transition {
                source: StateId(1),
                result: StateId(2),
                probability: 1.0,
                mode: TransitionMode::Removing,
                ..Transition::default()
            },
        ],
        12,
    );

    let result = Engine::new(task)
        .expect("task is valid")
        .with_shape(ResultShape::table())
        .run()
        .expect("run succeeds");

    let table = result.table().expect("table was requested");
    println!("step  {:>10} {:>10} {:>10}", table.columns[0], table.columns[1], table.columns[2]);
    for row in &table.rows {
        println!(
            "{:>4}  {:>10.3} {:>10.3} {:>10.3}",
            row.point, row.values[0], row.values[1], row.values[2]
        );
    }
}
