//! Named population compartments.

use serde::{Deserialize, Serialize};

/// Identifies a state in a task. User states carry non-negative ids; the
/// reserved [`StateId::EXTERNAL`] sentinel denotes the open-world
/// source/sink whose population is never tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateId(pub i32);

impl StateId {
    /// The external (open-world) state. Never materialized in the grid.
    pub const EXTERNAL: StateId = StateId(-1);

    pub fn is_external(self) -> bool {
        self == Self::EXTERNAL
    }
}

/// A named compartment with an initial (possibly fractional) population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub name: String,
    /// Initial population count, non-negative.
    pub count: f64,
}

impl State {
    pub fn new(id: i32, name: impl Into<String>, count: f64) -> Self {
        Self {
            id: StateId(id),
            name: name.into(),
            count,
        }
    }
}
