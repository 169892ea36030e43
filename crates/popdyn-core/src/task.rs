//! The simulation task: states, transitions, and run settings.

use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::state::{State, StateId};
use crate::transition::{Transition, TransitionKind, TransitionMode};

/// A complete, self-contained description of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Ordered states; their order fixes the grid's index space.
    pub states: Vec<State>,
    /// Ordered transition rules.
    pub transitions: Vec<Transition>,
    /// X-axis coordinate of step 0 in results.
    pub start_point: i64,
    /// Number of grid rows. `0` and `1` run no transition batches.
    pub steps_count: usize,
    /// Fan transitions within a step out over a worker pool.
    pub parallel: bool,
    /// Run the arbitrary-precision lane alongside the `f64` grid.
    pub higher_accuracy: bool,
    /// Pass negative values through to results instead of clipping.
    pub allow_negative: bool,
}

impl Task {
    /// A sequential, finite-precision task with clipping on.
    pub fn new(states: Vec<State>, transitions: Vec<Transition>, steps_count: usize) -> Self {
        Self {
            states,
            transitions,
            start_point: 0,
            steps_count,
            parallel: false,
            higher_accuracy: false,
            allow_negative: false,
        }
    }

    /// Initial counts in state order.
    pub fn initial_counts(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.count).collect()
    }

    /// The deepest lookback any transition performs.
    pub fn max_delay(&self) -> usize {
        self.transitions
            .iter()
            .map(|t| t.source_delay.max(t.operand_delay) as usize)
            .max()
            .unwrap_or(0)
    }

    /// Validate the task and resolve every transition's endpoints to dense
    /// state indices (`None` = external). The index space is immutable for
    /// the whole run.
    pub fn resolve(&self) -> Result<Vec<ResolvedTransition>, TaskError> {
        for state in &self.states {
            if !state.count.is_finite() {
                return Err(TaskError::NonFiniteInitialCount {
                    name: state.name.clone(),
                });
            }
            if state.count < 0.0 {
                return Err(TaskError::NegativeInitialCount {
                    name: state.name.clone(),
                });
            }
        }
        self.transitions
            .iter()
            .enumerate()
            .map(|(index, t)| self.resolve_one(index, t))
            .collect()
    }

    fn resolve_one(&self, index: usize, t: &Transition) -> Result<ResolvedTransition, TaskError> {
        let coefficients = [
            ("source", t.source_coefficient),
            ("operand", t.operand_coefficient),
            ("result", t.result_coefficient),
        ];
        for (field, value) in coefficients {
            if !value.is_finite() {
                return Err(TaskError::NonFiniteNumber { index, field });
            }
            if value < 0.0 {
                return Err(TaskError::NegativeCoefficient { index, field });
            }
        }
        if !t.probability.is_finite() {
            return Err(TaskError::NonFiniteNumber {
                index,
                field: "probability",
            });
        }
        Ok(ResolvedTransition {
            source: self.find_state(index, t.source)?,
            operand: self.find_state(index, t.operand)?,
            result: self.find_state(index, t.result)?,
            source_coefficient: t.source_coefficient,
            operand_coefficient: t.operand_coefficient,
            result_coefficient: t.result_coefficient,
            source_delay: t.source_delay,
            operand_delay: t.operand_delay,
            probability: t.probability,
            kind: t.kind,
            mode: t.mode,
        })
    }

    /// Position of `id` in the state list; external resolves to `None`.
    fn find_state(&self, index: usize, id: StateId) -> Result<Option<usize>, TaskError> {
        if id.is_external() {
            return Ok(None);
        }
        self.states
            .iter()
            .position(|s| s.id == id)
            .map(Some)
            .ok_or(TaskError::UnknownState { index, id: id.0 })
    }
}

/// A transition with endpoints resolved to grid indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTransition {
    pub source: Option<usize>,
    pub operand: Option<usize>,
    pub result: Option<usize>,
    pub source_coefficient: f64,
    pub operand_coefficient: f64,
    pub result_coefficient: f64,
    pub source_delay: u32,
    pub operand_delay: u32,
    pub probability: f64,
    pub kind: TransitionKind,
    pub mode: TransitionMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_states() -> Vec<State> {
        vec![State::new(0, "a", 10.0), State::new(1, "b", 0.0)]
    }

    #[test]
    fn resolves_endpoints_to_indices() {
        let task = Task::new(
            two_states(),
            vec![Transition {
                source: StateId(1),
                operand: StateId::EXTERNAL,
                result: StateId(0),
                ..Transition::default()
            }],
            5,
        );
        let resolved = task.resolve().unwrap();
        assert_eq!(resolved[0].source, Some(1));
        assert_eq!(resolved[0].operand, None);
        assert_eq!(resolved[0].result, Some(0));
    }

    #[test]
    fn unknown_state_is_rejected() {
        let task = Task::new(
            two_states(),
            vec![Transition {
                source: StateId(42),
                ..Transition::default()
            }],
            5,
        );
        assert_eq!(
            task.resolve(),
            Err(TaskError::UnknownState { index: 0, id: 42 })
        );
    }

    #[test]
    fn negative_coefficient_is_rejected() {
        let task = Task::new(
            two_states(),
            vec![Transition {
                source: StateId(0),
                operand_coefficient: -1.0,
                ..Transition::default()
            }],
            5,
        );
        assert_eq!(
            task.resolve(),
            Err(TaskError::NegativeCoefficient {
                index: 0,
                field: "operand"
            })
        );
    }

    #[test]
    fn non_finite_probability_is_rejected() {
        let task = Task::new(
            two_states(),
            vec![Transition {
                source: StateId(0),
                probability: f64::NAN,
                ..Transition::default()
            }],
            5,
        );
        assert!(matches!(
            task.resolve(),
            Err(TaskError::NonFiniteNumber {
                field: "probability",
                ..
            })
        ));
    }

    #[test]
    fn negative_initial_count_is_rejected() {
        let task = Task::new(vec![State::new(0, "a", -1.0)], Vec::new(), 5);
        assert!(matches!(
            task.resolve(),
            Err(TaskError::NegativeInitialCount { .. })
        ));
    }

    #[test]
    fn max_delay_over_both_endpoints() {
        let task = Task::new(
            two_states(),
            vec![
                Transition {
                    source: StateId(0),
                    source_delay: 2,
                    operand_delay: 7,
                    ..Transition::default()
                },
                Transition {
                    source: StateId(1),
                    source_delay: 4,
                    ..Transition::default()
                },
            ],
            5,
        );
        assert_eq!(task.max_delay(), 7);
    }

    #[test]
    fn task_serde_round_trip() {
        let task = Task::new(two_states(), Vec::new(), 10);
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.states.len(), 2);
        assert_eq!(back.steps_count, 10);
    }
}
