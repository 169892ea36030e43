//! Transition rules: how population flows between states each step.

use serde::{Deserialize, Serialize};

use crate::state::StateId;

/// The form of the flow-rate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Flow proportional to the limiting count.
    Linear,
    /// Mass-action flow normalized by the total population.
    Solute,
    /// Mass-action flow normalized by the participating counts.
    Blend,
}

/// The commit policy: how the computed flow is debited from its inputs
/// and how probability composes with the operand density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionMode {
    /// Debit the operand, credit the result.
    Simple,
    /// Credit the result without touching the operand.
    Retaining,
    /// Debit both source and operand.
    Removing,
    /// The operand density suppresses the flow before probability.
    Inhibitor,
    /// The flow is the operand density left over after probability.
    Residual,
}

/// An immutable population-flow rule.
///
/// Any of the three endpoints may be [`StateId::EXTERNAL`], making the
/// rule draw from or discard into the open world. Delays are lookbacks in
/// steps applied to the source/operand reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub source: StateId,
    pub operand: StateId,
    pub result: StateId,
    pub source_coefficient: f64,
    pub operand_coefficient: f64,
    pub result_coefficient: f64,
    pub source_delay: u32,
    pub operand_delay: u32,
    /// Scalar in `[0, 1]` in normal use; deliberately not range-checked.
    pub probability: f64,
    pub kind: TransitionKind,
    pub mode: TransitionMode,
}

impl Default for Transition {
    fn default() -> Self {
        Self {
            source: StateId::EXTERNAL,
            operand: StateId::EXTERNAL,
            result: StateId::EXTERNAL,
            source_coefficient: 1.0,
            operand_coefficient: 1.0,
            result_coefficient: 1.0,
            source_delay: 0,
            operand_delay: 0,
            probability: 1.0,
            kind: TransitionKind::Linear,
            mode: TransitionMode::Simple,
        }
    }
}
