//! Error types for task validation, the numeric kernel, and the engine.

/// Errors detected while validating a [`Task`](crate::task::Task) at engine
/// construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    /// A transition references a state id that is neither a declared state
    /// nor the external sentinel.
    #[error("transition {index} references unknown state id {id}")]
    UnknownState { index: usize, id: i32 },

    /// A transition carries a negative coefficient.
    #[error("transition {index} has a negative {field} coefficient")]
    NegativeCoefficient { index: usize, field: &'static str },

    /// A transition carries a NaN or infinite numeric field.
    #[error("transition {index} has a non-finite {field}")]
    NonFiniteNumber { index: usize, field: &'static str },

    /// A state's initial count is negative.
    #[error("state '{name}' has a negative initial count")]
    NegativeInitialCount { name: String },

    /// A state's initial count is NaN or infinite.
    #[error("state '{name}' has a non-finite initial count")]
    NonFiniteInitialCount { name: String },
}

/// Domain errors raised by the arbitrary-precision kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NumericError {
    /// Decimal division with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// Natural logarithm of a non-positive value.
    #[error("natural logarithm is defined only for positive values")]
    LogNonPositive,
}

/// Engine-level failures surfaced by [`Engine`](crate::engine::Engine).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The task failed validation at construction.
    #[error("invalid task: {0}")]
    InvalidTask(#[from] TaskError),

    /// A transition evaluation hit a kernel domain error.
    #[error(transparent)]
    Numeric(#[from] NumericError),

    /// A worker thread or the worker pool failed.
    #[error("worker failure: {0}")]
    Worker(String),
}
