use chainlace_core::{Digit, Position};

/// Errors surfaced by the chaining engine.
///
/// Only [`Cancelled`](EngineError::Cancelled) is recoverable above the engine
/// boundary; the other kinds indicate violated invariants and should be
/// treated as bugs by callers.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
pub enum EngineError {
    /// An elimination expected in the accumulated off-set was not found while
    /// recovering hidden or rule parents. The implication graph would be
    /// missing a premise, so the engine aborts instead of emitting an
    /// unjustifiable hint.
    #[display("no recorded elimination for candidate {digit} at {position}")]
    MissingParent {
        /// Cell of the missing off-potential.
        position: Position,
        /// Digit of the missing off-potential.
        digit: Digit,
    },
    /// The caller requested cancellation; the current rule was abandoned.
    #[display("chaining was cancelled")]
    Cancelled,
    /// A parallel worker could not be started or failed.
    #[display("parallel chaining worker failed: {_0}")]
    Worker(#[error(not(source))] String),
}
