// ABOUTME: Orchestrator errors with the SNAFU pattern.
// ABOUTME: Missing edges, foreign dependencies, and step failures during convergence.

use snafu::Snafu;

use crate::error::Error;

/// A step touched a value it is not ordered after.
///
/// Without an edge the producer may not have run yet, so the read is refused
/// instead of racing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    #[error(
        "step '{step}' reads the output of '{producer}' without depending on it; declare it with reads() or after()"
    )]
    MissingEdge { step: String, producer: String },

    #[error("output of '{producer}' was read before it resolved")]
    Unresolved { producer: String },
}

/// Failure of a whole convergence pass.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConvergeError {
    #[snafu(display("step '{step}' failed: {source}"))]
    StepFailed {
        step: String,
        /// Side-effecting steps that already completed. Their effects are not undone.
        fired: Vec<String>,
        source: Box<Error>,
    },

    #[snafu(display("step '{step}' depends on '{dependency}' from a different plan"))]
    ForeignDependency { step: String, dependency: String },

    #[snafu(display("step name '{name}' is declared twice"))]
    DuplicateStep { name: String },
}

impl ConvergeError {
    /// Name of the failing step, if a step failed.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            ConvergeError::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Side effects that completed before the pass aborted.
    pub fn fired_side_effects(&self) -> &[String] {
        match self {
            ConvergeError::StepFailed { fired, .. } => fired,
            _ => &[],
        }
    }
}
