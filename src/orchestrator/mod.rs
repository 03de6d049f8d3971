// ABOUTME: Dependency orchestration for producer and consumer runs.
// ABOUTME: Steps thread deferred values; edges are recorded, never implied by timing.

mod deferred;
mod error;
mod plan;

pub use deferred::{Deferred, StepId};
pub use error::{ConvergeError, OrderingError};
pub use plan::{ConvergeReport, EdgeKind, Plan, StepBuilder, StepContext, StepKind};
