// ABOUTME: Deferred values: outputs of plan steps that resolve during convergence.
// ABOUTME: Each value remembers the step that produces it so edges can be derived.

use std::fmt;
use std::sync::{Arc, OnceLock};

/// Identifies a step within one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId {
    pub(crate) plan: u64,
    pub(crate) index: usize,
}

impl StepId {
    /// Sentinel producer for values known before the plan runs.
    pub(crate) const KNOWN: StepId = StepId {
        plan: 0,
        index: usize::MAX,
    };

    pub(crate) fn is_known(&self) -> bool {
        *self == Self::KNOWN
    }
}

/// A value produced by a plan step, unknown until that step completes.
///
/// Clones share the same slot. Reading goes through
/// [`StepContext::read`](super::StepContext::read), which refuses values
/// whose producer is not an ancestor of the reading step.
pub struct Deferred<T> {
    producer: StepId,
    label: Arc<str>,
    slot: Arc<OnceLock<T>>,
}

impl<T> Deferred<T> {
    pub(crate) fn pending(producer: StepId, label: &str) -> Self {
        Self {
            producer,
            label: Arc::from(label),
            slot: Arc::new(OnceLock::new()),
        }
    }

    /// A value that is already known when the plan is declared.
    pub fn known(label: &str, value: T) -> Self {
        let slot = OnceLock::new();
        let _ = slot.set(value);
        Self {
            producer: StepId::KNOWN,
            label: Arc::from(label),
            slot: Arc::new(slot),
        }
    }

    pub fn producer(&self) -> StepId {
        self.producer
    }

    /// Name of the producing step (or of the known value).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The resolved value, for use after convergence has finished.
    pub fn get(&self) -> Option<&T> {
        self.slot.get()
    }

    pub(crate) fn fulfil(&self, value: T) -> bool {
        self.slot.set(value).is_ok()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer,
            label: Arc::clone(&self.label),
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("label", &self.label)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
