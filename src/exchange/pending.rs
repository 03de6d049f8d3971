// ABOUTME: Export entries whose values are still deferred.
// ABOUTME: Resolves into an ExportDocument only once every entry has resolved.

use serde_json::Value;

use super::codec::ExportDocument;
use crate::orchestrator::{Deferred, OrderingError, StepBuilder, StepContext};

enum Entry {
    Value { key: String, value: Deferred<Value> },
    Merge(Deferred<ExportDocument>),
}

/// Exports collected while a plan is being declared.
///
/// There is no way to encode a `PendingExports` directly: it must first be
/// resolved inside a step that depends on every entry, which yields a plain
/// [`ExportDocument`]. Unresolved placeholders therefore never reach the wire.
#[derive(Default)]
pub struct PendingExports {
    entries: Vec<Entry>,
}

impl PendingExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a single deferred value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: Deferred<Value>) {
        self.entries.push(Entry::Value {
            key: key.into(),
            value,
        });
    }

    /// Export a value that is already known.
    pub fn insert_known(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = Deferred::known(&key, value.into());
        self.insert(key, value);
    }

    /// Export every key of a deferred document, in its order.
    pub fn merge(&mut self, document: Deferred<ExportDocument>) {
        self.entries.push(Entry::Merge(document));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a data edge from every entry's producer to the step being declared.
    pub fn wire<'p>(&self, mut step: StepBuilder<'p>) -> StepBuilder<'p> {
        for entry in &self.entries {
            step = match entry {
                Entry::Value { value, .. } => step.reads(value),
                Entry::Merge(document) => step.reads(document),
            };
        }
        step
    }

    /// Collect the resolved values, in declaration order.
    pub fn resolve(&self, ctx: &StepContext) -> Result<ExportDocument, OrderingError> {
        let mut document = ExportDocument::new();
        for entry in &self.entries {
            match entry {
                Entry::Value { key, value } => {
                    document.insert(key.clone(), ctx.read(value)?.clone());
                }
                Entry::Merge(merged) => document.extend(ctx.read(merged)?.clone()),
            }
        }
        Ok(document)
    }
}

impl std::fmt::Debug for PendingExports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingExports")
            .field("entries", &self.entries.len())
            .finish()
    }
}
