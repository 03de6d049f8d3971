// ABOUTME: Persistence of update records, one JSON object per resource name.
// ABOUTME: Entries are marked Detached on removal instead of being deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::lifecycle::{Lifecycle, UpdateResource};
use super::request::UpdateRecord;
use crate::exchange::{JSON_CONTENT_TYPE, Location, ObjectStore, StoreError};
use crate::types::ResourceName;

pub const LEDGER_BUCKET: &str = "stacklink-state";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Part of the declared graph.
    Active,
    /// Removed from the declared graph; the record is kept for history.
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub resource: ResourceName,
    pub status: EntryStatus,
    pub record: UpdateRecord,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn active(resource: ResourceName, record: UpdateRecord) -> Self {
        Self {
            resource,
            status: EntryStatus::Active,
            record,
            updated_at: Utc::now(),
        }
    }

    pub fn detached(resource: ResourceName, record: UpdateRecord) -> Self {
        Self {
            status: EntryStatus::Detached,
            ..Self::active(resource, record)
        }
    }

    /// Lifecycle state for a resource declared again. Detached entries start over.
    pub fn into_lifecycle(self) -> Lifecycle {
        match self.status {
            EntryStatus::Active => {
                Lifecycle::Applied(UpdateResource::from_record(self.resource, self.record))
            }
            EntryStatus::Detached => Lifecycle::Absent(UpdateResource::new(self.resource)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger entry at {location} is unreadable: {source}")]
    Corrupt {
        location: Location,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode ledger entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Update records keyed by resource name.
#[derive(Clone)]
pub struct RecordLedger {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl std::fmt::Debug for RecordLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLedger")
            .field("backend", &self.store.backend())
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl RecordLedger {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            bucket: LEDGER_BUCKET.to_string(),
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    fn location(&self, resource: &ResourceName) -> Result<Location, StoreError> {
        Location::new(&self.bucket, format!("records/{resource}.json"))
    }

    pub async fn load(&self, resource: &ResourceName) -> Result<Option<LedgerEntry>, LedgerError> {
        let location = self.location(resource)?;
        let object = match self.store.get(&location).await {
            Ok(object) => object,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry = serde_json::from_slice(&object.body)
            .map_err(|source| LedgerError::Corrupt { location, source })?;
        Ok(Some(entry))
    }

    /// Current lifecycle of `resource`; `Absent` when nothing is recorded.
    pub async fn lifecycle(&self, resource: &ResourceName) -> Result<Lifecycle, LedgerError> {
        Ok(match self.load(resource).await? {
            Some(entry) => entry.into_lifecycle(),
            None => Lifecycle::Absent(UpdateResource::new(resource.clone())),
        })
    }

    pub async fn save(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let location = self.location(&entry.resource)?;
        let body = serde_json::to_vec_pretty(entry)?;
        tracing::debug!(%location, status = ?entry.status, id = %entry.record.id, "saving ledger entry");
        self.store.put(&location, body, JSON_CONTENT_TYPE).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MemoryStore;
    use crate::resource::UpdateRequest;

    fn record() -> UpdateRecord {
        UpdateRecord::first(&UpdateRequest::parse("f1", "repo:v2", "r1").unwrap())
    }

    #[tokio::test]
    async fn missing_entry_is_absent() {
        let ledger = RecordLedger::new(Arc::new(MemoryStore::new()));
        let name = ResourceName::new("image-update").unwrap();
        assert!(ledger.load(&name).await.unwrap().is_none());
        assert!(matches!(
            ledger.lifecycle(&name).await.unwrap(),
            Lifecycle::Absent(_)
        ));
    }

    #[tokio::test]
    async fn saved_entry_loads_back() {
        let ledger = RecordLedger::new(Arc::new(MemoryStore::new()));
        let name = ResourceName::new("image-update").unwrap();
        let entry = LedgerEntry::active(name.clone(), record());
        ledger.save(&entry).await.unwrap();
        assert_eq!(ledger.load(&name).await.unwrap(), Some(entry));
        assert!(matches!(
            ledger.lifecycle(&name).await.unwrap(),
            Lifecycle::Applied(_)
        ));
    }

    #[tokio::test]
    async fn detached_entry_starts_over() {
        let ledger = RecordLedger::new(Arc::new(MemoryStore::new()));
        let name = ResourceName::new("image-update").unwrap();
        ledger
            .save(&LedgerEntry::detached(name.clone(), record()))
            .await
            .unwrap();
        assert!(matches!(
            ledger.lifecycle(&name).await.unwrap(),
            Lifecycle::Absent(_)
        ));
    }
}
