// ABOUTME: Publish and fetch of export documents through an object store.
// ABOUTME: Publishes return a content digest that consumers can demand on fetch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use super::codec::ExportDocument;
use super::error::{ExchangeError, StaleReason};
use super::store::{JSON_CONTENT_TYPE, Location, ObjectStore};

/// What a publish wrote and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    pub location: String,
    /// `sha256:<hex>` of the exact bytes written.
    pub digest: String,
    pub bytes: usize,
    pub keys: usize,
    pub published_at: DateTime<Utc>,
    pub publisher: String,
}

/// A decoded document plus what is known about its provenance.
#[derive(Debug, Clone)]
pub struct FetchedExports {
    pub document: ExportDocument,
    pub digest: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Preconditions a consumer places on the document it fetches.
///
/// The default accepts whatever is published, matching the historical
/// behaviour where producer/consumer ordering is purely operational.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Freshness {
    pub expected_digest: Option<String>,
    pub max_age: Option<Duration>,
}

impl Freshness {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn digest(mut self, digest: impl Into<String>) -> Self {
        self.expected_digest = Some(digest.into());
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    fn check(&self, fetched: &FetchedExports, now: DateTime<Utc>) -> Result<(), StaleReason> {
        if let Some(ref expected) = self.expected_digest
            && *expected != fetched.digest
        {
            return Err(StaleReason::DigestMismatch {
                expected: expected.clone(),
                actual: fetched.digest.clone(),
            });
        }

        if let Some(max_age) = self.max_age {
            let written = fetched.last_modified.ok_or(StaleReason::UnknownAge)?;
            // Clock skew can put the write in the future; treat that as brand new.
            let age = (now - written).to_std().unwrap_or(Duration::ZERO);
            if age > max_age {
                return Err(StaleReason::TooOld { age, max_age });
            }
        }

        Ok(())
    }
}

/// `sha256:<hex>` content digest.
pub fn content_digest(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// The shared side channel between producer and consumer stacks.
#[derive(Clone)]
pub struct StateExchange {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for StateExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateExchange")
            .field("backend", &self.store.backend())
            .finish()
    }
}

impl StateExchange {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Encode and upload, replacing whatever was at `location`.
    ///
    /// There is no concurrency check; concurrent producers race and the last
    /// write wins.
    pub async fn publish(
        &self,
        location: &Location,
        document: &ExportDocument,
    ) -> Result<PublishReceipt, ExchangeError> {
        let body = document.encode()?;
        let receipt = PublishReceipt {
            location: location.to_string(),
            digest: content_digest(&body),
            bytes: body.len(),
            keys: document.len(),
            published_at: Utc::now(),
            publisher: gethostname::gethostname().to_string_lossy().into_owned(),
        };

        tracing::info!(
            %location,
            backend = self.store.backend(),
            digest = %receipt.digest,
            keys = receipt.keys,
            "publishing exports"
        );
        self.store.put(location, body, JSON_CONTENT_TYPE).await?;
        Ok(receipt)
    }

    /// Download and decode whatever is currently published.
    pub async fn fetch(&self, location: &Location) -> Result<FetchedExports, ExchangeError> {
        let object = self.store.get(location).await?;
        let digest = content_digest(&object.body);
        let document =
            ExportDocument::decode(&object.body).map_err(|source| ExchangeError::Parse {
                location: location.clone(),
                source,
            })?;

        tracing::info!(%location, %digest, keys = document.len(), "fetched exports");
        Ok(FetchedExports {
            document,
            digest,
            last_modified: object.last_modified,
        })
    }

    /// Fetch and enforce `freshness`.
    pub async fn fetch_checked(
        &self,
        location: &Location,
        freshness: &Freshness,
    ) -> Result<FetchedExports, ExchangeError> {
        let fetched = self.fetch(location).await?;
        freshness
            .check(&fetched, Utc::now())
            .map_err(|reason| ExchangeError::Stale {
                location: location.clone(),
                reason,
            })?;
        Ok(fetched)
    }
}
