// ABOUTME: Desired state for an imperative function update and the record it leaves.
// ABOUTME: Requests are built fresh per apply; records carry the persisted identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{
    FunctionName, FunctionNameError, ImageRef, ParseImageRefError, RecordId, Region, RegionError,
};

/// A request field failed validation.
#[derive(Debug, thiserror::Error)]
pub enum MalformedRequest {
    #[error("invalid target: {0}")]
    Target(#[from] FunctionNameError),

    #[error("invalid image reference: {0}")]
    Image(#[from] ParseImageRefError),

    #[error("invalid region: {0}")]
    Region(#[from] RegionError),
}

/// Distinguishes one apply from another. Derived from the apply time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyMarker(String);

impl IdempotencyMarker {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        Self(time.format("%Y%m%dT%H%M%S%3fZ").to_string())
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point `target` at `image` in `region`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub target: FunctionName,
    pub image: ImageRef,
    pub region: Region,
    pub marker: IdempotencyMarker,
}

impl UpdateRequest {
    pub fn new(target: FunctionName, image: ImageRef, region: Region) -> Self {
        Self {
            target,
            image,
            region,
            marker: IdempotencyMarker::now(),
        }
    }

    /// Validate raw fields, typically values resolved from an export document.
    pub fn parse(target: &str, image: &str, region: &str) -> Result<Self, MalformedRequest> {
        Ok(Self::new(
            FunctionName::new(target)?,
            ImageRef::parse(image)?,
            Region::new(region)?,
        ))
    }

    pub fn with_marker(mut self, marker: IdempotencyMarker) -> Self {
        self.marker = marker;
        self
    }
}

/// Identity and last-applied fields of an update resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub id: RecordId,
    pub target: FunctionName,
    pub image: ImageRef,
    pub region: Region,
    pub marker: IdempotencyMarker,
    pub applied_at: DateTime<Utc>,
    pub applied_by: String,
}

impl UpdateRecord {
    /// Record for the first successful apply; the id is `<target>_<marker>`.
    pub fn first(request: &UpdateRequest) -> Self {
        let id = RecordId::new(format!("{}_{}", request.target, request.marker));
        Self::with_id(id, request)
    }

    /// Record for a later apply. Keeps this record's id.
    pub fn superseding(&self, request: &UpdateRequest) -> Self {
        Self::with_id(self.id.clone(), request)
    }

    fn with_id(id: RecordId, request: &UpdateRequest) -> Self {
        Self {
            id,
            target: request.target.clone(),
            image: request.image.clone(),
            region: request.region.clone(),
            marker: request.marker.clone(),
            applied_at: Utc::now(),
            applied_by: gethostname::gethostname().to_string_lossy().into_owned(),
        }
    }

    /// Whether both records describe the same target state.
    pub fn same_target_state(&self, other: &UpdateRecord) -> bool {
        self.target == other.target && self.image == other.image && self.region == other.region
    }
}
