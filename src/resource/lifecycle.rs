// ABOUTME: Type-state lifecycle of the imperative update resource.
// ABOUTME: Absent -> Applied on first apply, Applied -> Applied afterwards, removal orphans.

use super::mutation::{ExternalCallError, ExternalMutation};
use super::request::{IdempotencyMarker, UpdateRecord, UpdateRequest};
use crate::types::{ImageRef, ResourceName};

/// Never applied, or detached from an earlier record.
/// Available actions: `apply()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Absent;

/// Applied at least once.
/// Available actions: `apply()`, `remove()`
#[derive(Debug, Clone)]
pub struct Applied {
    record: UpdateRecord,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("external update of '{resource}' failed: {source}")]
    External {
        resource: String,
        #[source]
        source: ExternalCallError,
    },
}

impl ApplyError {
    pub fn external_call(&self) -> &ExternalCallError {
        match self {
            ApplyError::External { source, .. } => source,
        }
    }
}

/// Result type for transitions; a failure hands back the resource unchanged.
pub type TransitionResult<T, S> = Result<UpdateResource<T>, (UpdateResource<S>, ApplyError)>;

/// An update resource parameterized by its lifecycle state.
#[derive(Debug, Clone)]
pub struct UpdateResource<S> {
    name: ResourceName,
    state: S,
}

impl<S> UpdateResource<S> {
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    async fn call<M>(&self, mutation: &M, request: &UpdateRequest) -> Result<(), ApplyError>
    where
        M: ExternalMutation + ?Sized,
    {
        mutation
            .update_function_image(request)
            .await
            .map_err(|source| ApplyError::External {
                resource: self.name.to_string(),
                source,
            })
    }
}

impl UpdateResource<Absent> {
    pub fn new(name: ResourceName) -> Self {
        Self {
            name,
            state: Absent,
        }
    }

    /// Issue the external call and record the result.
    ///
    /// # Errors
    ///
    /// Returns the resource still `Absent` if the external call fails.
    pub async fn apply<M>(
        self,
        mutation: &M,
        request: &UpdateRequest,
    ) -> TransitionResult<Applied, Absent>
    where
        M: ExternalMutation + ?Sized,
    {
        if let Err(e) = self.call(mutation, request).await {
            return Err((self, e));
        }
        let record = UpdateRecord::first(request);
        tracing::info!(resource = %self.name, id = %record.id, "update resource applied");
        Ok(UpdateResource {
            name: self.name,
            state: Applied { record },
        })
    }
}

impl UpdateResource<Applied> {
    /// Rehydrate from a persisted record.
    pub fn from_record(name: ResourceName, record: UpdateRecord) -> Self {
        Self {
            name,
            state: Applied { record },
        }
    }

    /// The last known-good record.
    pub fn record(&self) -> &UpdateRecord {
        &self.state.record
    }

    pub fn into_record(self) -> UpdateRecord {
        self.state.record
    }

    /// Re-apply with new fields. The call is issued even when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns the resource with its previous record if the external call fails.
    pub async fn apply<M>(
        self,
        mutation: &M,
        request: &UpdateRequest,
    ) -> TransitionResult<Applied, Applied>
    where
        M: ExternalMutation + ?Sized,
    {
        if let Err(e) = self.call(mutation, request).await {
            return Err((self, e));
        }
        let record = self.state.record.superseding(request);
        tracing::info!(
            resource = %self.name,
            id = %record.id,
            image = %record.image,
            "update resource re-applied"
        );
        Ok(UpdateResource {
            name: self.name,
            state: Applied { record },
        })
    }

    /// Drop the resource from the declared graph.
    ///
    /// Nothing external happens here. The function keeps the last image it
    /// was given; the returned [`Orphaned`] has to be settled explicitly.
    pub fn remove(self) -> Orphaned {
        tracing::warn!(
            resource = %self.name,
            function = %self.state.record.target,
            "update resource removed; external target keeps its last applied image"
        );
        Orphaned {
            name: self.name,
            record: self.state.record,
        }
    }
}

/// A removed resource whose external effect is still in place.
#[derive(Debug)]
#[must_use = "an orphaned update must be acknowledged or compensated"]
pub struct Orphaned {
    name: ResourceName,
    record: UpdateRecord,
}

impl Orphaned {
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    pub fn record(&self) -> &UpdateRecord {
        &self.record
    }

    /// Leave the external target as it is.
    pub fn acknowledge(self) -> UpdateRecord {
        tracing::info!(resource = %self.name, id = %self.record.id, "orphaned update acknowledged");
        self.record
    }

    /// Point the target at `image` before letting go.
    ///
    /// # Errors
    ///
    /// Returns the orphan untouched if the compensating call fails.
    pub async fn compensate<M>(
        self,
        mutation: &M,
        image: ImageRef,
    ) -> Result<UpdateRecord, (Orphaned, ApplyError)>
    where
        M: ExternalMutation + ?Sized,
    {
        let request = UpdateRequest {
            target: self.record.target.clone(),
            image,
            region: self.record.region.clone(),
            marker: IdempotencyMarker::now(),
        };
        if let Err(source) = mutation.update_function_image(&request).await {
            let err = ApplyError::External {
                resource: self.name.to_string(),
                source,
            };
            return Err((self, err));
        }
        tracing::info!(resource = %self.name, image = %request.image, "orphaned update compensated");
        Ok(self.record.superseding(&request))
    }
}

/// Either lifecycle state, for callers that only learn it at runtime.
#[derive(Debug, Clone)]
pub enum Lifecycle {
    Absent(UpdateResource<Absent>),
    Applied(UpdateResource<Applied>),
}

impl Lifecycle {
    pub fn name(&self) -> &ResourceName {
        match self {
            Lifecycle::Absent(r) => r.name(),
            Lifecycle::Applied(r) => r.name(),
        }
    }

    pub fn record(&self) -> Option<&UpdateRecord> {
        match self {
            Lifecycle::Absent(_) => None,
            Lifecycle::Applied(r) => Some(r.record()),
        }
    }

    /// Apply from whichever state the resource is in.
    pub async fn apply<M>(
        self,
        mutation: &M,
        request: &UpdateRequest,
    ) -> Result<UpdateResource<Applied>, (Lifecycle, ApplyError)>
    where
        M: ExternalMutation + ?Sized,
    {
        match self {
            Lifecycle::Absent(r) => r
                .apply(mutation, request)
                .await
                .map_err(|(r, e)| (Lifecycle::Absent(r), e)),
            Lifecycle::Applied(r) => r
                .apply(mutation, request)
                .await
                .map_err(|(r, e)| (Lifecycle::Applied(r), e)),
        }
    }
}
