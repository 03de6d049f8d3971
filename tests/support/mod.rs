// ABOUTME: Test support utilities.
// ABOUTME: Fake token issuer, image publisher and recording mutation for pipeline tests.

use async_trait::async_trait;
use base64::Engine;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

use stacklink::credentials::{CredentialBundle, RegistryToken, TokenIssueError, TokenIssuer};
use stacklink::exchange::{
    ExportDocument, ExportKeys, Freshness, Location, MemoryStore, ObjectStore, StateExchange,
    StoreError, StoredObject,
};
use stacklink::image::{ImageBuild, ImageError, ImagePublisher, PushedImage};
use stacklink::pipeline::{ConsumerDeps, ConsumerSettings, ImageSettings};
use stacklink::resource::{ExternalCallError, ExternalMutation, RecordLedger, UpdateRequest};
use stacklink::types::{ImageDigest, Region, RegistryId, ResourceName};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("stacklink=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub const REGISTRY: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com";
#[allow(dead_code)]
pub const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:f1";

/// A complete export document as the producer stack writes it.
#[allow(dead_code)]
pub fn full_exports() -> ExportDocument {
    let keys = ExportKeys::default();
    ExportDocument::from_iter([
        (keys.repository_url, format!("{REGISTRY}/app")),
        (keys.registry_id, "123456789012".to_string()),
        (keys.function_name, "f1".to_string()),
        (keys.function_arn, FUNCTION_ARN.to_string()),
        (keys.role_arn, "arn:x".to_string()),
        (keys.bucket_name, "app-bucket".to_string()),
    ])
}

#[allow(dead_code)]
pub fn exports_location() -> Location {
    Location::new("shared-exports", "pulumi-exports.json").unwrap()
}

/// Records every request; optionally fails every call.
#[derive(Default)]
pub struct RecordingMutation {
    requests: Mutex<Vec<UpdateRequest>>,
    fail: bool,
}

#[allow(dead_code)]
impl RecordingMutation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<UpdateRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ExternalMutation for RecordingMutation {
    async fn update_function_image(&self, request: &UpdateRequest) -> Result<(), ExternalCallError> {
        self.requests.lock().push(request.clone());
        if self.fail {
            return Err(ExternalCallError::Rejected("function is being updated".to_string()));
        }
        Ok(())
    }
}

/// Holds nothing and refuses every write.
pub struct RejectingStore;

#[async_trait]
impl ObjectStore for RejectingStore {
    fn backend(&self) -> &'static str {
        "rejecting"
    }

    async fn put(
        &self,
        location: &Location,
        _body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend {
            location: location.clone(),
            message: "access denied".to_string(),
        })
    }

    async fn get(&self, location: &Location) -> Result<StoredObject, StoreError> {
        Err(StoreError::NotFound(location.clone()))
    }
}

/// Issues a fixed `AWS:<password>` token.
pub struct FakeIssuer {
    token: String,
    pub issued: AtomicUsize,
}

#[allow(dead_code)]
impl FakeIssuer {
    pub fn new() -> Arc<Self> {
        Self::with_decoded("AWS:registry-password")
    }

    pub fn with_decoded(decoded: &str) -> Arc<Self> {
        Arc::new(Self {
            token: base64::engine::general_purpose::STANDARD.encode(decoded),
            issued: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TokenIssuer for FakeIssuer {
    async fn issue(&self, _registry: &RegistryId) -> Result<RegistryToken, TokenIssueError> {
        self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(RegistryToken {
            token: self.token.clone(),
            server: REGISTRY.to_string(),
            expires_at: None,
        })
    }
}

/// Pretends to build and push, returning a fixed digest.
#[derive(Default)]
pub struct FakePublisher {
    builds: Mutex<Vec<(ImageBuild, String)>>,
}

#[allow(dead_code)]
impl FakePublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Images pushed, with the username used to log in.
    pub fn pushes(&self) -> Vec<(String, String)> {
        self.builds
            .lock()
            .iter()
            .map(|(build, user)| (build.image.to_string(), user.clone()))
            .collect()
    }

    /// Whether each push asked for the registry digest.
    pub fn digest_required(&self) -> Vec<bool> {
        self.builds.lock().iter().map(|(build, _)| build.require_digest).collect()
    }
}

#[async_trait]
impl ImagePublisher for FakePublisher {
    async fn publish(
        &self,
        build: &ImageBuild,
        credentials: &CredentialBundle,
    ) -> Result<PushedImage, ImageError> {
        self.builds
            .lock()
            .push((build.clone(), credentials.username.clone()));
        Ok(PushedImage {
            image: build.image.clone(),
            digest: Some(ImageDigest::new("sha256:feedface")),
        })
    }
}

/// A consumer wired to in-memory stores and fakes.
#[allow(dead_code)]
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub state: Arc<MemoryStore>,
    pub issuer: Arc<FakeIssuer>,
    pub publisher: Arc<FakePublisher>,
    pub mutation: Arc<RecordingMutation>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_mutation(RecordingMutation::new())
    }

    pub fn with_mutation(mutation: Arc<RecordingMutation>) -> Self {
        init_tracing();
        Self {
            store: Arc::new(MemoryStore::new()),
            state: Arc::new(MemoryStore::new()),
            issuer: FakeIssuer::new(),
            publisher: FakePublisher::new(),
            mutation,
        }
    }

    pub fn exchange(&self) -> StateExchange {
        StateExchange::new(self.store.clone())
    }

    pub fn ledger(&self) -> RecordLedger {
        RecordLedger::new(self.state.clone())
    }

    pub fn deps(&self) -> ConsumerDeps {
        ConsumerDeps {
            exchange: self.exchange(),
            issuer: self.issuer.clone(),
            publisher: self.publisher.clone(),
            mutation: self.mutation.clone(),
            ledger: self.ledger(),
        }
    }

    pub fn settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            location: exports_location(),
            freshness: Freshness::any(),
            keys: ExportKeys::default(),
            region: Region::new("us-east-1").unwrap(),
            image: ImageSettings {
                repository: None,
                tag: "v2".to_string(),
                context: ".".into(),
                dockerfile: None,
                pin_digest: false,
            },
            resource: ResourceName::new("function-image").unwrap(),
            gateway: None,
        }
    }
}
