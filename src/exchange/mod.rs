// ABOUTME: Cross-stack state exchange: export documents in a shared object store.
// ABOUTME: Codec, storage backends, schema, and the publish/fetch pair.

mod aws;
mod codec;
mod error;
mod pending;
mod schema;
mod state;
mod store;

pub use aws::AwsCliStore;
pub use codec::{ExportDocument, ParseError, SchemaError};
pub use error::{ExchangeError, StaleReason};
pub use pending::PendingExports;
pub use schema::ExportKeys;
pub use state::{FetchedExports, Freshness, PublishReceipt, StateExchange, content_digest};
pub use store::{
    DEFAULT_EXPORTS_KEY, FileStore, JSON_CONTENT_TYPE, Location, MemoryStore, ObjectStore,
    StoreError, StoredObject,
};
