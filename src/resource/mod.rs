// ABOUTME: Imperative update resource: pushes a new image into an existing function.
// ABOUTME: Lifecycle is type-state; records persist through the ledger.

mod ledger;
mod lifecycle;
mod mutation;
mod request;

pub use ledger::{EntryStatus, LEDGER_BUCKET, LedgerEntry, LedgerError, RecordLedger};
pub use lifecycle::{
    Absent, Applied, ApplyError, Lifecycle, Orphaned, TransitionResult, UpdateResource,
};
pub use mutation::{AwsCliMutation, ExternalCallError, ExternalMutation};
pub use request::{IdempotencyMarker, MalformedRequest, UpdateRecord, UpdateRequest};
