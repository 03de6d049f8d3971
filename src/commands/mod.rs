// ABOUTME: Command module aggregator for the stacklink CLI.
// ABOUTME: Re-exports publish, fetch, deploy, remove, and status handlers.

mod backends;
mod deploy;
mod fetch;
mod publish;
mod remove;
mod status;

pub use deploy::deploy;
pub use fetch::fetch;
pub use publish::publish;
pub use remove::remove;
pub use status::status;
