// ABOUTME: Shared helper for building stores and external clients from config.
// ABOUTME: Keeps backend selection identical across publish, fetch, deploy, and remove.

use std::sync::Arc;

use stacklink::config::{Backend, Config};
use stacklink::credentials::AwsCliTokenIssuer;
use stacklink::error::Result;
use stacklink::exchange::{AwsCliStore, FileStore, ObjectStore, StateExchange};
use stacklink::image::DockerCli;
use stacklink::pipeline::ConsumerDeps;
use stacklink::resource::{AwsCliMutation, RecordLedger};

pub fn exchange(config: &Config) -> Result<StateExchange> {
    let store: Arc<dyn ObjectStore> = match config.exchange.backend {
        Backend::Aws => Arc::new(
            AwsCliStore::new(Some(config.region()?)).timeout(config.command_timeout),
        ),
        Backend::Local => Arc::new(FileStore::new(&config.exchange.root)),
    };
    Ok(StateExchange::new(store))
}

pub fn ledger(config: &Config) -> RecordLedger {
    RecordLedger::new(Arc::new(FileStore::new(&config.update.state_dir)))
}

pub fn mutation(config: &Config) -> AwsCliMutation {
    AwsCliMutation::new().timeout(config.command_timeout)
}

pub fn consumer_deps(config: &Config) -> Result<ConsumerDeps> {
    Ok(ConsumerDeps {
        exchange: exchange(config)?,
        issuer: Arc::new(AwsCliTokenIssuer::new(config.region()?).timeout(config.command_timeout)),
        publisher: Arc::new(DockerCli::new().timeout(config.command_timeout)),
        mutation: Arc::new(mutation(config)),
        ledger: ledger(config),
    })
}
