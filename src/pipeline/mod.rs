// ABOUTME: Producer and consumer runs assembled as dependency-ordered plans.

mod consumer;
mod producer;

pub use consumer::{
    ConsumerDeps, ConsumerOutputs, ConsumerSettings, DeployOutcome, ImageSettings, consumer_plan,
    deploy,
};
pub use producer::{ProducerSettings, PublishOutcome, producer_plan, publish};
