// ABOUTME: Library root for stacklink - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod credentials;
pub mod diagnostics;
pub mod error;
pub mod exchange;
pub mod gateway;
pub mod image;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod resource;
pub mod types;
