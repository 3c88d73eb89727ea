//! Server crate for the ShelfRecs book recommendation service.
//!
//! This crate contains the orchestrator that answers search requests,
//! the request gates that run in front of it, and the configuration
//! every component is built from.

pub mod config;
pub mod gates;
pub mod orchestrator;

pub use config::{Config, ConfigError};
pub use gates::{ProfanityGate, RateLimitGate, RequestGate};
pub use orchestrator::{BookSearchOrchestrator, OrchestratorBuilder};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
