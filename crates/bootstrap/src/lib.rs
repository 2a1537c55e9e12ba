//! Private inference stack bootstrap.
//!
//! Brings up an Ollama model server on EKS behind an Istio gateway, then wires
//! a Kong Konnect Dedicated Cloud Gateway to it over an AWS Transit Gateway
//! shared through RAM. Every stage checks remote state before acting, so a
//! re-run after a partial failure converges instead of duplicating resources.
//!
//! # Example
//!
//! ```ignore
//! use inference_bootstrap::{Backends, BootstrapConfig, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BootstrapConfig::with_defaults("ollama-eks".into());
//!     let mut orchestrator = Orchestrator::new(config, backends)?;
//!     orchestrator.run_to_completion().await?;
//!     Ok(())
//! }
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]
// Allow async functions that don't use await
#![allow(clippy::unused_async)]
#![allow(clippy::module_name_repetitions)]

pub mod attachment;
pub mod aws;
pub mod cloud_gateway;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod deck;
pub mod endpoint;
pub mod error;
pub mod exec;
pub mod gate;
pub mod gitops;
pub mod grant;
pub mod infra;
pub mod ollama;
pub mod orchestrator;
pub mod poll;
pub mod portforward;
pub mod reconcile;
pub mod state;
pub mod tls;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types at the crate root
pub use config::BootstrapConfig;
pub use error::BootstrapError;
pub use orchestrator::{Backends, Orchestrator};
pub use state::{BootstrapState, Stage};
