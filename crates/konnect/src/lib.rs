//! Kong Konnect API client.
//!
//! Covers the subset of the Konnect API needed to stand up a Dedicated Cloud
//! Gateway that reaches a private workload over an AWS Transit Gateway:
//!
//! - **Control planes** - regional `/v2/control-planes`
//! - **Cloud gateway networks** - global `/v2/cloud-gateways/networks`
//! - **Transit gateway attachments** - per-network `transit-gateways`
//! - **Provider accounts** - Kong's own AWS account for the RAM share principal
//! - **Configurations** - data plane group placement
//!
//! Create calls never fail on a name collision. They return
//! [`CreateOutcome::Conflict`] so the caller can adopt the existing resource.
//!
//! # Example
//!
//! ```rust,ignore
//! use konnect::{ControlPlaneApi, CreateControlPlaneRequest, CreateOutcome, Konnect};
//!
//! let api = Konnect::new("kpat_xxx", "us")?;
//! match api.create_control_plane(&CreateControlPlaneRequest::cloud_gateway("cp-a")).await? {
//!     CreateOutcome::Created(cp) => println!("created {}", cp.id),
//!     CreateOutcome::Conflict { .. } => println!("cp-a already exists"),
//! }
//! ```

#![allow(clippy::module_name_repetitions)]

mod client;
pub mod models;
mod traits;

pub use client::Konnect;
pub use models::*;
pub use traits::{ControlPlaneApi, CreateOutcome, KonnectError, NamedResource};
