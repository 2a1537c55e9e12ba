//! API trait and common types for the Konnect control plane.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    ConfigurationRequest, ControlPlane, CreateControlPlaneRequest, CreateNetworkRequest,
    CreateTransitGatewayRequest, DataPlaneConfiguration, Network, ProviderAccount, TransitGateway,
};

/// Errors that can occur during Konnect operations.
#[derive(Error, Debug)]
pub enum KonnectError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response. `message` is the literal body.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Token rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KonnectError {
    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result of a create call.
///
/// A name collision is an expected outcome, not an error: the logical name is
/// the idempotency key and the caller adopts the existing resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome<T> {
    /// The resource was created.
    Created(T),
    /// The name is already taken (HTTP 409).
    Conflict {
        /// Literal response body.
        body: String,
    },
}

/// A remote resource identified by a caller-assigned name.
pub trait NamedResource {
    /// Remote identifier assigned by Konnect.
    fn id(&self) -> &str;
    /// Logical name assigned by the caller.
    fn name(&self) -> &str;
}

/// Operations against the Konnect control plane and cloud gateway APIs.
#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
    /// Create a control plane.
    async fn create_control_plane(
        &self,
        req: &CreateControlPlaneRequest,
    ) -> Result<CreateOutcome<ControlPlane>, KonnectError>;

    /// List control planes whose name equals `name`.
    async fn list_control_planes(&self, name: &str) -> Result<Vec<ControlPlane>, KonnectError>;

    /// Create a cloud gateway network.
    async fn create_network(
        &self,
        req: &CreateNetworkRequest,
    ) -> Result<CreateOutcome<Network>, KonnectError>;

    /// List networks whose name equals `name`.
    async fn list_networks(&self, name: &str) -> Result<Vec<Network>, KonnectError>;

    /// Get a network by ID.
    async fn get_network(&self, id: &str) -> Result<Network, KonnectError>;

    /// Request a transit gateway attachment on a network.
    async fn create_transit_gateway(
        &self,
        network_id: &str,
        req: &CreateTransitGatewayRequest,
    ) -> Result<CreateOutcome<TransitGateway>, KonnectError>;

    /// List transit gateway attachments on a network whose name equals `name`.
    async fn list_transit_gateways(
        &self,
        network_id: &str,
        name: &str,
    ) -> Result<Vec<TransitGateway>, KonnectError>;

    /// Get a transit gateway attachment by ID.
    async fn get_transit_gateway(
        &self,
        network_id: &str,
        id: &str,
    ) -> Result<TransitGateway, KonnectError>;

    /// List the cloud provider accounts Konnect provisions into.
    async fn list_provider_accounts(&self) -> Result<Vec<ProviderAccount>, KonnectError>;

    /// Put the data plane group configuration for a control plane.
    async fn put_configuration(
        &self,
        req: &ConfigurationRequest,
    ) -> Result<DataPlaneConfiguration, KonnectError>;
}
