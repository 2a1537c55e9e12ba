//! Konnect API request and response models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::traits::NamedResource;

// ============================================================================
// Common wrapper types
// ============================================================================

/// List response body.
///
/// Konnect wraps list results as `{"data": [...], "meta": {...}}`; some
/// endpoints and proxies return the bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListBody<T> {
    /// Paged envelope.
    Paged {
        /// Items on this page.
        data: Vec<T>,
    },
    /// Bare array.
    Bare(Vec<T>),
}

impl<T> ListBody<T> {
    /// Take the items out of either shape.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Paged { data } | Self::Bare(data) => data,
        }
    }
}

// ============================================================================
// Control planes
// ============================================================================

/// Control plane as returned by `/v2/control-planes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlane {
    /// Control plane ID.
    pub id: String,
    /// Control plane name (logical name).
    pub name: String,
    /// Control plane configuration.
    #[serde(default)]
    pub config: Option<ControlPlaneConfig>,
}

/// Control plane configuration details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// Control plane endpoint for data planes.
    #[serde(default)]
    pub control_plane_endpoint: Option<String>,
    /// Cluster type.
    #[serde(default)]
    pub cluster_type: Option<String>,
    /// Whether this control plane manages cloud gateways.
    #[serde(default)]
    pub cloud_gateway: bool,
}

impl NamedResource for ControlPlane {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Request to create a control plane.
#[derive(Debug, Clone, Serialize)]
pub struct CreateControlPlaneRequest {
    /// Logical name.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cluster type (`CLUSTER_TYPE_CONTROL_PLANE`).
    pub cluster_type: String,
    /// Whether this control plane manages cloud gateways.
    pub cloud_gateway: bool,
    /// Labels.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl CreateControlPlaneRequest {
    /// Request for a control plane backing Dedicated Cloud Gateways.
    #[must_use]
    pub fn cloud_gateway(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            cluster_type: "CLUSTER_TYPE_CONTROL_PLANE".to_string(),
            cloud_gateway: true,
            labels: BTreeMap::new(),
        }
    }

    /// Add a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Cloud gateway networks
// ============================================================================

/// Network lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    /// Network is being provisioned.
    Initializing,
    /// Network is provisioned but not serving.
    Offline,
    /// Network is ready.
    Ready,
    /// Network is being torn down.
    Terminating,
    /// Network is gone.
    Terminated,
    /// State not known to this client.
    #[serde(other)]
    Unknown,
}

impl NetworkState {
    /// Whether the network can never become ready without new action.
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Terminating | Self::Terminated)
    }
}

impl std::fmt::Display for NetworkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Offline => write!(f, "offline"),
            Self::Ready => write!(f, "ready"),
            Self::Terminating => write!(f, "terminating"),
            Self::Terminated => write!(f, "terminated"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Cloud gateway network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Network ID.
    pub id: String,
    /// Network name (logical name).
    pub name: String,
    /// Lifecycle state.
    #[serde(default = "unknown_network_state")]
    pub state: NetworkState,
    /// Konnect provider account ID the network lives in.
    #[serde(default)]
    pub cloud_gateway_provider_account_id: Option<String>,
    /// Provider region.
    #[serde(default)]
    pub region: Option<String>,
    /// Network CIDR.
    #[serde(default)]
    pub cidr_block: Option<String>,
}

fn unknown_network_state() -> NetworkState {
    NetworkState::Unknown
}

impl NamedResource for Network {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Request to create a cloud gateway network.
#[derive(Debug, Clone, Serialize)]
pub struct CreateNetworkRequest {
    /// Logical name.
    pub name: String,
    /// Konnect provider account ID.
    pub cloud_gateway_provider_account_id: String,
    /// Provider region (e.g., "us-west-2").
    pub region: String,
    /// Availability zone IDs (e.g., "usw2-az1").
    pub availability_zones: Vec<String>,
    /// Network CIDR; must not overlap the workload VPC.
    pub cidr_block: String,
}

// ============================================================================
// Transit gateway attachments
// ============================================================================

/// Transit gateway attachment lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttachmentState {
    /// Attachment requested, nothing provisioned yet.
    #[serde(alias = "created")]
    Requested,
    /// Attachment is being provisioned.
    Initializing,
    /// Waiting for the transit gateway owner to accept the attachment.
    #[serde(alias = "pendingAcceptance", alias = "pending_acceptance")]
    PendingAcceptance,
    /// Attachment is ready.
    Ready,
    /// Attachment is being torn down.
    Terminating,
    /// Attachment is gone.
    Terminated,
    /// State not known to this client.
    #[serde(other)]
    Unknown,
}

impl AttachmentState {
    /// Whether the attachment can never become ready without new action.
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Terminating | Self::Terminated)
    }
}

impl std::fmt::Display for AttachmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::Initializing => write!(f, "initializing"),
            Self::PendingAcceptance => write!(f, "pendingAcceptance"),
            Self::Ready => write!(f, "ready"),
            Self::Terminating => write!(f, "terminating"),
            Self::Terminated => write!(f, "terminated"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Transit gateway attachment on a cloud gateway network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitGateway {
    /// Attachment ID.
    pub id: String,
    /// Attachment name (logical name).
    pub name: String,
    /// Lifecycle state.
    #[serde(default = "requested_state")]
    pub state: AttachmentState,
    /// CIDR blocks routed through the transit gateway.
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
    /// Provider-side attachment configuration.
    #[serde(default)]
    pub transit_gateway_attachment_config: Option<TransitGatewayAttachmentConfig>,
}

fn requested_state() -> AttachmentState {
    AttachmentState::Requested
}

impl NamedResource for TransitGateway {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// AWS transit gateway attachment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitGatewayAttachmentConfig {
    /// Always `aws-transit-gateway-attachment`.
    pub kind: String,
    /// Transit gateway ID in the workload account.
    pub transit_gateway_id: String,
    /// RAM share ARN granting Kong's account access to the transit gateway.
    pub ram_share_arn: String,
}

/// Request to attach a network to a transit gateway.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTransitGatewayRequest {
    /// Logical name.
    pub name: String,
    /// CIDR blocks reachable through the transit gateway.
    pub cidr_blocks: Vec<String>,
    /// Provider-side attachment configuration.
    pub transit_gateway_attachment_config: TransitGatewayAttachmentConfig,
}

impl CreateTransitGatewayRequest {
    /// Request for an AWS transit gateway attachment.
    #[must_use]
    pub fn aws(
        name: impl Into<String>,
        cidr_blocks: Vec<String>,
        transit_gateway_id: impl Into<String>,
        ram_share_arn: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            cidr_blocks,
            transit_gateway_attachment_config: TransitGatewayAttachmentConfig {
                kind: "aws-transit-gateway-attachment".to_string(),
                transit_gateway_id: transit_gateway_id.into(),
                ram_share_arn: ram_share_arn.into(),
            },
        }
    }
}

// ============================================================================
// Provider accounts
// ============================================================================

/// Cloud provider account Konnect provisions cloud gateways into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccount {
    /// Konnect provider account ID (used when creating networks).
    pub id: String,
    /// Provider (`aws`, `azure`, `gcp`).
    pub provider: String,
    /// Provider-native account ID (the AWS account number for `aws`).
    pub provider_account_id: String,
}

// ============================================================================
// Data plane group configuration
// ============================================================================

/// Autoscaling policy for a data plane group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Autoscale {
    /// Always `autopilot` for rps-based scaling.
    pub kind: String,
    /// Baseline requests per second.
    pub base_rps: u32,
}

/// Data plane group placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPlaneGroupSpec {
    /// Cloud provider.
    pub provider: String,
    /// Provider region.
    pub region: String,
    /// Network the data planes join.
    pub cloud_gateway_network_id: String,
    /// Autoscaling policy.
    pub autoscale: Autoscale,
}

/// Request to put the cloud gateway configuration for a control plane.
///
/// The endpoint is a PUT of the full desired state, so repeating it is a no-op.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationRequest {
    /// Control plane ID.
    pub control_plane_id: String,
    /// Control plane geo (`us`, `eu`, ...).
    pub control_plane_geo: String,
    /// Kong Gateway version.
    pub version: String,
    /// Data plane groups.
    pub dataplane_groups: Vec<DataPlaneGroupSpec>,
}

/// Applied data plane group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPlaneGroup {
    /// Group ID.
    pub id: String,
    /// Provider region.
    #[serde(default)]
    pub region: Option<String>,
    /// Group state.
    #[serde(default)]
    pub state: Option<String>,
}

/// Cloud gateway configuration as returned by Konnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPlaneConfiguration {
    /// Configuration ID.
    pub id: String,
    /// Kong Gateway version.
    #[serde(default)]
    pub version: Option<String>,
    /// Data plane groups.
    #[serde(default)]
    pub dataplane_groups: Vec<DataPlaneGroup>,
}
