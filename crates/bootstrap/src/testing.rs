//! In-memory fakes for the remote systems.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use konnect::{
    AttachmentState, ConfigurationRequest, ControlPlane, ControlPlaneApi,
    CreateControlPlaneRequest, CreateNetworkRequest, CreateOutcome, CreateTransitGatewayRequest,
    DataPlaneConfiguration, KonnectError, Network, NetworkState, ProviderAccount, TransitGateway,
};
use serde_json::{json, Value};

use crate::aws::{AssociationStatus, CloudAccount, ResourceShare, ShareAssociation, TgwAttachment};
use crate::error::BootstrapError;
use crate::gate::{ClusterProbe, ResourceKind, ResourceRef};
use crate::tls::{TlsMaterial, TlsSecretStore};

/// Pop the next scripted value, repeating the last one forever.
fn next_scripted<T: Clone>(script: &mut VecDeque<T>) -> Option<T> {
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

// ============================================================================
// Cluster
// ============================================================================

#[derive(Default)]
pub(crate) struct FakeCluster {
    objects: Mutex<HashMap<ResourceRef, VecDeque<Option<Value>>>>,
    queries: Mutex<HashMap<ResourceRef, u32>>,
    secrets: Mutex<Vec<(String, String)>>,
    certs: Mutex<HashMap<(String, String), String>>,
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Script successive observations of `resource`.
    pub(crate) fn with(self, resource: &ResourceRef, states: Vec<Option<Value>>) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(resource.clone(), states.into());
        self
    }

    pub(crate) fn queries(&self, resource: &ResourceRef) -> u32 {
        self.queries
            .lock()
            .unwrap()
            .get(resource)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn secrets(&self) -> Vec<(String, String)> {
        self.secrets.lock().unwrap().clone()
    }

    /// Certificate currently stored in a TLS secret.
    pub(crate) fn cert(&self, namespace: &str, name: &str) -> Option<String> {
        self.certs
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ClusterProbe for FakeCluster {
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Value>, BootstrapError> {
        *self
            .queries
            .lock()
            .unwrap()
            .entry(resource.clone())
            .or_default() += 1;

        Ok(self
            .objects
            .lock()
            .unwrap()
            .get_mut(resource)
            .and_then(next_scripted)
            .flatten())
    }
}

#[async_trait]
impl TlsSecretStore for FakeCluster {
    async fn apply_tls_secret(
        &self,
        namespace: &str,
        name: &str,
        material: &TlsMaterial,
    ) -> Result<(), BootstrapError> {
        self.secrets
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string()));
        self.certs.lock().unwrap().insert(
            (namespace.to_string(), name.to_string()),
            material.cert_pem.clone(),
        );
        self.objects.lock().unwrap().insert(
            ResourceRef::namespaced(ResourceKind::Secret, namespace, name),
            VecDeque::from([Some(json!({"type": "kubernetes.io/tls"}))]),
        );
        Ok(())
    }
}

// ============================================================================
// Konnect
// ============================================================================

#[derive(Default)]
struct KonnectState {
    control_planes: Vec<ControlPlane>,
    networks: Vec<Network>,
    network_states: VecDeque<NetworkState>,
    network_queries: u32,
    attachments: Vec<TransitGateway>,
    attachment_states: VecDeque<AttachmentState>,
    configurations: Vec<ConfigurationRequest>,
}

/// Konnect API that enforces unique names and scripts lifecycle states.
///
/// Clones share one backing store.
#[derive(Default, Clone)]
pub(crate) struct FakeKonnect {
    state: Arc<Mutex<KonnectState>>,
}

fn conflict<T>() -> CreateOutcome<T> {
    CreateOutcome::Conflict {
        body: r#"{"status":409,"title":"Conflict","detail":"name already exists"}"#.to_string(),
    }
}

impl FakeKonnect {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_network_states(self, states: &[NetworkState]) -> Self {
        self.state.lock().unwrap().network_states = states.iter().copied().collect();
        self
    }

    pub(crate) fn with_attachment_states(self, states: &[AttachmentState]) -> Self {
        self.state.lock().unwrap().attachment_states = states.iter().copied().collect();
        self
    }

    pub(crate) fn control_plane_count(&self) -> usize {
        self.state.lock().unwrap().control_planes.len()
    }

    pub(crate) fn network_count(&self) -> usize {
        self.state.lock().unwrap().networks.len()
    }

    pub(crate) fn attachment_count(&self) -> usize {
        self.state.lock().unwrap().attachments.len()
    }

    pub(crate) fn network_queries(&self) -> u32 {
        self.state.lock().unwrap().network_queries
    }

    pub(crate) fn last_configuration(&self) -> Option<ConfigurationRequest> {
        self.state.lock().unwrap().configurations.last().cloned()
    }
}

#[async_trait]
impl ControlPlaneApi for FakeKonnect {
    async fn create_control_plane(
        &self,
        req: &CreateControlPlaneRequest,
    ) -> Result<CreateOutcome<ControlPlane>, KonnectError> {
        let mut state = self.state.lock().unwrap();
        if state.control_planes.iter().any(|c| c.name == req.name) {
            return Ok(conflict());
        }
        let cp = ControlPlane {
            id: format!("cp-{}", state.control_planes.len() + 1),
            name: req.name.clone(),
            config: None,
        };
        state.control_planes.push(cp.clone());
        Ok(CreateOutcome::Created(cp))
    }

    async fn list_control_planes(&self, name: &str) -> Result<Vec<ControlPlane>, KonnectError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .control_planes
            .iter()
            .filter(|c| c.name == name)
            .cloned()
            .collect())
    }

    async fn create_network(
        &self,
        req: &CreateNetworkRequest,
    ) -> Result<CreateOutcome<Network>, KonnectError> {
        let mut state = self.state.lock().unwrap();
        if state.networks.iter().any(|n| n.name == req.name) {
            return Ok(conflict());
        }
        let network = Network {
            id: format!("net-{}", state.networks.len() + 1),
            name: req.name.clone(),
            state: NetworkState::Initializing,
            cloud_gateway_provider_account_id: Some(req.cloud_gateway_provider_account_id.clone()),
            region: Some(req.region.clone()),
            cidr_block: Some(req.cidr_block.clone()),
        };
        state.networks.push(network.clone());
        Ok(CreateOutcome::Created(network))
    }

    async fn list_networks(&self, name: &str) -> Result<Vec<Network>, KonnectError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .networks
            .iter()
            .filter(|n| n.name == name)
            .cloned()
            .collect())
    }

    async fn get_network(&self, id: &str) -> Result<Network, KonnectError> {
        let mut state = self.state.lock().unwrap();
        state.network_queries += 1;
        let next = next_scripted(&mut state.network_states).unwrap_or(NetworkState::Ready);
        let network = state
            .networks
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| KonnectError::NotFound(format!("network {id}")))?;
        network.state = next;
        Ok(network.clone())
    }

    async fn create_transit_gateway(
        &self,
        _network_id: &str,
        req: &CreateTransitGatewayRequest,
    ) -> Result<CreateOutcome<TransitGateway>, KonnectError> {
        let mut state = self.state.lock().unwrap();
        if state.attachments.iter().any(|a| a.name == req.name) {
            return Ok(conflict());
        }
        let attachment = TransitGateway {
            id: format!("tgw-link-{}", state.attachments.len() + 1),
            name: req.name.clone(),
            state: AttachmentState::Requested,
            cidr_blocks: req.cidr_blocks.clone(),
            transit_gateway_attachment_config: Some(req.transit_gateway_attachment_config.clone()),
        };
        state.attachments.push(attachment.clone());
        Ok(CreateOutcome::Created(attachment))
    }

    async fn list_transit_gateways(
        &self,
        _network_id: &str,
        name: &str,
    ) -> Result<Vec<TransitGateway>, KonnectError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .attachments
            .iter()
            .filter(|a| a.name == name)
            .cloned()
            .collect())
    }

    async fn get_transit_gateway(
        &self,
        _network_id: &str,
        id: &str,
    ) -> Result<TransitGateway, KonnectError> {
        let mut state = self.state.lock().unwrap();
        let next = next_scripted(&mut state.attachment_states).unwrap_or(AttachmentState::Ready);
        let attachment = state
            .attachments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| KonnectError::NotFound(format!("transit gateway {id}")))?;
        attachment.state = next;
        Ok(attachment.clone())
    }

    async fn list_provider_accounts(&self) -> Result<Vec<ProviderAccount>, KonnectError> {
        Ok(vec![
            ProviderAccount {
                id: "pa-azure".to_string(),
                provider: "azure".to_string(),
                provider_account_id: "sub-1".to_string(),
            },
            ProviderAccount {
                id: "pa-aws".to_string(),
                provider: "aws".to_string(),
                provider_account_id: "999988887777".to_string(),
            },
        ])
    }

    async fn put_configuration(
        &self,
        req: &ConfigurationRequest,
    ) -> Result<DataPlaneConfiguration, KonnectError> {
        let mut state = self.state.lock().unwrap();
        state.configurations.push(req.clone());
        Ok(DataPlaneConfiguration {
            id: "cfg-1".to_string(),
            version: Some(req.version.clone()),
            dataplane_groups: Vec::new(),
        })
    }
}

// ============================================================================
// AWS
// ============================================================================

#[derive(Default)]
struct CloudState {
    shares: Vec<ResourceShare>,
    principals: Vec<(String, String)>,
    statuses: VecDeque<AssociationStatus>,
    shares_created: u32,
    principal_adds: u32,
    pending: Vec<String>,
    pending_lookups: u32,
}

/// Workload account with scripted association statuses.
///
/// Clones share one backing store.
#[derive(Default, Clone)]
pub(crate) struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
}

impl FakeCloud {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_association_statuses(self, statuses: &[AssociationStatus]) -> Self {
        self.state.lock().unwrap().statuses = statuses.iter().copied().collect();
        self
    }

    pub(crate) fn with_pending_attachment(self, id: &str) -> Self {
        self.state.lock().unwrap().pending.push(id.to_string());
        self
    }

    pub(crate) fn shares_created(&self) -> u32 {
        self.state.lock().unwrap().shares_created
    }

    pub(crate) fn principal_adds(&self) -> u32 {
        self.state.lock().unwrap().principal_adds
    }

    pub(crate) fn pending_lookups(&self) -> u32 {
        self.state.lock().unwrap().pending_lookups
    }
}

#[async_trait]
impl CloudAccount for FakeCloud {
    async fn find_resource_share(
        &self,
        name: &str,
    ) -> Result<Option<ResourceShare>, BootstrapError> {
        let state = self.state.lock().unwrap();
        Ok(state.shares.iter().find(|s| s.name == name).cloned())
    }

    async fn create_resource_share(
        &self,
        name: &str,
        _resource_arn: &str,
        principal: &str,
    ) -> Result<ResourceShare, BootstrapError> {
        let mut state = self.state.lock().unwrap();
        state.shares_created += 1;
        let share = ResourceShare {
            resource_share_arn: format!(
                "arn:aws:ram:us-west-2:111122223333:resource-share/{}",
                state.shares_created
            ),
            name: name.to_string(),
            status: "ACTIVE".to_string(),
            allow_external_principals: true,
        };
        state
            .principals
            .push((share.resource_share_arn.clone(), principal.to_string()));
        state.shares.push(share.clone());
        Ok(share)
    }

    async fn associate_principal(
        &self,
        share_arn: &str,
        principal: &str,
    ) -> Result<(), BootstrapError> {
        let mut state = self.state.lock().unwrap();
        state.principal_adds += 1;
        state
            .principals
            .push((share_arn.to_string(), principal.to_string()));
        Ok(())
    }

    async fn principal_associations(
        &self,
        share_arn: &str,
    ) -> Result<Vec<ShareAssociation>, BootstrapError> {
        let mut state = self.state.lock().unwrap();
        let status = next_scripted(&mut state.statuses).unwrap_or(AssociationStatus::Associated);
        Ok(state
            .principals
            .iter()
            .filter(|(arn, _)| arn == share_arn)
            .map(|(arn, principal)| ShareAssociation {
                resource_share_arn: arn.clone(),
                associated_entity: principal.clone(),
                status,
                status_message: (status == AssociationStatus::Failed)
                    .then(|| "principal rejected the invitation".to_string()),
            })
            .collect())
    }

    async fn pending_attachments(
        &self,
        _transit_gateway_id: &str,
    ) -> Result<Vec<TgwAttachment>, BootstrapError> {
        let mut state = self.state.lock().unwrap();
        state.pending_lookups += 1;
        Ok(state
            .pending
            .iter()
            .map(|id| TgwAttachment {
                transit_gateway_attachment_id: id.clone(),
                state: "pendingAcceptance".to_string(),
                resource_owner_id: Some("999988887777".to_string()),
            })
            .collect())
    }
}
