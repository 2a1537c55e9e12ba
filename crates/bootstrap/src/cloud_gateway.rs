//! Konnect control plane, cloud gateway network and data plane group.

use konnect::{
    Autoscale, ConfigurationRequest, ControlPlaneApi, CreateControlPlaneRequest,
    CreateNetworkRequest, DataPlaneGroupSpec, Network, NetworkState, ProviderAccount,
};
use tracing::info;

use crate::config::BootstrapConfig;
use crate::error::{remote, BootstrapError};
use crate::poll::{poll_until, Probe};
use crate::reconcile::{ensure, Reconciled};

/// Create or adopt the control plane.
///
/// # Errors
///
/// Returns the reconciler's error.
pub async fn ensure_control_plane(
    api: &dyn ControlPlaneApi,
    config: &BootstrapConfig,
) -> Result<Reconciled, BootstrapError> {
    let name = config.control_plane_name();
    let req = CreateControlPlaneRequest::cloud_gateway(&name)
        .with_label("deployment", &config.deployment_name);

    ensure(
        "control plane",
        &name,
        || api.create_control_plane(&req),
        || api.list_control_planes(&name),
    )
    .await
}

/// Konnect's AWS provider account.
///
/// # Errors
///
/// Returns an error if Konnect has no `aws` provider account for this org.
pub async fn aws_provider_account(
    api: &dyn ControlPlaneApi,
) -> Result<ProviderAccount, BootstrapError> {
    api.list_provider_accounts()
        .await
        .map_err(remote)?
        .into_iter()
        .find(|a| a.provider == "aws")
        .ok_or_else(|| BootstrapError::ResourceFailed {
            what: "Konnect provider accounts".to_string(),
            state: "no aws provider account".to_string(),
        })
}

/// Create or adopt the cloud gateway network.
///
/// # Errors
///
/// Returns the reconciler's error.
pub async fn ensure_network(
    api: &dyn ControlPlaneApi,
    config: &BootstrapConfig,
    provider_account: &ProviderAccount,
) -> Result<Reconciled, BootstrapError> {
    let name = config.network_name();
    let req = CreateNetworkRequest {
        name: name.clone(),
        cloud_gateway_provider_account_id: provider_account.id.clone(),
        region: config.aws_region.clone(),
        availability_zones: config.availability_zones.clone(),
        cidr_block: config.network_cidr.clone(),
    };

    ensure(
        "network",
        &name,
        || api.create_network(&req),
        || api.list_networks(&name),
    )
    .await
}

/// Poll the network until it is `ready`.
///
/// Polling stops early on a terminal failure state.
///
/// # Errors
///
/// - [`BootstrapError::ResourceFailed`] if the network is terminating or terminated
/// - [`BootstrapError::PreconditionTimeout`] if the budget runs out
pub async fn wait_network_ready(
    api: &dyn ControlPlaneApi,
    config: &BootstrapConfig,
    network_id: &str,
) -> Result<Network, BootstrapError> {
    let what = format!("network {network_id}");

    let network = poll_until(&config.timeouts.network, &what, || async {
        let network = api.get_network(network_id).await?;
        Ok::<_, BootstrapError>(
            if network.state == NetworkState::Ready || network.state.is_failed() {
                Probe::Ready(network)
            } else {
                Probe::Pending(network.state.to_string())
            },
        )
    })
    .await?;

    if network.state.is_failed() {
        return Err(BootstrapError::ResourceFailed {
            what,
            state: network.state.to_string(),
        });
    }

    info!(network_id = %network.id, "Network ready");
    Ok(network)
}

/// Place a data plane group on the network. The PUT is idempotent.
///
/// # Errors
///
/// Returns the remote rejection verbatim.
pub async fn configure_data_plane_group(
    api: &dyn ControlPlaneApi,
    config: &BootstrapConfig,
    control_plane_id: &str,
    network_id: &str,
) -> Result<(), BootstrapError> {
    let req = ConfigurationRequest {
        control_plane_id: control_plane_id.to_string(),
        control_plane_geo: config.control_plane_geo().to_string(),
        version: config.kong_version.clone(),
        dataplane_groups: vec![DataPlaneGroupSpec {
            provider: "aws".to_string(),
            region: config.aws_region.clone(),
            cloud_gateway_network_id: network_id.to_string(),
            autoscale: Autoscale {
                kind: "autopilot".to_string(),
                base_rps: config.base_rps,
            },
        }],
    };

    let applied = api.put_configuration(&req).await.map_err(remote)?;
    info!(
        configuration_id = %applied.id,
        groups = applied.dataplane_groups.len(),
        "Data plane group configured"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollConfig;
    use crate::testing::FakeKonnect;

    fn config() -> BootstrapConfig {
        let mut config = BootstrapConfig::with_defaults("demo".into());
        config.timeouts.network = PollConfig::new(0, 5);
        config
    }

    #[tokio::test]
    async fn test_network_ready_after_three_queries() {
        let api = FakeKonnect::new().with_network_states(&[
            NetworkState::Initializing,
            NetworkState::Initializing,
            NetworkState::Ready,
        ]);
        let config = config();
        let account = aws_provider_account(&api).await.unwrap();
        let network = ensure_network(&api, &config, &account).await.unwrap();

        let ready = wait_network_ready(&api, &config, &network.id).await.unwrap();
        assert_eq!(ready.state, NetworkState::Ready);
        assert_eq!(api.network_queries(), 3);
    }

    #[tokio::test]
    async fn test_terminated_network_is_fatal() {
        let api = FakeKonnect::new().with_network_states(&[NetworkState::Terminated]);
        let config = config();
        let account = aws_provider_account(&api).await.unwrap();
        let network = ensure_network(&api, &config, &account).await.unwrap();

        let err = wait_network_ready(&api, &config, &network.id)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::ResourceFailed { .. }));
        assert_eq!(api.network_queries(), 1);
    }

    #[tokio::test]
    async fn test_control_plane_rerun_adopts() {
        let api = FakeKonnect::new();
        let config = config();

        let first = ensure_control_plane(&api, &config).await.unwrap();
        let second = ensure_control_plane(&api, &config).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.adopted);
        assert_eq!(api.control_plane_count(), 1);
    }

    #[tokio::test]
    async fn test_data_plane_group_request() {
        let api = FakeKonnect::new();
        let config = config();
        configure_data_plane_group(&api, &config, "cp1", "net1")
            .await
            .unwrap();

        let req = api.last_configuration().unwrap();
        assert_eq!(req.control_plane_geo, "us");
        assert_eq!(req.dataplane_groups[0].cloud_gateway_network_id, "net1");
        assert_eq!(req.dataplane_groups[0].region, "us-west-2");
    }
}
