//! Transit gateway attachment from the cloud gateway network.
//!
//! Konnect requests the attachment from Kong's account; it lands on our
//! transit gateway and may sit in `pendingAcceptance` until someone accepts
//! it here. That state gets its own remediation instead of a bare timeout.

use std::cell::{Cell, RefCell};

use konnect::{AttachmentState, ControlPlaneApi, CreateTransitGatewayRequest, TransitGateway};
use tracing::{info, warn};

use crate::aws::{accept_attachment_command, CloudAccount};
use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use crate::poll::{poll_until, Probe};
use crate::reconcile::{ensure, Reconciled};
use crate::ui;

/// Inputs the attachment chains on.
#[derive(Debug, Clone)]
pub struct AttachmentTarget<'a> {
    /// Konnect network ID.
    pub network_id: &'a str,
    /// Transit gateway ID in our account.
    pub transit_gateway_id: &'a str,
    /// RAM share ARN granting Kong's account access.
    pub ram_share_arn: &'a str,
    /// CIDRs routed from the cloud gateway network to the transit gateway.
    pub cidr_blocks: Vec<String>,
}

/// Create or adopt the attachment.
///
/// # Errors
///
/// Returns the reconciler's error.
pub async fn ensure_attachment(
    api: &dyn ControlPlaneApi,
    config: &BootstrapConfig,
    target: &AttachmentTarget<'_>,
) -> Result<Reconciled, BootstrapError> {
    let name = config.attachment_name();
    let req = CreateTransitGatewayRequest::aws(
        &name,
        target.cidr_blocks.clone(),
        target.transit_gateway_id,
        target.ram_share_arn,
    );

    ensure(
        "transit gateway attachment",
        &name,
        || api.create_transit_gateway(target.network_id, &req),
        || api.list_transit_gateways(target.network_id, &name),
    )
    .await
}

/// Accept commands for the attachments pending on `transit_gateway_id`.
async fn remediation(cloud: &dyn CloudAccount, region: &str, transit_gateway_id: &str) -> String {
    match cloud.pending_attachments(transit_gateway_id).await {
        Ok(pending) if !pending.is_empty() => pending
            .iter()
            .map(|a| accept_attachment_command(region, &a.transit_gateway_attachment_id))
            .collect::<Vec<_>>()
            .join("\n"),
        Ok(_) => format!(
            "aws ec2 describe-transit-gateway-attachments --region {region} \
             --filters Name=transit-gateway-id,Values={transit_gateway_id} \
             Name=state,Values=pendingAcceptance\n{}",
            accept_attachment_command(region, "<attachment-id>")
        ),
        Err(e) => {
            warn!(error = %e, "Could not list pending transit gateway attachments");
            accept_attachment_command(region, "<attachment-id>")
        }
    }
}

/// Poll the attachment until it is `ready`.
///
/// The first time `pendingAcceptance` is observed the accept command is
/// printed; polling then continues in case auto-accept or an operator
/// resolves it.
///
/// # Errors
///
/// - [`BootstrapError::AttachmentPendingAcceptance`] on timeout in that state
/// - [`BootstrapError::ResourceFailed`] if the attachment is terminating or terminated
/// - [`BootstrapError::PreconditionTimeout`] on timeout in any other state
pub async fn wait_attachment_ready(
    api: &dyn ControlPlaneApi,
    cloud: &dyn CloudAccount,
    config: &BootstrapConfig,
    target: &AttachmentTarget<'_>,
    attachment_id: &str,
) -> Result<TransitGateway, BootstrapError> {
    let what = format!("transit gateway attachment {attachment_id}");
    let last_state = Cell::new(None::<AttachmentState>);
    let advice = RefCell::new(None::<String>);

    let result = poll_until(&config.timeouts.attachment, &what, || async {
        let attachment = api
            .get_transit_gateway(target.network_id, attachment_id)
            .await?;
        last_state.set(Some(attachment.state));

        if attachment.state == AttachmentState::PendingAcceptance && advice.borrow().is_none() {
            let commands =
                remediation(cloud, &config.aws_region, target.transit_gateway_id).await;
            ui::print_warning("Attachment is pendingAcceptance; accept it in this account:");
            for line in commands.lines() {
                ui::print_command(line);
            }
            *advice.borrow_mut() = Some(commands);
        }

        Ok::<_, BootstrapError>(
            if attachment.state == AttachmentState::Ready || attachment.state.is_failed() {
                Probe::Ready(attachment)
            } else {
                Probe::Pending(attachment.state.to_string())
            },
        )
    })
    .await;

    match result {
        Ok(attachment) if attachment.state.is_failed() => Err(BootstrapError::ResourceFailed {
            what,
            state: attachment.state.to_string(),
        }),
        Ok(attachment) => {
            info!(attachment_id = %attachment.id, "Transit gateway attachment ready");
            Ok(attachment)
        }
        Err(timeout) if last_state.get() == Some(AttachmentState::PendingAcceptance) => {
            let commands = match advice.into_inner() {
                Some(commands) => commands,
                None => remediation(cloud, &config.aws_region, target.transit_gateway_id).await,
            };
            warn!(elapsed_secs = timeout.elapsed.as_secs(), "Attachment still pendingAcceptance");
            Err(BootstrapError::AttachmentPendingAcceptance {
                id: attachment_id.to_string(),
                remediation: commands,
            })
        }
        Err(timeout) => Err(timeout.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollConfig;
    use crate::testing::{FakeCloud, FakeKonnect};

    fn target() -> AttachmentTarget<'static> {
        AttachmentTarget {
            network_id: "net1",
            transit_gateway_id: "tgw-0abc",
            ram_share_arn: "arn:aws:ram:us-west-2:111122223333:resource-share/x",
            cidr_blocks: vec!["10.0.0.0/16".into()],
        }
    }

    fn config(timeout_secs: u64) -> BootstrapConfig {
        let mut config = BootstrapConfig::with_defaults("demo".into());
        config.timeouts.attachment = PollConfig::new(0, timeout_secs);
        config
    }

    #[tokio::test]
    async fn test_reaches_ready_through_pending_acceptance() {
        let api = FakeKonnect::new().with_attachment_states(&[
            AttachmentState::Requested,
            AttachmentState::PendingAcceptance,
            AttachmentState::Ready,
        ]);
        let cloud = FakeCloud::new().with_pending_attachment("tgw-attach-0123");
        let config = config(5);

        let attachment = ensure_attachment(&api, &config, &target()).await.unwrap();
        let ready = wait_attachment_ready(&api, &cloud, &config, &target(), &attachment.id)
            .await
            .unwrap();
        assert_eq!(ready.state, AttachmentState::Ready);
        assert_eq!(cloud.pending_lookups(), 1);
    }

    #[tokio::test]
    async fn test_timeout_in_pending_acceptance_is_specific() {
        let api = FakeKonnect::new().with_attachment_states(&[AttachmentState::PendingAcceptance]);
        let cloud = FakeCloud::new().with_pending_attachment("tgw-attach-0123");
        let config = config(0);

        let attachment = ensure_attachment(&api, &config, &target()).await.unwrap();
        let err = wait_attachment_ready(&api, &cloud, &config, &target(), &attachment.id)
            .await
            .unwrap_err();

        match &err {
            BootstrapError::AttachmentPendingAcceptance { remediation, .. } => {
                assert!(remediation.contains("--transit-gateway-attachment-id tgw-attach-0123"));
            }
            other => panic!("expected pendingAcceptance error, got {other}"),
        }
        assert!(err.to_string().contains("pendingAcceptance"));
    }

    #[tokio::test]
    async fn test_timeout_in_other_state_is_generic() {
        let api = FakeKonnect::new().with_attachment_states(&[AttachmentState::Initializing]);
        let cloud = FakeCloud::new();
        let config = config(0);

        let attachment = ensure_attachment(&api, &config, &target()).await.unwrap();
        let err = wait_attachment_ready(&api, &cloud, &config, &target(), &attachment.id)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::PreconditionTimeout { .. }));
    }

    #[tokio::test]
    async fn test_terminated_attachment_is_fatal() {
        let api = FakeKonnect::new().with_attachment_states(&[AttachmentState::Terminated]);
        let cloud = FakeCloud::new();
        let config = config(5);

        let attachment = ensure_attachment(&api, &config, &target()).await.unwrap();
        let err = wait_attachment_ready(&api, &cloud, &config, &target(), &attachment.id)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::ResourceFailed { .. }));
    }

    #[tokio::test]
    async fn test_attachment_rerun_adopts() {
        let api = FakeKonnect::new();
        let config = config(0);

        let first = ensure_attachment(&api, &config, &target()).await.unwrap();
        let second = ensure_attachment(&api, &config, &target()).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.adopted);
    }
}
