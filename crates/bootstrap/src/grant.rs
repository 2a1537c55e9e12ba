//! Cross-account grant of the transit gateway to Kong's AWS account.
//!
//! The share lives in our account but only completes when the other account
//! associates with it, which we can observe but not drive.

use tracing::{info, warn};

use crate::aws::{AssociationStatus, CloudAccount};
use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use crate::poll::{poll_until, Probe};
use crate::ui;

/// Result of the grant stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// RAM share ARN.
    pub share_arn: String,
    /// Whether an existing share was adopted.
    pub adopted: bool,
    /// Whether the principal association was observed as complete.
    pub associated: bool,
}

/// Share `resource_arn` with `principal` and wait for the association.
///
/// An association that does not complete within the grant budget is logged
/// and tolerated unless `config.strict_grant` is set; the attachment stage
/// then surfaces any real problem.
///
/// # Errors
///
/// - [`BootstrapError::ResourceFailed`] if the association reports `FAILED`
/// - [`BootstrapError::PreconditionTimeout`] on timeout with `strict_grant`
/// - any error from the cloud account calls
pub async fn ensure_grant(
    cloud: &dyn CloudAccount,
    config: &BootstrapConfig,
    resource_arn: &str,
    principal: &str,
) -> Result<Grant, BootstrapError> {
    let name = config.resource_share_name();

    let (share_arn, adopted) = match cloud.find_resource_share(&name).await? {
        Some(share) => {
            info!(name = %name, arn = %share.resource_share_arn, "Adopting existing resource share");
            let associations = cloud
                .principal_associations(&share.resource_share_arn)
                .await?;
            let has_principal = associations.iter().any(|a| {
                a.associated_entity == principal
                    && matches!(
                        a.status,
                        AssociationStatus::Associating | AssociationStatus::Associated
                    )
            });
            if !has_principal {
                info!(principal = %principal, "Adding principal to resource share");
                cloud
                    .associate_principal(&share.resource_share_arn, principal)
                    .await?;
            }
            (share.resource_share_arn, true)
        }
        None => {
            let share = cloud
                .create_resource_share(&name, resource_arn, principal)
                .await?;
            info!(name = %name, arn = %share.resource_share_arn, "Created resource share");
            (share.resource_share_arn, false)
        }
    };
    ui::print_success(&format!("Resource share {name} ({share_arn})"));

    let what = format!("principal {principal} to associate with {name}");
    let observed = poll_until(&config.timeouts.grant, &what, || async {
        let associations = cloud.principal_associations(&share_arn).await?;
        let status = associations
            .iter()
            .find(|a| a.associated_entity == principal)
            .map(|a| (a.status, a.status_message.clone()));

        Ok::<_, BootstrapError>(match status {
            Some((AssociationStatus::Associated, _)) => Probe::Ready(Ok(())),
            Some((AssociationStatus::Failed, message)) => Probe::Ready(Err(message)),
            Some((status, _)) => Probe::Pending(status.to_string()),
            None => Probe::Pending("not associated".to_string()),
        })
    })
    .await;

    let associated = match observed {
        Ok(Ok(())) => {
            info!(principal = %principal, "Principal associated");
            true
        }
        Ok(Err(message)) => {
            return Err(BootstrapError::ResourceFailed {
                what: format!("resource share association for {principal}"),
                state: format!(
                    "FAILED ({})",
                    message.unwrap_or_else(|| "no status message".to_string())
                ),
            });
        }
        Err(timeout) if config.strict_grant => return Err(timeout.into()),
        Err(timeout) => {
            warn!(
                principal = %principal,
                last_observed = %timeout.last_observed,
                "Resource share association not confirmed, continuing"
            );
            ui::print_warning(&format!(
                "Association with {principal} not confirmed after {}s (last observed: {}); continuing",
                timeout.elapsed.as_secs(),
                timeout.last_observed
            ));
            false
        }
    };

    Ok(Grant {
        share_arn,
        adopted,
        associated,
    })
}
