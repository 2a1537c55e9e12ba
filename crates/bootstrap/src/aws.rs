//! Workload-account AWS operations (RAM shares, transit gateway attachments).
//!
//! Calls go through the `aws` CLI with JSON output so the operator's usual
//! credential chain (profiles, SSO, instance roles) applies unchanged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BootstrapError;
use crate::exec::Cli;

/// RAM resource share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceShare {
    pub resource_share_arn: String,
    pub name: String,
    /// `PENDING`, `ACTIVE`, `FAILED`, `DELETING` or `DELETED`.
    pub status: String,
    #[serde(default)]
    pub allow_external_principals: bool,
}

impl ResourceShare {
    /// Whether the share can still be used.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self.status.as_str(), "ACTIVE" | "PENDING")
    }
}

/// Principal association status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssociationStatus {
    Associating,
    Associated,
    Failed,
    Disassociating,
    Disassociated,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for AssociationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Associating => "ASSOCIATING",
            Self::Associated => "ASSOCIATED",
            Self::Failed => "FAILED",
            Self::Disassociating => "DISASSOCIATING",
            Self::Disassociated => "DISASSOCIATED",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Association between a share and a principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareAssociation {
    pub resource_share_arn: String,
    /// Account ID for principal associations.
    pub associated_entity: String,
    pub status: AssociationStatus,
    #[serde(default)]
    pub status_message: Option<String>,
}

/// Transit gateway attachment as seen from the transit gateway owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TgwAttachment {
    pub transit_gateway_attachment_id: String,
    pub state: String,
    #[serde(default)]
    pub resource_owner_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceSharesOutput {
    #[serde(default)]
    resource_shares: Vec<ResourceShare>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResourceShareOutput {
    resource_share: ResourceShare,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssociationsOutput {
    #[serde(default)]
    resource_share_associations: Vec<ShareAssociation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttachmentsOutput {
    #[serde(default)]
    transit_gateway_attachments: Vec<TgwAttachment>,
}

/// Operations against the workload AWS account.
#[async_trait]
pub trait CloudAccount: Send + Sync {
    /// Find a usable share we own by exact name.
    async fn find_resource_share(&self, name: &str)
        -> Result<Option<ResourceShare>, BootstrapError>;

    /// Create a share of `resource_arn` with `principal`, allowing external principals.
    async fn create_resource_share(
        &self,
        name: &str,
        resource_arn: &str,
        principal: &str,
    ) -> Result<ResourceShare, BootstrapError>;

    /// Add `principal` to an existing share.
    async fn associate_principal(
        &self,
        share_arn: &str,
        principal: &str,
    ) -> Result<(), BootstrapError>;

    /// Principal associations of a share.
    async fn principal_associations(
        &self,
        share_arn: &str,
    ) -> Result<Vec<ShareAssociation>, BootstrapError>;

    /// Attachments on `transit_gateway_id` waiting to be accepted.
    async fn pending_attachments(
        &self,
        transit_gateway_id: &str,
    ) -> Result<Vec<TgwAttachment>, BootstrapError>;
}

/// [`CloudAccount`] backed by the `aws` CLI.
#[derive(Debug, Clone)]
pub struct AwsCli {
    region: String,
}

impl AwsCli {
    #[must_use]
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
        }
    }

    fn aws<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> Cli {
        Cli::new("aws")
            .args(args)
            .args(["--region", self.region.as_str(), "--output", "json"])
    }
}

#[async_trait]
impl CloudAccount for AwsCli {
    async fn find_resource_share(
        &self,
        name: &str,
    ) -> Result<Option<ResourceShare>, BootstrapError> {
        let out: ResourceSharesOutput = self
            .aws(["ram", "get-resource-shares", "--resource-owner", "SELF", "--name", name])
            .run_json()
            .await?;

        debug!(name = %name, found = out.resource_shares.len(), "Resource share lookup");
        Ok(out
            .resource_shares
            .into_iter()
            .find(|s| s.name == name && s.is_usable()))
    }

    async fn create_resource_share(
        &self,
        name: &str,
        resource_arn: &str,
        principal: &str,
    ) -> Result<ResourceShare, BootstrapError> {
        let out: CreateResourceShareOutput = self
            .aws([
                "ram",
                "create-resource-share",
                "--name",
                name,
                "--resource-arns",
                resource_arn,
                "--principals",
                principal,
                "--allow-external-principals",
            ])
            .run_json()
            .await?;
        Ok(out.resource_share)
    }

    async fn associate_principal(
        &self,
        share_arn: &str,
        principal: &str,
    ) -> Result<(), BootstrapError> {
        self.aws([
            "ram",
            "associate-resource-share",
            "--resource-share-arn",
            share_arn,
            "--principals",
            principal,
        ])
        .run()
        .await?;
        Ok(())
    }

    async fn principal_associations(
        &self,
        share_arn: &str,
    ) -> Result<Vec<ShareAssociation>, BootstrapError> {
        let out: AssociationsOutput = self
            .aws([
                "ram",
                "get-resource-share-associations",
                "--association-type",
                "PRINCIPAL",
                "--resource-share-arns",
                share_arn,
            ])
            .run_json()
            .await?;
        Ok(out.resource_share_associations)
    }

    async fn pending_attachments(
        &self,
        transit_gateway_id: &str,
    ) -> Result<Vec<TgwAttachment>, BootstrapError> {
        let tgw_filter = format!("Name=transit-gateway-id,Values={transit_gateway_id}");
        let out: AttachmentsOutput = self
            .aws([
                "ec2",
                "describe-transit-gateway-attachments",
                "--filters",
                tgw_filter.as_str(),
                "Name=state,Values=pendingAcceptance",
            ])
            .run_json()
            .await?;
        Ok(out.transit_gateway_attachments)
    }
}

/// Command that accepts a pending attachment in the transit gateway account.
#[must_use]
pub fn accept_attachment_command(region: &str, attachment_id: &str) -> String {
    format!(
        "aws ec2 accept-transit-gateway-vpc-attachment --region {region} \
         --transit-gateway-attachment-id {attachment_id}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_shares() {
        let out: ResourceSharesOutput = serde_json::from_str(
            r#"{"resourceShares": [
                {"resourceShareArn": "arn:aws:ram:us-west-2:111122223333:resource-share/a",
                 "name": "demo-konnect-tgw", "owningAccountId": "111122223333",
                 "allowExternalPrincipals": true, "status": "DELETED"},
                {"resourceShareArn": "arn:aws:ram:us-west-2:111122223333:resource-share/b",
                 "name": "demo-konnect-tgw", "allowExternalPrincipals": true, "status": "ACTIVE"}
            ]}"#,
        )
        .unwrap();

        let usable: Vec<_> = out
            .resource_shares
            .iter()
            .filter(|s| s.is_usable())
            .collect();
        assert_eq!(usable.len(), 1);
        assert!(usable[0].resource_share_arn.ends_with("/b"));
    }

    #[test]
    fn test_parse_associations() {
        let out: AssociationsOutput = serde_json::from_str(
            r#"{"resourceShareAssociations": [
                {"resourceShareArn": "arn:x", "associatedEntity": "999988887777",
                 "associationType": "PRINCIPAL", "status": "ASSOCIATING", "external": true},
                {"resourceShareArn": "arn:x", "associatedEntity": "444455556666",
                 "associationType": "PRINCIPAL", "status": "SOMETHING_NEW"}
            ]}"#,
        )
        .unwrap();

        let statuses: Vec<_> = out
            .resource_share_associations
            .iter()
            .map(|a| a.status)
            .collect();
        assert_eq!(
            statuses,
            vec![AssociationStatus::Associating, AssociationStatus::Unknown]
        );
    }

    #[test]
    fn test_parse_pending_attachments() {
        let out: AttachmentsOutput = serde_json::from_str(
            r#"{"TransitGatewayAttachments": [
                {"TransitGatewayAttachmentId": "tgw-attach-0123", "TransitGatewayId": "tgw-0abc",
                 "ResourceOwnerId": "999988887777", "ResourceType": "vpc",
                 "State": "pendingAcceptance"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            out.transit_gateway_attachments[0].transit_gateway_attachment_id,
            "tgw-attach-0123"
        );
        assert_eq!(
            out.transit_gateway_attachments[0].resource_owner_id.as_deref(),
            Some("999988887777")
        );
    }

    #[test]
    fn test_accept_command() {
        let cmd = accept_attachment_command("us-west-2", "tgw-attach-0123");
        assert!(cmd.starts_with("aws ec2 accept-transit-gateway-vpc-attachment"));
        assert!(cmd.contains("--transit-gateway-attachment-id tgw-attach-0123"));
    }
}
