//! Infrastructure apply and output capture.
//!
//! Terraform owns the VPC, EKS cluster and transit gateway. This module only
//! runs it and reads back the values later stages chain on.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::BootstrapError;
use crate::exec::Cli;

/// Values later stages need from the infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraOutputs {
    /// EKS cluster name.
    pub cluster_name: String,
    /// Transit gateway ID (`tgw-...`).
    pub transit_gateway_id: String,
    /// Transit gateway ARN (shared through RAM).
    pub transit_gateway_arn: String,
    /// Workload VPC CIDR.
    pub vpc_cidr: Option<String>,
}

/// One entry of `terraform output -json`.
#[derive(Debug, Deserialize)]
struct TerraformOutput {
    value: serde_json::Value,
}

impl InfraOutputs {
    /// Parse `terraform output -json`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first required output that is missing or
    /// not a non-empty string.
    pub fn from_terraform_json(json: &str) -> Result<Self, BootstrapError> {
        let outputs: HashMap<String, TerraformOutput> = serde_json::from_str(json)?;

        let get = |key: &str| -> Option<String> {
            outputs
                .get(key)
                .and_then(|o| o.value.as_str())
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        };
        let require = |key: &str| {
            get(key).ok_or_else(|| BootstrapError::Command {
                program: "terraform output".to_string(),
                stderr: format!("required output '{key}' is missing or empty"),
            })
        };

        Ok(Self {
            cluster_name: require("cluster_name")?,
            transit_gateway_id: require("transit_gateway_id")?,
            transit_gateway_arn: require("transit_gateway_arn")?,
            vpc_cidr: get("vpc_cidr"),
        })
    }
}

/// Run `terraform init` and `terraform apply`.
///
/// # Errors
///
/// Returns the failing command's stderr.
pub async fn apply(dir: &Path) -> Result<(), BootstrapError> {
    info!(dir = %dir.display(), "Applying infrastructure");

    Cli::new("terraform")
        .args(["init", "-input=false"])
        .current_dir(dir)
        .run()
        .await?;
    Cli::new("terraform")
        .args(["apply", "-input=false", "-auto-approve"])
        .current_dir(dir)
        .run()
        .await?;

    Ok(())
}

/// Read the infrastructure outputs.
///
/// # Errors
///
/// Returns an error if terraform fails or a required output is missing.
pub async fn outputs(dir: &Path) -> Result<InfraOutputs, BootstrapError> {
    let json = Cli::new("terraform")
        .args(["output", "-json"])
        .current_dir(dir)
        .run()
        .await?;
    InfraOutputs::from_terraform_json(&json)
}

/// Write a kubeconfig for the EKS cluster to `path`.
///
/// # Errors
///
/// Returns the failing command's stderr.
pub async fn write_kubeconfig(
    cluster_name: &str,
    region: &str,
    path: &Path,
) -> Result<(), BootstrapError> {
    info!(cluster = %cluster_name, path = %path.display(), "Writing kubeconfig");

    let path = path.to_string_lossy();
    Cli::new("aws")
        .args([
            "eks",
            "update-kubeconfig",
            "--name",
            cluster_name,
            "--region",
            region,
            "--kubeconfig",
            path.as_ref(),
        ])
        .run()
        .await?;

    Ok(())
}
