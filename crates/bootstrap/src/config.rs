//! Bootstrap configuration types.
//!
//! One explicit struct is threaded through every stage; nothing is read from
//! process-wide environment variables after the CLI has been parsed.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::poll::PollConfig;

/// Wait budgets for every polling stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Namespaces created by the first sync wave.
    pub namespaces: PollConfig,
    /// Argo CD root application healthy.
    pub gitops: PollConfig,
    /// Gateway listener healthy after the TLS secret lands.
    pub gateway: PollConfig,
    /// Model server Deployment has ready replicas.
    pub workload: PollConfig,
    /// Model pull through the port-forward.
    pub model_pull: PollConfig,
    /// Konnect network `ready` (multi-minute).
    pub network: PollConfig,
    /// RAM principal association (crosses the account boundary).
    pub grant: PollConfig,
    /// Transit gateway attachment `ready` (multi-minute).
    pub attachment: PollConfig,
    /// Load balancer hostname assigned.
    pub endpoint: PollConfig,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            namespaces: PollConfig::new(5, 300),
            gitops: PollConfig::new(15, 1_800),
            gateway: PollConfig::new(10, 600),
            workload: PollConfig::new(15, 1_800),
            model_pull: PollConfig::new(2, 60),
            network: PollConfig::new(30, 1_800),
            grant: PollConfig::new(15, 600),
            attachment: PollConfig::new(30, 1_800),
            endpoint: PollConfig::new(10, 600),
        }
    }
}

impl Timeouts {
    /// Every budget with its config key.
    #[must_use]
    pub fn named(&self) -> [(&'static str, PollConfig); 9] {
        [
            ("namespaces", self.namespaces),
            ("gitops", self.gitops),
            ("gateway", self.gateway),
            ("workload", self.workload),
            ("model_pull", self.model_pull),
            ("network", self.network),
            ("grant", self.grant),
            ("attachment", self.attachment),
            ("endpoint", self.endpoint),
        ]
    }
}

/// IPv4 block in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ipv4Cidr {
    base: u32,
    prefix: u32,
}

impl Ipv4Cidr {
    fn parse(value: &str) -> Result<Self> {
        let (addr, prefix) = value
            .split_once('/')
            .with_context(|| format!("{value} is not in a.b.c.d/n form"))?;
        let addr: Ipv4Addr = addr
            .parse()
            .with_context(|| format!("{value} has an invalid address"))?;
        let prefix: u32 = prefix
            .parse()
            .with_context(|| format!("{value} has an invalid prefix length"))?;
        if prefix > 32 {
            anyhow::bail!("{value} has a prefix length above 32");
        }
        Ok(Self {
            base: u32::from(addr),
            prefix,
        })
    }

    fn mask(prefix: u32) -> u32 {
        u32::MAX.checked_shl(32 - prefix).unwrap_or(0)
    }

    /// Two blocks overlap when they agree on the shorter prefix.
    fn overlaps(self, other: Self) -> bool {
        let mask = Self::mask(self.prefix.min(other.prefix));
        self.base & mask == other.base & mask
    }
}

/// Full bootstrap configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    // Identity
    /// Deployment name; prefix of every logical name.
    pub deployment_name: String,
    /// AWS region of the workload account.
    pub aws_region: String,
    /// Output directory for kubeconfig and state.
    pub output_dir: PathBuf,

    // Infrastructure
    /// Terraform root module for the VPC, EKS cluster and transit gateway.
    pub terraform_dir: PathBuf,
    /// Skip `terraform apply` (outputs are still read).
    pub skip_infra: bool,

    // GitOps
    /// Argo CD root application manifest (app-of-apps).
    pub root_app_manifest: PathBuf,
    /// Namespace Argo CD runs in.
    pub argocd_namespace: String,

    // Workload
    /// Namespace of the model server.
    pub model_namespace: String,
    /// Model server Deployment.
    pub model_deployment: String,
    /// Model server Service.
    pub model_service: String,
    /// Model server port.
    pub model_port: u16,
    /// Model to pull onto the server; empty disables the pull.
    pub model: String,
    /// Local port for the model-pull port-forward.
    pub local_port: u16,

    // Ingress
    /// Namespace of the Istio gateway.
    pub ingress_namespace: String,
    /// Gateway API `Gateway` name.
    pub gateway_name: String,
    /// Service Istio provisions for the gateway (internal NLB).
    pub gateway_service: String,
    /// TLS secret the gateway listener references.
    pub tls_secret_name: String,
    /// Hostname on the gateway certificate.
    pub tls_hostname: String,

    // Konnect
    /// Konnect personal or system access token. Never persisted.
    #[serde(skip_serializing)]
    pub konnect_token: String,
    /// Konnect geo for regional APIs.
    pub konnect_region: String,
    /// Override for the Konnect API base URL.
    pub konnect_base_url: Option<String>,
    /// Kong Gateway version for the data plane group.
    pub kong_version: String,
    /// Cloud gateway network CIDR (must not overlap `vpc_cidr`).
    pub network_cidr: String,
    /// Availability zone IDs for the cloud gateway network.
    pub availability_zones: Vec<String>,
    /// Kong's AWS account ID; discovered from Konnect when unset.
    pub kong_aws_account_id: Option<String>,
    /// Baseline requests per second for the data plane group.
    pub base_rps: u32,

    // Cross-account grant
    /// Workload VPC CIDR routed from the cloud gateway network.
    pub vpc_cidr: String,
    /// Treat a grant association timeout as fatal.
    pub strict_grant: bool,

    // Declarative config
    /// decK document with the gateway configuration.
    pub deck_file: PathBuf,
    /// Placeholder token replaced by the load balancer hostname.
    pub endpoint_placeholder: String,
    /// Sync without asking for confirmation.
    pub auto_approve: bool,

    // Timing
    /// Wait budgets.
    pub timeouts: Timeouts,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self::with_defaults("ollama-eks".into())
    }
}

impl BootstrapConfig {
    /// Create config with sensible defaults for a given deployment name.
    #[must_use]
    pub fn with_defaults(deployment_name: String) -> Self {
        let output_dir = PathBuf::from(".bootstrap").join(&deployment_name);
        Self {
            deployment_name,
            aws_region: "us-west-2".into(),
            output_dir,
            terraform_dir: PathBuf::from("terraform"),
            skip_infra: false,
            root_app_manifest: PathBuf::from("gitops/root-app.yaml"),
            argocd_namespace: "argocd".into(),
            model_namespace: "ollama".into(),
            model_deployment: "ollama".into(),
            model_service: "ollama".into(),
            model_port: 11434,
            model: "qwen3-coder:32b".into(),
            local_port: 11434,
            ingress_namespace: "istio-ingress".into(),
            gateway_name: "ollama-gateway".into(),
            gateway_service: "ollama-gateway-istio".into(),
            tls_secret_name: "ollama-gateway-tls".into(),
            tls_hostname: "ollama.internal".into(),
            konnect_token: String::new(),
            konnect_region: "us".into(),
            konnect_base_url: None,
            kong_version: "3.9".into(),
            network_cidr: "192.168.0.0/16".into(),
            availability_zones: vec!["usw2-az1".into(), "usw2-az2".into()],
            kong_aws_account_id: None,
            base_rps: 100,
            vpc_cidr: "10.0.0.0/16".into(),
            strict_grant: false,
            deck_file: PathBuf::from("kong/kong.yaml"),
            endpoint_placeholder: "${NLB_HOSTNAME}".into(),
            auto_approve: false,
            timeouts: Timeouts::default(),
        }
    }

    /// Load a TOML config file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Check cross-field constraints before anything touches a remote system.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.deployment_name.trim().is_empty() {
            anyhow::bail!("deployment_name must not be empty");
        }
        if self.konnect_token.trim().is_empty() {
            anyhow::bail!("Konnect token missing: pass --konnect-token or set KONNECT_TOKEN");
        }
        let network = Ipv4Cidr::parse(&self.network_cidr).context("Invalid network_cidr")?;
        let vpc = Ipv4Cidr::parse(&self.vpc_cidr).context("Invalid vpc_cidr")?;
        if network.overlaps(vpc) {
            anyhow::bail!(
                "network_cidr {} overlaps vpc_cidr {}",
                self.network_cidr,
                self.vpc_cidr
            );
        }
        for (name, poll) in self.timeouts.named() {
            if poll.interval.is_zero() {
                anyhow::bail!("timeouts.{name}.interval must be greater than zero");
            }
        }
        if self.availability_zones.is_empty() {
            anyhow::bail!("at least one availability zone is required");
        }
        if self.endpoint_placeholder.is_empty() {
            anyhow::bail!("endpoint_placeholder must not be empty");
        }
        Ok(())
    }

    /// Logical name of the Konnect control plane.
    #[must_use]
    pub fn control_plane_name(&self) -> String {
        format!("{}-cp", self.deployment_name)
    }

    /// Logical name of the Konnect cloud gateway network.
    #[must_use]
    pub fn network_name(&self) -> String {
        format!("{}-network", self.deployment_name)
    }

    /// Logical name of the Konnect transit gateway attachment.
    #[must_use]
    pub fn attachment_name(&self) -> String {
        format!("{}-tgw", self.deployment_name)
    }

    /// Name of the RAM resource share.
    #[must_use]
    pub fn resource_share_name(&self) -> String {
        format!("{}-konnect-tgw", self.deployment_name)
    }

    /// Konnect geo for the data plane configuration.
    #[must_use]
    pub fn control_plane_geo(&self) -> &str {
        &self.konnect_region
    }

    /// Get the state file path.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.output_dir.join("bootstrap-state.json")
    }

    /// Get the kubeconfig path.
    #[must_use]
    pub fn kubeconfig_path(&self) -> PathBuf {
        self.output_dir.join("kubeconfig")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = BootstrapConfig::with_defaults("demo".into());
        assert_eq!(config.deployment_name, "demo");
        assert_eq!(config.aws_region, "us-west-2");
        assert_eq!(config.model_port, 11434);
        assert_eq!(config.output_dir, PathBuf::from(".bootstrap/demo"));
        assert_eq!(config.timeouts.grant.timeout.as_secs(), 600);
    }

    #[test]
    fn test_logical_names() {
        let config = BootstrapConfig::with_defaults("prod".into());
        assert_eq!(config.control_plane_name(), "prod-cp");
        assert_eq!(config.network_name(), "prod-network");
        assert_eq!(config.attachment_name(), "prod-tgw");
        assert_eq!(config.resource_share_name(), "prod-konnect-tgw");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BootstrapConfig = toml::from_str(
            r#"
            deployment_name = "lab"
            aws_region = "us-east-1"

            [timeouts.network]
            interval = 5
            timeout = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.deployment_name, "lab");
        assert_eq!(config.aws_region, "us-east-1");
        assert_eq!(config.model_namespace, "ollama");
        assert_eq!(config.timeouts.network.timeout.as_secs(), 60);
        assert_eq!(config.timeouts.attachment.timeout.as_secs(), 1_800);
    }

    #[test]
    fn test_validate() {
        let mut config = BootstrapConfig::with_defaults("demo".into());
        assert!(config.validate().is_err(), "token is required");

        config.konnect_token = "kpat_x".into();
        assert!(config.validate().is_ok());

        config.network_cidr.clone_from(&config.vpc_cidr);
        assert!(config.validate().unwrap_err().to_string().contains("overlaps"));
    }

    #[test]
    fn test_nested_cidrs_overlap() {
        let mut config = BootstrapConfig::with_defaults("demo".into());
        config.konnect_token = "kpat_x".into();

        config.network_cidr = "192.168.0.0/16".into();
        config.vpc_cidr = "192.168.1.0/24".into();
        assert!(config.validate().unwrap_err().to_string().contains("overlaps"));

        config.vpc_cidr = "10.0.0.0/8".into();
        config.network_cidr = "10.200.0.0/16".into();
        assert!(config.validate().is_err());

        config.network_cidr = "192.168.0.0/24".into();
        config.vpc_cidr = "192.168.1.0/24".into();
        assert!(config.validate().is_ok());

        config.vpc_cidr = "10.0.0.0/33".into();
        assert!(format!("{:#}", config.validate().unwrap_err()).contains("vpc_cidr"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = BootstrapConfig::with_defaults("demo".into());
        config.konnect_token = "kpat_x".into();
        config.timeouts.attachment = PollConfig::new(0, 60);

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeouts.attachment.interval"));
    }

    #[test]
    fn test_token_never_serialized() {
        let mut config = BootstrapConfig::with_defaults("demo".into());
        config.konnect_token = "kpat_secret".into();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("kpat_secret"));
    }
}
