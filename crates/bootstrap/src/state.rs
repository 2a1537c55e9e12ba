//! Bootstrap stages and the persisted run record.
//!
//! The record is written after every stage so an operator (or `status`) can
//! see how far the last run got and which remote identifiers it discovered.
//! It is never used to skip a stage: every run starts from the top and each
//! stage re-checks its own remote state.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::BootstrapConfig;
use crate::infra::InfraOutputs;

/// Ordered bootstrap stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Not yet started.
    NotStarted,
    /// Applying infrastructure and reading its outputs.
    InfraApply,
    /// Applying the Argo CD root application.
    GitOpsRoot,
    /// Waiting for the first sync wave's namespaces.
    NamespaceGate,
    /// Injecting the gateway TLS secret and waiting for the listener.
    TlsInjection,
    /// Waiting for the model server to have ready replicas.
    WorkloadGate,
    /// Pulling the model onto the server.
    ModelPull,
    /// Creating or adopting the Konnect control plane.
    ControlPlane,
    /// Creating or adopting the cloud gateway network.
    Network,
    /// Placing the data plane group on the network.
    DataPlaneGroup,
    /// Sharing the transit gateway with Kong's account.
    ResourceShare,
    /// Attaching the cloud gateway network to the transit gateway.
    Attachment,
    /// Discovering the gateway address and syncing the decK document.
    ConfigSync,
    /// All stages done.
    Complete,
}

impl Stage {
    /// First real stage.
    pub const FIRST: Self = Self::InfraApply;

    /// Total number of stages.
    pub const TOTAL: u8 = 13;

    /// Get the next stage in the sequence.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::NotStarted => Self::InfraApply,
            Self::InfraApply => Self::GitOpsRoot,
            Self::GitOpsRoot => Self::NamespaceGate,
            Self::NamespaceGate => Self::TlsInjection,
            Self::TlsInjection => Self::WorkloadGate,
            Self::WorkloadGate => Self::ModelPull,
            Self::ModelPull => Self::ControlPlane,
            Self::ControlPlane => Self::Network,
            Self::Network => Self::DataPlaneGroup,
            Self::DataPlaneGroup => Self::ResourceShare,
            Self::ResourceShare => Self::Attachment,
            Self::Attachment => Self::ConfigSync,
            Self::ConfigSync | Self::Complete => Self::Complete,
        }
    }

    /// Get a human-readable description of the stage.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::InfraApply => "Applying infrastructure",
            Self::GitOpsRoot => "Applying Argo CD root application",
            Self::NamespaceGate => "Waiting for namespaces",
            Self::TlsInjection => "Injecting gateway TLS secret",
            Self::WorkloadGate => "Waiting for model server",
            Self::ModelPull => "Pulling model",
            Self::ControlPlane => "Reconciling Konnect control plane",
            Self::Network => "Reconciling cloud gateway network",
            Self::DataPlaneGroup => "Configuring data plane group",
            Self::ResourceShare => "Sharing transit gateway with Kong",
            Self::Attachment => "Attaching transit gateway",
            Self::ConfigSync => "Syncing gateway configuration",
            Self::Complete => "Complete",
        }
    }

    /// Get the stage number for progress display.
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::InfraApply => 1,
            Self::GitOpsRoot => 2,
            Self::NamespaceGate => 3,
            Self::TlsInjection => 4,
            Self::WorkloadGate => 5,
            Self::ModelPull => 6,
            Self::ControlPlane => 7,
            Self::Network => 8,
            Self::DataPlaneGroup => 9,
            Self::ResourceShare => 10,
            Self::Attachment => 11,
            Self::ConfigSync => 12,
            Self::Complete => 13,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Remote identifiers discovered during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Discovered {
    /// Konnect control plane ID.
    pub control_plane_id: Option<String>,
    /// Whether the control plane was adopted rather than created.
    #[serde(default)]
    pub control_plane_adopted: bool,
    /// Konnect cloud gateway network ID.
    pub network_id: Option<String>,
    /// Kong's AWS account ID (RAM principal).
    pub kong_aws_account_id: Option<String>,
    /// RAM resource share ARN.
    pub resource_share_arn: Option<String>,
    /// Whether the RAM principal association was observed.
    #[serde(default)]
    pub grant_associated: bool,
    /// Konnect transit gateway attachment ID.
    pub attachment_id: Option<String>,
    /// Gateway load balancer hostname.
    pub endpoint: Option<String>,
}

/// Persisted record of the last run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapState {
    /// Configuration the run used (token excluded).
    pub config: BootstrapConfig,
    /// Last stage entered.
    pub stage: Stage,
    /// Infrastructure outputs.
    pub infra: Option<InfraOutputs>,
    /// Discovered remote identifiers.
    #[serde(default)]
    pub discovered: Discovered,
    /// Path to kubeconfig (once written).
    pub kubeconfig_path: Option<PathBuf>,
    /// Timestamp of last state update.
    pub updated_at: String,
    /// Number of retry attempts for the current stage.
    pub attempt_count: u32,
    /// Last error message (if any).
    pub last_error: Option<String>,
}

impl BootstrapState {
    /// Create a new state record.
    #[must_use]
    pub fn new(config: BootstrapConfig) -> Self {
        Self {
            config,
            stage: Stage::NotStarted,
            infra: None,
            discovered: Discovered::default(),
            kubeconfig_path: None,
            updated_at: chrono::Utc::now().to_rfc3339(),
            attempt_count: 0,
            last_error: None,
        }
    }

    /// Get the state file path for a given output directory.
    #[must_use]
    pub fn state_file(output_dir: &Path) -> PathBuf {
        output_dir.join("bootstrap-state.json")
    }

    /// Load state from file if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(output_dir: &Path) -> Result<Option<Self>> {
        let path = Self::state_file(output_dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).context("Failed to read state file")?;
        let state: Self = serde_json::from_str(&content).context("Failed to parse state file")?;

        info!(
            "Loaded bootstrap state: stage={:?}, attempt={}",
            state.stage, state.attempt_count
        );
        Ok(Some(state))
    }

    /// Save state to file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&mut self) -> Result<()> {
        self.updated_at = chrono::Utc::now().to_rfc3339();

        let path = Self::state_file(&self.config.output_dir);
        std::fs::create_dir_all(&self.config.output_dir)
            .context("Failed to create output directory")?;

        let content = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        let mut file = tempfile::NamedTempFile::new_in(&self.config.output_dir)
            .context("Failed to create temporary state file")?;
        file.write_all(content.as_bytes())
            .context("Failed to write state file")?;
        file.persist(&path).context("Failed to replace state file")?;

        Ok(())
    }

    /// Update the current stage and save.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn set_stage(&mut self, stage: Stage) -> Result<()> {
        info!("Stage: {} -> {}", self.stage, stage);
        self.stage = stage;
        self.attempt_count = 0;
        self.last_error = None;
        self.save()
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn advance(&mut self) -> Result<()> {
        let next = self.stage.next();
        self.set_stage(next)
    }

    /// Record an error for the current stage.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn record_error(&mut self, error: &str) -> Result<()> {
        self.last_error = Some(error.to_string());
        self.attempt_count += 1;
        self.save()
    }

    /// Persist whatever was discovered so far.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn update(&mut self, f: impl FnOnce(&mut Discovered)) -> Result<()> {
        f(&mut self.discovered);
        self.save()
    }

    /// Set the infrastructure outputs.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn set_infra(&mut self, outputs: InfraOutputs) -> Result<()> {
        self.infra = Some(outputs);
        self.save()
    }

    /// Set the kubeconfig path.
    ///
    /// # Errors
    ///
    /// Returns an error if saving fails.
    pub fn set_kubeconfig(&mut self, path: PathBuf) -> Result<()> {
        self.kubeconfig_path = Some(path);
        self.save()
    }

    /// Check if the run completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }
}

/// Retry configuration for transient stage failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(120),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given attempt number.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt.min(10)).unwrap_or(10);
        let multiplier = self.backoff_multiplier.powi(exp);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let capped = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Check if we should retry given the current attempt count.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progression() {
        let mut stage = Stage::NotStarted;
        let mut count = 0;
        while stage != Stage::Complete {
            stage = stage.next();
            count += 1;
            assert_eq!(stage.number(), count);
        }
        assert_eq!(count, Stage::TOTAL);
        assert_eq!(Stage::Complete.next(), Stage::Complete);
        assert_eq!(Stage::NotStarted.next(), Stage::FIRST);
    }

    #[test]
    fn test_cross_account_stages_are_ordered() {
        assert!(Stage::Network < Stage::ResourceShare);
        assert!(Stage::ResourceShare < Stage::Attachment);
        assert!(Stage::Attachment < Stage::ConfigSync);
    }

    #[test]
    fn test_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(10));
        assert!(config.delay_for_attempt(100) <= config.max_delay);
        assert!(config.should_retry(4));
        assert!(!config.should_retry(5));
    }

    #[test]
    fn test_state_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BootstrapConfig::with_defaults("demo".into());
        config.output_dir = dir.path().to_path_buf();
        config.konnect_token = "kpat_secret".into();

        let mut state = BootstrapState::new(config);
        state.set_stage(Stage::Network).unwrap();
        state
            .update(|d| d.control_plane_id = Some("abc123".into()))
            .unwrap();
        state.record_error("network quota exceeded").unwrap();

        let loaded = BootstrapState::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.stage, Stage::Network);
        assert_eq!(loaded.attempt_count, 1);
        assert_eq!(loaded.discovered.control_plane_id.as_deref(), Some("abc123"));
        assert!(loaded.config.konnect_token.is_empty());

        let raw = std::fs::read_to_string(BootstrapState::state_file(dir.path())).unwrap();
        assert!(!raw.contains("kpat_secret"));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BootstrapState::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_repeated_saves_leave_only_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BootstrapConfig::with_defaults("demo".into());
        config.output_dir = dir.path().to_path_buf();

        let mut state = BootstrapState::new(config);
        state.set_stage(Stage::InfraApply).unwrap();
        state.advance().unwrap();
        state.advance().unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["bootstrap-state.json".to_string()]);

        let loaded = BootstrapState::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.stage, Stage::InfraApply.next().next());
    }

    #[test]
    fn test_truncated_record_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(BootstrapState::state_file(dir.path()), "{\"stage\": \"net").unwrap();

        let err = BootstrapState::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse state file"));
    }
}
