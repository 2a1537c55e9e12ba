//! Bootstrap orchestration.
//!
//! Runs the stages in order on a single task. Every run starts from the first
//! stage; each stage checks its own remote state, so re-running after a
//! partial failure converges instead of duplicating resources.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use konnect::ControlPlaneApi;
use tracing::{error, info, warn};

use crate::attachment::{self, AttachmentTarget};
use crate::aws::CloudAccount;
use crate::cloud_gateway;
use crate::cluster::KubeCluster;
use crate::config::BootstrapConfig;
use crate::deck::{self, Deck, DiffSummary, SyncOutcome};
use crate::endpoint;
use crate::error::BootstrapError;
use crate::gate::{self, Criterion, ResourceKind, ResourceRef};
use crate::gitops;
use crate::grant;
use crate::infra::{self, InfraOutputs};
use crate::ollama::{self, Ollama};
use crate::portforward::PortForward;
use crate::state::{BootstrapState, RetryConfig, Stage};
use crate::tls;
use crate::ui;

/// Remote systems the orchestrator drives.
pub struct Backends {
    /// Konnect control plane and cloud gateway API.
    pub konnect: Box<dyn ControlPlaneApi>,
    /// Workload AWS account.
    pub cloud: Box<dyn CloudAccount>,
    /// decK diff/sync against the control plane.
    pub deck: Box<dyn Deck>,
}

/// Bootstrap orchestrator.
pub struct Orchestrator {
    /// Run record (persisted after every stage).
    state: BootstrapState,
    /// Retry configuration for transient errors.
    retry_config: RetryConfig,
    backends: Backends,
    /// Cluster client, available once the kubeconfig is written.
    cluster: Option<KubeCluster>,
}

impl Orchestrator {
    /// Create an orchestrator for a fresh run.
    ///
    /// A previous run's record is reported but never used to skip stages.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory cannot be created. An
    /// unreadable previous record is reported and replaced.
    pub fn new(config: BootstrapConfig, backends: Backends) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir).context("Failed to create output directory")?;

        match BootstrapState::load(&config.output_dir) {
            Ok(Some(previous)) if previous.is_complete() => {
                ui::print_info("Previous run completed; re-checking every stage");
            }
            Ok(Some(previous)) => {
                ui::print_info(&format!("Previous run stopped at: {}", previous.stage));
                if let Some(ref err) = previous.last_error {
                    ui::print_warning(&format!("Previous error: {err}"));
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Ignoring unreadable run record");
                ui::print_warning(&format!("Ignoring unreadable previous run record: {e:#}"));
            }
        }

        Ok(Self {
            state: BootstrapState::new(config),
            retry_config: RetryConfig::default(),
            backends,
            cluster: None,
        })
    }

    /// Run record.
    #[must_use]
    pub fn state(&self) -> &BootstrapState {
        &self.state
    }

    /// Run every stage from the top with automatic retry of transient errors.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error, or a transient one after all
    /// retries.
    pub async fn run_to_completion(&mut self) -> Result<()> {
        ui::print_section("Bootstrapping");
        self.state.set_stage(Stage::FIRST)?;
        self.print_stage();

        loop {
            match self.execute_current_stage().await {
                Ok(()) => {
                    self.state.advance()?;
                    if self.state.is_complete() {
                        self.print_success_summary();
                        return Ok(());
                    }
                    self.print_stage();
                }
                Err(e) => {
                    self.state.record_error(&format!("{e:#}"))?;

                    if Self::is_transient_error(&e)
                        && self.retry_config.should_retry(self.state.attempt_count)
                    {
                        let delay = self
                            .retry_config
                            .delay_for_attempt(self.state.attempt_count);
                        warn!(
                            attempt = self.state.attempt_count,
                            error = %e,
                            delay_secs = delay.as_secs(),
                            "Transient error, retrying"
                        );
                        ui::print_warning(&format!(
                            "Transient error (attempt {}): {e:#}",
                            self.state.attempt_count
                        ));
                        ui::print_info(&format!("Retrying in {} seconds...", delay.as_secs()));
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    error!(stage = ?self.state.stage, error = %e, "Bootstrap failed");
                    ui::print_error(&format!(
                        "Bootstrap failed at stage '{}': {e:#}",
                        self.state.stage
                    ));
                    ui::print_info("Re-run the same command once the cause is fixed; completed stages are re-checked, not repeated.");
                    return Err(e);
                }
            }
        }
    }

    fn print_stage(&self) {
        ui::print_progress_step(
            self.state.stage.number(),
            Stage::TOTAL,
            self.state.stage.description(),
        );
    }

    /// Execute the current stage.
    async fn execute_current_stage(&mut self) -> Result<()> {
        info!(stage = ?self.state.stage, "Executing stage");

        match self.state.stage {
            Stage::NotStarted | Stage::Complete => {}
            Stage::InfraApply => self.apply_infra().await?,
            Stage::GitOpsRoot => self.apply_gitops_root().await?,
            Stage::NamespaceGate => self.wait_namespaces().await?,
            Stage::TlsInjection => self.inject_tls().await?,
            Stage::WorkloadGate => self.wait_workload().await?,
            Stage::ModelPull => self.pull_model().await?,
            Stage::ControlPlane => self.reconcile_control_plane().await?,
            Stage::Network => self.reconcile_network().await?,
            Stage::DataPlaneGroup => self.configure_data_plane_group().await?,
            Stage::ResourceShare => self.share_transit_gateway().await?,
            Stage::Attachment => self.attach_transit_gateway().await?,
            Stage::ConfigSync => self.sync_config().await?,
        }

        Ok(())
    }

    // =========================================================================
    // Cluster stages
    // =========================================================================

    async fn apply_infra(&mut self) -> Result<()> {
        let config = &self.state.config;

        if config.skip_infra {
            ui::print_info("Skipping terraform apply (--skip-infra)");
        } else {
            infra::apply(&config.terraform_dir).await?;
            ui::print_success("Infrastructure applied");
        }

        let outputs = infra::outputs(&config.terraform_dir).await?;
        let kubeconfig = config.kubeconfig_path();
        infra::write_kubeconfig(&outputs.cluster_name, &config.aws_region, &kubeconfig).await?;

        ui::print_kv("Cluster", &outputs.cluster_name);
        ui::print_kv("Transit gateway", &outputs.transit_gateway_id);
        ui::print_kv("Kubeconfig", &kubeconfig.display().to_string());

        self.state.set_infra(outputs)?;
        self.state.set_kubeconfig(kubeconfig)?;
        self.cluster = None;
        Ok(())
    }

    fn kubeconfig(&self) -> Result<PathBuf> {
        self.state
            .kubeconfig_path
            .clone()
            .context("kubeconfig not written yet")
    }

    async fn cluster(&mut self) -> Result<&KubeCluster> {
        if self.cluster.is_none() {
            let path = self.kubeconfig()?;
            self.cluster = Some(KubeCluster::from_kubeconfig(&path).await?);
        }
        self.cluster.as_ref().context("cluster client not initialised")
    }

    async fn apply_gitops_root(&mut self) -> Result<()> {
        let kubeconfig = self.kubeconfig()?;
        let config = self.state.config.clone();

        let apps = gitops::applications(&config.root_app_manifest, &config.argocd_namespace)?;
        gitops::apply_root(&kubeconfig, &config.root_app_manifest).await?;
        for app in &apps {
            ui::print_list_item(&app.to_string());
        }

        let cluster = self.cluster().await?;
        gate::wait_for(
            cluster,
            "root application",
            &apps,
            Criterion::Exists,
            &config.timeouts.gitops,
        )
        .await?;
        ui::print_success("Root application registered with Argo CD");
        Ok(())
    }

    async fn wait_namespaces(&mut self) -> Result<()> {
        let config = self.state.config.clone();
        let refs = [
            ResourceRef::namespace(&config.model_namespace),
            ResourceRef::namespace(&config.ingress_namespace),
        ];

        let cluster = self.cluster().await?;
        gate::wait_for(
            cluster,
            "first sync wave namespaces",
            &refs,
            Criterion::Exists,
            &config.timeouts.namespaces,
        )
        .await?;
        ui::print_success("Namespaces created");
        Ok(())
    }

    async fn inject_tls(&mut self) -> Result<()> {
        let config = self.state.config.clone();
        let cluster = self.cluster().await?;
        tls::inject(cluster, cluster, &config).await?;
        ui::print_success("Gateway listener programmed");
        Ok(())
    }

    async fn wait_workload(&mut self) -> Result<()> {
        let config = self.state.config.clone();
        let refs = [
            ResourceRef::namespaced(
                ResourceKind::Deployment,
                &config.model_namespace,
                &config.model_deployment,
            ),
            ResourceRef::namespaced(
                ResourceKind::Service,
                &config.model_namespace,
                &config.model_service,
            ),
        ];

        let cluster = self.cluster().await?;
        gate::wait_for(
            cluster,
            "model server",
            &refs,
            Criterion::Healthy,
            &config.timeouts.workload,
        )
        .await?;
        ui::print_success("Model server ready");
        Ok(())
    }

    async fn pull_model(&mut self) -> Result<()> {
        let config = &self.state.config;
        if config.model.is_empty() {
            ui::print_info("No model configured, skipping pull");
            return Ok(());
        }

        let kubeconfig = self.kubeconfig()?;
        let forward = PortForward::start(
            &kubeconfig,
            &config.model_namespace,
            &config.model_service,
            config.local_port,
            config.model_port,
        )?;

        let ollama = Ollama::new(&forward.url());
        match ollama::ensure_model(&ollama, &config.model, &config.timeouts.model_pull).await? {
            ollama::ModelPull::AlreadyPresent => {
                ui::print_success(&format!("Model {} already present", config.model));
            }
            ollama::ModelPull::Pulled => {
                ui::print_success(&format!("Model {} pulled", config.model));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Remote control plane stages
    // =========================================================================

    async fn reconcile_control_plane(&mut self) -> Result<()> {
        let cp =
            cloud_gateway::ensure_control_plane(self.backends.konnect.as_ref(), &self.state.config)
                .await?;

        report_reconciled("Control plane", &self.state.config.control_plane_name(), &cp.id, cp.adopted);
        self.state.update(|d| {
            d.control_plane_id = Some(cp.id);
            d.control_plane_adopted = cp.adopted;
        })?;
        Ok(())
    }

    async fn reconcile_network(&mut self) -> Result<()> {
        let api = self.backends.konnect.as_ref();
        let config = &self.state.config;

        let account = cloud_gateway::aws_provider_account(api).await?;
        let kong_account = config
            .kong_aws_account_id
            .clone()
            .unwrap_or_else(|| account.provider_account_id.clone());

        let network = cloud_gateway::ensure_network(api, config, &account).await?;
        report_reconciled("Network", &config.network_name(), &network.id, network.adopted);

        let network_id = network.id.clone();
        self.state.update(|d| {
            d.network_id = Some(network.id);
            d.kong_aws_account_id = Some(kong_account);
        })?;

        cloud_gateway::wait_network_ready(
            self.backends.konnect.as_ref(),
            &self.state.config,
            &network_id,
        )
        .await?;
        ui::print_success("Network ready");
        Ok(())
    }

    async fn configure_data_plane_group(&mut self) -> Result<()> {
        let discovered = &self.state.discovered;
        let cp_id = required(&discovered.control_plane_id, "control plane ID")?;
        let network_id = required(&discovered.network_id, "network ID")?;

        cloud_gateway::configure_data_plane_group(
            self.backends.konnect.as_ref(),
            &self.state.config,
            cp_id,
            network_id,
        )
        .await?;
        ui::print_success("Data plane group placed on network");
        Ok(())
    }

    fn infra(&self) -> Result<&InfraOutputs> {
        self.state
            .infra
            .as_ref()
            .context("infrastructure outputs not captured yet")
    }

    async fn share_transit_gateway(&mut self) -> Result<()> {
        let infra = self.infra()?;
        let principal = required(&self.state.discovered.kong_aws_account_id, "Kong AWS account ID")?;

        let grant = grant::ensure_grant(
            self.backends.cloud.as_ref(),
            &self.state.config,
            &infra.transit_gateway_arn,
            principal,
        )
        .await?;

        self.state.update(|d| {
            d.resource_share_arn = Some(grant.share_arn);
            d.grant_associated = grant.associated;
        })?;
        Ok(())
    }

    async fn attach_transit_gateway(&mut self) -> Result<()> {
        let infra = self.infra()?;
        let discovered = &self.state.discovered;
        let config = &self.state.config;

        let target = AttachmentTarget {
            network_id: required(&discovered.network_id, "network ID")?,
            transit_gateway_id: &infra.transit_gateway_id,
            ram_share_arn: required(&discovered.resource_share_arn, "resource share ARN")?,
            cidr_blocks: vec![infra.vpc_cidr.clone().unwrap_or_else(|| config.vpc_cidr.clone())],
        };

        let api = self.backends.konnect.as_ref();
        let reconciled = attachment::ensure_attachment(api, config, &target).await?;
        report_reconciled(
            "Transit gateway attachment",
            &config.attachment_name(),
            &reconciled.id,
            reconciled.adopted,
        );

        let ready = attachment::wait_attachment_ready(
            api,
            self.backends.cloud.as_ref(),
            config,
            &target,
            &reconciled.id,
        )
        .await;

        let attachment_id = reconciled.id;
        self.state.update(|d| d.attachment_id = Some(attachment_id))?;
        ready?;
        ui::print_success("Transit gateway attachment ready");
        Ok(())
    }

    // =========================================================================
    // Config sync
    // =========================================================================

    async fn sync_config(&mut self) -> Result<()> {
        let config = self.state.config.clone();

        let cluster = self.cluster().await?;
        let address = endpoint::discover(cluster, &config).await?;
        ui::print_kv("Gateway endpoint", &address);
        endpoint::render(&config, &address)?;

        let auto_approve = config.auto_approve;
        let outcome = deck::push(self.backends.deck.as_ref(), |summary| {
            approve_sync(summary, auto_approve)
        })
        .await?;
        if let SyncOutcome::Declined(summary) = outcome {
            warn!(%summary, "Gateway configuration left unsynced");
        }

        self.state.update(|d| d.endpoint = Some(address))?;
        Ok(())
    }

    /// Check if an error is transient and should be retried.
    ///
    /// Timeouts are not retried here; each wait already had its full budget.
    fn is_transient_error(error: &anyhow::Error) -> bool {
        error
            .chain()
            .find_map(|cause| cause.downcast_ref::<BootstrapError>())
            .is_some_and(BootstrapError::is_transient)
    }

    /// Print success summary at the end.
    fn print_success_summary(&self) {
        let discovered = &self.state.discovered;
        ui::print_section("Bootstrap Complete");
        ui::print_success("Private inference gateway is wired up.");

        ui::print_kv("Deployment", &self.state.config.deployment_name);
        let rows = [
            ("Control plane", &discovered.control_plane_id),
            ("Network", &discovered.network_id),
            ("Resource share", &discovered.resource_share_arn),
            ("Attachment", &discovered.attachment_id),
            ("Endpoint", &discovered.endpoint),
        ];
        for (key, value) in rows {
            if let Some(value) = value {
                ui::print_kv(key, value);
            }
        }
        if !discovered.grant_associated {
            ui::print_warning("Resource share association was never confirmed");
        }
    }
}

/// An identifier an earlier stage of this run should have recorded.
fn required<'a>(value: &'a Option<String>, what: &str) -> Result<&'a str> {
    value
        .as_deref()
        .with_context(|| format!("{what} missing; an earlier stage did not record it"))
}

fn report_reconciled(kind: &str, name: &str, id: &str, adopted: bool) {
    let verb = if adopted { "adopted" } else { "created" };
    ui::print_success(&format!("{kind} {name} {verb} ({id})"));
}

/// Ask before pushing gateway configuration, unless approved up front.
fn approve_sync(summary: &DiffSummary, auto_approve: bool) -> bool {
    if auto_approve {
        return true;
    }
    if !std::io::stdin().is_terminal() {
        ui::print_warning("Not a terminal; pass --yes to sync gateway configuration");
        return false;
    }

    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Sync gateway configuration ({summary})?"))
        .default(true)
        .interact()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Confirmation prompt failed");
            false
        })
}
