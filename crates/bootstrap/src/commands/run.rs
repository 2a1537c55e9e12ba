use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use konnect::Konnect;

use crate::aws::AwsCli;
use crate::config::BootstrapConfig;
use crate::deck::DeckCli;
use crate::orchestrator::{Backends, Orchestrator};
use crate::ui;

/// Options shared by every subcommand that reads the deployment config.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Deployment name; prefix of every logical resource name
    #[arg(short = 'n', long)]
    deployment_name: Option<String>,

    /// AWS region of the workload account
    #[arg(long)]
    region: Option<String>,

    /// Directory for kubeconfig and run state
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// decK document with the gateway configuration
    #[arg(long, value_name = "FILE")]
    deck_file: Option<PathBuf>,
}

impl ConfigArgs {
    /// Config file (or defaults) with command-line overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn resolve(&self) -> Result<BootstrapConfig> {
        let mut config = match &self.config {
            Some(path) => BootstrapConfig::load(path)?,
            None => BootstrapConfig::default(),
        };

        // An output dir nobody chose follows the deployment name.
        let unchosen = [
            BootstrapConfig::default().output_dir,
            BootstrapConfig::with_defaults(config.deployment_name.clone()).output_dir,
        ];
        if let Some(name) = &self.deployment_name {
            config.deployment_name.clone_from(name);
        }
        if unchosen.contains(&config.output_dir) {
            config.output_dir = BootstrapConfig::with_defaults(config.deployment_name.clone()).output_dir;
        }
        if let Some(region) = &self.region {
            config.aws_region.clone_from(region);
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(file) = &self.deck_file {
            config.deck_file.clone_from(file);
        }
        Ok(config)
    }
}

/// Bring the whole stack up, re-checking every stage
#[derive(Args, Debug)]
pub struct RunCommand {
    #[command(flatten)]
    config: ConfigArgs,

    /// Konnect personal or system access token
    #[arg(long, env = "KONNECT_TOKEN", hide_env_values = true)]
    konnect_token: Option<String>,

    /// Konnect API base URL (proxies, testing)
    #[arg(long, value_name = "URL")]
    konnect_base_url: Option<String>,

    /// Terraform root module for the VPC, cluster and transit gateway
    #[arg(long, value_name = "DIR")]
    terraform_dir: Option<PathBuf>,

    /// Skip terraform apply and only read its outputs
    #[arg(long)]
    skip_infra: bool,

    /// Kong's AWS account ID (discovered from Konnect when omitted)
    #[arg(long, value_name = "ACCOUNT_ID")]
    kong_aws_account: Option<String>,

    /// Fail when the resource share association is not confirmed in time
    #[arg(long)]
    strict_grant: bool,

    /// Sync gateway configuration without asking
    #[arg(short = 'y', long)]
    yes: bool,
}

impl RunCommand {
    fn build_config(&self) -> Result<BootstrapConfig> {
        let mut config = self.config.resolve()?;

        if let Some(token) = &self.konnect_token {
            config.konnect_token.clone_from(token);
        }
        if let Some(url) = &self.konnect_base_url {
            config.konnect_base_url = Some(url.clone());
        }
        if let Some(dir) = &self.terraform_dir {
            config.terraform_dir.clone_from(dir);
        }
        if let Some(account) = &self.kong_aws_account {
            config.kong_aws_account_id = Some(account.clone());
        }
        config.skip_infra |= self.skip_infra;
        config.strict_grant |= self.strict_grant;
        config.auto_approve |= self.yes;

        config.validate()?;
        Ok(config)
    }

    pub async fn run(&self) -> Result<()> {
        ui::print_banner();
        let config = self.build_config()?;

        ui::print_section("Configuration");
        ui::print_kv("Deployment", &config.deployment_name);
        ui::print_kv("Region", &config.aws_region);
        ui::print_kv("Konnect geo", &config.konnect_region);
        ui::print_kv("Output", &config.output_dir.display().to_string());

        let mut konnect = Konnect::new(config.konnect_token.clone(), &config.konnect_region)
            .context("Failed to create Konnect client")?;
        if let Some(url) = &config.konnect_base_url {
            konnect = konnect.with_base_url(url.clone());
        }

        let backends = Backends {
            deck: Box::new(DeckCli::new(&config, konnect.regional_url())),
            cloud: Box::new(AwsCli::new(&config.aws_region)),
            konnect: Box::new(konnect),
        };

        let mut orchestrator = Orchestrator::new(config, backends)?;
        orchestrator.run_to_completion().await?;

        println!();
        println!("{}", "Stack is up.".green().bold());
        Ok(())
    }
}
