use anyhow::{Context, Result};
use clap::Args;

use crate::cluster::KubeCluster;
use crate::endpoint;
use crate::state::BootstrapState;
use crate::ui;

use super::run::ConfigArgs;

/// Substitute the gateway endpoint into the decK document without syncing
#[derive(Args, Debug)]
pub struct RenderCommand {
    #[command(flatten)]
    config: ConfigArgs,
}

impl RenderCommand {
    pub async fn run(&self) -> Result<()> {
        let config = self.config.resolve()?;

        let kubeconfig = BootstrapState::load(&config.output_dir)?
            .and_then(|s| s.kubeconfig_path)
            .unwrap_or_else(|| config.kubeconfig_path());
        let cluster = KubeCluster::from_kubeconfig(&kubeconfig)
            .await
            .with_context(|| format!("No usable kubeconfig at {}", kubeconfig.display()))?;

        ui::print_section("Rendering gateway configuration");
        let address = endpoint::discover(&cluster, &config).await?;
        ui::print_kv("Gateway endpoint", &address);
        endpoint::render(&config, &address)?;
        Ok(())
    }
}
