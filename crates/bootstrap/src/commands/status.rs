use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::state::{BootstrapState, Stage};
use crate::ui;

use super::run::ConfigArgs;

/// Show the record of the last run
#[derive(Args, Debug)]
pub struct StatusCommand {
    #[command(flatten)]
    config: ConfigArgs,
}

impl StatusCommand {
    pub async fn run(&self) -> Result<()> {
        let config = self.config.resolve()?;

        let Some(state) = BootstrapState::load(&config.output_dir)? else {
            ui::print_info(&format!(
                "No run recorded in {}",
                config.output_dir.display()
            ));
            return Ok(());
        };

        print_state(&state);
        Ok(())
    }
}

fn print_state(state: &BootstrapState) {
    ui::print_section(&format!("Deployment {}", state.config.deployment_name));

    let stage = if state.is_complete() {
        "complete".green().to_string()
    } else if state.last_error.is_some() {
        format!(
            "failed at {} ({}/{})",
            state.stage,
            state.stage.number(),
            Stage::TOTAL
        )
        .red()
        .to_string()
    } else {
        format!("{} ({}/{})", state.stage, state.stage.number(), Stage::TOTAL)
    };
    ui::print_kv("Stage", &stage);
    ui::print_kv("Updated", &state.updated_at);

    if let Some(ref infra) = state.infra {
        ui::print_kv("Cluster", &infra.cluster_name);
        ui::print_kv("Transit gateway", &infra.transit_gateway_id);
    }

    let d = &state.discovered;
    let rows = [
        ("Control plane", &d.control_plane_id),
        ("Network", &d.network_id),
        ("Kong AWS account", &d.kong_aws_account_id),
        ("Resource share", &d.resource_share_arn),
        ("Attachment", &d.attachment_id),
        ("Endpoint", &d.endpoint),
    ];
    for (key, value) in rows {
        ui::print_kv(key, value.as_deref().unwrap_or("-"));
    }
    if d.resource_share_arn.is_some() && !d.grant_associated {
        ui::print_warning("Resource share association not confirmed");
    }

    if let Some(ref err) = state.last_error {
        println!();
        ui::print_error(err);
        if state.attempt_count > 1 {
            ui::print_info(&format!("after {} attempts", state.attempt_count));
        }
    }
}
