//! Declarative gateway configuration push with decK.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use crate::exec::Cli;
use crate::ui;

/// Counts from `deck gateway diff --json-output`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DiffSummary {
    #[serde(default)]
    pub creating: u32,
    #[serde(default)]
    pub updating: u32,
    #[serde(default)]
    pub deleting: u32,
    #[serde(default)]
    pub total: u32,
}

impl DiffSummary {
    /// Whether the remote already matches the document.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0 && self.creating == 0 && self.updating == 0 && self.deleting == 0
    }
}

impl std::fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete",
            self.creating, self.updating, self.deleting
        )
    }
}

#[derive(Deserialize)]
struct DiffOutput {
    #[serde(default)]
    summary: DiffSummary,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Parse `deck gateway diff --json-output`.
///
/// # Errors
///
/// Returns an error if the output is not JSON or reports errors.
pub fn parse_diff(json: &str) -> Result<DiffSummary, BootstrapError> {
    let out: DiffOutput = serde_json::from_str(json)?;
    if !out.errors.is_empty() {
        return Err(BootstrapError::Command {
            program: "deck gateway diff".to_string(),
            stderr: out
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        });
    }
    Ok(out.summary)
}

/// Diff and sync against the remote control plane.
#[async_trait]
pub trait Deck: Send + Sync {
    /// Compare the document with the remote state.
    async fn diff(&self) -> Result<DiffSummary, BootstrapError>;
    /// Make the remote state match the document.
    async fn sync(&self) -> Result<(), BootstrapError>;
}

/// [`Deck`] backed by the `deck` CLI.
pub struct DeckCli {
    file: PathBuf,
    control_plane_name: String,
    konnect_addr: String,
    token: String,
}

impl std::fmt::Debug for DeckCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeckCli")
            .field("file", &self.file)
            .field("control_plane_name", &self.control_plane_name)
            .field("konnect_addr", &self.konnect_addr)
            .finish_non_exhaustive()
    }
}

impl DeckCli {
    /// Build from config; `konnect_addr` is the regional API URL.
    #[must_use]
    pub fn new(config: &BootstrapConfig, konnect_addr: &str) -> Self {
        Self {
            file: config.deck_file.clone(),
            control_plane_name: config.control_plane_name(),
            konnect_addr: konnect_addr.to_string(),
            token: config.konnect_token.clone(),
        }
    }

    /// The token goes through the child's environment, never argv.
    fn deck(&self, subcommand: &str) -> Cli {
        let file = self.file.to_string_lossy();
        Cli::new("deck")
            .args(["gateway", subcommand, file.as_ref()])
            .args([
                "--konnect-addr",
                self.konnect_addr.as_str(),
                "--konnect-control-plane-name",
                self.control_plane_name.as_str(),
            ])
            .env("DECK_KONNECT_TOKEN", &self.token)
    }
}

#[async_trait]
impl Deck for DeckCli {
    async fn diff(&self) -> Result<DiffSummary, BootstrapError> {
        let out = self.deck("diff").args(["--json-output"]).run().await?;
        parse_diff(&out)
    }

    async fn sync(&self) -> Result<(), BootstrapError> {
        self.deck("sync").run().await?;
        Ok(())
    }
}

/// Outcome of a configuration push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to change.
    InSync,
    /// Changes applied.
    Applied(DiffSummary),
    /// Changes found but not approved.
    Declined(DiffSummary),
}

/// Diff, then sync only if there are changes and `approve` agrees.
///
/// # Errors
///
/// Returns the failing decK command's error.
pub async fn push(
    deck: &dyn Deck,
    approve: impl FnOnce(&DiffSummary) -> bool,
) -> Result<SyncOutcome, BootstrapError> {
    let summary = deck.diff().await?;
    if summary.is_empty() {
        ui::print_success("Gateway configuration already in sync");
        return Ok(SyncOutcome::InSync);
    }

    ui::print_info(&format!("Gateway configuration diff: {summary}"));
    if !approve(&summary) {
        ui::print_warning("Gateway configuration sync skipped");
        return Ok(SyncOutcome::Declined(summary));
    }

    deck.sync().await?;
    info!(creating = summary.creating, updating = summary.updating, deleting = summary.deleting, "Gateway configuration synced");
    ui::print_success("Gateway configuration synced");
    Ok(SyncOutcome::Applied(summary))
}
