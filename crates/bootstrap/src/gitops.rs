//! Argo CD root application (app-of-apps).

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::BootstrapError;
use crate::exec::Cli;
use crate::gate::{ResourceKind, ResourceRef};

/// Read the `Application` objects declared in a manifest.
///
/// Objects without a namespace are placed in `default_namespace`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid YAML, or if it
/// declares no `Application`.
pub fn applications(path: &Path, default_namespace: &str) -> Result<Vec<ResourceRef>, BootstrapError> {
    let content = std::fs::read_to_string(path)?;

    let mut apps = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(&content) {
        let value = serde_yaml::Value::deserialize(doc).map_err(|e| BootstrapError::Command {
            program: format!("parse {}", path.display()),
            stderr: e.to_string(),
        })?;

        if value["kind"].as_str() != Some("Application") {
            continue;
        }
        let Some(name) = value["metadata"]["name"].as_str() else {
            continue;
        };
        let namespace = value["metadata"]["namespace"]
            .as_str()
            .unwrap_or(default_namespace);
        apps.push(ResourceRef::namespaced(ResourceKind::Application, namespace, name));
    }

    if apps.is_empty() {
        return Err(BootstrapError::Command {
            program: format!("parse {}", path.display()),
            stderr: "no Argo CD Application found in manifest".to_string(),
        });
    }
    Ok(apps)
}

/// `kubectl apply` the root manifest.
///
/// # Errors
///
/// Returns kubectl's stderr on failure.
pub async fn apply_root(kubeconfig: &Path, manifest: &Path) -> Result<(), BootstrapError> {
    info!(manifest = %manifest.display(), "Applying root application");

    let kubeconfig = kubeconfig.to_string_lossy();
    let manifest = manifest.to_string_lossy();
    Cli::new("kubectl")
        .args([
            "--kubeconfig",
            kubeconfig.as_ref(),
            "apply",
            "-f",
            manifest.as_ref(),
        ])
        .run()
        .await?;
    Ok(())
}
