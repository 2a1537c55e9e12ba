//! Model pull on the Ollama server.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::BootstrapError;
use crate::poll::{poll_until, PollConfig, Probe};

/// Timeout for the tags probe. Pulls have no request timeout.
const PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct Tags {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PullStatus {
    #[serde(default)]
    status: String,
}

/// What [`ensure_model`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPull {
    AlreadyPresent,
    Pulled,
}

/// Minimal Ollama API client.
#[derive(Debug, Clone)]
pub struct Ollama {
    client: Client,
    base_url: String,
}

impl Ollama {
    /// Client for the server at `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Names of the models present on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or replies non-2xx.
    pub async fn models(&self) -> Result<Vec<String>, BootstrapError> {
        let tags: Tags = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Pull `model` and wait for the pull to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server reports a status
    /// other than `success`.
    pub async fn pull(&self, model: &str) -> Result<(), BootstrapError> {
        let status: PullStatus = self
            .client
            .post(format!("{}/api/pull", self.base_url))
            .json(&json!({ "model": model, "stream": false }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if status.status == "success" {
            Ok(())
        } else {
            Err(BootstrapError::ResourceFailed {
                what: format!("model pull {model}"),
                state: status.status,
            })
        }
    }
}

/// Wait for the server to answer, then pull `model` unless it is present.
///
/// # Errors
///
/// Returns a timeout if the server never answers, or the pull error.
pub async fn ensure_model(
    ollama: &Ollama,
    model: &str,
    ready: &PollConfig,
) -> Result<ModelPull, BootstrapError> {
    let models = poll_until(ready, "model server API", || async {
        ollama.models().await.map(Probe::Ready)
    })
    .await?;
    debug!(models = ?models, "Models on server");

    if models.iter().any(|m| m == model) {
        info!(model = %model, "Model already present");
        return Ok(ModelPull::AlreadyPresent);
    }

    info!(model = %model, "Pulling model");
    ollama.pull(model).await?;
    info!(model = %model, "Model pulled");
    Ok(ModelPull::Pulled)
}
