//! Gateway endpoint discovery and decK document substitution.

use std::fmt;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use crate::gate::{ClusterProbe, ResourceKind, ResourceRef};
use crate::poll::{poll_until, Probe};
use crate::ui;

/// Placeholder some tooling prints before a load balancer is assigned.
const PENDING_SENTINEL: &str = "<pending>";

/// Load balancer address as observed on the gateway Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// The Service does not exist.
    Absent,
    /// The Service exists but no address is assigned yet.
    Pending,
    /// Hostname (or IP) assigned by the cloud provider.
    Resolved(String),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("service absent"),
            Self::Pending => f.write_str("address pending"),
            Self::Resolved(addr) => f.write_str(addr),
        }
    }
}

impl Endpoint {
    /// Read the address from a Service object's load balancer status.
    ///
    /// Only `status` is consulted; anything written under `spec` is intent,
    /// not an assignment.
    #[must_use]
    pub fn from_service(service: Option<&Value>) -> Self {
        let Some(service) = service else {
            return Self::Absent;
        };

        let ingress = &service["status"]["loadBalancer"]["ingress"][0];
        let addr = ingress["hostname"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| ingress["ip"].as_str())
            .map(str::trim)
            .unwrap_or_default();

        if addr.is_empty() || addr == PENDING_SENTINEL {
            Self::Pending
        } else {
            Self::Resolved(addr.to_string())
        }
    }
}

/// Poll the gateway Service until its load balancer address is assigned.
///
/// # Errors
///
/// Returns [`BootstrapError::PreconditionTimeout`] with the last observed
/// endpoint state.
pub async fn discover(
    cluster: &dyn ClusterProbe,
    config: &BootstrapConfig,
) -> Result<String, BootstrapError> {
    let service = ResourceRef::namespaced(
        ResourceKind::Service,
        &config.ingress_namespace,
        &config.gateway_service,
    );
    let what = format!("load balancer address on {service}");

    let addr = poll_until(&config.timeouts.endpoint, &what, || async {
        let object = cluster.get(&service).await?;
        Ok::<_, BootstrapError>(match Endpoint::from_service(object.as_ref()) {
            Endpoint::Resolved(addr) => Probe::Ready(addr),
            other => Probe::Pending(other.to_string()),
        })
    })
    .await?;

    info!(endpoint = %addr, "Gateway endpoint resolved");
    Ok(addr)
}

/// Result of substituting the endpoint into the decK document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    /// The placeholder was replaced this many times.
    Replaced(usize),
    /// No placeholder left and the document already contains the value.
    AlreadyApplied,
    /// No placeholder left and the value is not in the document either.
    Stale,
}

/// Replace every `placeholder` in `path` with `value`, in place.
///
/// A document without the placeholder counts as already substituted.
///
/// # Errors
///
/// Returns an I/O error if the document cannot be read or written.
pub fn substitute_placeholder(
    path: &Path,
    placeholder: &str,
    value: &str,
) -> Result<Substitution, BootstrapError> {
    let content = std::fs::read_to_string(path)?;

    let count = content.matches(placeholder).count();
    if count == 0 {
        return Ok(if content.contains(value) {
            Substitution::AlreadyApplied
        } else {
            Substitution::Stale
        });
    }

    std::fs::write(path, content.replace(placeholder, value))?;
    Ok(Substitution::Replaced(count))
}

/// Substitute the endpoint into the configured decK document and report it.
///
/// # Errors
///
/// Returns an I/O error if the document cannot be read or written.
pub fn render(config: &BootstrapConfig, endpoint: &str) -> Result<Substitution, BootstrapError> {
    let outcome = substitute_placeholder(&config.deck_file, &config.endpoint_placeholder, endpoint)?;
    let file = config.deck_file.display();

    match outcome {
        Substitution::Replaced(n) => {
            ui::print_success(&format!("Substituted {endpoint} into {file} ({n} occurrences)"));
        }
        Substitution::AlreadyApplied => {
            ui::print_info(&format!("{file} already references {endpoint}"));
        }
        Substitution::Stale => {
            warn!(file = %file, endpoint = %endpoint, "Placeholder absent and endpoint not found in document");
            ui::print_warning(&format!(
                "{file} has no {} placeholder and does not reference {endpoint}; \
                 a previous run may have substituted a different address",
                config.endpoint_placeholder
            ));
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollConfig;
    use crate::testing::FakeCluster;
    use serde_json::json;

    const DOC: &str = "services:\n  - name: ollama\n    host: ${NLB_HOSTNAME}\n    port: 443\n";

    #[test]
    fn test_endpoint_lifecycle() {
        assert_eq!(Endpoint::from_service(None), Endpoint::Absent);
        assert_eq!(
            Endpoint::from_service(Some(&json!({"status": {"loadBalancer": {}}}))),
            Endpoint::Pending
        );
        assert_eq!(
            Endpoint::from_service(Some(
                &json!({"status": {"loadBalancer": {"ingress": [{"hostname": "<pending>"}]}}})
            )),
            Endpoint::Pending
        );
        assert_eq!(
            Endpoint::from_service(Some(
                &json!({"status": {"loadBalancer": {"ingress": [{"hostname": "nlb-1.elb.amazonaws.com"}]}}})
            )),
            Endpoint::Resolved("nlb-1.elb.amazonaws.com".into())
        );
        assert_eq!(
            Endpoint::from_service(Some(
                &json!({"status": {"loadBalancer": {"ingress": [{"ip": "10.0.3.7"}]}}})
            )),
            Endpoint::Resolved("10.0.3.7".into())
        );
    }

    #[test]
    fn test_spec_is_ignored() {
        let svc = json!({
            "spec": {"loadBalancerIP": "10.9.9.9"},
            "status": {"loadBalancer": {}}
        });
        assert_eq!(Endpoint::from_service(Some(&svc)), Endpoint::Pending);
    }

    #[test]
    fn test_substitution_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kong.yaml");
        std::fs::write(&path, DOC).unwrap();

        let host = "nlb-1.elb.amazonaws.com";
        assert_eq!(
            substitute_placeholder(&path, "${NLB_HOSTNAME}", host).unwrap(),
            Substitution::Replaced(1)
        );
        assert_eq!(
            substitute_placeholder(&path, "${NLB_HOSTNAME}", host).unwrap(),
            Substitution::AlreadyApplied
        );
        assert_eq!(
            substitute_placeholder(&path, "${NLB_HOSTNAME}", "nlb-2.elb.amazonaws.com").unwrap(),
            Substitution::Stale
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("host: nlb-1.elb.amazonaws.com"));
    }

    #[tokio::test]
    async fn test_discover_waits_past_pending() {
        let mut config = BootstrapConfig::with_defaults("demo".into());
        config.timeouts.endpoint = PollConfig::new(0, 5);
        let service = ResourceRef::namespaced(
            ResourceKind::Service,
            &config.ingress_namespace,
            &config.gateway_service,
        );
        let cluster = FakeCluster::new().with(
            &service,
            vec![
                None,
                Some(json!({"status": {"loadBalancer": {"ingress": [{"hostname": "<pending>"}]}}})),
                Some(json!({"status": {"loadBalancer": {"ingress": [{"hostname": "nlb-1.elb.amazonaws.com"}]}}})),
            ],
        );

        let addr = discover(&cluster, &config).await.unwrap();
        assert_eq!(addr, "nlb-1.elb.amazonaws.com");
        assert_eq!(cluster.queries(&service), 3);
    }

    #[tokio::test]
    async fn test_discover_times_out_while_pending() {
        let mut config = BootstrapConfig::with_defaults("demo".into());
        config.timeouts.endpoint = PollConfig::new(0, 0);
        let service = ResourceRef::namespaced(
            ResourceKind::Service,
            &config.ingress_namespace,
            &config.gateway_service,
        );
        let cluster = FakeCluster::new().with(&service, vec![Some(json!({"status": {}}))]);

        let err = discover(&cluster, &config).await.unwrap_err();
        assert!(err.to_string().contains("address pending"));
    }
}
