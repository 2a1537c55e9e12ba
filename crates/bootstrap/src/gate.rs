//! Wave gates over GitOps-managed cluster resources.
//!
//! Argo CD applies manifests in sync-wave order but never says "done". A gate
//! blocks until a set of resources exists (or is healthy) in the cluster.

use std::cell::RefCell;
use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Secret, Service};
use kube::discovery::ApiResource;
use serde_json::Value;
use tracing::info;

use crate::error::BootstrapError;
use crate::poll::{poll_until, PollConfig, Probe};

/// Kinds of resource a gate can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Namespace,
    Deployment,
    Service,
    Secret,
    /// Gateway API `Gateway`.
    Gateway,
    /// Argo CD `Application`.
    Application,
}

impl ResourceKind {
    /// API resource used for dynamic lookups.
    #[must_use]
    pub fn api_resource(self) -> ApiResource {
        match self {
            Self::Namespace => ApiResource::erase::<Namespace>(&()),
            Self::Deployment => ApiResource::erase::<Deployment>(&()),
            Self::Service => ApiResource::erase::<Service>(&()),
            Self::Secret => ApiResource::erase::<Secret>(&()),
            Self::Gateway => ApiResource {
                group: "gateway.networking.k8s.io".to_string(),
                version: "v1".to_string(),
                api_version: "gateway.networking.k8s.io/v1".to_string(),
                kind: "Gateway".to_string(),
                plural: "gateways".to_string(),
            },
            Self::Application => ApiResource {
                group: "argoproj.io".to_string(),
                version: "v1alpha1".to_string(),
                api_version: "argoproj.io/v1alpha1".to_string(),
                kind: "Application".to_string(),
                plural: "applications".to_string(),
            },
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Namespace => "Namespace",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::Secret => "Secret",
            Self::Gateway => "Gateway",
            Self::Application => "Application",
        };
        f.write_str(name)
    }
}

/// A cluster resource by namespace, kind and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    /// Namespace; `None` for cluster-scoped kinds.
    pub namespace: Option<String>,
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceRef {
    /// A cluster-scoped namespace.
    #[must_use]
    pub fn namespace(name: &str) -> Self {
        Self {
            namespace: None,
            kind: ResourceKind::Namespace,
            name: name.to_string(),
        }
    }

    /// A namespaced resource.
    #[must_use]
    pub fn namespaced(kind: ResourceKind, namespace: &str, name: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            kind,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// What a gate requires of each resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// The object exists.
    Exists,
    /// The object exists and its status reports healthy.
    Healthy,
}

/// Observed condition of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Missing,
    Unhealthy(String),
    Healthy,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::Unhealthy(reason) => f.write_str(reason),
            Self::Healthy => f.write_str("healthy"),
        }
    }
}

/// Read access to cluster objects.
#[async_trait]
pub trait ClusterProbe: Send + Sync {
    /// Fetch an object as JSON, or `None` if it does not exist.
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Value>, BootstrapError>;
}

/// Evaluate the health condition for an existing object of `kind`.
#[must_use]
pub fn evaluate_health(kind: ResourceKind, object: &Value) -> Health {
    let status = &object["status"];
    match kind {
        ResourceKind::Namespace => match status["phase"].as_str() {
            Some("Active") | None => Health::Healthy,
            Some(phase) => Health::Unhealthy(format!("phase {phase}")),
        },
        ResourceKind::Deployment => {
            let ready = status["readyReplicas"].as_u64().unwrap_or(0);
            if ready >= 1 {
                Health::Healthy
            } else {
                Health::Unhealthy("0 ready replicas".to_string())
            }
        }
        ResourceKind::Gateway => {
            let programmed = status["conditions"]
                .as_array()
                .and_then(|conds| conds.iter().find(|c| c["type"] == "Programmed"));
            match programmed {
                Some(c) if c["status"] == "True" => Health::Healthy,
                Some(c) => Health::Unhealthy(format!(
                    "Programmed={} ({})",
                    c["status"].as_str().unwrap_or("Unknown"),
                    c["reason"].as_str().unwrap_or("no reason")
                )),
                None => Health::Unhealthy("not programmed yet".to_string()),
            }
        }
        ResourceKind::Application => match status["health"]["status"].as_str() {
            Some("Healthy") => Health::Healthy,
            Some(other) => Health::Unhealthy(format!("health {other}")),
            None => Health::Unhealthy("health unknown".to_string()),
        },
        ResourceKind::Service | ResourceKind::Secret => Health::Healthy,
    }
}

/// Assess an optional object against `criterion`.
#[must_use]
pub fn assess(kind: ResourceKind, object: Option<&Value>, criterion: Criterion) -> Health {
    match (object, criterion) {
        (None, _) => Health::Missing,
        (Some(_), Criterion::Exists) => Health::Healthy,
        (Some(obj), Criterion::Healthy) => evaluate_health(kind, obj),
    }
}

/// Block until every reference satisfies `criterion`.
///
/// # Errors
///
/// Returns [`BootstrapError::GateTimeout`] listing the references that were
/// still missing or unhealthy when the budget ran out.
pub async fn wait_for(
    cluster: &dyn ClusterProbe,
    gate: &str,
    refs: &[ResourceRef],
    criterion: Criterion,
    config: &PollConfig,
) -> Result<(), BootstrapError> {
    info!(gate = %gate, resources = refs.len(), criterion = ?criterion, "Waiting on gate");

    let missing = RefCell::new(
        refs.iter()
            .map(|r| format!("{r} (not checked)"))
            .collect::<Vec<_>>(),
    );

    let result = poll_until(config, gate, || {
        let missing = &missing;
        async move {
            let mut pending = Vec::new();
            for r in refs {
                let object = cluster.get(r).await?;
                match assess(r.kind, object.as_ref(), criterion) {
                    Health::Healthy => {}
                    health => pending.push(format!("{r} ({health})")),
                }
            }

            let probe = if pending.is_empty() {
                Probe::Ready(())
            } else {
                Probe::Pending(format!(
                    "{}/{} ready, waiting on {}",
                    refs.len() - pending.len(),
                    refs.len(),
                    pending.join(", ")
                ))
            };
            *missing.borrow_mut() = pending;
            Ok::<_, BootstrapError>(probe)
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(timeout) => Err(BootstrapError::GateTimeout {
            gate: gate.to_string(),
            elapsed: timeout.elapsed,
            missing: missing.into_inner(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCluster;
    use serde_json::json;

    #[test]
    fn test_deployment_health() {
        let obj = json!({"status": {"replicas": 1, "readyReplicas": 0}});
        assert!(matches!(
            evaluate_health(ResourceKind::Deployment, &obj),
            Health::Unhealthy(_)
        ));
        let obj = json!({"status": {"readyReplicas": 1}});
        assert_eq!(evaluate_health(ResourceKind::Deployment, &obj), Health::Healthy);
    }

    #[test]
    fn test_gateway_programmed_condition() {
        let obj = json!({"status": {"conditions": [
            {"type": "Accepted", "status": "True"},
            {"type": "Programmed", "status": "False", "reason": "Invalid"}
        ]}});
        assert_eq!(
            evaluate_health(ResourceKind::Gateway, &obj),
            Health::Unhealthy("Programmed=False (Invalid)".into())
        );

        let obj = json!({"status": {"conditions": [{"type": "Programmed", "status": "True"}]}});
        assert_eq!(evaluate_health(ResourceKind::Gateway, &obj), Health::Healthy);
    }

    #[test]
    fn test_existence_is_not_health() {
        let obj = json!({"status": {"health": {"status": "Progressing"}}});
        assert_eq!(
            assess(ResourceKind::Application, Some(&obj), Criterion::Exists),
            Health::Healthy
        );
        assert_eq!(
            assess(ResourceKind::Application, Some(&obj), Criterion::Healthy),
            Health::Unhealthy("health Progressing".into())
        );
        assert_eq!(
            assess(ResourceKind::Namespace, None, Criterion::Exists),
            Health::Missing
        );
    }

    #[tokio::test]
    async fn test_gate_passes_once_all_exist() {
        let ollama = ResourceRef::namespace("ollama");
        let ingress = ResourceRef::namespace("istio-ingress");
        let cluster = FakeCluster::new()
            .with(&ollama, vec![None, Some(json!({"status": {"phase": "Active"}}))])
            .with(&ingress, vec![Some(json!({}))]);

        wait_for(
            &cluster,
            "namespaces",
            &[ollama, ingress],
            Criterion::Exists,
            &PollConfig::new(0, 5),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_gate_timeout_names_missing_refs() {
        let ollama = ResourceRef::namespace("ollama");
        let deploy = ResourceRef::namespaced(ResourceKind::Deployment, "ollama", "ollama");
        let cluster = FakeCluster::new()
            .with(&ollama, vec![Some(json!({}))])
            .with(&deploy, vec![Some(json!({"status": {"readyReplicas": 0}}))]);

        let err = wait_for(
            &cluster,
            "model server",
            &[ollama, deploy],
            Criterion::Healthy,
            &PollConfig::new(0, 0),
        )
        .await
        .unwrap_err();

        match err {
            BootstrapError::GateTimeout { missing, .. } => {
                assert_eq!(missing, vec!["Deployment/ollama/ollama (0 ready replicas)"]);
            }
            other => panic!("expected gate timeout, got {other}"),
        }
    }
}
