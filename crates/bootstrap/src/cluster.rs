//! Kubernetes cluster access through `kube`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::Value;
use tracing::debug;

use crate::error::BootstrapError;
use crate::gate::{ClusterProbe, ResourceRef};
use crate::tls::{TlsMaterial, TlsSecretStore};

/// Field manager for server-side apply.
const FIELD_MANAGER: &str = "inference-bootstrap";

/// Cluster client built from the bootstrap kubeconfig.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Create a client from a kubeconfig file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the kubeconfig cannot be read or the client cannot be created.
    pub async fn from_kubeconfig(path: &Path) -> Result<Self> {
        let kubeconfig = Kubeconfig::read_from(path)
            .with_context(|| format!("Failed to read kubeconfig from {}", path.display()))?;

        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context("Failed to create Kubernetes config from kubeconfig")?;

        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ClusterProbe for KubeCluster {
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Value>, BootstrapError> {
        let ar = resource.kind.api_resource();
        let api: Api<DynamicObject> = match &resource.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };

        debug!(resource = %resource, "Fetching object");
        let object = api.get_opt(&resource.name).await?;
        Ok(object.map(serde_json::to_value).transpose()?)
    }
}

#[async_trait]
impl TlsSecretStore for KubeCluster {
    async fn apply_tls_secret(
        &self,
        namespace: &str,
        name: &str,
        material: &TlsMaterial,
    ) -> Result<(), BootstrapError> {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(BTreeMap::from([(
                    "app.kubernetes.io/managed-by".to_string(),
                    FIELD_MANAGER.to_string(),
                )])),
                ..Default::default()
            },
            type_: Some("kubernetes.io/tls".to_string()),
            data: Some(BTreeMap::from([
                (
                    "tls.crt".to_string(),
                    ByteString(material.cert_pem.clone().into_bytes()),
                ),
                (
                    "tls.key".to_string(),
                    ByteString(material.key_pem.clone().into_bytes()),
                ),
            ])),
            ..Default::default()
        };

        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&secret),
        )
        .await?;

        Ok(())
    }
}
