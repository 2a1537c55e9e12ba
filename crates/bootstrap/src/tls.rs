//! Gateway TLS secret injection.
//!
//! The Istio gateway listener references a TLS secret that nothing in the
//! GitOps tree creates, so its Gateway stays unprogrammed until we write one.
//! After writing it we wait for the reconciler to pick it up.

use async_trait::async_trait;
use rcgen::{generate_simple_self_signed, CertifiedKey};
use tracing::info;

use crate::config::BootstrapConfig;
use crate::error::BootstrapError;
use crate::gate::{wait_for, ClusterProbe, Criterion, ResourceKind, ResourceRef};
use crate::ui;

/// PEM-encoded certificate and private key.
#[derive(Clone)]
pub struct TlsMaterial {
    pub cert_pem: String,
    pub key_pem: String,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("cert_pem", &format_args!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

impl TlsMaterial {
    /// Generate a self-signed certificate for `hostname`.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation or signing fails.
    pub fn self_signed(hostname: &str) -> Result<Self, BootstrapError> {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec![hostname.to_string()])?;
        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        })
    }
}

/// Write access for `kubernetes.io/tls` secrets.
#[async_trait]
pub trait TlsSecretStore: Send + Sync {
    /// Create or replace a TLS secret.
    async fn apply_tls_secret(
        &self,
        namespace: &str,
        name: &str,
        material: &TlsMaterial,
    ) -> Result<(), BootstrapError>;
}

/// Write the gateway TLS secret and wait for the Gateway to become programmed.
///
/// Rotating the material on every run is harmless; the secret is applied
/// with a forced server-side apply.
///
/// # Errors
///
/// Returns an error if the secret cannot be written or either gate times out.
pub async fn inject(
    store: &dyn TlsSecretStore,
    probe: &dyn ClusterProbe,
    config: &BootstrapConfig,
) -> Result<(), BootstrapError> {
    let namespace = &config.ingress_namespace;
    let secret_name = &config.tls_secret_name;

    let material = TlsMaterial::self_signed(&config.tls_hostname)?;
    store
        .apply_tls_secret(namespace, secret_name, &material)
        .await?;
    info!(namespace = %namespace, secret = %secret_name, hostname = %config.tls_hostname, "TLS secret applied");
    ui::print_success(&format!("TLS secret {namespace}/{secret_name} applied"));

    wait_for(
        probe,
        "TLS secret",
        &[ResourceRef::namespaced(
            ResourceKind::Secret,
            namespace,
            secret_name,
        )],
        Criterion::Exists,
        &config.timeouts.namespaces,
    )
    .await?;

    wait_for(
        probe,
        "gateway listener",
        &[ResourceRef::namespaced(
            ResourceKind::Gateway,
            namespace,
            &config.gateway_name,
        )],
        Criterion::Healthy,
        &config.timeouts.gateway,
    )
    .await
}
