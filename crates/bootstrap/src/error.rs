//! Error taxonomy for bootstrap stages.

use std::time::Duration;

use konnect::KonnectError;
use thiserror::Error;

use crate::poll::PollTimeout;

/// Errors raised by bootstrap stages.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// A wait budget expired. The target state may still be reachable.
    #[error(
        "Timed out after {}s waiting for {what} (last observed: {last_observed})",
        .elapsed.as_secs()
    )]
    PreconditionTimeout {
        what: String,
        elapsed: Duration,
        last_observed: String,
    },

    /// A wave gate expired with references still unsatisfied.
    #[error(
        "Timed out after {}s waiting for {gate}; still waiting on: {}",
        .elapsed.as_secs(),
        .missing.join(", ")
    )]
    GateTimeout {
        gate: String,
        elapsed: Duration,
        missing: Vec<String>,
    },

    /// A create call reported a name conflict but no resource with that name
    /// could be found afterwards.
    #[error("{kind} '{name}' reported as existing but lookup by name found no match")]
    ConflictUnresolved { kind: String, name: String },

    /// The remote API returned an identifier-less resource.
    #[error("{kind} '{name}' returned an empty identifier")]
    EmptyIdentifier { kind: String, name: String },

    /// Remote quota/permission failure, surfaced verbatim.
    #[error("Remote API rejected the request ({status}): {body}")]
    Remote { status: u16, body: String },

    /// The transit gateway attachment is waiting on an explicit accept.
    #[error(
        "Transit gateway attachment {id} is still in state pendingAcceptance. \
         Accept it in the transit gateway account:\n{remediation}"
    )]
    AttachmentPendingAcceptance { id: String, remediation: String },

    /// A remote resource reached a terminal failure state.
    #[error("{what} reached terminal state '{state}'")]
    ResourceFailed { what: String, state: String },

    /// A collaborator CLI failed.
    #[error("{program} failed: {stderr}")]
    Command { program: String, stderr: String },

    /// Konnect API error not covered above.
    #[error(transparent)]
    Konnect(#[from] KonnectError),

    /// Certificate generation failed.
    #[error("Certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),

    /// HTTP error talking to the model server.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<PollTimeout> for BootstrapError {
    fn from(t: PollTimeout) -> Self {
        Self::PreconditionTimeout {
            what: t.what,
            elapsed: t.elapsed,
            last_observed: t.last_observed,
        }
    }
}

impl BootstrapError {
    /// Whether re-running the failed operation shortly could succeed.
    ///
    /// Quota/permission failures and unresolved conflicts are never transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Konnect(e) => e.is_transient(),
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            Self::Kube(kube::Error::Api(resp)) => resp.code == 429 || resp.code >= 500,
            Self::Kube(
                kube::Error::HyperError(_) | kube::Error::Service(_) | kube::Error::ReadEvents(_),
            ) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Map a Konnect error into the bootstrap taxonomy.
///
/// API errors keep their literal body as [`BootstrapError::Remote`].
pub fn remote(err: KonnectError) -> BootstrapError {
    match err {
        KonnectError::Api { status, message } => BootstrapError::Remote {
            status,
            body: message,
        },
        other => BootstrapError::Konnect(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_keeps_body() {
        let err = remote(KonnectError::Api {
            status: 403,
            message: r#"{"detail":"quota exceeded"}"#.into(),
        });
        assert!(err.to_string().contains("quota exceeded"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_kube_transport_failures_are_transient() {
        let reset = BootstrapError::Kube(kube::Error::Service(Box::new(std::io::Error::other(
            "connection reset",
        ))));
        assert!(reset.is_transient());

        let unavailable = BootstrapError::Kube(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".into(),
            message: "etcdserver: leader changed".into(),
            reason: "ServiceUnavailable".into(),
            code: 503,
        }));
        assert!(unavailable.is_transient());
    }

    #[test]
    fn test_kube_client_side_failures_are_not_transient() {
        let forbidden = BootstrapError::Kube(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".into(),
            message: "secrets is forbidden".into(),
            reason: "Forbidden".into(),
            code: 403,
        }));
        assert!(!forbidden.is_transient());

        let decode = serde_json::from_str::<u8>("not a number").unwrap_err();
        assert!(!BootstrapError::Kube(kube::Error::SerdeError(decode)).is_transient());
    }

    #[test]
    fn test_gate_timeout_lists_missing() {
        let err = BootstrapError::GateTimeout {
            gate: "namespaces".into(),
            elapsed: Duration::from_secs(300),
            missing: vec!["Namespace/ollama (missing)".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("300s"));
        assert!(msg.contains("Namespace/ollama"));
    }

    #[test]
    fn test_pending_acceptance_message_is_specific() {
        let err = BootstrapError::AttachmentPendingAcceptance {
            id: "t1".into(),
            remediation: "aws ec2 accept-transit-gateway-vpc-attachment ...".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pendingAcceptance"));
        assert!(msg.contains("accept-transit-gateway-vpc-attachment"));
    }
}
