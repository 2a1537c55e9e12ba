//! Create-or-adopt for remote resources keyed by logical name.

use std::future::Future;

use konnect::{CreateOutcome, KonnectError, NamedResource};
use tracing::{debug, info};

use crate::error::{remote, BootstrapError};

/// A remote resource that exists after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Remote identifier (never empty).
    pub id: String,
    /// Whether an existing resource was adopted.
    pub adopted: bool,
}

/// Create the resource named `name`, or adopt the existing one on conflict.
///
/// `create` is called exactly once. `list` is only called after a conflict
/// and must return candidates for `name`; the result is filtered by exact
/// name again in case the remote filter was ignored.
///
/// # Errors
///
/// - [`BootstrapError::Remote`] with the literal body for any other rejection
/// - [`BootstrapError::ConflictUnresolved`] if the conflict has no match
/// - [`BootstrapError::EmptyIdentifier`] if the remote returned a blank ID
pub async fn ensure<T, C, CF, L, LF>(
    kind: &str,
    name: &str,
    create: C,
    list: L,
) -> Result<Reconciled, BootstrapError>
where
    T: NamedResource,
    C: FnOnce() -> CF,
    CF: Future<Output = Result<CreateOutcome<T>, KonnectError>>,
    L: FnOnce() -> LF,
    LF: Future<Output = Result<Vec<T>, KonnectError>>,
{
    let (id, adopted) = match create().await.map_err(remote)? {
        CreateOutcome::Created(resource) => (resource.id().to_string(), false),
        CreateOutcome::Conflict { body } => {
            debug!(kind = %kind, name = %name, body = %body, "Create reported conflict");

            let candidates = list().await.map_err(remote)?;
            let found = candidates
                .iter()
                .find(|r| r.name() == name)
                .ok_or_else(|| BootstrapError::ConflictUnresolved {
                    kind: kind.to_string(),
                    name: name.to_string(),
                })?;
            (found.id().to_string(), true)
        }
    };

    if id.trim().is_empty() {
        return Err(BootstrapError::EmptyIdentifier {
            kind: kind.to_string(),
            name: name.to_string(),
        });
    }

    if adopted {
        info!(kind = %kind, name = %name, id = %id, "Adopted existing resource");
    } else {
        info!(kind = %kind, name = %name, id = %id, "Created resource");
    }
    Ok(Reconciled { id, adopted })
}
