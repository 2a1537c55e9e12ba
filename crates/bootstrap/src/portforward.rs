//! Scoped `kubectl port-forward`.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Child;
use tracing::debug;

use crate::error::BootstrapError;
use crate::exec::Cli;

/// A running port-forward. The child process is killed when this is dropped.
#[derive(Debug)]
pub struct PortForward {
    child: Child,
    local_port: u16,
}

impl PortForward {
    /// Forward `local_port` to `service:remote_port` in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if `kubectl` cannot be spawned.
    pub fn start(
        kubeconfig: &Path,
        namespace: &str,
        service: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Result<Self, BootstrapError> {
        let kubeconfig = kubeconfig.to_string_lossy();
        let target = format!("svc/{service}");
        let ports = format!("{local_port}:{remote_port}");

        let cli = Cli::new("kubectl").args([
            "--kubeconfig",
            kubeconfig.as_ref(),
            "-n",
            namespace,
            "port-forward",
            target.as_str(),
            ports.as_str(),
        ]);

        let forward = Self::spawn(&cli, local_port)?;
        debug!(namespace = %namespace, service = %service, ports = %ports, "Port-forward started");
        Ok(forward)
    }

    fn spawn(cli: &Cli, local_port: u16) -> Result<Self, BootstrapError> {
        let child = cli
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(Self { child, local_port })
    }

    /// Base URL of the forwarded service.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.local_port)
    }

    /// Whether the child is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for PortForward {
    fn drop(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!(error = %e, "Port-forward already exited");
        }
    }
}
