//! Running collaborator CLIs (`terraform`, `aws`, `kubectl`, `deck`).

use std::path::Path;

use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::debug;

use crate::error::BootstrapError;

/// A CLI invocation.
#[derive(Debug, Clone)]
pub struct Cli {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    cwd: Option<std::path::PathBuf>,
}

impl Cli {
    /// Start building an invocation of `program`.
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            envs: Vec::new(),
            cwd: None,
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self
    }

    /// Set an environment variable on the child only.
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_string(), value.to_string()));
        self
    }

    /// Run in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Build the tokio command.
    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run to completion and return stdout.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Command`] with stderr when the exit status is
    /// non-zero, or an I/O error if the program cannot be spawned.
    pub async fn run(&self) -> Result<String, BootstrapError> {
        debug!(program = %self.program, args = ?self.args, "Running command");

        let output = self.command().output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BootstrapError::Command {
                    program: self.program.clone(),
                    stderr: format!("{} not found in PATH", self.program),
                }
            } else {
                BootstrapError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BootstrapError::Command {
                program: format!("{} {}", self.program, self.args.join(" ")),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run and parse stdout as JSON.
    ///
    /// # Errors
    ///
    /// Returns the command error or a serialization error.
    pub async fn run_json<T: DeserializeOwned>(&self) -> Result<T, BootstrapError> {
        let stdout = self.run().await?;
        Ok(serde_json::from_str(&stdout)?)
    }
}
