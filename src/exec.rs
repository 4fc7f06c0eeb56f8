//! Package-manager process execution
//!
//! Every call to `npm`/`pnpm` goes through [`CommandRunner`] so tests can
//! substitute canned outputs. A nonzero exit code is reported in
//! [`ExecOutput`], never turned into an error.

#[cfg(test)]
use mockall::automock;

use std::path::Path;

use tracing::debug;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Trait for running external commands
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program args...` in `cwd` and wait for it to finish
    async fn exec(&self, program: &str, args: &[String], cwd: &Path)
    -> Result<ExecOutput, ExecError>;
}

/// Runs commands through `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct TokioCommandRunner;

#[async_trait::async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn exec(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<ExecOutput, ExecError> {
        debug!("exec: {} {} (cwd: {:?})", program, args.join(" "), cwd);

        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ExecError::Spawn {
                command: program.to_string(),
                source,
            })?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

/// Convenience for building an owned argument list
pub fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
