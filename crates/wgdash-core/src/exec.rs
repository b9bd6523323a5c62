use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Upper bound on any external binary invocation. Calls that exceed it fail
/// rather than hang.
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with status {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{command} did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

/// Port for invoking external binaries (`wg`, `sysctl`, `pfctl`, ...).
///
/// Arguments are always passed as a discrete array, never a shell string.
/// Stdin is optional (`wg pubkey` reads the private key from it). Returns
/// captured stdout on a zero exit status.
pub trait CommandRunner: Send + Sync + 'static {
    async fn run(
        &self,
        command: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<String, ExecError>;
}

/// Spawns real processes via [`tokio::process`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        command: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> Result<String, ExecError> {
        debug!(command, ?args, "spawning");

        let spawn_err = |source| ExecError::Spawn {
            command: command.to_string(),
            source,
        };

        let mut child = Command::new(command)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        if let Some(input) = stdin {
            // Taking the handle closes the pipe once the write is done.
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).await.map_err(spawn_err)?;
            }
        }

        let output = match tokio::time::timeout(EXEC_TIMEOUT, child.wait_with_output()).await {
            Ok(waited) => waited.map_err(spawn_err)?,
            Err(_) => {
                return Err(ExecError::TimedOut {
                    command: command.to_string(),
                    timeout: EXEC_TIMEOUT,
                });
            }
        };

        if !output.status.success() {
            return Err(ExecError::Failed {
                command: command.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
