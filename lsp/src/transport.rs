//! Language server subprocess: spawn, stderr forwarding and teardown.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use lspbridge_config::ProcessConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

const SERVER_TARGET: &str = "lspbridge::server";

/// How long a graceful shutdown may take before the process tree is killed.
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period for the dispose path.
pub(crate) const DISPOSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Spawned server with its stdio pipes detached for the connection.
pub(crate) struct SpawnedServer {
    pub process: ServerProcess,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

pub(crate) struct ServerProcess {
    command: String,
    child: Child,
    stderr_handle: JoinHandle<()>,
}

impl ServerProcess {
    pub fn spawn(config: &ProcessConfig) -> Result<SpawnedServer> {
        let resolved = which::which(&config.command)
            .with_context(|| format!("{} not found in PATH", config.command))?;

        let mut cmd = Command::new(&resolved);
        cmd.args(&config.args)
            .current_dir(&config.workspace)
            .envs(&config.environment)
            .env("DOTNET_USE_POLLING_FILE_WATCHER", "true")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        set_new_session(&mut cmd);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {}", resolved.display()))?;

        let stdin = child.stdin.take().context("no stdin from child")?;
        let stdout = child.stdout.take().context("no stdout from child")?;
        let stderr = child.stderr.take().context("no stderr from child")?;

        tracing::info!(
            pid = child.id(),
            "Started language server {}",
            resolved.display()
        );

        Ok(SpawnedServer {
            process: Self {
                command: config.command.clone(),
                child,
                stderr_handle: tokio::spawn(forward_stderr(stderr)),
            },
            stdin,
            stdout,
        })
    }

    /// Wait up to `timeout` for the process to exit on its own, then kill
    /// the whole process tree. Never fails.
    pub async fn wait_or_kill(&mut self, timeout: Duration) {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("Language server {} exited: {status}", self.command);
            }
            Ok(Err(e)) => {
                tracing::debug!("Waiting for {} failed: {e}", self.command);
                self.kill_tree().await;
            }
            Err(_) => {
                tracing::debug!(
                    "Language server {} didn't exit in time, killing",
                    self.command
                );
                self.kill_tree().await;
            }
        }
        self.stderr_handle.abort();
    }

    async fn kill_tree(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            // SAFETY: plain syscall on a pid we spawned as a group leader.
            unsafe {
                libc::killpg(pid as i32, libc::SIGKILL);
            }
        }
        let _ = self.child.kill().await;
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!(target: SERVER_TARGET, "{line}"),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(target: SERVER_TARGET, "stderr read error: {e}");
                break;
            }
        }
    }
}

/// Put the child in its own session so `killpg` reaches its descendants.
#[cfg(unix)]
fn set_new_session(cmd: &mut Command) {
    // SAFETY: `setsid` is async-signal-safe and touches no parent state.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}
