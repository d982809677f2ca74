//! Worker process lifetime: graceful termination with forced escalation

use crate::error::Result;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, info, warn};

/// Handle to the spawned worker, owned by the session
pub struct WorkerProcess {
    child: Child,
    command: String,
}

impl WorkerProcess {
    pub(crate) fn new(child: Child, command: &str) -> Self {
        Self {
            child,
            command: command.to_string(),
        }
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Ask the worker to exit, then kill it if it is still alive after `grace`.
    ///
    /// Resolves once the process has actually exited.
    pub async fn terminate(&mut self, grace: Duration) -> Result<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            debug!("Worker {} already exited: {}", self.command, status);
            return Ok(status);
        }

        if let Err(e) = self.send_terminate() {
            warn!("Failed to signal worker {}: {}", self.command, e);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                info!("Worker {} exited: {}", self.command, status);
                Ok(status)
            }
            Err(_) => {
                warn!(
                    "Worker {} still running after {:?}, killing",
                    self.command, grace
                );
                if let Err(e) = self.child.start_kill() {
                    debug!("Kill of worker {} failed: {}", self.command, e);
                }
                let status = self.child.wait().await?;
                info!("Worker {} killed: {}", self.command, status);
                Ok(status)
            }
        }
    }

    #[cfg(unix)]
    fn send_terminate(&mut self) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        debug!("Sending SIGTERM to worker {} (pid {})", self.command, pid);
        kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(std::io::Error::from)
    }

    #[cfg(not(unix))]
    fn send_terminate(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ServerCommand;
    use crate::mcp::transport::Transport;
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    fn spawn_sh(script: &str) -> WorkerProcess {
        let command = ServerCommand::new("sh").with_args(["-c", script]);
        let (_transport, _events, process) = Transport::spawn(&command, 16).unwrap();
        process
    }

    #[tokio::test]
    async fn test_terminate_graceful() {
        let mut process = spawn_sh("sleep 30");
        assert!(process.id().is_some());

        let status = process.terminate(Duration::from_secs(5)).await.unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn test_terminate_escalates_to_kill() {
        let mut process = spawn_sh("trap '' TERM; while true; do sleep 1; done");
        // Give the shell time to install its trap
        tokio::time::sleep(Duration::from_millis(200)).await;

        let status = process.terminate(Duration::from_millis(300)).await.unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGKILL as i32));
    }

    #[tokio::test]
    async fn test_terminate_already_exited() {
        let mut process = spawn_sh("exit 3");
        tokio::time::sleep(Duration::from_millis(200)).await;

        let status = process.terminate(Duration::from_secs(1)).await.unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
