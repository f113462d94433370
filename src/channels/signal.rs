//! signal-cli transport.
//!
//! Every interaction is a separate `signal-cli` process:
//! `signal-cli -u <account> --output=json <operation> <args...>`.
//! The event stream is a long-running `receive --timeout -1` whose stdout
//! carries one JSON envelope per line.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::actions::{Action, ActionExecutor, ActionOutcome};
use crate::channels::{Quiescent, StderrWatch, Subscription, SubscriptionExit, Transport};
use crate::config::BotConfig;
use crate::error::{ActionError, ChannelError};

/// Time a `receive` process gets to exit after SIGTERM before it is killed.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// signal-cli wrapper for one account.
#[derive(Debug, Clone)]
pub struct SignalCli {
    program: PathBuf,
    account: String,
}

impl SignalCli {
    pub fn new(program: impl Into<PathBuf>, account: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            account: account.into(),
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.signal_cli_path.clone(), config.bot_number.clone())
    }

    /// Full argument list for an operation.
    pub fn command_args(&self, operation_args: &[String]) -> Vec<String> {
        let mut args = vec![
            "-u".to_string(),
            self.account.clone(),
            "--output=json".to_string(),
        ];
        args.extend(operation_args.iter().cloned());
        args
    }

    fn command(&self, operation_args: &[String]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.command_args(operation_args));
        command
    }

    async fn run(&self, action: &Action) -> Result<(), ActionError> {
        let operation_args = action.to_args();
        info!(
            "[Exec] {} {}",
            self.program.display(),
            self.command_args(&operation_args).join(" ")
        );

        let output = self
            .command(&operation_args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ActionError::SpawnFailed {
                program: self.program.display().to_string(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ActionError::NonZeroExit {
                operation: action.operation().to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl ActionExecutor for SignalCli {
    async fn execute(&self, _idle: &Quiescent, action: &Action) -> ActionOutcome {
        match self.run(action).await {
            Ok(()) => {
                info!(operation = action.operation(), "Success");
                ActionOutcome::Ok
            }
            Err(e) => {
                warn!(operation = action.operation(), "Command failed: {e}");
                ActionOutcome::Failed(e)
            }
        }
    }
}

#[async_trait]
impl Transport for SignalCli {
    fn name(&self) -> &str {
        "signal"
    }

    async fn subscribe(&self) -> Result<Box<dyn Subscription>, ChannelError> {
        let receive = ["receive".to_string(), "--timeout".into(), "-1".into()];
        let mut child = self
            .command(&receive)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ChannelError::StartupFailed {
                name: "signal".into(),
                reason: format!("Failed to spawn {}: {e}", self.program.display()),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| ChannelError::StartupFailed {
            name: "signal".into(),
            reason: "receive stdout not captured".into(),
        })?;

        // Drain stderr concurrently so a chatty process never blocks on a full pipe.
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(watch_stderr(err)));

        Ok(Box::new(ReceiveProcess {
            child,
            stdout: BufReader::new(stdout),
            pending: Vec::new(),
            stderr,
        }))
    }
}

/// Scan stderr line by line until the pipe closes.
async fn watch_stderr(stderr: impl AsyncRead + Unpin) -> StderrWatch {
    let mut watch = StderrWatch::default();
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => watch.observe(String::from_utf8_lossy(&buf).trim_end()),
            Err(e) => {
                debug!("stderr read failed: {e}");
                break;
            }
        }
    }
    watch
}

/// A running `receive` process.
struct ReceiveProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    /// Bytes of the line being read. Survives a cancelled read.
    pending: Vec<u8>,
    stderr: Option<JoinHandle<StderrWatch>>,
}

impl ReceiveProcess {
    /// Ask the process to stop with SIGTERM. Returns `true` once it has exited.
    #[cfg(unix)]
    async fn stop_gracefully(&mut self) -> bool {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return true;
        };
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            debug!("SIGTERM to receive process failed: {e}");
            return false;
        }
        matches!(
            tokio::time::timeout(TERM_GRACE, self.child.wait()).await,
            Ok(Ok(_))
        )
    }

    #[cfg(not(unix))]
    async fn stop_gracefully(&mut self) -> bool {
        false
    }
}

#[async_trait]
impl Subscription for ReceiveProcess {
    async fn next_line(&mut self) -> Result<Option<String>, ChannelError> {
        loop {
            let read = self
                .stdout
                .read_until(b'\n', &mut self.pending)
                .await
                .map_err(|e| ChannelError::Disconnected {
                    name: "signal".into(),
                    reason: e.to_string(),
                })?;
            if read == 0 && self.pending.is_empty() {
                return Ok(None);
            }

            let bytes = std::mem::take(&mut self.pending);
            match String::from_utf8(bytes) {
                Ok(line) => return Ok(Some(line.trim_end_matches(['\n', '\r']).to_string())),
                Err(_) => debug!("Dropping non-UTF-8 line from receive"),
            }
        }
    }

    async fn terminate(&mut self) {
        if !self.stop_gracefully().await {
            debug!("receive process still running, killing it");
            if let Err(e) = self.child.kill().await {
                warn!("Failed to stop receive process: {e}");
            }
        }
        if let Some(handle) = self.stderr.take() {
            handle.abort();
        }
    }

    async fn wait_exit(&mut self) -> SubscriptionExit {
        let code = match self.child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                warn!("Failed to reap receive process: {e}");
                None
            }
        };
        let watch = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => StderrWatch::default(),
        };
        watch.into_exit(code)
    }
}
