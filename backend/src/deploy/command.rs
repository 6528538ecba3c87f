//! External command execution

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::AppError;

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    secret: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            secret: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Hide `secret` whenever the command is displayed
    pub fn redacting(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secret = Some(secret);
        }
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        match &self.secret {
            Some(secret) => f.write_str(&line.replace(secret.as_str(), "***")),
            None => f.write_str(&line),
        }
    }
}

/// Runs external programs on behalf of the deployment pipeline
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. When `lines` is given, stdout and stderr are
    /// merged and forwarded line by line while the process runs.
    async fn run(
        &self,
        spec: &CommandSpec,
        lines: Option<mpsc::Sender<String>>,
        cancel: &CancellationToken,
    ) -> Result<(), AppError>;

    /// Run to completion and return stdout
    async fn output(&self, spec: &CommandSpec, cancel: &CancellationToken)
        -> Result<String, AppError>;
}

/// Command runner backed by OS processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        lines: Option<mpsc::Sender<String>>,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        debug!("Running: {}", spec);

        let mut child = Self::command(spec)
            .spawn()
            .map_err(|e| AppError::command_failed(&spec.program, format!("failed to start: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::command_failed(&spec.program, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::command_failed(&spec.program, "stderr not captured"))?;

        let stdout_task = tokio::spawn(forward_lines(stdout, lines.clone()));
        let stderr_task = tokio::spawn(forward_lines(stderr, lines));

        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel.cancelled() => None,
        };

        let status = match exited {
            Some(status) => status,
            None => {
                debug!("Cancelled, killing: {}", spec);
                let _ = child.kill().await;
                // Grandchildren may still hold the pipes open.
                stdout_task.abort();
                stderr_task.abort();
                return Err(AppError::Cancelled);
            }
        };

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let status = status
            .map_err(|e| AppError::command_failed(&spec.program, format!("wait failed: {}", e)))?;
        if !status.success() {
            return Err(AppError::command_failed(&spec.program, exit_info(&status)));
        }
        Ok(())
    }

    async fn output(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<String, AppError> {
        debug!("Running: {}", spec);

        let mut cmd = Self::command(spec);
        let output = tokio::select! {
            output = cmd.output() => output
                .map_err(|e| AppError::command_failed(&spec.program, format!("failed to start: {}", e)))?,
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
        };

        if !output.status.success() {
            return Err(AppError::command_failed(&spec.program, exit_info(&output.status)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

async fn forward_lines<R>(pipe: R, mut sink: Option<mpsc::Sender<String>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                // Dropping the pipe early would kill the child with SIGPIPE
                debug!("Failed to read command output, discarding the rest: {}", e);
                let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
                break;
            }
        }

        let line = decode_line(&buf);
        match &sink {
            Some(tx) => {
                if tx.send(line).await.is_err() {
                    // Keep draining so the child never blocks on a full pipe
                    sink = None;
                }
            }
            None => trace!("{}", line),
        }
    }
}

/// Lossy UTF-8 without the line terminator
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn exit_info(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}
