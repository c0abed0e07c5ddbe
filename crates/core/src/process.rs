//! External tool invocation.
//!
//! Every collaborator (extractor, raw fetcher, browser helper, sync client) is
//! a separate program. Arguments are passed as an argv vector, never through a
//! shell, so links are always opaque arguments.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Number of stderr lines kept for diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Errors from spawning or waiting on a tool.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Program could not be found on PATH.
    #[error("program not found: {program}")]
    NotFound { program: PathBuf },

    /// Program ran longer than the configured timeout and was killed.
    #[error("{program} timed out after {timeout_secs} seconds")]
    Timeout { program: PathBuf, timeout_secs: u64 },

    /// I/O error while spawning or waiting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully described tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub envs: Vec<(OsString, OsString)>,
    pub timeout_secs: Option<u64>,
    /// Keep stdout instead of discarding it.
    pub capture_stdout: bool,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            timeout_secs: None,
            capture_stdout: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn capture_stdout(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    /// Arguments as lossy strings, for logging and tests.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

/// Result of a finished tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Full stdout when captured, otherwise empty.
    pub stdout: String,
    /// Last lines written to stderr.
    pub stderr_tail: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Stderr tail, or `None` when the tool was silent.
    pub fn stderr(&self) -> Option<String> {
        if self.stderr_tail.is_empty() {
            None
        } else {
            Some(self.stderr_tail.clone())
        }
    }
}

/// Runs a tool to completion.
///
/// Stdout is discarded unless the command asks for it. Stderr is streamed to
/// `debug` logs and its tail kept.
/// Without a timeout the call blocks for as long as the tool runs.
pub async fn run_tool(command: &ToolCommand) -> Result<ToolOutput, ProcessError> {
    let program_name = command
        .program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| command.program.display().to_string());

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .envs(command.envs.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(if command.capture_stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProcessError::NotFound {
                program: command.program.clone(),
            }
        } else {
            ProcessError::Io(e)
        }
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let wait = async {
        let read_stdout = async {
            let mut buf = String::new();
            if let Some(mut stdout) = stdout {
                stdout.read_to_string(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };
        let read_stderr = async {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                // Byte lines so a non-UTF-8 line cannot end the read and close the pipe.
                let mut lines = BufReader::new(stderr).split(b'\n');
                while let Ok(Some(raw)) = lines.next_segment().await {
                    let line = String::from_utf8_lossy(&raw)
                        .trim_end_matches('\r')
                        .to_string();
                    debug!(tool = %program_name, "{}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail
        };
        let (stdout, tail) = tokio::join!(read_stdout, read_stderr);
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((status, stdout?, tail))
    };

    let (status, stdout, tail) = match command.timeout_secs {
        Some(secs) => match timeout(Duration::from_secs(secs), wait).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProcessError::Timeout {
                    program: command.program.clone(),
                    timeout_secs: secs,
                });
            }
        },
        None => wait.await?,
    };

    Ok(ToolOutput {
        status,
        stdout,
        stderr_tail: tail.into_iter().collect::<Vec<_>>().join("\n"),
    })
}
