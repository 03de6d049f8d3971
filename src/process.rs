// ABOUTME: Subprocess execution for the external CLIs stacklink drives.
// ABOUTME: Runs a program without a shell, feeds stdin, captures output, enforces a timeout.

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A program invocation. Arguments are passed verbatim, never through a shell.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            timeout: DEFAULT_TIMEOUT,
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

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Run to completion. A non-zero exit is not an error here; callers
    /// inspect `CommandOutput::success`.
    ///
    /// The timeout covers feeding stdin as well as waiting for exit. Stdin is
    /// written from its own task while output is drained, so a child that
    /// writes before it has consumed its input cannot stall the run.
    pub async fn run(mut self) -> Result<CommandOutput, CommandError> {
        tracing::debug!(program = %self.program, args = ?self.args, "running command");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let writer = match (self.stdin.take(), child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(tokio::spawn(async move {
                // Dropping the pipe on return closes stdin so the child sees EOF.
                pipe.write_all(&input).await
            })),
            _ => None,
        };
        let abort = writer.as_ref().map(|task| task.abort_handle());

        let io_err = |source: std::io::Error| CommandError::Io {
            program: self.program.clone(),
            source,
        };
        let finished = tokio::time::timeout(self.timeout, async {
            let output = child.wait_with_output().await.map_err(io_err)?;
            if let Some(writer) = writer {
                match writer.await {
                    Ok(Ok(())) => {}
                    // The child exited without reading all of its input.
                    Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                    Ok(Err(source)) => return Err(io_err(source)),
                    Err(join) => return Err(io_err(std::io::Error::other(join))),
                }
            }
            Ok(output)
        })
        .await;

        let output = match finished {
            Ok(output) => output?,
            Err(_) => {
                if let Some(abort) = abort {
                    abort.abort();
                }
                return Err(CommandError::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                });
            }
        };

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.success() {
            tracing::debug!(program = %self.program, "command succeeded");
        } else {
            tracing::warn!(
                program = %self.program,
                exit_code = ?result.exit_code,
                "command failed"
            );
        }

        Ok(result)
    }
}
