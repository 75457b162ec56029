//! Command execution on the local machine.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::error::{ExecutionError, Result};
use super::executor::Executor;
use super::multiplex::forward_lines;
use super::sink::{Sink, SinkSlots};

/// Runs commands as child processes of the current one.
///
/// The command string is split on whitespace; the first word is the program,
/// the rest are its arguments. No shell is involved, so quoting, pipes and
/// globbing are not interpreted.
#[derive(Default)]
pub struct LocalConnection {
    sinks: SinkSlots,
}

impl LocalConnection {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Executor for LocalConnection {
    async fn run(&self, command: &str, sink: Option<&Sink>) -> Result<()> {
        let mut words = command.split_whitespace();
        let program = words.next().ok_or(ExecutionError::EmptyCommand)?;
        debug!("Running local command: {}", command);

        let mut child = Command::new(program)
            .args(words)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let (stdout_sink, stderr_sink) = self.sinks.resolve(sink);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, stdout_result, stderr_result) = tokio::join!(
            child.wait(),
            async {
                match stdout {
                    Some(out) => forward_lines(out, stdout_sink.as_ref()).await,
                    None => Ok(0),
                }
            },
            async {
                match stderr {
                    Some(err) => forward_lines(err, stderr_sink.as_ref()).await,
                    None => Ok(0),
                }
            },
        );

        let status = status.map_err(|source| ExecutionError::Wait {
            program: program.to_string(),
            source,
        })?;
        match status.code() {
            Some(0) => {}
            Some(code) => {
                return Err(ExecutionError::ExitStatus {
                    command: command.to_string(),
                    code: code.into(),
                }
                .into());
            }
            None => {
                return Err(ExecutionError::MissingExitStatus {
                    command: command.to_string(),
                }
                .into());
            }
        }

        stdout_result.map_err(|source| ExecutionError::Stream {
            command: command.to_string(),
            stream: "stdout",
            source,
        })?;
        stderr_result.map_err(|source| ExecutionError::Stream {
            command: command.to_string(),
            stream: "stderr",
            source,
        })?;
        Ok(())
    }

    fn set_stdout_sink(&self, sink: Option<Sink>) {
        self.sinks.set_stdout(sink);
    }

    fn set_stderr_sink(&self, sink: Option<Sink>) {
        self.sinks.set_stderr(sink);
    }
}
