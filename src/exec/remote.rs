//! Command execution and file placement over one long-lived SSH client.
//!
//! A [`RemoteConnection`] dials once and opens a fresh session channel for
//! every command or copy. Channels are always closed afterwards, also when the
//! command fails or a copy runs past its deadline.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{Channel, client};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::channel::{SessionIo, channel_pipes};
use super::client::{ClientHandle, connect_with_retry};
use super::config::RemoteOptions;
use super::copy::{base_name, send_file, validate_permission};
use super::error::{ConnectionError, Error, ExecutionError, ProtocolError, Result};
use super::executor::{Executor, RemoteExecutor};
use super::multiplex::forward_lines;
use super::sink::{Sink, SinkSlots};
use super::types::Credentials;

/// SSH transport for one remote host.
pub struct RemoteConnection {
    credentials: Credentials,
    options: RemoteOptions,
    handle: Mutex<Option<Arc<ClientHandle>>>,
    sinks: SinkSlots,
}

impl RemoteConnection {
    pub fn new(credentials: Credentials, options: RemoteOptions) -> Self {
        Self {
            credentials,
            options,
            handle: Mutex::new(None),
            sinks: SinkSlots::default(),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn options(&self) -> &RemoteOptions {
        &self.options
    }

    pub async fn is_connected(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    async fn open_session(&self) -> Result<Channel<client::Msg>> {
        let handle = self
            .handle
            .lock()
            .await
            .clone()
            .ok_or(ConnectionError::NotConnected)?;
        let channel = handle
            .channel_open_session()
            .await
            .map_err(ConnectionError::Session)?;
        Ok(channel)
    }

    /// Start the copy receiver on `channel` and run the handshake.
    async fn send_over_session(
        &self,
        channel: &mut Channel<client::Msg>,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
        remote_path: &str,
        permission: &str,
    ) -> Result<()> {
        let command = self.options.copy_command(remote_path);
        debug!("Starting copy receiver: {}", command);
        channel
            .exec(true, command.as_str())
            .await
            .map_err(|source| ExecutionError::Channel {
                command: command.clone(),
                source,
            })?;

        let (io, pump) = channel_pipes();
        let SessionIo {
            mut stdin,
            mut stdout,
            mut stderr,
        } = io;
        let name = base_name(remote_path);

        let receiver = async {
            let status = pump
                .drive(channel)
                .await
                .map_err(|source| ExecutionError::Channel {
                    command: command.clone(),
                    source,
                })?;
            check_exit(&command, status)
        };
        let sender = async {
            send_file(&mut stdin, &mut stdout, reader, size, name, permission).await?;
            drop(stdin);
            Ok::<(), Error>(())
        };
        let diagnostics = async {
            let mut text = String::new();
            if stderr.read_to_string(&mut text).await.is_ok() && !text.trim().is_empty() {
                warn!("Copy receiver reported: {}", text.trim());
            }
            Ok::<(), Error>(())
        };

        tokio::try_join!(receiver, sender, diagnostics).map(|_| ())
    }
}

async fn close_channel(channel: Channel<client::Msg>) {
    if let Err(e) = channel.close().await {
        debug!("Closing session channel failed: {}", e);
    }
}

fn check_exit(command: &str, status: Option<u32>) -> Result<()> {
    match status {
        Some(0) => Ok(()),
        Some(code) => Err(ExecutionError::ExitStatus {
            command: command.to_string(),
            code: code.into(),
        }
        .into()),
        None => Err(ExecutionError::MissingExitStatus {
            command: command.to_string(),
        }
        .into()),
    }
}

#[async_trait]
impl Executor for RemoteConnection {
    /// Dial and authenticate. A no-op when already connected.
    async fn connect(&self) -> Result<()> {
        let mut slot = self.handle.lock().await;
        if slot.is_some() {
            return Ok(());
        }
        let handle = connect_with_retry(&self.credentials, &self.options).await?;
        *slot = Some(Arc::new(handle));
        Ok(())
    }

    async fn run(&self, command: &str, sink: Option<&Sink>) -> Result<()> {
        let mut channel = self.open_session().await?;
        let request = self.options.shell.wrap(command);
        debug!("Running remote command: {}", request);

        let (stdout_sink, stderr_sink) = self.sinks.resolve(sink);
        let (io, pump) = channel_pipes();
        let SessionIo {
            stdin,
            stdout,
            stderr,
        } = io;
        drop(stdin);

        let result = match channel.exec(true, request.as_str()).await {
            Ok(()) => {
                let (status, stdout_result, stderr_result) = tokio::join!(
                    pump.drive(&mut channel),
                    forward_lines(stdout, stdout_sink.as_ref()),
                    forward_lines(stderr, stderr_sink.as_ref()),
                );
                finish_run(command, status, stdout_result, stderr_result)
            }
            Err(source) => {
                // Nothing will be forwarded; release readers of the sinks.
                drop(pump);
                let _ = forward_lines(stdout, stdout_sink.as_ref()).await;
                let _ = forward_lines(stderr, stderr_sink.as_ref()).await;
                Err(ExecutionError::Channel {
                    command: command.to_string(),
                    source,
                }
                .into())
            }
        };

        close_channel(channel).await;
        result
    }

    fn set_stdout_sink(&self, sink: Option<Sink>) {
        self.sinks.set_stdout(sink);
    }

    fn set_stderr_sink(&self, sink: Option<Sink>) {
        self.sinks.set_stderr(sink);
    }

    async fn close(&self) -> Result<()> {
        let Some(handle) = self.handle.lock().await.take() else {
            return Ok(());
        };
        handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await
            .map_err(ConnectionError::Close)?;
        info!("SSH connection to {} closed", self.credentials.hostname);
        Ok(())
    }
}

fn finish_run(
    command: &str,
    status: std::result::Result<Option<u32>, russh::Error>,
    stdout_result: std::io::Result<usize>,
    stderr_result: std::io::Result<usize>,
) -> Result<()> {
    let status = status.map_err(|source| ExecutionError::Channel {
        command: command.to_string(),
        source,
    })?;
    check_exit(command, status)?;

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

#[async_trait]
impl RemoteExecutor for RemoteConnection {
    async fn copy(&self, local_path: &Path, remote_path: &str, permission: &str) -> Result<()> {
        validate_permission(permission)?;
        let data = tokio::fs::read(local_path)
            .await
            .map_err(ProtocolError::Io)?;
        debug!(
            "Copying {} ({} bytes) to {}",
            local_path.display(),
            data.len(),
            remote_path
        );
        let mut reader = data.as_slice();
        self.copy_from_reader(&mut reader, data.len() as u64, remote_path, permission)
            .await
    }

    async fn copy_from_reader(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size: u64,
        remote_path: &str,
        permission: &str,
    ) -> Result<()> {
        validate_permission(permission)?;

        // The deadline covers opening the channel as well as the handshake.
        let deadline = self.options.copy_timeout;
        let mut opened = None;
        let outcome = tokio::time::timeout(deadline, async {
            let channel = opened.insert(self.open_session().await?);
            self.send_over_session(channel, reader, size, remote_path, permission)
                .await
        })
        .await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::DeadlineExceeded(deadline).into()),
        };
        if let Some(channel) = opened {
            close_channel(channel).await;
        }

        if result.is_ok() {
            info!("Copied {} bytes to {}", size, remote_path);
        }
        result
    }
}
