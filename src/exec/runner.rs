//! One local and one remote executor bound together for provisioning code.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::config::RemoteOptions;
use super::error::Result;
use super::executor::{Executor, RemoteExecutor, capture_output};
use super::local::LocalConnection;
use super::remote::RemoteConnection;
use super::retry::{PollOutcome, RetryPoller};
use super::sink::Sink;
use super::types::Credentials;

/// Provisioning logic that needs access to both executors.
pub trait Provisioner {
    fn set_local(&mut self, local: Arc<dyn Executor>);
    fn set_remote(&mut self, remote: Arc<dyn RemoteExecutor>);
}

/// Façade over a local and a remote executor.
#[derive(Clone)]
pub struct Runner {
    local: Arc<dyn Executor>,
    remote: Arc<dyn RemoteExecutor>,
}

impl Runner {
    /// Connect to the host described by `credentials`.
    pub async fn connect(credentials: Credentials, options: RemoteOptions) -> Result<Self> {
        let remote = RemoteConnection::new(credentials, options);
        remote.connect().await?;
        Ok(Self::from_executors(
            Arc::new(LocalConnection::new()),
            Arc::new(remote),
        ))
    }

    pub fn from_executors(local: Arc<dyn Executor>, remote: Arc<dyn RemoteExecutor>) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> Arc<dyn Executor> {
        self.local.clone()
    }

    pub fn remote(&self) -> Arc<dyn RemoteExecutor> {
        self.remote.clone()
    }

    /// Hand both executors to `provisioner`.
    pub fn install(&self, provisioner: &mut dyn Provisioner) {
        provisioner.set_local(self.local.clone());
        provisioner.set_remote(self.remote.clone());
    }

    pub async fn run_local(&self, command: &str) -> Result<()> {
        self.local.run(command, None).await
    }

    pub async fn run_local_streamed(&self, command: &str, sink: &Sink) -> Result<()> {
        self.local.run(command, Some(sink)).await
    }

    pub async fn run_remote(&self, command: &str) -> Result<()> {
        self.remote.run(command, None).await
    }

    pub async fn run_remote_streamed(&self, command: &str, sink: &Sink) -> Result<()> {
        self.remote.run(command, Some(sink)).await
    }

    pub async fn copy(&self, local_path: &Path, remote_path: &str, permission: &str) -> Result<()> {
        self.remote.copy(local_path, remote_path, permission).await
    }

    /// Stdout of a remote command, lines joined by spaces.
    pub async fn remote_output(&self, command: &str) -> Result<String> {
        capture_output(&*self.remote, command).await
    }

    /// Repeat `command` on the remote host until it exits successfully.
    ///
    /// The value of a successful outcome is the command's output.
    pub async fn wait_for_remote(&self, command: &str, poller: &RetryPoller) -> PollOutcome<String> {
        debug!("Waiting for remote command to succeed: {}", command);
        poller
            .start(|| capture_output(&*self.remote, command))
            .await
    }

    /// Close the remote connection, then the local one.
    pub async fn close(&self) -> Result<()> {
        self.remote.close().await?;
        self.local.close().await
    }
}
