//! Local and remote command execution.
//!
//! This module provides the execution core used by provisioning code:
//!
//! - [`LocalConnection`] runs commands as child processes.
//! - [`RemoteConnection`] runs commands and places files on a host over SSH,
//!   one session channel per command.
//! - [`Sink`] is a renewable destination for output lines, filled by
//!   [`forward_lines`].
//! - [`RetryPoller`] repeats an operation until it succeeds or is cancelled.
//! - [`Runner`] binds one local and one remote executor together.
//!
//! # Architecture
//!
//! ```text
//! Runner ──► Arc<dyn Executor> ─────────► LocalConnection ──► tokio::process
//!        └─► Arc<dyn RemoteExecutor> ───► RemoteConnection ─► russh client
//!                                                │
//!                                    channel pump (duplex pipes)
//!                                                │
//!                               forward_lines ──► Sink     copy handshake
//! ```
//!
//! # Module Structure
//!
//! - [`auth`]: Authentication strategies (key, password, chain)
//! - [`config`]: Option resolution from parameters, environment and defaults
//! - [`error`]: Error types and retry classification

pub mod auth;
mod channel;
mod client;
pub mod config;
mod copy;
pub mod error;
mod executor;
mod handler;
mod local;
mod multiplex;
mod remote;
mod retry;
mod runner;
mod sink;
#[cfg(test)]
pub(crate) mod test_server;
mod types;

pub use config::{RemoteOptions, RemoteShell};
pub use copy::{DEFAULT_PERMISSION, base_name, validate_permission};
pub use error::{ConnectionError, Error, ExecutionError, ProtocolError, Result};
pub use executor::{Executor, RemoteExecutor, capture_output};
pub use handler::NodeClientHandler;
pub use local::LocalConnection;
pub use multiplex::forward_lines;
pub use remote::RemoteConnection;
pub use retry::{PollOutcome, RetryPoller};
pub use runner::{Provisioner, Runner};
pub use sink::{Sink, SinkReceiver};
pub use types::Credentials;
