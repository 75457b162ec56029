//! Error types for local and remote command execution.
//!
//! Failures are grouped the way callers need to react to them:
//!
//! 1. [`ConnectionError`]: authentication material is missing or rejected, the
//!    dial failed, or an operation was attempted before `connect`.
//! 2. [`ExecutionError`]: a command could not be started, exited non-zero, or
//!    one of its output streams failed while being scanned.
//! 3. [`ProtocolError`]: the copy sink handshake failed, either because the
//!    remote receiver answered with a failure frame or because the deadline
//!    elapsed.
//!
//! None of these are retried internally, with one exception: transient dial
//! failures are retried by `RemoteConnection::connect` according to
//! [`ConnectionError::is_retryable`].
//!
//! # Retry classification
//!
//! Dial errors are classified by message. Authentication failures take
//! precedence: a message containing both authentication and connection
//! keywords is NOT retryable, to avoid repeatedly failing with bad credentials.
//!
//! ```rust,ignore
//! use nodeboot::exec::error::is_retryable_error;
//!
//! assert!(!is_retryable_error("Permission denied"));
//! assert!(is_retryable_error("Connection refused"));
//! assert!(!is_retryable_error("SSH protocol error"));
//! assert!(is_retryable_error("SSH connection timeout"));
//! ```

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Authentication error patterns that indicate permanent failures.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "password authentication failed",
    "key authentication failed",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "all authentication methods failed",
];

/// Connection error patterns that indicate transient failures.
const RETRYABLE_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timeout",
    "timed out",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "resource temporarily unavailable",
    "handshake failed",
    "failed to connect",
    "broken pipe",
    "would block",
];

/// Crate-level result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Any failure surfaced by the execution core.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Transport-level failures: credentials, dial, session lifecycle.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Neither a usable private key nor a password was supplied.
    #[error("no authentication methods available: provide a password or a readable private key")]
    NoAuthMethods,

    /// The private key file could not be read or parsed.
    #[error("failed to load private key from {path}: {reason}")]
    KeyLoad { path: String, reason: String },

    /// Every configured strategy was rejected or errored.
    #[error("authentication failed for {username}: {reason}")]
    AuthRejected { username: String, reason: String },

    /// The host:port string could not be parsed.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// TCP connect or SSH handshake failure.
    #[error("failed to dial {address}: {reason}")]
    Dial { address: String, reason: String },

    /// Run or Copy was called before Connect, or after Close.
    #[error("client is not connected, call connect() first")]
    NotConnected,

    /// A per-command session could not be opened on the live client.
    #[error("failed to open session: {0}")]
    Session(#[source] russh::Error),

    /// Releasing the client failed.
    #[error("failed to close connection: {0}")]
    Close(#[source] russh::Error),
}

impl ConnectionError {
    /// Whether retrying the dial could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConnectionError::Dial { reason, .. } => is_retryable_error(reason),
            _ => false,
        }
    }
}

/// Failures of one command execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The command string contained no program name.
    #[error("empty command")]
    EmptyCommand,

    /// The local process could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Waiting for the local process failed.
    #[error("failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The command ran and exited with a non-zero status.
    #[error("command '{command}' exited with status {code}")]
    ExitStatus { command: String, code: i64 },

    /// The process was terminated without an exit code (signal, dropped session).
    #[error("command '{command}' exited without reporting a status")]
    MissingExitStatus { command: String },

    /// Scanning stdout or stderr failed.
    #[error("failed to read {stream} of '{command}': {source}")]
    Stream {
        command: String,
        stream: &'static str,
        #[source]
        source: io::Error,
    },

    /// The remote session failed while the command was running.
    #[error("session failed while running '{command}': {source}")]
    Channel {
        command: String,
        #[source]
        source: russh::Error,
    },
}

/// Failures of the copy sink handshake.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The receiver answered with a warning or error frame.
    #[error("remote copy failed: {0}")]
    Remote(String),

    /// The receiver answered with a byte that is not a known frame marker.
    #[error("unexpected response byte 0x{0:02x} from remote copy receiver")]
    UnexpectedResponse(u8),

    /// The receiver closed its output before answering.
    #[error("remote copy receiver closed the stream before acknowledging")]
    UnexpectedEof,

    /// The permission string is not 3 or 4 octal digits.
    #[error("invalid permission '{0}': expected 3 or 4 octal digits")]
    InvalidPermission(String),

    /// The payload reader produced a different number of bytes than declared.
    #[error("payload size mismatch: declared {declared} bytes, sent {sent}")]
    SizeMismatch { declared: u64, sent: u64 },

    /// Reading the local source or writing to the session failed.
    #[error("copy I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The copy did not complete before its deadline.
    #[error("copy deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// Determines if an error message describes a transient failure.
///
/// 1. **Authentication failures are NOT retryable** and are checked first.
/// 2. **Connection errors ARE retryable** ("connection refused", "timeout", ...).
/// 3. **Unknown errors**: retried unless they look like an SSH protocol error,
///    which is only retried when it also mentions a timeout or connect failure.
pub(crate) fn is_retryable_error(error: &str) -> bool {
    let error_lower = error.to_lowercase();

    for auth_err in AUTH_ERRORS {
        if error_lower.contains(auth_err) {
            return false;
        }
    }

    for retryable_err in RETRYABLE_ERRORS {
        if error_lower.contains(retryable_err) {
            return true;
        }
    }

    !error_lower.contains("ssh")
        || error_lower.contains("timeout")
        || error_lower.contains("connect")
}
