//! Configuration resolution for local and remote execution.
//!
//! Values follow a three-tier priority system:
//!
//! 1. **Explicit** - Set with a `RemoteOptions::with_*` builder (highest priority)
//! 2. **Environment Variable** - Read by [`RemoteOptions::from_env`]
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! The resolved values are collected into [`RemoteOptions`], which is passed
//! into `RemoteConnection::new`. Nothing here is held in process-wide state.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_CONNECT_TIMEOUT` | 30s | Connection timeout in seconds |
//! | `SSH_MAX_RETRIES` | 3 | Maximum retry attempts for transient dial errors |
//! | `SSH_RETRY_DELAY_MS` | 1000ms | Initial retry delay in milliseconds |
//! | `SSH_COPY_TIMEOUT` | 30s | Deadline of a single copy in seconds |
//! | `SSH_COPY_BINARY` | Windows OpenSSH `scp.exe` | Remote copy receiver |
//! | `SSH_REMOTE_SHELL` | `powershell` | Remote interpreter (`powershell` or `raw`) |
//! | `SSH_COMPRESSION` | false | Enable zlib compression |

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default SSH connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default maximum retry attempts for SSH connection
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default retry delay in milliseconds
pub(crate) const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Default copy deadline in seconds
pub(crate) const DEFAULT_COPY_TIMEOUT_SECS: u64 = 30;

/// Copy receiver shipped with the Windows OpenSSH server
pub(crate) const DEFAULT_COPY_BINARY: &str = "C:\\Windows\\System32\\OpenSSH\\scp.exe";

/// Maximum retry delay cap
pub(crate) const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT";
pub(crate) const MAX_RETRIES_ENV_VAR: &str = "SSH_MAX_RETRIES";
pub(crate) const RETRY_DELAY_MS_ENV_VAR: &str = "SSH_RETRY_DELAY_MS";
pub(crate) const COPY_TIMEOUT_ENV_VAR: &str = "SSH_COPY_TIMEOUT";
pub(crate) const COPY_BINARY_ENV_VAR: &str = "SSH_COPY_BINARY";
pub(crate) const REMOTE_SHELL_ENV_VAR: &str = "SSH_REMOTE_SHELL";
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";

/// Interpreter that remote command strings are handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteShell {
    /// `powershell -NoLogo -Command "<command>"`
    #[default]
    PowerShell,
    /// Send the normalized command string as-is to the server's login shell.
    Raw,
}

impl RemoteShell {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "powershell" | "pwsh" => Some(RemoteShell::PowerShell),
            "raw" | "sh" => Some(RemoteShell::Raw),
            _ => None,
        }
    }

    /// Build the exec request for `command`.
    ///
    /// Embedded newlines (`\n` or `\r\n`) become `;` statement separators so a
    /// multi-line script runs as one invocation.
    pub fn wrap(&self, command: &str) -> String {
        let normalized = normalize_newlines(command);
        match self {
            RemoteShell::PowerShell => format!("powershell -NoLogo -Command \"{}\"", normalized),
            RemoteShell::Raw => normalized,
        }
    }
}

fn normalize_newlines(command: &str) -> String {
    command
        .replace("\r\n", ";")
        .replace('\n', ";")
        .trim_end_matches(';')
        .to_string()
}

/// Explicit configuration for a remote connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOptions {
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub copy_timeout: Duration,
    pub copy_binary: String,
    pub shell: RemoteShell,
    pub compress: bool,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            copy_timeout: Duration::from_secs(DEFAULT_COPY_TIMEOUT_SECS),
            copy_binary: DEFAULT_COPY_BINARY.to_string(),
            shell: RemoteShell::default(),
            compress: false,
        }
    }
}

impl RemoteOptions {
    /// Resolve every option from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            connect_timeout: Duration::from_secs(resolve_connect_timeout()),
            max_retries: resolve_max_retries(),
            retry_delay: resolve_retry_delay(),
            copy_timeout: Duration::from_secs(resolve_copy_timeout()),
            copy_binary: resolve_copy_binary(),
            shell: resolve_remote_shell(),
            compress: resolve_compression(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = delay;
        self
    }

    pub fn with_copy_timeout(mut self, timeout: Duration) -> Self {
        self.copy_timeout = timeout;
        self
    }

    pub fn with_copy_binary(mut self, binary: impl Into<String>) -> Self {
        self.copy_binary = binary.into();
        self
    }

    pub fn with_shell(mut self, shell: RemoteShell) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Command that starts the copy receiver in sink mode for `remote_path`.
    pub fn copy_command(&self, remote_path: &str) -> String {
        format!("{} -qt {:?}", self.copy_binary, remote_path)
    }
}

/// Resolve the connection timeout: env var -> default
pub(crate) fn resolve_connect_timeout() -> u64 {
    env_parsed(CONNECT_TIMEOUT_ENV_VAR).unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
}

/// Resolve the max retries: env var -> default
pub(crate) fn resolve_max_retries() -> u32 {
    env_parsed(MAX_RETRIES_ENV_VAR).unwrap_or(DEFAULT_MAX_RETRIES)
}

/// Resolve the retry delay: env var -> default
pub(crate) fn resolve_retry_delay() -> Duration {
    Duration::from_millis(env_parsed(RETRY_DELAY_MS_ENV_VAR).unwrap_or(DEFAULT_RETRY_DELAY_MS))
}

/// Resolve the copy deadline: env var -> default
pub(crate) fn resolve_copy_timeout() -> u64 {
    env_parsed(COPY_TIMEOUT_ENV_VAR).unwrap_or(DEFAULT_COPY_TIMEOUT_SECS)
}

/// Resolve the copy receiver binary: env var -> default
pub(crate) fn resolve_copy_binary() -> String {
    match env::var(COPY_BINARY_ENV_VAR) {
        Ok(binary) if !binary.trim().is_empty() => binary,
        _ => DEFAULT_COPY_BINARY.to_string(),
    }
}

/// Resolve the remote interpreter: env var -> default
pub(crate) fn resolve_remote_shell() -> RemoteShell {
    if let Ok(env_shell) = env::var(REMOTE_SHELL_ENV_VAR)
        && let Some(shell) = RemoteShell::parse(&env_shell)
    {
        return shell;
    }

    RemoteShell::default()
}

/// Resolve the compression setting: env var -> default (false)
pub(crate) fn resolve_compression() -> bool {
    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    false
}

/// Parse an environment variable, ignoring unset or unparsable values.
fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.trim().parse().ok()
}
