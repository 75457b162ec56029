//! SSH client connection and authentication.
//!
//! ## Connection Lifecycle
//!
//! 1. **Credentials**: build the [`AuthChain`] first, so missing or unreadable
//!    key material fails before any network traffic.
//! 2. **Address Parsing**: `host:port`, with port 22 when omitted.
//! 3. **Dial**: TCP connect and SSH handshake under the connect timeout.
//! 4. **Authentication**: key, then password, first success wins.
//!
//! ## Retry Strategy
//!
//! Dial attempts use exponential backoff with jitter via the `backon` crate,
//! starting from `RemoteOptions::retry_delay` and capped at [`MAX_RETRY_DELAY`].
//! Only errors for which [`ConnectionError::is_retryable`] holds are retried;
//! authentication failures never are.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use russh::client;
use tracing::{error, info, warn};

use super::auth::{AuthChain, AuthStrategy};
use super::config::{MAX_RETRY_DELAY, RemoteOptions};
use super::error::ConnectionError;
use super::handler::NodeClientHandler;
use super::types::Credentials;

pub(crate) type ClientHandle = client::Handle<NodeClientHandler>;

/// Build russh client configuration.
///
/// The connection is long-lived and shared by many commands, so there is no
/// inactivity timeout; keepalives (30s, max 3) detect a dead peer instead.
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// Parse address string into host and port components.
///
/// Uses `rsplit_once` so a bracketed IPv6 address keeps its colons
/// (`[::1]:22`).
pub(crate) fn parse_address(address: &str) -> Result<(String, u16), ConnectionError> {
    if let Some((host, port_str)) = address.rsplit_once(':') {
        let port = port_str
            .parse::<u16>()
            .map_err(|e| ConnectionError::InvalidAddress {
                address: address.to_string(),
                reason: format!("Invalid port number: {}", e),
            })?;
        Ok((host.to_string(), port))
    } else {
        Ok((address.to_string(), 22))
    }
}

/// Connect and authenticate, retrying transient dial failures.
pub(crate) async fn connect_with_retry(
    credentials: &Credentials,
    options: &RemoteOptions,
) -> Result<ClientHandle, ConnectionError> {
    let auth_chain = AuthChain::from_credentials(credentials)?;
    let (host, port) = parse_address(&credentials.hostname)?;

    let attempt_counter = AtomicU32::new(0);
    let address = credentials.hostname.as_str();
    let username = credentials.username.as_str();

    let backoff = ExponentialBuilder::default()
        .with_min_delay(options.retry_delay)
        .with_max_delay(MAX_RETRY_DELAY)
        .with_max_times(options.max_retries as usize)
        .with_jitter();

    let result = (|| async {
        let current_attempt = attempt_counter.fetch_add(1, Ordering::SeqCst);
        if current_attempt > 0 {
            warn!(
                "SSH connection retry attempt {} to {}@{}",
                current_attempt, username, address
            );
        }
        connect_once(&host, port, address, options).await
    })
    .retry(backoff)
    .when(|e: &ConnectionError| {
        let retryable = e.is_retryable();
        if !retryable {
            warn!(
                "SSH connection to {}@{} failed with non-retryable error: {}",
                username, address, e
            );
        }
        retryable
    })
    .notify(|err, dur| {
        warn!("SSH connection failed: {}. Retrying in {:?}", err, dur);
    })
    .await;

    let total_attempts = attempt_counter.load(Ordering::SeqCst);
    let mut handle = match result {
        Ok(handle) => handle,
        Err(e) => {
            error!(
                "SSH connection to {}@{} failed after {} attempt(s). Last error: {}",
                username, address, total_attempts, e
            );
            return Err(e);
        }
    };

    let authenticated = auth_chain
        .authenticate(&mut handle, username)
        .await
        .map_err(|reason| ConnectionError::AuthRejected {
            username: username.to_string(),
            reason,
        })?;
    if !authenticated {
        return Err(ConnectionError::AuthRejected {
            username: username.to_string(),
            reason: "no authentication methods succeeded".to_string(),
        });
    }

    if total_attempts > 1 {
        info!(
            "SSH connection to {}@{} succeeded after {} retry attempt(s)",
            username,
            address,
            total_attempts - 1
        );
    } else {
        info!("SSH connection to {}@{} established", username, address);
    }
    Ok(handle)
}

/// One dial: TCP connect plus SSH handshake, bounded by the connect timeout.
async fn connect_once(
    host: &str,
    port: u16,
    address: &str,
    options: &RemoteOptions,
) -> Result<ClientHandle, ConnectionError> {
    let config = build_client_config(options.compress);
    let handler = NodeClientHandler::new(address);
    let connect_future = client::connect(config, (host, port), handler);

    tokio::time::timeout(options.connect_timeout, connect_future)
        .await
        .map_err(|_| ConnectionError::Dial {
            address: address.to_string(),
            reason: format!("Connection timed out after {:?}", options.connect_timeout),
        })?
        .map_err(|e| ConnectionError::Dial {
            address: address.to_string(),
            reason: format!("Failed to connect: {}", e),
        })
}
