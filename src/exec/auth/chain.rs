//! Authentication chain for trying multiple strategies.

use async_trait::async_trait;
use russh::client;
use tracing::{debug, warn};

use crate::exec::error::ConnectionError;
use crate::exec::handler::NodeClientHandler;
use crate::exec::types::Credentials;

use super::AuthStrategy;
use super::{KeyAuth, PasswordAuth};

/// Authentication chain that tries multiple strategies in order.
///
/// The first successful strategy stops the chain.
pub struct AuthChain {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Build the chain for `credentials`: private key first, then password.
    ///
    /// A key that cannot be loaded is skipped when a password is also present,
    /// and is an error otherwise. No usable material at all fails with
    /// [`ConnectionError::NoAuthMethods`].
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, ConnectionError> {
        let mut chain = AuthChain::new();
        let password = credentials.usable_password();

        if let Some(key_path) = credentials.usable_private_key() {
            debug!("SSH authenticating with private key '{}'", key_path.display());
            match KeyAuth::load(key_path) {
                Ok(key) => chain = chain.with_strategy(key),
                Err(e) if password.is_some() => {
                    warn!("Skipping private key, falling back to password: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(password) = password {
            debug!("SSH authenticating with password");
            chain = chain.with_password(password);
        }

        if chain.is_empty() {
            return Err(ConnectionError::NoAuthMethods);
        }

        Ok(chain)
    }

    pub fn with_password(self, password: impl Into<String>) -> Self {
        self.with_strategy(PasswordAuth::new(password))
    }

    pub fn with_strategy(mut self, strategy: impl AuthStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[cfg(test)]
    fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

impl Default for AuthChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthStrategy for AuthChain {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<NodeClientHandler>,
        username: &str,
    ) -> Result<bool, String> {
        if self.strategies.is_empty() {
            return Err("No authentication strategies configured".to_string());
        }

        let mut last_error = None;

        for strategy in &self.strategies {
            debug!("Trying authentication strategy: {}", strategy.name());

            match strategy.authenticate(handle, username).await {
                Ok(true) => {
                    debug!(
                        "Authentication succeeded with strategy: {}",
                        strategy.name()
                    );
                    return Ok(true);
                }
                Ok(false) => {
                    debug!("Authentication rejected for strategy: {}", strategy.name());
                    last_error = Some(format!("{} authentication rejected", strategy.name()));
                }
                Err(e) => {
                    debug!(
                        "Authentication error with strategy {}: {}",
                        strategy.name(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| "All authentication methods failed".to_string()))
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
