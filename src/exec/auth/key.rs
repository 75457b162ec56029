//! Private key file SSH authentication.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::exec::error::ConnectionError;
use crate::exec::handler::NodeClientHandler;

use super::AuthStrategy;

/// Private key authentication strategy.
///
/// The key is read and parsed when the strategy is built, so an unreadable
/// key is reported before any dial happens. Passphrase-less keys only.
pub struct KeyAuth {
    key: Arc<keys::PrivateKey>,
}

impl KeyAuth {
    /// Load the private key at `path`.
    pub fn load(path: &Path) -> Result<Self, ConnectionError> {
        let key = keys::load_secret_key(path, None).map_err(|e| ConnectionError::KeyLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { key: Arc::new(key) })
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<NodeClientHandler>,
        username: &str,
    ) -> Result<bool, String> {
        // RSA keys need the strongest hash the server supports
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let key_with_hash = keys::PrivateKeyWithHashAlg::new(self.key.clone(), hash_alg);

        let result = handle
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| format!("Key authentication failed: {}", e))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "key"
    }
}
