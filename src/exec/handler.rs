//! russh client handler used by every remote connection.
//!
//! Host keys are accepted without verification, like
//! `StrictHostKeyChecking=no` in OpenSSH: the nodes this crate bootstraps are
//! freshly created VMs whose keys are not known in advance. The key
//! fingerprint is logged so it can be compared out of band.

use russh::{client, keys};
use tracing::debug;

/// Client handler that accepts all host keys and logs their fingerprints.
pub struct NodeClientHandler {
    address: String,
}

impl NodeClientHandler {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl client::Handler for NodeClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "Accepting host key {} for {}",
            server_public_key.fingerprint(keys::ssh_key::HashAlg::Sha256),
            self.address
        );
        Ok(true)
    }
}
