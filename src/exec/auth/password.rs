use std::fmt;

use async_trait::async_trait;
use russh::client;
use tracing::debug;

use crate::exec::handler::NodeClientHandler;

use super::AuthStrategy;

/// Plain password login.
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl fmt::Debug for PasswordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordAuth(<redacted>)")
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<NodeClientHandler>,
        username: &str,
    ) -> Result<bool, String> {
        debug!("Sending password for {}", username);
        handle
            .authenticate_password(username, &self.password)
            .await
            .map(|result| result.success())
            .map_err(|e| format!("Password authentication failed: {}", e))
    }

    fn name(&self) -> &'static str {
        "password"
    }
}
