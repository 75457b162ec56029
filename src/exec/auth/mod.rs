//! Authentication strategies for SSH connections.
//!
//! [`AuthChain::from_credentials`] assembles the strategies from
//! [`Credentials`](crate::exec::Credentials): [`KeyAuth`] first, then
//! [`PasswordAuth`].
//!
//! ```ignore
//! let chain = AuthChain::from_credentials(&credentials)?;
//! let ok = chain.authenticate(&mut handle, &credentials.username).await?;
//! ```

mod chain;
mod key;
mod password;

use async_trait::async_trait;
use russh::client;

use crate::exec::handler::NodeClientHandler;

pub use chain::AuthChain;
pub use key::KeyAuth;
pub use password::PasswordAuth;

/// One way of proving the user's identity to the server.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// `Ok(false)` means the server refused the credentials; `Err` means the
    /// attempt itself failed.
    async fn authenticate(
        &self,
        handle: &mut client::Handle<NodeClientHandler>,
        username: &str,
    ) -> Result<bool, String>;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}
