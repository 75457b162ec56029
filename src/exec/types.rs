//! Credential types shared by the remote connection and the runner.
//!
//! Field names serialize in camelCase so the same document that configures a
//! node (`hostname`, `username`, `password`, `privateKey`) deserializes here
//! unchanged.

use std::env;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable holding the `host:port` of the remote node
pub(crate) const HOSTNAME_ENV_VAR: &str = "SSH_HOSTNAME";

/// Environment variable holding the remote username
pub(crate) const USERNAME_ENV_VAR: &str = "SSH_USERNAME";

/// Environment variable holding the remote password
pub(crate) const PASSWORD_ENV_VAR: &str = "SSH_PASSWORD";

/// Environment variable holding the private key path
pub(crate) const PRIVATE_KEY_ENV_VAR: &str = "SSH_PRIVATE_KEY";

/// Secure-shell credentials for one remote node.
///
/// At least one of `password` / `private_key` must be usable when the
/// connection is established; empty strings are treated as absent.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Node endpoint in `host:port` form (port defaults to 22)
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Path to an OpenSSH private key file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,
}

impl Credentials {
    /// Create credentials with no authentication material yet.
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            password: None,
            private_key: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_private_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key = Some(path.into());
        self
    }

    /// Read credentials from `SSH_HOSTNAME`, `SSH_USERNAME`, `SSH_PASSWORD`
    /// and `SSH_PRIVATE_KEY`. Missing variables become empty/absent fields.
    pub fn from_env() -> Self {
        Self {
            hostname: env::var(HOSTNAME_ENV_VAR).unwrap_or_default(),
            username: env::var(USERNAME_ENV_VAR).unwrap_or_default(),
            password: env::var(PASSWORD_ENV_VAR).ok(),
            private_key: env::var(PRIVATE_KEY_ENV_VAR).ok().map(PathBuf::from),
        }
    }

    /// Password, if one was supplied and is not empty.
    pub fn usable_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Private key path, if one was supplied and is not empty.
    pub fn usable_private_key(&self) -> Option<&PathBuf> {
        self.private_key
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod serde_names {
        use super::*;

        #[test]
        fn test_deserializes_camel_case_document() {
            let json = r#"{
                "hostname": "192.168.122.10:22",
                "username": "Administrator",
                "password": "S3cret!",
                "privateKey": "/home/dev/.ssh/id_ed25519"
            }"#;
            let creds: Credentials = serde_json::from_str(json).unwrap();
            assert_eq!(creds.hostname, "192.168.122.10:22");
            assert_eq!(creds.username, "Administrator");
            assert_eq!(creds.usable_password(), Some("S3cret!"));
            assert_eq!(
                creds.usable_private_key(),
                Some(&PathBuf::from("/home/dev/.ssh/id_ed25519"))
            );
        }

        #[test]
        fn test_missing_fields_default() {
            let creds: Credentials = serde_json::from_str(r#"{"username": "vagrant"}"#).unwrap();
            assert_eq!(creds.hostname, "");
            assert!(creds.password.is_none());
            assert!(creds.private_key.is_none());
        }

        #[test]
        fn test_serializes_private_key_camel_case() {
            let creds = Credentials::new("node:22", "admin").with_private_key("/k");
            let json = serde_json::to_string(&creds).unwrap();
            assert!(json.contains("\"privateKey\":\"/k\""));
            assert!(!json.contains("password"));
        }
    }

    mod usable_material {
        use super::*;

        #[test]
        fn test_empty_password_is_not_usable() {
            let creds = Credentials::new("node:22", "admin").with_password("");
            assert_eq!(creds.usable_password(), None);
        }

        #[test]
        fn test_empty_key_path_is_not_usable() {
            let creds = Credentials::new("node:22", "admin").with_private_key("");
            assert_eq!(creds.usable_private_key(), None);
        }
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("node:22", "admin").with_password("hunter2");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
