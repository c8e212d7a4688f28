//! Service account key file
//!
//! The key is read once at startup and shared by the token provider and the
//! URL signer.

use crate::error::CredentialError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Contents of a `serviceAccount.json` key file (unused fields omitted)
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

// Keeps the private key out of logs
impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Load and validate a key file.
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let contents = fs::read_to_string(path).map_err(|e| CredentialError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let key: ServiceAccountKey = serde_json::from_str(&contents).map_err(|e| CredentialError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if key.key_type != "service_account" {
            return Err(CredentialError::UnsupportedType(key.key_type));
        }

        Ok(key)
    }
}
