use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{AuthError, Result};

/// The persisted record of an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    #[serde(rename = "user_name")]
    pub account_id: String,
    pub access_token: String,
    pub client_id: String,
}

impl Credential {
    pub fn new(account_id: String, access_token: String, client_id: String) -> Self {
        Self {
            account_id,
            access_token,
            client_id,
        }
    }
}

/// On-disk shape before validation. Every field is optional here so that
/// an incomplete file is reported by name instead of as a parse error.
#[derive(Debug, Deserialize)]
struct AuthDotJson {
    user_name: Option<String>,
    access_token: Option<String>,
    client_id: Option<String>,
}

impl AuthDotJson {
    fn into_credential(self, path: &Path) -> Result<Credential> {
        let required = |value: Option<String>, field: &'static str| match value {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(AuthError::CredentialIncomplete {
                path: path.to_path_buf(),
                field,
            }),
        };
        Ok(Credential {
            account_id: required(self.user_name, "user_name")?,
            access_token: required(self.access_token, "access_token")?,
            client_id: required(self.client_id, "client_id")?,
        })
    }
}

/// Reads, writes and removes the credential file at a fixed path.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Credential> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            log::debug!("Could not read {}: {}", self.path.display(), e);
            AuthError::CredentialMissing(self.path.clone())
        })?;
        let raw: AuthDotJson =
            serde_json::from_str(&contents).map_err(|source| AuthError::CredentialMalformed {
                path: self.path.clone(),
                source,
            })?;
        raw.into_credential(&self.path)
    }

    /// Overwrites the credential file. The JSON is written to a sibling
    /// temp file (owner read/write only) and renamed over the target.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let write_err = |source| AuthError::CredentialWrite {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(write_err)?;

        let json_string = serde_json::to_string_pretty(credential)
            .map_err(|e| write_err(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        let mut file = NamedTempFile::new_in(&parent).map_err(write_err)?;
        file.write_all(json_string.as_bytes()).map_err(write_err)?;
        file.as_file().sync_all().map_err(write_err)?;
        file.persist(&self.path).map_err(|e| write_err(e.error))?;

        log::debug!("Saved credential to {}", self.path.display());
        Ok(())
    }

    /// Removes the credential file. Returns `false` if there was nothing
    /// to remove.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(AuthError::CredentialRemove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
