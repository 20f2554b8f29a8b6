use reqwest::StatusCode;

use crate::auth::credential::{Credential, CredentialStore};
use crate::auth::provider::ProviderClient;
use crate::error::Result;

/// The current user's session, built once per invocation from the
/// credential file and handed to each command.
#[derive(Debug, Clone)]
pub struct Session {
    store: CredentialStore,
    credential: Option<Credential>,
}

impl Session {
    /// Loads the stored credential. A missing, malformed or incomplete
    /// file just means nobody is logged in.
    pub fn load(store: CredentialStore) -> Self {
        let credential = match store.load() {
            Ok(credential) => Some(credential),
            Err(e) => {
                log::debug!("No usable credential: {}", e);
                None
            }
        };
        Self { store, credential }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    pub fn clear(&mut self) {
        self.credential = None;
    }
}

/// Answers "is the stored credential still accepted by the provider?".
pub struct SessionValidator<'a> {
    provider: &'a ProviderClient,
}

impl<'a> SessionValidator<'a> {
    pub fn new(provider: &'a ProviderClient) -> Self {
        Self { provider }
    }

    /// `Ok(false)` covers every "not logged in" state, including a token
    /// the provider no longer accepts. Only transport failures are errors.
    pub fn is_authenticated(&self, session: &Session) -> Result<bool> {
        let Some(credential) = session.credential() else {
            return Ok(false);
        };
        if credential.access_token.is_empty() {
            return Ok(false);
        }

        let status = self.provider.user_status(&credential.access_token)?;
        if status != StatusCode::OK {
            log::warn!(
                "Failed to validate current user's authentication status: {}",
                status.as_u16()
            );
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubAuthConfig;
    use std::fs;
    use tempfile::tempdir;

    fn offline_provider() -> ProviderClient {
        let config = GitHubAuthConfig {
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..GitHubAuthConfig::default()
        };
        ProviderClient::new(&config).unwrap()
    }

    #[test]
    fn test_missing_file_is_not_authenticated() {
        let dir = tempdir().unwrap();
        let session = Session::load(CredentialStore::new(dir.path().join(".auth.json")));
        assert!(session.credential().is_none());

        let provider = offline_provider();
        assert!(!SessionValidator::new(&provider).is_authenticated(&session).unwrap());
    }

    #[test]
    fn test_incomplete_file_is_not_authenticated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".auth.json");
        fs::write(&path, r#"{"user_name": "octocat", "client_id": "Iv1.client"}"#).unwrap();

        let session = Session::load(CredentialStore::new(&path));
        let provider = offline_provider();
        assert!(!SessionValidator::new(&provider).is_authenticated(&session).unwrap());
    }

    #[test]
    fn test_empty_token_short_circuits() {
        let dir = tempdir().unwrap();
        let mut session = Session::load(CredentialStore::new(dir.path().join(".auth.json")));
        session.set_credential(Credential::new(
            "octocat".into(),
            String::new(),
            "Iv1.client".into(),
        ));

        // The provider is unreachable, so reaching it would be an error.
        let provider = offline_provider();
        assert!(!SessionValidator::new(&provider).is_authenticated(&session).unwrap());
    }

    #[test]
    fn test_unreachable_provider_is_an_error() {
        let dir = tempdir().unwrap();
        let mut session = Session::load(CredentialStore::new(dir.path().join(".auth.json")));
        session.set_credential(Credential::new(
            "octocat".into(),
            "gho_token".into(),
            "Iv1.client".into(),
        ));

        let provider = offline_provider();
        assert!(SessionValidator::new(&provider).is_authenticated(&session).is_err());
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let mut session = Session::load(CredentialStore::new(dir.path().join(".auth.json")));
        session.set_credential(Credential::new("a".into(), "b".into(), "c".into()));
        session.clear();
        assert!(session.credential().is_none());
    }
}
