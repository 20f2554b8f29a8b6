use crate::auth::provider::ProviderClient;
use crate::auth::session::{Session, SessionValidator};
use crate::error::{AuthError, Result};

#[derive(Debug)]
pub enum LogoutOutcome {
    /// Nobody was logged in; nothing was touched.
    NotAuthenticated,
    LoggedOut,
    /// The grant was revoked but the local file could not be removed.
    RevokedWithStaleFile(AuthError),
}

pub struct LogoutOrchestrator<'a> {
    provider: &'a ProviderClient,
}

impl<'a> LogoutOrchestrator<'a> {
    pub fn new(provider: &'a ProviderClient) -> Self {
        Self { provider }
    }

    pub fn logout(&self, session: &mut Session) -> Result<LogoutOutcome> {
        if !SessionValidator::new(self.provider).is_authenticated(session)? {
            return Ok(LogoutOutcome::NotAuthenticated);
        }
        let Some(credential) = session.credential() else {
            return Ok(LogoutOutcome::NotAuthenticated);
        };

        self.provider.revoke_grant(&credential.access_token)?;
        log::info!("Revoked grant for {}", credential.account_id);

        let removed = session.store().remove();
        session.clear();
        match removed {
            Ok(_) => Ok(LogoutOutcome::LoggedOut),
            Err(e) => {
                log::error!("Failed to remove authentication file: {}", e);
                Ok(LogoutOutcome::RevokedWithStaleFile(e))
            }
        }
    }
}
