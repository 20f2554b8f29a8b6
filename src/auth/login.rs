use std::io;
use std::sync::Arc;

use crate::auth::credential::Credential;
use crate::auth::oauth_server::{CallbackHandler, CallbackServer};
use crate::auth::provider::ProviderClient;
use crate::auth::session::Session;
use crate::auth::state::generate_state;
use crate::config::GitHubAuthConfig;
use crate::error::{AuthError, Result};

/// Opens the authorization URL for the user.
pub trait BrowserLauncher {
    fn open(&self, url: &str) -> io::Result<()>;
}

/// Launches the user's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        webbrowser::open(url)
    }
}

/// Runs one authorization attempt: state, listener, browser, then a race
/// between the callback and the configured deadline.
pub struct LoginOrchestrator<'a, B> {
    config: &'a GitHubAuthConfig,
    provider: Arc<ProviderClient>,
    browser: B,
}

impl<'a, B: BrowserLauncher> LoginOrchestrator<'a, B> {
    pub fn new(config: &'a GitHubAuthConfig, provider: Arc<ProviderClient>, browser: B) -> Self {
        Self {
            config,
            provider,
            browser,
        }
    }

    /// On success the credential has already been written by the callback
    /// handler; the session is updated to match.
    pub fn perform_login(&self, session: &mut Session) -> Result<Credential> {
        let state = generate_state()?;

        // Listen before the browser opens so a fast redirect cannot miss us.
        let mut server = CallbackServer::bind(self.config.server_port)?;
        let redirect_uri = self.config.redirect_url_for(server.port());
        let auth_url = self.provider.authorization_url(&state, &redirect_uri)?;

        let handler = CallbackHandler::new(
            state,
            redirect_uri,
            self.provider.clone(),
            session.store().clone(),
        );
        let completion = server.serve(handler)?;

        if let Err(e) = self.browser.open(&auth_url) {
            server.stop();
            return Err(AuthError::Browser(e));
        }
        log::info!(
            "Waiting up to {}s for the OAuth callback on port {}",
            self.config.callback_timeout,
            server.port()
        );

        let outcome = completion.wait(self.config.callback_timeout());
        server.stop();

        match outcome {
            Some(Ok(credential)) => {
                session.set_credential(credential.clone());
                Ok(credential)
            }
            Some(Err(e)) => Err(e),
            None => Err(AuthError::Timeout(self.config.callback_timeout)),
        }
    }
}
