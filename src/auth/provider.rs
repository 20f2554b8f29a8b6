use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::config::GitHubAuthConfig;
use crate::error::{AuthError, Result};

const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const GITHUB_JSON: &str = "application/vnd.github+json";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

/// HTTP transport for the provider endpoints. The inner client is built
/// once and never mutated, so one instance can be shared across threads.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: Client,
    client_id: String,
    client_secret: String,
    oauth_base_url: String,
    api_base_url: String,
    scopes: Vec<String>,
}

impl ProviderClient {
    pub fn new(config: &GitHubAuthConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            client_id: config.github_client_id.clone(),
            client_secret: config.github_client_secret.clone(),
            oauth_base_url: config.oauth_base_url.trim_end_matches('/').to_string(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            scopes: config.scopes.clone(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn authorization_url(&self, state: &str, redirect_uri: &str) -> Result<String> {
        let mut auth_url = Url::parse(&format!("{}/login/oauth/authorize", self.oauth_base_url))?;
        auth_url
            .query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("access_type", "offline");
        Ok(auth_url.to_string())
    }

    /// Trades an authorization code for an access token.
    pub fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String> {
        let token_url = format!("{}/login/oauth/access_token", self.oauth_base_url);
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http
            .post(&token_url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, user_agent())
            .form(&params)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AuthError::ExchangeRejected(format!(
                "status {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let token: TokenResponse = response.json()?;
        match (token.access_token, token.error) {
            (Some(access_token), None) if !access_token.is_empty() => Ok(access_token),
            (_, Some(error)) => Err(AuthError::ExchangeRejected(
                token.error_description.unwrap_or(error),
            )),
            _ => Err(AuthError::ExchangeRejected("Missing access_token".to_string())),
        }
    }

    /// Sends the bearer-authenticated `GET /user` and hands back the raw
    /// response so callers can decide what a non-200 means.
    fn get_user(&self, access_token: &str) -> Result<reqwest::blocking::Response> {
        let response = self
            .http
            .get(format!("{}/user", self.api_base_url))
            .bearer_auth(access_token)
            .header(ACCEPT, GITHUB_JSON)
            .header(USER_AGENT, user_agent())
            .send()?;
        Ok(response)
    }

    /// Who am I: resolves the account name the token belongs to.
    pub fn fetch_login(&self, access_token: &str) -> Result<String> {
        let response = self
            .get_user(access_token)
            .map_err(|e| AuthError::IdentityLookup(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::IdentityLookup(format!(
                "unexpected status {}",
                status.as_u16()
            )));
        }
        let user: User = response
            .json()
            .map_err(|e| AuthError::IdentityLookup(e.to_string()))?;
        Ok(user.login)
    }

    /// Status code of an identity lookup. Transport failures surface as
    /// errors; any HTTP answer, good or bad, is returned as a status.
    pub fn user_status(&self, access_token: &str) -> Result<StatusCode> {
        Ok(self.get_user(access_token)?.status())
    }

    /// Revokes the application grant for `access_token`. Only `204 No
    /// Content` counts as success.
    pub fn revoke_grant(&self, access_token: &str) -> Result<()> {
        let url = format!(
            "{}/applications/{}/grant",
            self.api_base_url, self.client_id
        );
        let payload = serde_json::json!({ "access_token": access_token });

        let response = self
            .http
            .delete(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(ACCEPT, GITHUB_JSON)
            .header(API_VERSION_HEADER, API_VERSION)
            .header(USER_AGENT, user_agent())
            .json(&payload)
            .send()?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            log::debug!("Grant revocation answered {}", status.as_u16());
            return Err(AuthError::RevokeRejected(status.as_u16()));
        }
        Ok(())
    }
}

fn user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
