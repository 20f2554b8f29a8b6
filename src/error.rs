use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Broad failure classes, used by the command layer to pick the message
/// it prints before exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Protocol,
    Transport,
    Timeout,
    Environment,
}

impl ErrorCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration error",
            ErrorCategory::Protocol => "protocol error",
            ErrorCategory::Transport => "transport error",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Environment => "environment error",
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration file '{path}' could not be loaded: {reason}")]
    Config { path: PathBuf, reason: String },
    #[error("Credential file '{0}' not found")]
    CredentialMissing(PathBuf),
    #[error("Credential file '{path}' is not valid JSON: {source}")]
    CredentialMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Credential file '{path}' is missing required field `{field}`")]
    CredentialIncomplete { path: PathBuf, field: &'static str },
    #[error("Failed to write credential file '{path}': {source}")]
    CredentialWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to remove credential file '{path}': {source}")]
    CredentialRemove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Login request state did not match the request's state param")]
    StateMismatch,
    #[error("Callback request did not carry an authorization code")]
    MissingCode,
    #[error("Authorization was denied by the provider: {0}")]
    ProviderDenied(String),
    #[error("Failed to exchange the authorization code: {0}")]
    ExchangeRejected(String),
    #[error("Failed to fetch GitHub user info: {0}")]
    IdentityLookup(String),
    #[error("Token revocation was rejected with status {0}")]
    RevokeRejected(u16),
    #[error("Callback server stopped before the login completed")]
    CallbackAborted,

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Timed out after {0}s waiting for GitHub authentication")]
    Timeout(u64),

    #[error("Failed to read from the system entropy source: {0}")]
    Entropy(#[from] rand::Error),
    #[error("Error opening browser: {0}")]
    Browser(#[source] io::Error),
    #[error("Unable to listen on port {port}: {reason}")]
    Bind { port: u16, reason: String },
}

impl AuthError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::Config { .. }
            | AuthError::CredentialMissing(_)
            | AuthError::CredentialMalformed { .. }
            | AuthError::CredentialIncomplete { .. }
            | AuthError::CredentialWrite { .. }
            | AuthError::CredentialRemove { .. } => ErrorCategory::Configuration,
            AuthError::StateMismatch
            | AuthError::MissingCode
            | AuthError::ProviderDenied(_)
            | AuthError::ExchangeRejected(_)
            | AuthError::IdentityLookup(_)
            | AuthError::RevokeRejected(_)
            | AuthError::CallbackAborted => ErrorCategory::Protocol,
            AuthError::Transport(_) | AuthError::InvalidUrl(_) => ErrorCategory::Transport,
            AuthError::Timeout(_) => ErrorCategory::Timeout,
            AuthError::Entropy(_) | AuthError::Browser(_) | AuthError::Bind { .. } => {
                ErrorCategory::Environment
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
