pub mod auth;
pub mod config;
pub mod error;
pub mod printer;

pub use config::{AppConfig, GitHubAuthConfig};
pub use error::{AuthError, ErrorCategory, Result};
