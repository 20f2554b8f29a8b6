use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "./config.json";
/// Same host the callback listener binds, so an IPv6-first `localhost`
/// lookup cannot miss it.
const DEFAULT_REDIRECT_URL: &str = "http://127.0.0.1:{port}/callback";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_AUTH_FILE: &str = ".auth.json";
const DEFAULT_CALLBACK_TIMEOUT: u64 = 20;
const GITHUB_OAUTH_BASE: &str = "https://github.com";
const GITHUB_API_BASE: &str = "https://api.github.com";

/// Top-level layout of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub github_auth: GitHubAuthConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub main_config_file_path: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            main_config_file_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }
}

/// Settings for the OAuth application and the local callback listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubAuthConfig {
    pub github_client_id: String,
    pub github_client_secret: String,
    /// Redirect URL with a `{port}` (or legacy `%d`) placeholder.
    pub redirect_url: String,
    pub server_port: u16,
    pub auth_file_path: PathBuf,
    /// Seconds to wait for the browser to come back to the callback.
    pub callback_timeout: u64,
    pub oauth_base_url: String,
    pub api_base_url: String,
    pub scopes: Vec<String>,
}

impl Default for GitHubAuthConfig {
    fn default() -> Self {
        Self {
            github_client_id: String::new(),
            github_client_secret: String::new(),
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            server_port: DEFAULT_PORT,
            auth_file_path: PathBuf::from(DEFAULT_AUTH_FILE),
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            oauth_base_url: GITHUB_OAUTH_BASE.to_string(),
            api_base_url: GITHUB_API_BASE.to_string(),
            scopes: vec!["repo".to_string(), "user".to_string()],
        }
    }
}

impl GitHubAuthConfig {
    pub fn redirect_url_for(&self, port: u16) -> String {
        let port = port.to_string();
        self.redirect_url
            .replace("{port}", &port)
            .replace("%d", &port)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout)
    }

    /// Replaces the OAuth application credentials, ignoring empty values.
    pub fn override_client(&mut self, client_id: &str, client_secret: &str) {
        if !client_id.is_empty() && !client_secret.is_empty() {
            self.github_client_id = client_id.to_string();
            self.github_client_secret = client_secret.to_string();
        }
    }
}

impl AppConfig {
    /// Loads the configuration file, falling back to defaults when it does
    /// not exist. Fields omitted from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            let mut config = AppConfig::default();
            config.general.main_config_file_path = path.to_path_buf();
            return Ok(config);
        }

        let contents = fs::read_to_string(path).map_err(|e| AuthError::Config {
            path: path.to_path_buf(),
            reason: format!("could not open config file: {}", e),
        })?;
        let mut config: AppConfig =
            serde_json::from_str(&contents).map_err(|e| AuthError::Config {
                path: path.to_path_buf(),
                reason: format!("could not decode config JSON: {}", e),
            })?;
        config.general.main_config_file_path = path.to_path_buf();
        config.github_auth.auth_file_path = expand_tilde(&config.github_auth.auth_file_path)?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Expands a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let Some(rest) = raw.strip_prefix('~') else {
        return Ok(path.to_path_buf());
    };
    let home = dirs::home_dir().ok_or_else(|| AuthError::Config {
        path: path.to_path_buf(),
        reason: "cannot determine home directory".to_string(),
    })?;
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}
