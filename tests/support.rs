#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bricks_lib::auth::{Credential, CredentialStore};
use bricks_lib::GitHubAuthConfig;

pub const CLIENT_ID: &str = "Iv1.client";
pub const CLIENT_SECRET: &str = "shhh";

/// Auth config pointing every provider call at `provider_uri`, with an
/// OS-assigned callback port and a short deadline.
pub fn config_for(provider_uri: &str, dir: &Path) -> GitHubAuthConfig {
    GitHubAuthConfig {
        github_client_id: CLIENT_ID.to_string(),
        github_client_secret: CLIENT_SECRET.to_string(),
        redirect_url: "http://127.0.0.1:{port}/callback".to_string(),
        server_port: 0,
        auth_file_path: auth_file(dir),
        callback_timeout: 5,
        oauth_base_url: provider_uri.to_string(),
        api_base_url: provider_uri.to_string(),
        ..GitHubAuthConfig::default()
    }
}

pub fn auth_file(dir: &Path) -> PathBuf {
    dir.join(".auth.json")
}

pub fn write_credential(dir: &Path, token: &str) {
    CredentialStore::new(auth_file(dir))
        .save(&Credential::new(
            "octocat".to_string(),
            token.to_string(),
            CLIENT_ID.to_string(),
        ))
        .expect("write credential");
}
