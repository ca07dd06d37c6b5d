//! Access token discovery for the Google Calendar client.
//!
//! Token acquisition (the OAuth consent flow) happens outside this tool; we
//! only pick up a token that already exists.

use crate::error::{Error, Result};
use log::{debug, info, warn};
use secrecy::SecretString;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

pub const TOKEN_ENV_VAR: &str = "BULK_REMINDERS_TOKEN";

#[derive(Debug, Deserialize)]
struct TokenFile {
    token: Option<String>,
    access_token: Option<String>,
}

/// Load variables from a `.env` file in the working directory, if there is one
pub fn load_env_file() {
    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => debug!("No .env file loaded: {}", e),
    }
}

/// Find an access token in the environment, then in the token file
pub fn load_access_token(token_path: &Path) -> Result<SecretString> {
    resolve_token(env::var(TOKEN_ENV_VAR).ok(), token_path)
}

fn resolve_token(from_env: Option<String>, token_path: &Path) -> Result<SecretString> {
    if let Some(token) = from_env.filter(|t| !t.trim().is_empty()) {
        debug!("Using access token from {}", TOKEN_ENV_VAR);
        return Ok(SecretString::from(token.trim().to_string()));
    }

    let missing = || Error::MissingToken { path: token_path.to_path_buf() };
    if !token_path.exists() {
        return Err(missing());
    }

    let content = fs::read_to_string(token_path).map_err(|e| Error::storage(token_path, e))?;
    let file: TokenFile = match serde_json::from_str(&content) {
        Ok(file) => file,
        Err(e) => {
            warn!("Ignoring unreadable token file {}: {}", token_path.display(), e);
            return Err(missing());
        }
    };

    file.token
        .or(file.access_token)
        .filter(|t| !t.trim().is_empty())
        .map(|t| {
            debug!("Using access token from {}", token_path.display());
            SecretString::from(t)
        })
        .ok_or_else(missing)
}
