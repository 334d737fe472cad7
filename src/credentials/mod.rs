pub mod prompt;

use async_trait::async_trait;
use keyring::Entry;
use std::fmt;

const SERVICE_NAME: &str = "prscout";
const TOKEN_KEY: &str = "github-token";

/// Environment variable name for providing a GitHub token without keyring
pub const ENV_TOKEN_VAR: &str = "PRSCOUT_GH_TOKEN";

pub use prompt::prompt_for_token;

/// Check for a GitHub token in the PRSCOUT_GH_TOKEN environment variable.
/// Returns Some(token) if the env var is set and non-empty, None otherwise.
pub fn get_token_from_env() -> Option<String> {
    match std::env::var(ENV_TOKEN_VAR) {
        Ok(val) => {
            let trimmed = val.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(_) => None,
    }
}

#[derive(Debug)]
pub enum CredentialError {
    KeyringUnavailable(String),
    TokenNotFound,
    StoreFailed(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::KeyringUnavailable(msg) => write!(f, "Keyring unavailable: {}", msg),
            CredentialError::TokenNotFound => write!(f, "Token not found in keyring"),
            CredentialError::StoreFailed(msg) => write!(f, "Failed to store token: {}", msg),
        }
    }
}

impl std::error::Error for CredentialError {}

fn get_token_sync() -> Result<String, CredentialError> {
    let entry = Entry::new(SERVICE_NAME, TOKEN_KEY)
        .map_err(|e| CredentialError::KeyringUnavailable(format!("{}", e)))?;

    entry.get_password().map_err(|e| match e {
        keyring::Error::NoEntry => CredentialError::TokenNotFound,
        _ => CredentialError::KeyringUnavailable(format!("{}", e)),
    })
}

fn store_token_sync(token: &str) -> Result<(), CredentialError> {
    let entry = Entry::new(SERVICE_NAME, TOKEN_KEY)
        .map_err(|e| CredentialError::KeyringUnavailable(format!("{}", e)))?;

    entry
        .set_password(token)
        .map_err(|e| CredentialError::StoreFailed(format!("{}", e)))?;

    Ok(())
}

fn delete_token_sync() -> Result<(), CredentialError> {
    let entry = Entry::new(SERVICE_NAME, TOKEN_KEY)
        .map_err(|e| CredentialError::KeyringUnavailable(format!("{}", e)))?;

    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(CredentialError::KeyringUnavailable(format!("{}", e))),
    }
}

/// Retrieve the token from the system keyring.
/// Uses spawn_blocking to prevent blocking the async runtime.
pub async fn get_token() -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(get_token_sync)
        .await
        .map_err(|e| CredentialError::KeyringUnavailable(format!("Task join error: {}", e)))?
}

/// Store the token in the system keyring.
pub async fn store_token(token: String) -> Result<(), CredentialError> {
    tokio::task::spawn_blocking(move || store_token_sync(&token))
        .await
        .map_err(|e| CredentialError::KeyringUnavailable(format!("Task join error: {}", e)))?
}

/// Remove the token from the system keyring. Removing an absent token is
/// not an error.
pub async fn delete_token() -> Result<(), CredentialError> {
    tokio::task::spawn_blocking(delete_token_sync)
        .await
        .map_err(|e| CredentialError::KeyringUnavailable(format!("Task join error: {}", e)))?
}

/// Where the engine gets its credential from, abstracted so cycles can be
/// driven without a real keyring. `Ok(None)` means "not configured", which
/// is distinct from a keyring failure.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn token(&self) -> anyhow::Result<Option<String>>;
}

/// Production credential source: env var override first, then the keyring.
pub struct KeyringCredentials;

#[async_trait]
impl CredentialSource for KeyringCredentials {
    async fn token(&self) -> anyhow::Result<Option<String>> {
        if let Some(token) = get_token_from_env() {
            return Ok(Some(token));
        }
        match get_token().await {
            Ok(token) => Ok(Some(token)),
            Err(CredentialError::TokenNotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
