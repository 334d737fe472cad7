pub mod categories;
pub mod client;
pub mod search;
pub mod types;

pub use categories::Category;
pub use client::GitHubClient;
pub use types::{PullRequestRef, UserIdentity};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// How the GitHub API answered, reduced to the cases callers act on.
///
/// Everything that is not an explicit 401 or a quota-exhausted 403 collapses
/// into `Network`/`Status`, which callers treat as "no data this cycle".
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("GitHub rejected the token (HTTP 401). Update it with `prscout config set-token`.")]
    Auth,

    #[error("GitHub API rate limit exceeded; resets at {reset}")]
    RateLimited { reset: DateTime<Utc> },

    #[error("network error talking to GitHub: {0}")]
    Network(String),

    #[error("unexpected GitHub response: HTTP {0}")]
    Status(u16),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

/// The remote API surface the reconciliation engine depends on.
///
/// The token is passed per call so the client can be built once at startup
/// while the credential is re-read every cycle.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Fetch the identity of the user the token belongs to.
    async fn fetch_authenticated_user(&self, token: &str) -> Result<UserIdentity, ApiError>;

    /// Search for pull requests matching `query`, most recently updated
    /// first. An `archived:false` qualifier is appended unless the query
    /// already constrains archival state.
    async fn search_pull_requests(
        &self,
        token: &str,
        query: &str,
    ) -> Result<Vec<PullRequestRef>, ApiError>;
}
