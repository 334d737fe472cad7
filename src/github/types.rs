use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A pull request observed via the search API.
///
/// The canonical identity of a PR throughout prscout is its `url`
/// (GitHub's `html_url`); everything else is display data.
#[derive(Debug, Clone)]
pub struct PullRequestRef {
    pub url: String,
    pub title: String,
    pub repo: String, // "owner/repo" format
    pub author: String,
    pub assignee: Option<String>,
    pub head_branch: Option<String>,
    pub base_branch: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PullRequestRef {
    /// Repository name without the owner prefix
    pub fn repo_name(&self) -> &str {
        self.repo.rsplit('/').next().unwrap_or(&self.repo)
    }

    /// Bookmark/display label in the format "[repo] title (by author)"
    pub fn label(&self) -> String {
        format!("[{}] {} (by {})", self.repo_name(), self.title, self.author)
    }
}

/// The authenticated user, as returned by the `/user` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UserIdentity {
    pub login: String,
    pub id: u64,
}
