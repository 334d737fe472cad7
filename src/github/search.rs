use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::github::types::PullRequestRef;

/// Raw shape of a `/search/issues` response. The search endpoint returns
/// issues and pull requests mixed; items carrying a `pull_request` object
/// are PRs.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchItem {
    pub html_url: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub user: Option<ItemUser>,
    #[serde(default)]
    pub assignee: Option<ItemUser>,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
    #[serde(default)]
    pub head: Option<BranchRef>,
    #[serde(default)]
    pub base: Option<BranchRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BranchRef {
    #[serde(rename = "ref")]
    pub name: String,
}

/// Append `archived:false` unless the caller's query already constrains
/// archival state.
pub fn with_archived_qualifier(query: &str) -> String {
    if query.contains("archived:") {
        query.to_string()
    } else {
        format!("{} archived:false", query)
    }
}

/// Convert search items into typed PR refs, dropping anything that is not
/// a pull request. `is:pr` in the query should make the filter redundant,
/// but the endpoint serves issues too.
pub(crate) fn into_pull_requests(items: Vec<SearchItem>) -> Vec<PullRequestRef> {
    items
        .into_iter()
        .filter(|item| item.pull_request.is_some())
        .map(|item| {
            // Extract "owner/repo" from the html_url path,
            // e.g. "https://github.com/owner/repo/pull/123"
            let repo = item
                .html_url
                .strip_prefix("https://github.com/")
                .map(|path| {
                    let mut parts = path.split('/');
                    match (parts.next(), parts.next()) {
                        (Some(owner), Some(name)) => format!("{}/{}", owner, name),
                        _ => "unknown/unknown".to_string(),
                    }
                })
                .unwrap_or_else(|| "unknown/unknown".to_string());

            PullRequestRef {
                url: item.html_url,
                title: item.title,
                repo,
                author: item
                    .user
                    .map(|u| u.login)
                    .unwrap_or_else(|| "unknown".to_string()),
                assignee: item.assignee.map(|a| a.login),
                head_branch: item.head.map(|b| b.name),
                base_branch: item.base.map(|b| b.name),
                updated_at: item.updated_at,
            }
        })
        .collect()
}
