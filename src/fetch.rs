use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;

use crate::github::types::PullRequestRef;
use crate::github::{ApiError, Category, GitHubApi};

/// Fetch every category concurrently. Per-category failures are returned
/// in place rather than failing the whole call, so the status view can
/// render partial results.
///
/// Results come back in `Category::ALL` order regardless of completion
/// order.
pub async fn fetch_all_categories<A: GitHubApi>(
    api: &A,
    token: &str,
    login: &str,
) -> Vec<(Category, Result<Vec<PullRequestRef>, ApiError>)> {
    let mut futures = FuturesUnordered::new();
    for category in Category::ALL {
        let query = category.query(login);
        futures.push(async move {
            let result = api.search_pull_requests(token, &query).await;
            (category, result)
        });
    }

    let mut fetched = Vec::with_capacity(Category::ALL.len());
    while let Some(entry) = futures.next().await {
        fetched.push(entry);
    }

    fetched.sort_by_key(|(category, _)| Category::ALL.iter().position(|c| c == category));
    fetched
}

/// Deduplicate PRs by URL, keeping first occurrence order. The same PR can
/// appear in several categories (e.g. assigned and mentioned).
pub fn dedupe_by_url(prs: Vec<PullRequestRef>) -> Vec<PullRequestRef> {
    let mut seen_urls = HashSet::new();
    prs.into_iter()
        .filter(|pr| seen_urls.insert(pr.url.clone()))
        .collect()
}
