use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tracing::debug;

use crate::github::search::{self, SearchResponse};
use crate::github::types::{PullRequestRef, UserIdentity};
use crate::github::{ApiError, GitHubApi};

const API_BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("prscout/", env!("CARGO_PKG_VERSION"));

/// Thin reqwest wrapper around the two GitHub endpoints prscout uses:
/// `/user` and `/search/issues`.
pub struct GitHubClient {
    http: reqwest::Client,
}

impl GitHubClient {
    pub fn new() -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(GitHubClient { http })
    }

    async fn get(&self, url: &str, token: &str, query: &[(&str, &str)]) -> Result<reqwest::Response, ApiError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .query(query)
            .send()
            .await?;

        classify_status(response.status(), response.headers())?;
        Ok(response)
    }
}

/// Map a response status onto the error taxonomy. A 403 only counts as
/// rate limiting when the remaining-quota header is zero; GitHub also uses
/// 403 for permission problems.
fn classify_status(status: StatusCode, headers: &HeaderMap) -> Result<(), ApiError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Auth);
    }
    if status == StatusCode::FORBIDDEN && quota_exhausted(headers) {
        let reset = parse_rate_limit_reset(headers).unwrap_or_else(Utc::now);
        return Err(ApiError::RateLimited { reset });
    }
    Err(ApiError::Status(status.as_u16()))
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false)
}

/// Parse `x-ratelimit-reset` (epoch seconds) into an absolute timestamp.
fn parse_rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let epoch = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())?;
    DateTime::from_timestamp(epoch, 0)
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn fetch_authenticated_user(&self, token: &str) -> Result<UserIdentity, ApiError> {
        let url = format!("{}/user", API_BASE_URL);
        let response = self.get(&url, token, &[]).await?;
        let user: UserIdentity = response.json().await?;
        debug!(login = %user.login, "fetched authenticated user");
        Ok(user)
    }

    async fn search_pull_requests(
        &self,
        token: &str,
        query: &str,
    ) -> Result<Vec<PullRequestRef>, ApiError> {
        let full_query = search::with_archived_qualifier(query);
        let url = format!("{}/search/issues", API_BASE_URL);
        debug!(query = %full_query, "searching pull requests");

        let response = self
            .get(
                &url,
                token,
                &[("q", full_query.as_str()), ("sort", "updated"), ("order", "desc")],
            )
            .await?;

        let body: SearchResponse = response.json().await?;
        Ok(search::into_pull_requests(body.items))
    }
}
