pub mod diff;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::credentials::CredentialSource;
use crate::github::{ApiError, Category, GitHubApi};
use crate::state::{self, CachedUser, WatchState};

/// Bookmark folder mirroring the currently assigned PRs.
pub const BOOKMARK_FOLDER: &str = "Pull Requests";

// Fixed notification keys for the status alerts, so repeated cycles update
// the same notification instead of stacking new ones.
pub(crate) const SETUP_NEEDED_KEY: &str = "prscout-setup-needed";
pub(crate) const AUTH_FAILED_KEY: &str = "prscout-auth-failed";
pub(crate) const RATE_LIMIT_KEY: &str = "prscout-rate-limit";

/// Notification emitter. Fire-and-forget; re-invocation with the same key
/// is expected to coalesce rather than stack.
pub trait Notifier {
    fn notify(&mut self, key: &str, title: &str, body: &str);
}

/// Bookmark side effects the engine drives. Both operations are idempotent,
/// and removal is scoped to the named folder: a matching URL bookmarked
/// anywhere else must be left alone.
pub trait BookmarkSink {
    fn ensure(&mut self, folder: &str, url: &str, label: &str) -> Result<()>;
    fn remove_if_present(&mut self, folder: &str, url: &str) -> Result<()>;
}

/// How a reconciliation cycle ended. None of these are process-fatal;
/// every failure degrades to "try again next cycle".
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The cycle ran to commit.
    Completed(CycleReport),
    /// No credential configured; scheduling should suspend until it changes.
    ConfigMissing,
    /// The token was rejected (401). The credential is left in place for the
    /// user to correct; scheduling continues.
    AuthFailed,
    /// Search quota exhausted until the given time. Known set untouched.
    RateLimited(DateTime<Utc>),
    /// Network or other fetch failure. Known set untouched.
    FetchFailed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub assigned: usize,
    pub new: usize,
    pub vanished: usize,
}

/// The reconciliation engine: fetch the authoritative assigned set, diff it
/// against the persisted known set, notify for the delta and mirror the
/// assigned set into bookmarks, then commit the new known set wholesale.
///
/// The engine is the only writer of the known set. A cycle that fails
/// before commit leaves it byte-for-byte untouched, so a failed fetch is
/// never mistaken for "zero assigned PRs".
pub struct Engine<A, C, N, B> {
    api: A,
    credentials: C,
    notifier: N,
    bookmarks: B,
    state_path: PathBuf,
}

impl<A, C, N, B> Engine<A, C, N, B>
where
    A: GitHubApi,
    C: CredentialSource,
    N: Notifier,
    B: BookmarkSink,
{
    pub fn new(api: A, credentials: C, notifier: N, bookmarks: B, state_path: PathBuf) -> Self {
        Engine {
            api,
            credentials,
            notifier,
            bookmarks,
            state_path,
        }
    }

    /// Run one reconciliation cycle to completion.
    ///
    /// Errors are returned only for local faults (state file unwritable,
    /// keyring broken); remote failures map onto `CycleOutcome`.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        // ResolvingIdentity
        let Some(token) = self.credentials.token().await? else {
            warn!("no GitHub token configured; skipping cycle");
            self.notifier.notify(
                SETUP_NEEDED_KEY,
                "PRScout setup needed",
                "Configure your GitHub personal access token with `prscout config set-token`.",
            );
            return Ok(CycleOutcome::ConfigMissing);
        };

        let mut watch_state = state::load_state(&self.state_path)?;

        let login = match &watch_state.user {
            Some(user) => user.login.clone(),
            None => match self.api.fetch_authenticated_user(&token).await {
                Ok(identity) => {
                    debug!(login = %identity.login, "resolved authenticated user");
                    watch_state.user = Some(CachedUser {
                        login: identity.login.clone(),
                        id: identity.id,
                    });
                    state::save_state(&self.state_path, &watch_state)?;
                    identity.login
                }
                Err(e) => return Ok(self.classify_abort(e)),
            },
        };

        // FetchingRemote
        let query = Category::Assigned.query(&login);
        let fetched = match self.api.search_pull_requests(&token, &query).await {
            Ok(refs) => refs,
            Err(e) => return Ok(self.classify_abort(e)),
        };

        // Diffing. The query already filters by assignee; re-check anyway
        // since the known set must only ever mirror PRs assigned to us.
        let assigned: Vec<_> = fetched
            .into_iter()
            .filter(|pr| pr.assignee.as_deref() == Some(login.as_str()))
            .collect();
        let known = watch_state.known_set();
        let delta = diff::diff_known(&assigned, &known);

        // ApplyingEffects. Bookmark failures are logged, not fatal.
        for pr in &delta.new {
            info!(url = %pr.url, "new assigned PR");
            self.notifier.notify(
                &pr.url,
                &format!("New PR assigned: {}", pr.repo_name()),
                &format!("Title: {}\nAuthor: {}", pr.title, pr.author),
            );
        }
        // The bookmark folder mirrors the full assigned set, not just the
        // delta: ensure is idempotent, and re-ensuring everything restores
        // a bookmark lost to an earlier store failure.
        for pr in &assigned {
            if let Err(e) = self.bookmarks.ensure(BOOKMARK_FOLDER, &pr.url, &pr.label()) {
                warn!(url = %pr.url, error = %e, "failed to bookmark PR");
            }
        }
        for url in &delta.vanished {
            info!(url = %url, "PR no longer assigned");
            if let Err(e) = self.bookmarks.remove_if_present(BOOKMARK_FOLDER, url) {
                warn!(url = %url, error = %e, "failed to remove bookmark");
            }
        }

        // Committing
        let report = CycleReport {
            assigned: assigned.len(),
            new: delta.new.len(),
            vanished: delta.vanished.len(),
        };
        watch_state.commit_known(assigned.into_iter().map(|pr| pr.url).collect());
        state::save_state(&self.state_path, &watch_state)?;

        info!(
            assigned = report.assigned,
            new = report.new,
            vanished = report.vanished,
            "reconciliation cycle complete"
        );
        Ok(CycleOutcome::Completed(report))
    }

    /// Map an API error onto the aborted-cycle outcome, surfacing the
    /// user-actionable cases as notifications. The known set is untouched
    /// on every path here.
    fn classify_abort(&mut self, error: ApiError) -> CycleOutcome {
        match error {
            ApiError::Auth => {
                warn!("GitHub rejected the configured token");
                self.notifier.notify(
                    AUTH_FAILED_KEY,
                    "GitHub authentication failed",
                    "Invalid personal access token. Update it with `prscout config set-token`.",
                );
                CycleOutcome::AuthFailed
            }
            ApiError::RateLimited { reset } => {
                warn!(%reset, "GitHub rate limit exceeded");
                self.notifier.notify(
                    RATE_LIMIT_KEY,
                    "GitHub API rate limit",
                    &format!(
                        "Rate limit exceeded. Will try again after {}. \
                         You can lower the polling cadence with `prscout config set-interval`.",
                        format_reset(reset)
                    ),
                );
                CycleOutcome::RateLimited(reset)
            }
            ApiError::Network(msg) => {
                warn!(error = %msg, "network error; leaving known set untouched");
                CycleOutcome::FetchFailed
            }
            ApiError::Status(code) => {
                warn!(status = code, "unexpected GitHub response; leaving known set untouched");
                CycleOutcome::FetchFailed
            }
        }
    }
}

/// "in 3m 20s (at 2025-01-01 00:00:00 UTC)" style description of a
/// rate-limit reset instant.
fn format_reset(reset: DateTime<Utc>) -> String {
    let until = (reset - Utc::now()).to_std().unwrap_or_default();
    // Drop sub-second noise before handing to humantime
    let until = std::time::Duration::from_secs(until.as_secs());
    format!(
        "{} (at {})",
        humantime::format_duration(until),
        reset.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    use crate::github::types::{PullRequestRef, UserIdentity};

    // -- test doubles -----------------------------------------------------

    enum Scripted {
        Prs(Vec<PullRequestRef>),
        Fail(ApiError),
    }

    struct StubApi {
        user: Mutex<Option<Result<UserIdentity, ApiError>>>,
        searches: Mutex<VecDeque<Scripted>>,
        user_calls: AtomicUsize,
        search_calls: AtomicUsize,
    }

    impl StubApi {
        fn new() -> Self {
            StubApi {
                user: Mutex::new(Some(Ok(UserIdentity {
                    login: "me".to_string(),
                    id: 1,
                }))),
                searches: Mutex::new(VecDeque::new()),
                user_calls: AtomicUsize::new(0),
                search_calls: AtomicUsize::new(0),
            }
        }

        fn script_search(&self, response: Scripted) {
            self.searches.lock().unwrap().push_back(response);
        }

        fn script_user_error(&self, error: ApiError) {
            *self.user.lock().unwrap() = Some(Err(error));
        }
    }

    #[async_trait]
    impl GitHubApi for &StubApi {
        async fn fetch_authenticated_user(&self, _token: &str) -> Result<UserIdentity, ApiError> {
            self.user_calls.fetch_add(1, Ordering::SeqCst);
            self.user
                .lock()
                .unwrap()
                .take()
                .expect("unexpected second user fetch")
        }

        async fn search_pull_requests(
            &self,
            _token: &str,
            _query: &str,
        ) -> Result<Vec<PullRequestRef>, ApiError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            match self.searches.lock().unwrap().pop_front() {
                Some(Scripted::Prs(prs)) => Ok(prs),
                Some(Scripted::Fail(e)) => Err(e),
                None => panic!("unscripted search call"),
            }
        }
    }

    struct StubCredentials(Option<String>);

    #[async_trait]
    impl CredentialSource for StubCredentials {
        async fn token(&self) -> anyhow::Result<Option<String>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        emitted: Vec<(String, String)>, // (key, title)
    }

    impl Notifier for RecordingNotifier {
        fn notify(&mut self, key: &str, title: &str, _body: &str) {
            self.emitted.push((key.to_string(), title.to_string()));
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum BookmarkOp {
        Ensure(String),
        Remove(String),
    }

    // Stateful like the real store: `ops` records mutations only, so an
    // idempotent re-ensure of an existing bookmark is not an effect.
    #[derive(Default)]
    struct RecordingBookmarks {
        present: HashSet<String>,
        ops: Vec<BookmarkOp>,
    }

    impl BookmarkSink for RecordingBookmarks {
        fn ensure(&mut self, folder: &str, url: &str, _label: &str) -> Result<()> {
            assert_eq!(folder, BOOKMARK_FOLDER);
            if self.present.insert(url.to_string()) {
                self.ops.push(BookmarkOp::Ensure(url.to_string()));
            }
            Ok(())
        }

        fn remove_if_present(&mut self, folder: &str, url: &str) -> Result<()> {
            assert_eq!(folder, BOOKMARK_FOLDER);
            if self.present.remove(url) {
                self.ops.push(BookmarkOp::Remove(url.to_string()));
            }
            Ok(())
        }
    }

    fn assigned_pr(url: &str) -> PullRequestRef {
        PullRequestRef {
            url: url.to_string(),
            title: format!("PR {}", url),
            repo: "acme/widgets".to_string(),
            author: "octocat".to_string(),
            assignee: Some("me".to_string()),
            head_branch: None,
            base_branch: None,
            updated_at: Utc::now(),
        }
    }

    fn engine<'a>(
        api: &'a StubApi,
        token: Option<&str>,
        dir: &TempDir,
    ) -> Engine<&'a StubApi, StubCredentials, RecordingNotifier, RecordingBookmarks> {
        Engine::new(
            api,
            StubCredentials(token.map(String::from)),
            RecordingNotifier::default(),
            RecordingBookmarks::default(),
            dir.path().join("state.json"),
        )
    }

    fn seed_known(dir: &TempDir, urls: &[&str]) {
        let mut watch_state = WatchState::new();
        watch_state.user = Some(CachedUser {
            login: "me".to_string(),
            id: 1,
        });
        watch_state.commit_known(urls.iter().map(|u| u.to_string()).collect());
        state::save_state(&dir.path().join("state.json"), &watch_state).unwrap();
    }

    fn load_known(dir: &TempDir) -> Vec<String> {
        state::load_state(&dir.path().join("state.json"))
            .unwrap()
            .known_urls
    }

    // -- tests ------------------------------------------------------------

    #[tokio::test]
    async fn test_first_run_notifies_and_bookmarks_once() {
        let api = StubApi::new();
        api.script_search(Scripted::Prs(vec![assigned_pr("x")]));
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&api, Some("tok"), &dir);

        let outcome = engine.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Completed(CycleReport {
                assigned: 1,
                new: 1,
                vanished: 0
            })
        );
        assert_eq!(engine.notifier.emitted.len(), 1);
        assert_eq!(engine.notifier.emitted[0].0, "x");
        assert_eq!(engine.bookmarks.ops, vec![BookmarkOp::Ensure("x".to_string())]);
        assert_eq!(load_known(&dir), vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_unchanged_remote_is_idempotent() {
        let api = StubApi::new();
        api.script_search(Scripted::Prs(vec![assigned_pr("a"), assigned_pr("b")]));
        api.script_search(Scripted::Prs(vec![assigned_pr("a"), assigned_pr("b")]));
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&api, Some("tok"), &dir);

        engine.run_cycle().await.unwrap();
        let known_after_first = load_known(&dir);
        let effects_after_first = engine.bookmarks.ops.len();
        let notifications_after_first = engine.notifier.emitted.len();

        let outcome = engine.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Completed(CycleReport {
                assigned: 2,
                new: 0,
                vanished: 0
            })
        );
        // Second run: zero new effects, known set unchanged
        assert_eq!(engine.bookmarks.ops.len(), effects_after_first);
        assert_eq!(engine.notifier.emitted.len(), notifications_after_first);
        assert_eq!(load_known(&dir), known_after_first);
    }

    #[tokio::test]
    async fn test_delta_drives_effects() {
        // K = {a,b,c}, R = {b,c,d}
        let api = StubApi::new();
        api.script_search(Scripted::Prs(vec![
            assigned_pr("b"),
            assigned_pr("c"),
            assigned_pr("d"),
        ]));
        let dir = TempDir::new().unwrap();
        seed_known(&dir, &["a", "b", "c"]);
        let mut engine = engine(&api, Some("tok"), &dir);
        for url in ["a", "b", "c"] {
            engine.bookmarks.present.insert(url.to_string());
        }

        let outcome = engine.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Completed(CycleReport {
                assigned: 3,
                new: 1,
                vanished: 1
            })
        );
        assert_eq!(
            engine.bookmarks.ops,
            vec![
                BookmarkOp::Ensure("d".to_string()),
                BookmarkOp::Remove("a".to_string())
            ]
        );
        assert_eq!(engine.notifier.emitted.len(), 1);
        assert_eq!(engine.notifier.emitted[0].0, "d");
        assert_eq!(
            load_known(&dir),
            vec!["b".to_string(), "c".to_string(), "d".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_credential_aborts_before_any_api_call() {
        let api = StubApi::new();
        let dir = TempDir::new().unwrap();
        seed_known(&dir, &["a"]);
        let mut engine = engine(&api, None, &dir);

        let outcome = engine.run_cycle().await.unwrap();

        assert_eq!(outcome, CycleOutcome::ConfigMissing);
        assert_eq!(api.user_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 0);
        // Setup prompt surfaced, known set untouched
        assert_eq!(engine.notifier.emitted.len(), 1);
        assert_eq!(engine.notifier.emitted[0].0, SETUP_NEEDED_KEY);
        assert_eq!(load_known(&dir), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_rate_limit_preserves_state_and_skips_effects() {
        let api = StubApi::new();
        let reset = Utc::now() + chrono::Duration::minutes(10);
        api.script_search(Scripted::Fail(ApiError::RateLimited { reset }));
        let dir = TempDir::new().unwrap();
        seed_known(&dir, &["a", "b"]);
        let mut engine = engine(&api, Some("tok"), &dir);

        let outcome = engine.run_cycle().await.unwrap();

        assert_eq!(outcome, CycleOutcome::RateLimited(reset));
        assert!(engine.bookmarks.ops.is_empty());
        assert_eq!(engine.notifier.emitted.len(), 1);
        assert_eq!(engine.notifier.emitted[0].0, RATE_LIMIT_KEY);
        assert_eq!(load_known(&dir), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_network_error_preserves_state_silently() {
        let api = StubApi::new();
        api.script_search(Scripted::Fail(ApiError::Network("connection refused".into())));
        let dir = TempDir::new().unwrap();
        seed_known(&dir, &["a"]);
        let mut engine = engine(&api, Some("tok"), &dir);

        let outcome = engine.run_cycle().await.unwrap();

        assert_eq!(outcome, CycleOutcome::FetchFailed);
        assert!(engine.notifier.emitted.is_empty());
        assert!(engine.bookmarks.ops.is_empty());
        assert_eq!(load_known(&dir), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_auth_failure_surfaces_alert_and_keeps_state() {
        let api = StubApi::new();
        api.script_user_error(ApiError::Auth);
        let dir = TempDir::new().unwrap();
        // No cached user, so the cycle must resolve identity and hit the 401
        let mut engine = engine(&api, Some("tok"), &dir);

        let outcome = engine.run_cycle().await.unwrap();

        assert_eq!(outcome, CycleOutcome::AuthFailed);
        assert_eq!(engine.notifier.emitted.len(), 1);
        assert_eq!(engine.notifier.emitted[0].0, AUTH_FAILED_KEY);
        assert!(load_known(&dir).is_empty());
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cached_identity_skips_user_fetch() {
        let api = StubApi::new();
        api.script_search(Scripted::Prs(vec![]));
        let dir = TempDir::new().unwrap();
        seed_known(&dir, &[]);
        let mut engine = engine(&api, Some("tok"), &dir);

        engine.run_cycle().await.unwrap();

        assert_eq!(api.user_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.search_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_identity_cached_after_first_resolution() {
        let api = StubApi::new();
        api.script_search(Scripted::Prs(vec![]));
        api.script_search(Scripted::Prs(vec![]));
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&api, Some("tok"), &dir);

        engine.run_cycle().await.unwrap();
        engine.run_cycle().await.unwrap();

        // Second cycle reuses the persisted identity
        assert_eq!(api.user_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reappearing_pr_is_renotified() {
        let api = StubApi::new();
        api.script_search(Scripted::Prs(vec![assigned_pr("x")]));
        api.script_search(Scripted::Prs(vec![]));
        api.script_search(Scripted::Prs(vec![assigned_pr("x")]));
        let dir = TempDir::new().unwrap();
        seed_known(&dir, &[]);
        let mut engine = engine(&api, Some("tok"), &dir);

        engine.run_cycle().await.unwrap();
        engine.run_cycle().await.unwrap();
        engine.run_cycle().await.unwrap();

        // Notified on first appearance and again after the gap
        let x_notifications = engine
            .notifier
            .emitted
            .iter()
            .filter(|(key, _)| key == "x")
            .count();
        assert_eq!(x_notifications, 2);
    }

    #[tokio::test]
    async fn test_missing_bookmark_restored_on_next_cycle() {
        // x is already known (so it is not in New) but its bookmark is
        // absent, as after a store failure when x first appeared
        let api = StubApi::new();
        api.script_search(Scripted::Prs(vec![assigned_pr("x")]));
        let dir = TempDir::new().unwrap();
        seed_known(&dir, &["x"]);
        let mut engine = engine(&api, Some("tok"), &dir);

        engine.run_cycle().await.unwrap();

        // Restored without re-notifying
        assert!(engine.notifier.emitted.is_empty());
        assert_eq!(engine.bookmarks.ops, vec![BookmarkOp::Ensure("x".to_string())]);
    }

    #[tokio::test]
    async fn test_prs_assigned_to_others_are_excluded() {
        let api = StubApi::new();
        let mut foreign = assigned_pr("theirs");
        foreign.assignee = Some("someone-else".to_string());
        let mut unassigned = assigned_pr("nobody");
        unassigned.assignee = None;
        api.script_search(Scripted::Prs(vec![assigned_pr("mine"), foreign, unassigned]));
        let dir = TempDir::new().unwrap();
        seed_known(&dir, &[]);
        let mut engine = engine(&api, Some("tok"), &dir);

        let outcome = engine.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Completed(CycleReport {
                assigned: 1,
                new: 1,
                vanished: 0
            })
        );
        assert_eq!(load_known(&dir), vec!["mine".to_string()]);
    }
}
