use std::collections::HashSet;

use crate::github::types::PullRequestRef;

/// The outcome of diffing a fetched remote set against the known set.
///
/// `new` preserves the fetch order (most recently updated first);
/// `vanished` holds bare URLs since the refs behind them are gone.
/// The two are disjoint by construction.
#[derive(Debug, Clone)]
pub struct Delta {
    pub new: Vec<PullRequestRef>,
    pub vanished: Vec<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.vanished.is_empty()
    }
}

/// Compute `New = R \ K` and `Vanished = K \ R` for a remote set `remote`
/// and known set `known`.
pub fn diff_known(remote: &[PullRequestRef], known: &HashSet<String>) -> Delta {
    let remote_urls: HashSet<&str> = remote.iter().map(|pr| pr.url.as_str()).collect();

    let new = remote
        .iter()
        .filter(|pr| !known.contains(&pr.url))
        .cloned()
        .collect();

    let vanished = known
        .iter()
        .filter(|url| !remote_urls.contains(url.as_str()))
        .cloned()
        .collect();

    Delta { new, vanished }
}
