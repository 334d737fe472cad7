use notify_rust::Notification;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::engine::{Notifier, AUTH_FAILED_KEY, RATE_LIMIT_KEY, SETUP_NEEDED_KEY};

/// Desktop notification emitter backed by the platform notification
/// service.
///
/// Coalescing applies to the fixed status alerts only: desktop backends
/// have no portable replace-by-key, so an identical setup/auth/rate-limit
/// payload repeating every cycle is suppressed instead of stacking.
/// PR-keyed notifications always fire, since a PR that vanished and came
/// back must notify again even with an unchanged title.
#[derive(Default)]
pub struct DesktopNotifier {
    shown: HashMap<String, (String, String)>,
}

fn is_status_key(key: &str) -> bool {
    matches!(key, SETUP_NEEDED_KEY | AUTH_FAILED_KEY | RATE_LIMIT_KEY)
}

impl DesktopNotifier {
    pub fn new() -> Self {
        DesktopNotifier::default()
    }

    /// Decide whether this (key, payload) needs a fresh emission, updating
    /// the record either way.
    fn should_emit(&mut self, key: &str, title: &str, body: &str) -> bool {
        if !is_status_key(key) {
            return true;
        }
        let payload = (title.to_string(), body.to_string());
        match self.shown.get(key) {
            Some(previous) if *previous == payload => false,
            _ => {
                self.shown.insert(key.to_string(), payload);
                true
            }
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&mut self, key: &str, title: &str, body: &str) {
        if !self.should_emit(key, title, body) {
            debug!(key, "suppressing duplicate notification");
            return;
        }

        // Fire-and-forget: a missing notification daemon should not fail
        // the cycle that triggered it.
        if let Err(e) = Notification::new()
            .appname("prscout")
            .summary(title)
            .body(body)
            .show()
        {
            warn!(key, error = %e, "failed to show desktop notification");
        }
    }
}
