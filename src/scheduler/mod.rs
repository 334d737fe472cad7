use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::config;
use crate::credentials::CredentialSource;
use crate::engine::{BookmarkSink, CycleOutcome, Engine, Notifier};
use crate::github::GitHubApi;

/// The timer primitive ticks in whole minutes; sub-minute intervals round
/// up to one tick.
pub const TICK_UNIT_SECS: u64 = 60;

/// Settle window before the first firing after (re)scheduling, so a
/// just-saved configuration is in effect when the cycle runs.
const INITIAL_DELAY: Duration = Duration::from_secs(10);

/// Timer period in minutes for a configured interval in seconds:
/// `max(1, ceil(interval_secs / 60))`.
pub fn period_minutes(interval_secs: u64) -> u64 {
    interval_secs.div_ceil(TICK_UNIT_SECS).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Settings were saved: re-read the interval, reschedule, and run one
    /// immediate out-of-band cycle.
    ConfigChanged,
}

/// Cloneable handle for nudging a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl SchedulerHandle {
    pub fn config_changed(&self) {
        // Fire-and-forget: a dropped scheduler just means nothing to nudge.
        let _ = self.tx.send(Control::ConfigChanged);
    }
}

/// Drives the reconciliation engine on a recurring timer.
///
/// Cycles run inline in a single select loop, so two cycles can never
/// overlap; control messages arriving mid-cycle queue on the channel and
/// are handled after the cycle completes.
pub struct Scheduler<A, C, N, B> {
    engine: Engine<A, C, N, B>,
    settings_path: PathBuf,
    rx: mpsc::UnboundedReceiver<Control>,
    // Keeps the channel open even if every external handle is dropped.
    _keepalive: SchedulerHandle,
}

impl<A, C, N, B> Scheduler<A, C, N, B>
where
    A: GitHubApi,
    C: CredentialSource,
    N: Notifier,
    B: BookmarkSink,
{
    pub fn new(engine: Engine<A, C, N, B>, settings_path: PathBuf) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Scheduler {
            engine,
            settings_path,
            rx,
            _keepalive: SchedulerHandle { tx },
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self._keepalive.clone()
    }

    /// Run until the process exits. Returns only on a local fault the
    /// engine considers fatal (e.g. unwritable state file).
    pub async fn run(mut self) -> Result<()> {
        let mut timer = self.make_timer()?;
        // Set when a cycle reports ConfigMissing; only a config change
        // re-enables the timer.
        let mut suspended = false;

        loop {
            tokio::select! {
                _ = timer.tick(), if !suspended => {
                    suspended = self.fire().await?;
                }
                Some(ctrl) = self.rx.recv() => {
                    match ctrl {
                        Control::ConfigChanged => {
                            info!("configuration changed; rescheduling");
                            timer = self.make_timer()?;
                            suspended = self.fire().await?;
                        }
                    }
                }
            }
        }
    }

    /// Run one cycle; returns whether scheduling should suspend.
    async fn fire(&mut self) -> Result<bool> {
        match self.engine.run_cycle().await? {
            CycleOutcome::ConfigMissing => {
                warn!("polling suspended until a token is configured");
                Ok(true)
            }
            CycleOutcome::Completed(report) => {
                info!(assigned = report.assigned, "poll complete");
                Ok(false)
            }
            // Reported by the engine already; the next firing retries.
            CycleOutcome::AuthFailed
            | CycleOutcome::RateLimited(_)
            | CycleOutcome::FetchFailed => Ok(false),
        }
    }

    fn make_timer(&self) -> Result<Interval> {
        let settings = config::load_settings(&self.settings_path)?;
        let minutes = period_minutes(settings.polling_interval_secs);
        let period = Duration::from_secs(minutes * TICK_UNIT_SECS);
        info!(
            interval_secs = settings.polling_interval_secs,
            period_minutes = minutes,
            "scheduling poll timer"
        );

        let mut timer = interval_at(Instant::now() + INITIAL_DELAY, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(timer)
    }
}
