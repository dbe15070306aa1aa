//! Timer scheduler: one independent task per registered callback.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use plughost_types::{HostError, PluginFault, TimerId, TimerSpec};

use crate::TimerInfo;

/// Async timer callback. Each call runs one tick.
pub type TimerCallback = Arc<
    dyn Fn() -> Pin<Box<dyn Future<Output = Result<(), PluginFault>> + Send>> + Send + Sync,
>;

struct ScheduledTimer {
    owner: String,
    spec: TimerSpec,
    registered_at: DateTime<Utc>,
    stats: Arc<TimerStats>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct TimerStats {
    fired: AtomicU64,
    faulted: AtomicU64,
    last_fired: Mutex<Option<DateTime<Utc>>>,
}

impl TimerStats {
    fn record(&self, faulted: bool) {
        self.fired.fetch_add(1, Ordering::SeqCst);
        if faulted {
            self.faulted.fetch_add(1, Ordering::SeqCst);
        }
        *self
            .last_fired
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }
}

/// Runs registered timers until they are cancelled or the scheduler shuts down.
pub struct TimerScheduler {
    timers: Mutex<HashMap<TimerId, ScheduledTimer>>,
    shutdown: CancellationToken,
}

impl TimerScheduler {
    /// Create a new scheduler with no timers.
    pub fn new() -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Start a timer for `owner`. The first tick fires one interval from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(
        &self,
        owner: &str,
        spec: TimerSpec,
        callback: TimerCallback,
    ) -> Result<TimerId, HostError> {
        spec.validate()?;
        if self.shutdown.is_cancelled() {
            return Err(HostError::HostGone);
        }

        let id = TimerId::new();
        let cancel = self.shutdown.child_token();
        let stats = Arc::new(TimerStats::default());

        tokio::spawn(run_timer(
            owner.to_string(),
            spec.clone(),
            callback,
            stats.clone(),
            cancel.clone(),
        ));

        info!(
            plugin = owner,
            timer = %spec.name,
            interval_ms = spec.interval.as_millis() as u64,
            "Timer scheduled"
        );
        self.lock().insert(
            id,
            ScheduledTimer {
                owner: owner.to_string(),
                spec,
                registered_at: Utc::now(),
                stats,
                cancel,
            },
        );
        Ok(id)
    }

    /// Stop a single timer.
    pub fn cancel(&self, id: TimerId) -> bool {
        match self.lock().remove(&id) {
            Some(timer) => {
                timer.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop every timer owned by `owner`. Returns how many were stopped.
    pub fn cancel_owner(&self, owner: &str) -> usize {
        let mut timers = self.lock();
        let ids: Vec<TimerId> = timers
            .iter()
            .filter(|(_, t)| t.owner == owner)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(timer) = timers.remove(id) {
                timer.cancel.cancel();
            }
        }
        if !ids.is_empty() {
            debug!(plugin = owner, count = ids.len(), "Timers cancelled");
        }
        ids.len()
    }

    /// List all timers, oldest first.
    pub fn list(&self) -> Vec<TimerInfo> {
        let timers = self.lock();
        let mut infos: Vec<TimerInfo> = timers
            .iter()
            .map(|(id, t)| TimerInfo {
                id: *id,
                owner: t.owner.clone(),
                name: t.spec.name.clone(),
                interval: t.spec.interval,
                registered_at: t.registered_at,
                fired: t.stats.fired.load(Ordering::SeqCst),
                faulted: t.stats.faulted.load(Ordering::SeqCst),
                last_fired: *t
                    .stats
                    .last_fired
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            })
            .collect();
        infos.sort_by_key(|info| info.registered_at);
        infos
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stop all timers and refuse new ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.lock().clear();
        info!("Timer scheduler stopped");
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TimerId, ScheduledTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_timer(
    owner: String,
    spec: TimerSpec,
    callback: TimerCallback,
    stats: Arc<TimerStats>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + spec.interval, spec.interval);
    // A tick that comes due while the previous callback is still running is dropped.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = callback() => outcome,
        };

        match outcome {
            Ok(()) => stats.record(false),
            Err(fault) if fault.is_unavailable() => {
                debug!(plugin = %owner, timer = %spec.name, "Timer owner no longer available");
                break;
            }
            Err(fault) => {
                stats.record(true);
                warn!(plugin = %owner, timer = %spec.name, "Timed callback failed: {}", fault.kind);
            }
        }
    }

    debug!(plugin = %owner, timer = %spec.name, "Timer stopped");
}
