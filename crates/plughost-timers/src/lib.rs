//! plughost-timers: Periodic plugin callbacks.
//!
//! Every registered timer runs as its own task on its own interval, so a slow
//! or failing callback only ever delays its own next tick.

pub mod scheduler;

pub use scheduler::{TimerCallback, TimerScheduler};

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plughost_types::TimerId;

/// Snapshot of a scheduled timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerInfo {
    /// Unique timer ID.
    pub id: TimerId,
    /// Plugin that registered the timer.
    pub owner: String,
    /// Entry point invoked on each tick.
    pub name: String,
    pub interval: Duration,
    /// Registration time; the first tick is one interval later.
    pub registered_at: DateTime<Utc>,
    /// Number of completed invocations, including faulted ones.
    pub fired: u64,
    /// Number of invocations that faulted.
    pub faulted: u64,
    /// Last completed invocation.
    pub last_fired: Option<DateTime<Utc>>,
}
