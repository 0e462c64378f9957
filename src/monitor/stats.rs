/*!
 * Monitor Statistics
 * Lock-free counters for command handling
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic monitor statistics
///
/// Relaxed ordering throughout; values in a snapshot may be mutually
/// inconsistent under concurrent updates, which is acceptable for
/// observability.
#[derive(Default)]
pub struct MonitorStats {
    commands_handled: AtomicU64,
    unknown_commands: AtomicU64,
    warnings: AtomicU64,
    notifications_published: AtomicU64,
    paths_terminated: AtomicU64,
}

impl MonitorStats {
    pub const fn new() -> Self {
        Self {
            commands_handled: AtomicU64::new(0),
            unknown_commands: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
            notifications_published: AtomicU64::new(0),
            paths_terminated: AtomicU64::new(0),
        }
    }

    #[inline(always)]
    pub fn inc_handled(&self) {
        self.commands_handled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_unknown(&self) {
        self.unknown_commands.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_warnings(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_published(&self) {
        self.notifications_published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_terminated(&self) {
        self.paths_terminated.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot current values (no locks required)
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            commands_handled: self.commands_handled.load(Ordering::Relaxed),
            unknown_commands: self.unknown_commands.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            notifications_published: self.notifications_published.load(Ordering::Relaxed),
            paths_terminated: self.paths_terminated.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`MonitorStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StatsSnapshot {
    pub commands_handled: u64,
    pub unknown_commands: u64,
    pub warnings: u64,
    pub notifications_published: u64,
    pub paths_terminated: u64,
}
