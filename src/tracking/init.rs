/*!
 * Initialization State Machine
 * Per-path gate for state-tracking setup
 */

use crate::core::types::PathId;
use dashmap::DashMap;
use log::debug;

/// Per-path initialization flags
///
/// Each monitored path moves from uninitialized to initialized exactly
/// once, triggered by whichever of the init or first process-load
/// events arrives first — guests do not guarantee init precedes the
/// first load. The flag never gates event delivery; it only marks that
/// tracking setup has run.
pub struct InitTracker {
    paths: DashMap<PathId, bool>,
}

impl InitTracker {
    pub fn new() -> Self {
        Self {
            paths: DashMap::new(),
        }
    }

    /// Mark initialization complete for `path`
    ///
    /// Idempotent: only the first call per path transitions the state
    /// and returns `true`; later calls are side-effect-free.
    pub fn complete(&self, path: PathId) -> bool {
        let mut flag = self.paths.entry(path).or_insert(false);
        if *flag {
            return false;
        }
        *flag = true;
        debug!("path {path} state tracking initialized");
        true
    }

    /// Whether `path` has completed initialization
    pub fn is_complete(&self, path: PathId) -> bool {
        self.paths.get(&path).map_or(false, |flag| *flag)
    }

    /// Drop the flag for a terminated path
    pub fn forget(&self, path: PathId) {
        self.paths.remove(&path);
    }
}

impl Default for InitTracker {
    fn default() -> Self {
        Self::new()
    }
}
