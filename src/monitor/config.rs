/*!
 * Monitor Configuration
 * Control-action policy, loaded once at construction
 */

use serde::{Deserialize, Serialize};

/// Monitor configuration
///
/// Both termination switches default to on: a faulting or trapping
/// path rarely yields further useful exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct MonitorConfig {
    /// Terminate the faulting path when a segfault is reported
    pub terminate_on_segfault: bool,
    /// Terminate the trapping path when a trap is reported
    pub terminate_on_trap: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            terminate_on_segfault: true,
            terminate_on_trap: true,
        }
    }
}

impl MonitorConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_terminate_on_segfault(mut self, terminate: bool) -> Self {
        self.terminate_on_segfault = terminate;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_terminate_on_trap(mut self, terminate: bool) -> Self {
        self.terminate_on_trap = terminate;
        self
    }

    /// Load from a JSON document; absent keys keep their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
