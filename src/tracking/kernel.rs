/*!
 * Kernel State Tracker
 * Holds the guest kernel layout learned at init time and derives
 * per-thread identities from it
 */

use crate::core::traits::GuestMemory;
use crate::core::types::{GuestAddr, Pid, UNKNOWN_ID};
use log::warn;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Guest kernel layout reported by the in-guest agent
///
/// The offsets are version-specific details of the guest kernel's task
/// structure and are only known at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KernelLayout {
    /// Base of the kernel's address range
    pub kernel_base: GuestAddr,
    /// Address of the per-cpu current-task slot
    pub current_task_addr: GuestAddr,
    /// Byte offset of the per-thread id field
    pub task_pid_offset: u64,
    /// Byte offset of the thread-group id field
    pub task_tgid_offset: u64,
}

/// Tracks the kernel layout across the life of the monitor
///
/// Unset at construction, written once by the init event, then read by
/// every monitored path. Layout values are immutable after the write,
/// so readers never observe a partial update.
pub struct KernelTracker {
    layout: RwLock<Option<KernelLayout>>,
}

impl KernelTracker {
    pub const fn new() -> Self {
        Self {
            layout: RwLock::new(None),
        }
    }

    /// Store the layout reported by the guest
    ///
    /// Expected exactly once per run. A second call wins, since a
    /// re-initializing guest reports fresher values, but is surfaced as
    /// a warning.
    pub fn set_layout(&self, layout: KernelLayout) {
        let mut slot = self.layout.write();
        if let Some(old) = *slot {
            warn!(
                "kernel layout already set (current_task={:#x}); overwriting",
                old.current_task_addr
            );
        }
        *slot = Some(layout);
    }

    /// Current layout, if the init event has been seen
    pub fn layout(&self) -> Option<KernelLayout> {
        *self.layout.read()
    }

    /// Whether `addr` falls inside the kernel's address range
    ///
    /// Always `false` before the layout is known.
    pub fn is_kernel_address(&self, addr: GuestAddr) -> bool {
        self.layout().map_or(false, |l| addr >= l.kernel_base)
    }

    /// Process id of the task running on the calling path
    ///
    /// Each guest thread carries two identifiers: its own id and the id
    /// of the thread group it was started in. The process id reported
    /// here is the thread group id; [`tid`](KernelTracker::tid) returns
    /// the per-thread id.
    ///
    /// Returns [`UNKNOWN_ID`] before init or when either read fails.
    pub fn pid(&self, mem: &dyn GuestMemory) -> Pid {
        let layout = match self.layout() {
            Some(layout) => layout,
            None => return UNKNOWN_ID,
        };

        let current_task = match mem.read_u64(layout.current_task_addr) {
            Ok(task) => task,
            Err(_) => return UNKNOWN_ID,
        };

        // The guest's pid_t is a 32-bit int even on 64-bit kernels.
        let pid_address = current_task.wrapping_add(layout.task_tgid_offset);
        match mem.read_u32(pid_address) {
            Ok(pid) => Pid::from(pid),
            Err(_) => UNKNOWN_ID,
        }
    }

    /// Thread id of the task running on the calling path
    ///
    /// The id field sits beside the current-task slot itself: the
    /// offset is applied to the slot's address, not to the task pointer
    /// stored in it. This mirrors the guest kernel ABI and must not be
    /// "symmetrized" with [`pid`](KernelTracker::pid).
    ///
    /// Returns [`UNKNOWN_ID`] before init or when either read fails.
    pub fn tid(&self, mem: &dyn GuestMemory) -> Pid {
        let layout = match self.layout() {
            Some(layout) => layout,
            None => return UNKNOWN_ID,
        };

        // The slot must hold a live task pointer even though its value
        // is not chased here.
        if mem.read_u64(layout.current_task_addr).is_err() {
            return UNKNOWN_ID;
        }

        let tid_address = layout.current_task_addr.wrapping_add(layout.task_pid_offset);
        match mem.read_u64(tid_address) {
            Ok(tid) => tid,
            Err(_) => UNKNOWN_ID,
        }
    }
}

impl Default for KernelTracker {
    fn default() -> Self {
        Self::new()
    }
}
