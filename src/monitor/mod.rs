/*!
 * Guest OS Monitor
 * Decode-dispatch-track pipeline for guest-reported events
 */

pub mod config;
mod handlers;
pub mod stats;

pub use config::MonitorConfig;
pub use stats::{MonitorStats, StatsSnapshot};

use crate::core::errors::MonitorResult;
use crate::core::traits::{ExecutionPath, GuestMemory, ImageStore, PanicHandler};
use crate::core::types::{GuestAddr, PathId, Pid};
use crate::events::MonitorEvents;
use crate::tracking::{InitTracker, KernelLayout, KernelTracker};
use crate::wire::{Command, CommandPayload, COMMAND_SIZE, COMMAND_VERSION};
use log::warn;
use std::sync::Arc;

/// Name under which the guest kernel's own image is published
pub const KERNEL_IMAGE_NAME: &str = "vmlinux";

/// The guest OS introspection monitor
///
/// Invoked synchronously by the host, once per decoded guest command,
/// in the context of the path that issued it. Safe to share across
/// paths: the only mutable state is the write-once kernel layout, the
/// per-path init flags, and the stat counters.
pub struct Monitor {
    config: MonitorConfig,
    kernel: KernelTracker,
    init: InitTracker,
    events: MonitorEvents,
    images: Arc<dyn ImageStore>,
    panic: Arc<dyn PanicHandler>,
    stats: MonitorStats,
}

impl Monitor {
    /// Create a monitor
    ///
    /// Collaborators are constructor arguments: a monitor without its
    /// image store or panic handler cannot be built.
    pub fn new(
        config: MonitorConfig,
        images: Arc<dyn ImageStore>,
        panic: Arc<dyn PanicHandler>,
    ) -> Self {
        Self {
            config,
            kernel: KernelTracker::new(),
            init: InitTracker::new(),
            events: MonitorEvents::new(),
            images,
            panic,
            stats: MonitorStats::new(),
        }
    }

    /// The `(size, version)` pair the transport must enforce on guest
    /// calls before handing bytes in
    pub const fn expected_contract() -> (usize, u64) {
        (COMMAND_SIZE, COMMAND_VERSION)
    }

    /// Handle one raw command record from the guest agent
    ///
    /// Unknown kinds are dropped silently; all guest-data failures
    /// inside handlers degrade to warnings or sentinels. The only
    /// errors are wire-contract violations by the transport.
    pub fn handle_command(&self, path: &mut dyn ExecutionPath, raw: &[u8]) -> MonitorResult<()> {
        let command = match Command::decode(raw) {
            Ok(Some(command)) => command,
            Ok(None) => {
                self.stats.inc_unknown();
                return Ok(());
            }
            Err(err) => {
                warn!("rejecting command from path {}: {err}", path.id());
                return Err(err.into());
            }
        };

        self.stats.inc_handled();
        let pid = command.current_pid;

        match command.payload {
            CommandPayload::Segfault { pc, address, fault } => {
                self.handle_segfault(path, pid, pc, address, fault);
            }
            CommandPayload::ProcessLoad { process_path } => {
                self.handle_process_load(path, pid, process_path);
            }
            CommandPayload::ModuleLoad {
                module_path,
                load_base,
                size,
            } => {
                self.handle_module_load(path, pid, module_path, load_base, size);
            }
            CommandPayload::Trap {
                pc,
                trapnr,
                signr,
                error_code,
            } => {
                self.handle_trap(path, pid, pc, trapnr, signr, error_code);
            }
            CommandPayload::ProcessExit { code } => {
                self.handle_process_exit(path, pid, code);
            }
            CommandPayload::Init {
                page_offset,
                current_task_address,
                task_pid_offset,
                task_tgid_offset,
                start_kernel,
            } => {
                self.handle_init(
                    path,
                    pid,
                    page_offset,
                    current_task_address,
                    task_pid_offset,
                    task_tgid_offset,
                    start_kernel,
                );
            }
            CommandPayload::KernelPanic {
                message,
                message_size,
            } => {
                self.handle_kernel_panic(path, message, message_size);
            }
            CommandPayload::MemoryMap {
                address,
                size,
                prot,
                flags,
                pgoff,
            } => {
                self.handle_memory_map(pid, address, size, prot, flags, pgoff);
            }
            CommandPayload::MemoryUnmap { start, end } => {
                self.handle_memory_unmap(pid, start, end);
            }
            CommandPayload::MemoryProtect { start, size, prot } => {
                self.handle_memory_protect(pid, start, size, prot);
            }
        }

        Ok(())
    }

    /// Publish points for external subscribers
    pub fn events(&self) -> &MonitorEvents {
        &self.events
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Process id of the task currently running on `mem`'s path
    pub fn pid(&self, mem: &dyn GuestMemory) -> Pid {
        self.kernel.pid(mem)
    }

    /// Thread id of the task currently running on `mem`'s path
    pub fn tid(&self, mem: &dyn GuestMemory) -> Pid {
        self.kernel.tid(mem)
    }

    /// Kernel layout, once the init event has been seen
    pub fn kernel_layout(&self) -> Option<KernelLayout> {
        self.kernel.layout()
    }

    /// Whether `addr` lies in the guest kernel's address range
    pub fn is_kernel_address(&self, addr: GuestAddr) -> bool {
        self.kernel.is_kernel_address(addr)
    }

    /// Whether state tracking has completed for `path`
    pub fn is_initialized(&self, path: PathId) -> bool {
        self.init.is_complete(path)
    }

    /// Drop per-path bookkeeping after the host retires a path
    pub fn forget_path(&self, path: PathId) {
        self.init.forget(path);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
