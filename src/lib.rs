/*!
 * Guest Monitor Library
 * OS-introspection event monitoring for symbolic-execution and
 * dynamic-analysis hosts
 */

pub mod core;
pub mod events;
pub mod monitor;
pub mod tracking;
pub mod wire;

// Re-exports
pub use self::core::errors::{CommandError, MemoryError, MonitorError, MonitorResult};
pub use self::core::traits::{ExecutionPath, GuestMemory, ImageInfo, ImageStore, PanicHandler};
pub use self::core::types::{AddressSpaceId, GuestAddr, PathId, Pid, Prot, UNKNOWN_ID};
pub use events::types::{
    MemoryMapEvent, MemoryProtectEvent, MemoryUnmapEvent, ModuleDescriptor, ModuleLoadEvent,
    ProcessExitEvent, ProcessLoadEvent, SegfaultEvent, TrapEvent,
};
pub use events::MonitorEvents;
pub use monitor::{Monitor, MonitorConfig, StatsSnapshot};
pub use tracking::{InitTracker, KernelLayout, KernelTracker};
pub use wire::{Command, CommandKind, CommandPayload, COMMAND_SIZE, COMMAND_VERSION};
