/*!
 * Notification Bus
 * Typed publish points for external subscribers
 */

pub mod publisher;
pub mod types;

pub use publisher::Publisher;
pub use types::{
    MemoryMapEvent, MemoryProtectEvent, MemoryUnmapEvent, ModuleDescriptor, ModuleLoadEvent,
    ProcessExitEvent, ProcessLoadEvent, SegfaultEvent, TrapEvent,
};

/// One publish point per event kind
///
/// Subscribers attach to the publish points they care about; the
/// monitor's handlers publish to them synchronously as commands are
/// dispatched.
pub struct MonitorEvents {
    pub segfault: Publisher<SegfaultEvent>,
    pub process_load: Publisher<ProcessLoadEvent>,
    pub module_load: Publisher<ModuleLoadEvent>,
    pub process_exit: Publisher<ProcessExitEvent>,
    pub trap: Publisher<TrapEvent>,
    pub memory_map: Publisher<MemoryMapEvent>,
    pub memory_unmap: Publisher<MemoryUnmapEvent>,
    pub memory_protect: Publisher<MemoryProtectEvent>,
}

impl MonitorEvents {
    pub fn new() -> Self {
        Self {
            segfault: Publisher::new(),
            process_load: Publisher::new(),
            module_load: Publisher::new(),
            process_exit: Publisher::new(),
            trap: Publisher::new(),
            memory_map: Publisher::new(),
            memory_unmap: Publisher::new(),
            memory_protect: Publisher::new(),
        }
    }
}

impl Default for MonitorEvents {
    fn default() -> Self {
        Self::new()
    }
}
