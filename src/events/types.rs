/*!
 * Event Types
 * Strongly-typed notification payloads
 */

use crate::core::types::{AddressSpaceId, GuestAddr, Pid, Prot};
use serde::{Deserialize, Serialize};

/// A user process faulted on a memory access
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SegfaultEvent {
    pub pid: Pid,
    pub address_space: AddressSpaceId,
    /// Program counter at the fault
    pub pc: GuestAddr,
    /// Faulting address
    pub address: GuestAddr,
    /// Fault kind as reported by the guest
    pub fault: u64,
}

/// A process image finished loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessLoadEvent {
    pub address_space: AddressSpaceId,
    pub pid: Pid,
    /// Final component of the process path; empty when the path could
    /// not be read
    pub file_name: String,
}

/// A module was mapped into a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModuleLoadEvent {
    pub module: ModuleDescriptor,
}

/// A process exited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessExitEvent {
    pub address_space: AddressSpaceId,
    pub pid: Pid,
    pub exit_code: u64,
}

/// The guest raised a trap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrapEvent {
    pub pid: Pid,
    pub pc: GuestAddr,
    pub trapnr: u64,
    pub signr: u64,
}

/// A memory region was mapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryMapEvent {
    pub pid: Pid,
    pub address: GuestAddr,
    pub size: u64,
    pub prot: Prot,
}

/// A memory region was unmapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryUnmapEvent {
    pub pid: Pid,
    pub start: GuestAddr,
    pub size: u64,
}

/// A memory region's protection changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryProtectEvent {
    pub pid: Pid,
    pub start: GuestAddr,
    pub size: u64,
    pub prot: Prot,
}

/// Metadata for one loaded module
///
/// Built per module-load event, published, and discarded; the monitor
/// retains no module state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ModuleDescriptor {
    /// Normalized guest path of the image
    pub path: String,
    /// Final path component
    pub name: String,
    pub size: u64,
    pub entry_point: GuestAddr,
    pub load_base: GuestAddr,
    pub address_space: AddressSpaceId,
    pub pid: Pid,
}

impl ModuleDescriptor {
    /// Build a descriptor from guest-declared fields
    ///
    /// The path is normalized before the short name is derived, so
    /// guests reporting unclean paths ("/lib/../lib/libc.so") still
    /// yield stable names.
    pub fn new(
        path: String,
        size: u64,
        load_base: GuestAddr,
        address_space: AddressSpaceId,
        pid: Pid,
    ) -> Self {
        let path = if path.is_empty() {
            path
        } else {
            path_clean::clean(&path).to_string_lossy().into_owned()
        };
        let name = short_name(&path);

        Self {
            path,
            name,
            size,
            entry_point: 0,
            load_base,
            address_space,
            pid,
        }
    }
}

/// Final component of a guest path
///
/// Guest paths are always `/`-separated regardless of the host
/// platform.
pub(crate) fn short_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_owned()
}
