/*!
 * Core Traits
 * Collaborator seams between the monitor and its host
 */

use crate::core::errors::MemoryError;
use crate::core::types::{AddressSpaceId, GuestAddr, PathId, MAX_GUEST_STRING};
use serde::{Deserialize, Serialize};

/// Read access to a monitored path's guest memory
///
/// Implemented by the host against a snapshot of the calling path's
/// address space. All reads are blocking and bounded.
pub trait GuestMemory {
    /// Fill `buf` from guest memory starting at `addr`
    fn read(&self, addr: GuestAddr, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Read a little-endian 32-bit value
    fn read_u32(&self, addr: GuestAddr) -> Result<u32, MemoryError> {
        let mut buf = [0u8; 4];
        self.read(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a little-endian guest word
    fn read_u64(&self, addr: GuestAddr) -> Result<u64, MemoryError> {
        let mut buf = [0u8; 8];
        self.read(addr, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a NUL-terminated guest string, scanning at most
    /// [`MAX_GUEST_STRING`] bytes
    fn read_cstring(&self, addr: GuestAddr) -> Result<String, MemoryError> {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        for i in 0..MAX_GUEST_STRING {
            self.read(addr.wrapping_add(i as GuestAddr), &mut byte)?;
            if byte[0] == 0 {
                return Ok(String::from_utf8_lossy(&out).into_owned());
            }
            out.push(byte[0]);
        }
        Err(MemoryError::UnterminatedString {
            addr,
            max: MAX_GUEST_STRING,
        })
    }
}

/// One monitored execution path
///
/// The host invokes the monitor in the context of the path that issued
/// the command; this trait carries that path's identity, its
/// address-space identity, and the two control operations the monitor
/// may issue against it.
pub trait ExecutionPath: GuestMemory {
    /// Stable identifier of this path for the life of the exploration
    fn id(&self) -> PathId;

    /// Page-table root of the address space the path is executing in
    fn address_space(&self) -> AddressSpaceId;

    /// Prevent the host scheduler from switching away from this path
    /// until it is terminated
    fn set_non_switchable(&mut self);

    /// Terminate exploration of this path. One-way: no further commands
    /// from the path are expected afterwards.
    fn terminate(&mut self, reason: &str);
}

/// Metadata recovered from an on-disk image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ImageInfo {
    pub size: u64,
    pub entry_point: GuestAddr,
}

/// Binary-metadata enrichment collaborator
///
/// Resolves a guest-declared module name and size against the images
/// the host has on disk. A missing or unparsable image is `None`,
/// never fatal.
pub trait ImageStore: Send + Sync {
    fn lookup(&self, name: &str, declared_size: u64) -> Option<ImageInfo>;
}

/// Handler for guest kernel panic reports
///
/// Receives the raw message buffer location; whether the path survives
/// is up to the implementation.
pub trait PanicHandler: Send + Sync {
    fn on_panic(&self, path: &mut dyn ExecutionPath, message: GuestAddr, message_size: u64);
}
