/*!
 * Core Types
 * Common types used across the monitor
 */

/// Process id as reported by the guest (thread group id)
pub type Pid = u64;

/// Guest-virtual or guest-physical address, sized to the guest word width
pub type GuestAddr = u64;

/// Address-space identifier (page-table root of the owning process)
pub type AddressSpaceId = u64;

/// Identifier of one monitored execution path
pub type PathId = u64;

/// Memory protection flags as reported by the guest
pub type Prot = u64;

/// Sentinel returned when an identity cannot be derived (all-ones)
pub const UNKNOWN_ID: u64 = u64::MAX;

/// Upper bound for guest string reads, in bytes
pub const MAX_GUEST_STRING: usize = 4096;
