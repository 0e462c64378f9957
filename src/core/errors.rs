/*!
 * Error Types
 * Centralized error handling with thiserror
 */

use crate::core::types::GuestAddr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monitor operation result
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Top-level monitor errors
///
/// Guest-supplied malformed data never surfaces here: unreadable memory
/// degrades to sentinels or warnings inside the handlers, and unknown
/// command kinds are dropped. Only a misbehaving transport (wrong buffer
/// size or protocol version) produces an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Wire contract violations
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum CommandError {
    #[error("command buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("command version mismatch: expected {expected:#x}, got {actual:#x}")]
    VersionMismatch { expected: u64, actual: u64 },
}

/// Guest memory access failures
///
/// A routine, expected condition: the guest may report addresses that
/// are unmapped or symbolic in the monitored path's address space.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum MemoryError {
    #[error("guest read of {len} bytes at {addr:#x} failed")]
    ReadFailed { addr: GuestAddr, len: usize },

    #[error("guest string at {addr:#x} exceeds {max} bytes without a terminator")]
    UnterminatedString { addr: GuestAddr, max: usize },
}
