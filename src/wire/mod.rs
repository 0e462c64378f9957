/*!
 * Command Wire Contract
 * Fixed-layout, versioned command records written by the in-guest agent
 *
 * The record is a 64-byte little-endian block: a version word, a kind
 * tag, the reporting process id, and a 40-byte kind-specific payload
 * (zero-padded). The host transport validates `(size, version)` before
 * handing bytes in; the decoder re-validates both.
 */

use crate::core::errors::CommandError;
use crate::core::types::{GuestAddr, Pid, Prot};
use bytes::{Buf, BufMut};

/// Fixed size of one command record, in bytes
pub const COMMAND_SIZE: usize = 64;

/// Protocol version baked into the build; the guest agent must match
pub const COMMAND_VERSION: u64 = 0x0002;

/// Closed set of event kinds the monitor understands
///
/// Values outside this set are ignored at decode time to tolerate
/// version skew between the guest agent and the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum CommandKind {
    Segfault = 0,
    ProcessLoad = 1,
    ModuleLoad = 2,
    Trap = 3,
    ProcessExit = 4,
    Init = 5,
    KernelPanic = 6,
    MemoryMap = 7,
    MemoryUnmap = 8,
    MemoryProtect = 9,
}

impl CommandKind {
    /// Convert from the wire tag; unknown tags map to `None`
    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(CommandKind::Segfault),
            1 => Some(CommandKind::ProcessLoad),
            2 => Some(CommandKind::ModuleLoad),
            3 => Some(CommandKind::Trap),
            4 => Some(CommandKind::ProcessExit),
            5 => Some(CommandKind::Init),
            6 => Some(CommandKind::KernelPanic),
            7 => Some(CommandKind::MemoryMap),
            8 => Some(CommandKind::MemoryUnmap),
            9 => Some(CommandKind::MemoryProtect),
            _ => None,
        }
    }
}

/// Kind-specific payload, in wire field order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPayload {
    Segfault {
        pc: GuestAddr,
        address: GuestAddr,
        fault: u64,
    },
    ProcessLoad {
        /// Guest pointer to the NUL-terminated process path
        process_path: GuestAddr,
    },
    ModuleLoad {
        /// Guest pointer to the NUL-terminated module path
        module_path: GuestAddr,
        load_base: GuestAddr,
        size: u64,
    },
    Trap {
        pc: GuestAddr,
        trapnr: u64,
        signr: u64,
        error_code: u64,
    },
    ProcessExit {
        code: u64,
    },
    Init {
        page_offset: GuestAddr,
        current_task_address: GuestAddr,
        task_pid_offset: u64,
        task_tgid_offset: u64,
        start_kernel: GuestAddr,
    },
    KernelPanic {
        message: GuestAddr,
        message_size: u64,
    },
    MemoryMap {
        address: GuestAddr,
        size: u64,
        prot: Prot,
        flags: u64,
        pgoff: u64,
    },
    MemoryUnmap {
        start: GuestAddr,
        end: GuestAddr,
    },
    MemoryProtect {
        start: GuestAddr,
        size: u64,
        prot: Prot,
    },
}

impl CommandPayload {
    /// Kind tag for this payload
    pub const fn kind(&self) -> CommandKind {
        match self {
            CommandPayload::Segfault { .. } => CommandKind::Segfault,
            CommandPayload::ProcessLoad { .. } => CommandKind::ProcessLoad,
            CommandPayload::ModuleLoad { .. } => CommandKind::ModuleLoad,
            CommandPayload::Trap { .. } => CommandKind::Trap,
            CommandPayload::ProcessExit { .. } => CommandKind::ProcessExit,
            CommandPayload::Init { .. } => CommandKind::Init,
            CommandPayload::KernelPanic { .. } => CommandKind::KernelPanic,
            CommandPayload::MemoryMap { .. } => CommandKind::MemoryMap,
            CommandPayload::MemoryUnmap { .. } => CommandKind::MemoryUnmap,
            CommandPayload::MemoryProtect { .. } => CommandKind::MemoryProtect,
        }
    }
}

/// One decoded guest command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// Reporting process id. Guest-supplied and untrusted.
    pub current_pid: Pid,
    pub payload: CommandPayload,
}

impl Command {
    /// Decode a raw command record
    ///
    /// Returns `Ok(None)` for an unrecognized kind tag; the caller is
    /// expected to drop such records silently. Size and version
    /// mismatches are contract violations and surface as errors.
    pub fn decode(raw: &[u8]) -> Result<Option<Command>, CommandError> {
        if raw.len() != COMMAND_SIZE {
            return Err(CommandError::SizeMismatch {
                expected: COMMAND_SIZE,
                actual: raw.len(),
            });
        }

        let mut cur = raw;
        let version = cur.get_u64_le();
        if version != COMMAND_VERSION {
            return Err(CommandError::VersionMismatch {
                expected: COMMAND_VERSION,
                actual: version,
            });
        }

        let kind_raw = cur.get_u64_le();
        let current_pid = cur.get_u64_le();

        let kind = match CommandKind::from_raw(kind_raw) {
            Some(kind) => kind,
            None => return Ok(None),
        };

        let payload = match kind {
            CommandKind::Segfault => CommandPayload::Segfault {
                pc: cur.get_u64_le(),
                address: cur.get_u64_le(),
                fault: cur.get_u64_le(),
            },
            CommandKind::ProcessLoad => CommandPayload::ProcessLoad {
                process_path: cur.get_u64_le(),
            },
            CommandKind::ModuleLoad => CommandPayload::ModuleLoad {
                module_path: cur.get_u64_le(),
                load_base: cur.get_u64_le(),
                size: cur.get_u64_le(),
            },
            CommandKind::Trap => CommandPayload::Trap {
                pc: cur.get_u64_le(),
                trapnr: cur.get_u64_le(),
                signr: cur.get_u64_le(),
                error_code: cur.get_u64_le(),
            },
            CommandKind::ProcessExit => CommandPayload::ProcessExit {
                code: cur.get_u64_le(),
            },
            CommandKind::Init => CommandPayload::Init {
                page_offset: cur.get_u64_le(),
                current_task_address: cur.get_u64_le(),
                task_pid_offset: cur.get_u64_le(),
                task_tgid_offset: cur.get_u64_le(),
                start_kernel: cur.get_u64_le(),
            },
            CommandKind::KernelPanic => CommandPayload::KernelPanic {
                message: cur.get_u64_le(),
                message_size: cur.get_u64_le(),
            },
            CommandKind::MemoryMap => CommandPayload::MemoryMap {
                address: cur.get_u64_le(),
                size: cur.get_u64_le(),
                prot: cur.get_u64_le(),
                flags: cur.get_u64_le(),
                pgoff: cur.get_u64_le(),
            },
            CommandKind::MemoryUnmap => CommandPayload::MemoryUnmap {
                start: cur.get_u64_le(),
                end: cur.get_u64_le(),
            },
            CommandKind::MemoryProtect => CommandPayload::MemoryProtect {
                start: cur.get_u64_le(),
                size: cur.get_u64_le(),
                prot: cur.get_u64_le(),
            },
        };

        Ok(Some(Command {
            current_pid,
            payload,
        }))
    }

    /// Encode this command into a wire record
    ///
    /// The inverse of [`decode`](Command::decode); used by test
    /// fixtures and host-side tooling that stands in for the guest
    /// agent.
    pub fn encode(&self) -> [u8; COMMAND_SIZE] {
        let mut out = [0u8; COMMAND_SIZE];
        let mut cur = &mut out[..];

        cur.put_u64_le(COMMAND_VERSION);
        cur.put_u64_le(self.payload.kind() as u64);
        cur.put_u64_le(self.current_pid);

        match self.payload {
            CommandPayload::Segfault { pc, address, fault } => {
                cur.put_u64_le(pc);
                cur.put_u64_le(address);
                cur.put_u64_le(fault);
            }
            CommandPayload::ProcessLoad { process_path } => {
                cur.put_u64_le(process_path);
            }
            CommandPayload::ModuleLoad {
                module_path,
                load_base,
                size,
            } => {
                cur.put_u64_le(module_path);
                cur.put_u64_le(load_base);
                cur.put_u64_le(size);
            }
            CommandPayload::Trap {
                pc,
                trapnr,
                signr,
                error_code,
            } => {
                cur.put_u64_le(pc);
                cur.put_u64_le(trapnr);
                cur.put_u64_le(signr);
                cur.put_u64_le(error_code);
            }
            CommandPayload::ProcessExit { code } => {
                cur.put_u64_le(code);
            }
            CommandPayload::Init {
                page_offset,
                current_task_address,
                task_pid_offset,
                task_tgid_offset,
                start_kernel,
            } => {
                cur.put_u64_le(page_offset);
                cur.put_u64_le(current_task_address);
                cur.put_u64_le(task_pid_offset);
                cur.put_u64_le(task_tgid_offset);
                cur.put_u64_le(start_kernel);
            }
            CommandPayload::KernelPanic {
                message,
                message_size,
            } => {
                cur.put_u64_le(message);
                cur.put_u64_le(message_size);
            }
            CommandPayload::MemoryMap {
                address,
                size,
                prot,
                flags,
                pgoff,
            } => {
                cur.put_u64_le(address);
                cur.put_u64_le(size);
                cur.put_u64_le(prot);
                cur.put_u64_le(flags);
                cur.put_u64_le(pgoff);
            }
            CommandPayload::MemoryUnmap { start, end } => {
                cur.put_u64_le(start);
                cur.put_u64_le(end);
            }
            CommandPayload::MemoryProtect { start, size, prot } => {
                cur.put_u64_le(start);
                cur.put_u64_le(size);
                cur.put_u64_le(prot);
            }
        }

        out
    }
}
