//! Submission queue entries.

use std::fmt;

use crate::flags::InstallFlags;

bitflags::bitflags! {
    /// Per-entry submission flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// Resolve the entry's descriptor field through the fixed file table
        /// instead of the process descriptor table.
        const FIXED_FILE = 1 << 0;
    }
}

/// Operation carried by an entry. `fd` is the raw descriptor field; how it
/// is interpreted depends on `Flags::FIXED_FILE`.
pub(crate) enum Op {
    Nop,
    Read { fd: i32, buf: Vec<u8>, offset: u64 },
    Write { fd: i32, buf: Vec<u8>, offset: u64 },
    FixedFdInstall { fd: i32, flags: u32, reserved: u32 },
    Close { fd: i32 },
}

/// Opcode of an entry, for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Nop,
    Read,
    Write,
    FixedFdInstall,
    Close,
}

/// A submission queue entry.
///
/// Built with the types in [`crate::opcode`], then tagged with `user_data`
/// and pushed onto a [`crate::Ring`].
pub struct Entry {
    pub(crate) op: Op,
    pub(crate) flags: Flags,
    pub(crate) user_data: u64,
}

impl Entry {
    pub(crate) fn new(op: Op, flags: Flags) -> Self {
        Self {
            op,
            flags,
            user_data: 0,
        }
    }

    /// Set the user data returned with this entry's completion.
    #[inline]
    pub fn user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    /// Add submission flags.
    #[inline]
    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags |= flags;
        self
    }

    /// Remove submission flags.
    #[inline]
    pub fn clear_flags(mut self, flags: Flags) -> Self {
        self.flags &= !flags;
        self
    }

    pub fn get_user_data(&self) -> u64 {
        self.user_data
    }

    pub fn get_flags(&self) -> Flags {
        self.flags
    }

    pub fn opcode(&self) -> Opcode {
        match self.op {
            Op::Nop => Opcode::Nop,
            Op::Read { .. } => Opcode::Read,
            Op::Write { .. } => Opcode::Write,
            Op::FixedFdInstall { .. } => Opcode::FixedFdInstall,
            Op::Close { .. } => Opcode::Close,
        }
    }

    #[inline]
    pub(crate) fn is_fixed(&self) -> bool {
        self.flags.contains(Flags::FIXED_FILE)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Entry");
        d.field("opcode", &self.opcode());
        match &self.op {
            Op::Nop => {}
            Op::Read { fd, buf, offset } | Op::Write { fd, buf, offset } => {
                d.field("fd", fd)
                    .field("len", &buf.len())
                    .field("offset", offset);
            }
            Op::FixedFdInstall { fd, flags, reserved } => {
                d.field("fd", fd)
                    .field("install_flags", &InstallFlags::from_bits_retain(*flags))
                    .field("reserved", reserved);
            }
            Op::Close { fd } => {
                d.field("fd", fd);
            }
        }
        d.field("flags", &self.flags)
            .field("user_data", &self.user_data)
            .finish()
    }
}

/// The submission queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushError;

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("submission queue is full")
    }
}

impl std::error::Error for PushError {}
