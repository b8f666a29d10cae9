//! Operation builders.
//!
//! Each builder produces a [`squeue::Entry`]. Targets given as
//! [`types::Fixed`] set `Flags::FIXED_FILE` on the entry; [`types::Fd`]
//! targets leave it clear.

use crate::squeue::{self, Flags, Op};
use crate::types::{self, Target};

/// Offset value meaning "use and advance the file position".
pub const CURRENT_POSITION: u64 = u64::MAX;

fn target_flags(target: Target) -> Flags {
    if target.is_fixed() {
        Flags::FIXED_FILE
    } else {
        Flags::empty()
    }
}

/// Does nothing; completes with result 0.
#[derive(Debug, Default)]
pub struct Nop;

impl Nop {
    pub fn new() -> Self {
        Nop
    }

    pub fn build(self) -> squeue::Entry {
        squeue::Entry::new(Op::Nop, Flags::empty())
    }
}

/// Read into an owned buffer.
///
/// Reads at most `buf.len()` bytes. The buffer comes back in the completion,
/// truncated to the number of bytes read.
#[derive(Debug)]
pub struct Read {
    fd: Target,
    buf: Vec<u8>,
    offset: u64,
}

impl Read {
    pub fn new(fd: impl Into<Target>, buf: Vec<u8>) -> Self {
        Self {
            fd: fd.into(),
            buf,
            offset: CURRENT_POSITION,
        }
    }

    /// Read at an explicit offset. Ignored for files that cannot seek.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn build(self) -> squeue::Entry {
        squeue::Entry::new(
            Op::Read {
                fd: self.fd.raw(),
                buf: self.buf,
                offset: self.offset,
            },
            target_flags(self.fd),
        )
    }
}

/// Write an owned buffer.
#[derive(Debug)]
pub struct Write {
    fd: Target,
    buf: Vec<u8>,
    offset: u64,
}

impl Write {
    pub fn new(fd: impl Into<Target>, buf: Vec<u8>) -> Self {
        Self {
            fd: fd.into(),
            buf,
            offset: CURRENT_POSITION,
        }
    }

    /// Write at an explicit offset. Ignored for files that cannot seek.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn build(self) -> squeue::Entry {
        squeue::Entry::new(
            Op::Write {
                fd: self.fd.raw(),
                buf: self.buf,
                offset: self.offset,
            },
            target_flags(self.fd),
        )
    }
}

/// Install a fixed slot's file into the process descriptor table.
///
/// `flags` is the raw flag word; only `InstallFlags::CLOEXEC` is accepted.
/// The completion result is the new descriptor number, and the completion
/// owns that descriptor until taken.
#[derive(Debug)]
pub struct FixedFdInstall {
    fd: types::Fixed,
    flags: u32,
    reserved: u32,
}

impl FixedFdInstall {
    pub fn new(fd: types::Fixed, flags: u32) -> Self {
        Self {
            fd,
            flags,
            reserved: 0,
        }
    }

    /// Set the reserved field. Anything but zero is rejected at execution.
    pub fn reserved(mut self, reserved: u32) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn build(self) -> squeue::Entry {
        let target = Target::from(self.fd);
        squeue::Entry::new(
            Op::FixedFdInstall {
                fd: target.raw(),
                flags: self.flags,
                reserved: self.reserved,
            },
            Flags::FIXED_FILE,
        )
    }
}

/// Retire a fixed slot, releasing its file and emptying the slot.
#[derive(Debug)]
pub struct Close {
    fd: types::Fixed,
}

impl Close {
    pub fn new(fd: types::Fixed) -> Self {
        Self { fd }
    }

    pub fn build(self) -> squeue::Entry {
        let target = Target::from(self.fd);
        squeue::Entry::new(Op::Close { fd: target.raw() }, Flags::FIXED_FILE)
    }
}
