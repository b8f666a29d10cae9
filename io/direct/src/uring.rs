//! Kernel-backed fixed descriptors via io_uring.
//!
//! Drives the kernel's own registered file table and
//! `IORING_OP_FIXED_FD_INSTALL` (Linux 6.8+), so behavior can be compared
//! against [`crate::Ring`].

use std::collections::HashMap;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};

use io_uring::{IoUring, Probe, opcode, types};
use tracing::debug;

use crate::flags::InstallFlags;

/// Install flag asking the kernel not to set close-on-exec.
const IORING_FIXED_FD_NO_CLOEXEC: u32 = 1 << 0;

/// Flag word the kernel rejects regardless of version.
const KERNEL_INVALID_FLAGS: u32 = !IORING_FIXED_FD_NO_CLOEXEC;

/// Check whether the running kernel supports fixed descriptor install.
pub fn is_supported() -> bool {
    match IoUring::new(2) {
        Ok(ring) => {
            let mut probe = Probe::new();
            if ring.submitter().register_probe(&mut probe).is_err() {
                return false;
            }
            probe.is_supported(opcode::FixedFdInstall::CODE)
        }
        Err(_) => false,
    }
}

/// A completion from the kernel ring.
#[derive(Debug)]
pub struct Completion {
    pub user_data: u64,
    /// Non-negative on success, negative errno on failure. For installs this
    /// is a raw descriptor the caller now owns.
    pub result: i32,
    /// Buffer of a read, truncated to the bytes read.
    pub buf: Option<Vec<u8>>,
}

/// Thin wrapper around an io_uring instance for fixed descriptor work.
pub struct KernelRing {
    ring: IoUring,
    /// Read buffers owned until their completion arrives.
    bufs: HashMap<u64, Vec<u8>>,
    next_user_data: u64,
}

impl KernelRing {
    pub fn new(entries: u32) -> io::Result<Self> {
        Ok(Self {
            ring: IoUring::new(entries)?,
            bufs: HashMap::new(),
            next_user_data: 0,
        })
    }

    /// Register `fds` as the kernel's fixed file table.
    pub fn register_files(&self, fds: &[BorrowedFd<'_>]) -> io::Result<()> {
        let raw: Vec<RawFd> = fds.iter().map(|fd| fd.as_raw_fd()).collect();
        self.ring.submitter().register_files(&raw)?;
        debug!(files = raw.len(), "registered kernel file table");
        Ok(())
    }

    pub fn unregister_files(&self) -> io::Result<()> {
        self.ring.submitter().unregister_files()
    }

    /// Submit an install of `slot` with the given flags.
    pub fn install(&mut self, slot: u32, flags: InstallFlags) -> io::Result<u64> {
        self.install_raw(slot, flags.bits())
    }

    /// Submit an install with a raw flag word, translated to the kernel's
    /// vocabulary. Words outside [`InstallFlags`] are forwarded as a value
    /// the kernel rejects.
    pub fn install_raw(&mut self, slot: u32, flags: u32) -> io::Result<u64> {
        let file_flags = match InstallFlags::from_bits(flags) {
            Some(flags) if flags.contains(InstallFlags::CLOEXEC) => 0,
            Some(_) => IORING_FIXED_FD_NO_CLOEXEC,
            None => KERNEL_INVALID_FLAGS,
        };
        let user_data = self.next_user_data();
        let entry = opcode::FixedFdInstall::new(types::Fixed(slot), file_flags)
            .build()
            .user_data(user_data);
        self.push(&entry)?;
        Ok(user_data)
    }

    /// Submit a close of fixed slot `slot`.
    pub fn close(&mut self, slot: u32) -> io::Result<u64> {
        let user_data = self.next_user_data();
        let entry = opcode::Close::new(types::Fixed(slot))
            .build()
            .user_data(user_data);
        self.push(&entry)?;
        Ok(user_data)
    }

    /// Submit a read of up to `len` bytes from fixed slot `slot`.
    pub fn read(&mut self, slot: u32, len: usize) -> io::Result<u64> {
        let user_data = self.next_user_data();
        let mut buf = vec![0u8; len];
        let entry = opcode::Read::new(types::Fixed(slot), buf.as_mut_ptr(), len as u32)
            .build()
            .user_data(user_data);
        // The heap allocation does not move when the Vec moves into the map.
        self.bufs.insert(user_data, buf);
        if let Err(e) = self.push(&entry) {
            self.bufs.remove(&user_data);
            return Err(e);
        }
        Ok(user_data)
    }

    /// Wait for the next completion.
    pub fn wait(&mut self) -> io::Result<Completion> {
        loop {
            if let Some(cqe) = self.ring.completion().next() {
                let user_data = cqe.user_data();
                let result = cqe.result();
                let buf = self.bufs.remove(&user_data).map(|mut buf| {
                    buf.truncate(result.max(0) as usize);
                    buf
                });
                return Ok(Completion {
                    user_data,
                    result,
                    buf,
                });
            }
            self.ring.submit_and_wait(1)?;
        }
    }

    fn push(&mut self, entry: &io_uring::squeue::Entry) -> io::Result<()> {
        // SAFETY: entries reference either nothing or a buffer held in
        // `self.bufs` until its completion is reaped.
        unsafe {
            if self.ring.submission().push(entry).is_err() {
                self.ring.submit()?;
                self.ring
                    .submission()
                    .push(entry)
                    .map_err(|_| io::Error::other("SQ still full after submit"))?;
            }
        }
        self.ring.submit()?;
        Ok(())
    }

    fn next_user_data(&mut self) -> u64 {
        self.next_user_data += 1;
        self.next_user_data
    }
}

impl Drop for KernelRing {
    fn drop(&mut self) {
        // The kernel may still write into buffers of unreaped reads after the
        // ring closes; leak them rather than free memory it can touch.
        for (_, buf) in self.bufs.drain() {
            std::mem::forget(buf);
        }
    }
}
