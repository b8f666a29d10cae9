//! Descriptor resolution for submitted operations.
//!
//! An entry carrying `Flags::FIXED_FILE` has its descriptor field resolved
//! through the registered file table; otherwise it names a process
//! descriptor and is used as-is.

use std::io;
use std::os::fd::{AsRawFd, RawFd};

use crate::error::{Error, Result};
use crate::metrics::RESOLVE_ERRORS;
use crate::opcode::CURRENT_POSITION;
use crate::register::Registrar;
use crate::slot::FileRef;

/// A resolved operation target.
///
/// A fixed target holds its own reference to the file, so retiring the slot
/// while the operation runs does not close the descriptor under it.
pub(crate) enum Resolved {
    Fixed(FileRef),
    Process(RawFd),
}

impl AsRawFd for Resolved {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Resolved::Fixed(file) => file.as_raw_fd(),
            Resolved::Process(fd) => *fd,
        }
    }
}

/// Resolve a descriptor field.
pub(crate) fn resolve(files: &Registrar, fd: i32, fixed: bool) -> Result<Resolved> {
    if !fixed {
        if fd < 0 {
            return Err(Error::BadDescriptor);
        }
        return Ok(Resolved::Process(fd));
    }
    fixed_slot(fd)
        .and_then(|index| {
            let table = files.table().ok_or(Error::BadDescriptor)?;
            table.lookup(index)
        })
        .map(Resolved::Fixed)
        .inspect_err(|_| {
            RESOLVE_ERRORS.increment();
        })
}

/// Interpret a descriptor field as a fixed slot index.
pub(crate) fn fixed_slot(fd: i32) -> Result<u32> {
    u32::try_from(fd).map_err(|_| Error::BadDescriptor)
}

/// Read from a resolved target into `buf`.
pub(crate) fn read(target: &Resolved, buf: &mut [u8], offset: u64) -> Result<usize> {
    let fd = target.as_raw_fd();
    let ptr = buf.as_mut_ptr().cast::<libc::c_void>();
    let len = io_len(buf.len());
    match position(offset)? {
        None => retry(|| unsafe { libc::read(fd, ptr, len) }),
        Some(pos) => retry(|| unsafe { libc::pread(fd, ptr, len, pos) })
            .or_else(|e| match e.errno() {
                // pipes and sockets have no position
                libc::ESPIPE => retry(|| unsafe { libc::read(fd, ptr, len) }),
                _ => Err(e),
            }),
    }
}

/// Write `buf` to a resolved target.
pub(crate) fn write(target: &Resolved, buf: &[u8], offset: u64) -> Result<usize> {
    let fd = target.as_raw_fd();
    let ptr = buf.as_ptr().cast::<libc::c_void>();
    let len = io_len(buf.len());
    match position(offset)? {
        None => retry(|| unsafe { libc::write(fd, ptr, len) }),
        Some(pos) => retry(|| unsafe { libc::pwrite(fd, ptr, len, pos) })
            .or_else(|e| match e.errno() {
                libc::ESPIPE => retry(|| unsafe { libc::write(fd, ptr, len) }),
                _ => Err(e),
            }),
    }
}

/// Longest transfer whose byte count fits a completion result.
const MAX_IO_LEN: usize = i32::MAX as usize;

/// Clamp a buffer length so the syscall never reports more than
/// [`MAX_IO_LEN`] bytes.
#[inline]
fn io_len(len: usize) -> usize {
    len.min(MAX_IO_LEN)
}

fn position(offset: u64) -> Result<Option<libc::off_t>> {
    if offset == CURRENT_POSITION {
        return Ok(None);
    }
    libc::off_t::try_from(offset)
        .map(Some)
        .map_err(|_| Error::InvalidArgument)
}

fn retry(mut f: impl FnMut() -> libc::ssize_t) -> Result<usize> {
    loop {
        let ret = f();
        if ret >= 0 {
            return Ok(ret as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(Error::from(err));
        }
    }
}
