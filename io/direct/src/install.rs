//! Fixed descriptor install.
//!
//! Exposes the file in a fixed slot as a new descriptor in the process
//! table. The slot is left untouched: it stays occupied and usable through
//! fixed references, and the new descriptor lives independently of it.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tracing::debug;

use crate::adapter::fixed_slot;
use crate::error::{Error, Result};
use crate::flags::InstallFlags;
use crate::metrics::{INSTALL_ERRORS, INSTALLS};
use crate::register::Registrar;

/// Install the file at slot `fd` into the process descriptor table.
///
/// Checks run in order and the first failure wins:
/// 1. the entry must carry the fixed-file marker (`BadDescriptor`)
/// 2. the slot must be occupied (`BadDescriptor`)
/// 3. flags must be a subset of `CLOEXEC` and `reserved` zero (`InvalidArgument`)
///
/// The slot lock is held across validation and duplication, so a racing
/// retire either happens entirely before (install fails) or after (install
/// succeeds).
pub(crate) fn install(
    files: &Registrar,
    fd: i32,
    flags: u32,
    reserved: u32,
    fixed: bool,
) -> Result<OwnedFd> {
    let result = install_checked(files, fd, flags, reserved, fixed);
    match &result {
        Ok(installed) => {
            INSTALLS.increment();
            debug!(slot = fd, fd = installed.as_raw_fd(), "installed fixed file");
        }
        Err(e) => {
            INSTALL_ERRORS.increment();
            debug!(slot = fd, flags, error = %e, "fixed file install failed");
        }
    }
    result
}

fn install_checked(
    files: &Registrar,
    fd: i32,
    flags: u32,
    reserved: u32,
    fixed: bool,
) -> Result<OwnedFd> {
    if !fixed {
        return Err(Error::BadDescriptor);
    }
    let index = fixed_slot(fd)?;
    let table = files.table().ok_or(Error::BadDescriptor)?;
    table.with_occupied(index, |file| {
        let flags = InstallFlags::validate(flags, reserved)?;
        dup_into_process(file, flags)
    })
}

fn dup_into_process(file: &OwnedFd, flags: InstallFlags) -> Result<OwnedFd> {
    let fd = unsafe { libc::fcntl(file.as_raw_fd(), flags.dup_cmd(), 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error().into());
    }
    // SAFETY: fcntl returned a fresh descriptor that nothing else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}
