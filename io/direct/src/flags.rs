//! Flags accepted by fixed descriptor install.

use crate::error::{Error, Result};

bitflags::bitflags! {
    /// Flags for installing a fixed slot into the process descriptor table.
    ///
    /// The set is closed: `CLOEXEC` is the only accepted bit. Any other bit
    /// in the raw value rejects the install with `InvalidArgument`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InstallFlags: u32 {
        /// Set close-on-exec on the installed descriptor.
        const CLOEXEC = libc::O_CLOEXEC as u32;
    }
}

impl InstallFlags {
    /// Validate the raw flag word and reserved field of an install request.
    ///
    /// Runs before any effect, so a rejected install leaves nothing behind.
    pub fn validate(raw: u32, reserved: u32) -> Result<Self> {
        if reserved != 0 {
            return Err(Error::InvalidArgument);
        }
        Self::from_bits(raw).ok_or(Error::InvalidArgument)
    }

    /// The `fcntl` command that duplicates with these flags applied.
    pub(crate) fn dup_cmd(self) -> libc::c_int {
        if self.contains(InstallFlags::CLOEXEC) {
            libc::F_DUPFD_CLOEXEC
        } else {
            libc::F_DUPFD
        }
    }
}
