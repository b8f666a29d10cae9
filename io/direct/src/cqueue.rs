//! Completion queue entries.

use std::os::fd::OwnedFd;

use crate::error::Error;

/// Resources an operation hands back to the caller.
#[derive(Debug, Default)]
pub(crate) enum Payload {
    #[default]
    None,
    /// Descriptor produced by a fixed install.
    Fd(OwnedFd),
    /// Buffer of a read or write.
    Buf(Vec<u8>),
}

/// A completion queue entry.
///
/// `result` follows the kernel convention: non-negative on success, negative
/// errno on failure. An installed descriptor is owned by the entry until
/// taken with [`Entry::take_fd`]; if the entry is dropped first, the
/// descriptor is closed.
#[derive(Debug)]
pub struct Entry {
    user_data: u64,
    result: i32,
    payload: Payload,
}

impl Entry {
    pub(crate) fn new(user_data: u64, result: i32, payload: Payload) -> Self {
        Self {
            user_data,
            result,
            payload,
        }
    }

    pub(crate) fn failed(user_data: u64, error: &Error, payload: Payload) -> Self {
        Self::new(user_data, error.as_result(), payload)
    }

    /// The `user_data` of the submission entry this completes.
    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    /// Result code: non-negative on success, negative errno on failure.
    #[inline]
    pub fn result(&self) -> i32 {
        self.result
    }

    /// The error this completion reports, if it failed.
    pub fn error(&self) -> Option<Error> {
        (self.result < 0).then(|| Error::from_result(self.result))
    }

    /// Take ownership of the descriptor produced by an install.
    pub fn take_fd(&mut self) -> Option<OwnedFd> {
        match std::mem::take(&mut self.payload) {
            Payload::Fd(fd) => Some(fd),
            other => {
                self.payload = other;
                None
            }
        }
    }

    /// Take back the buffer of a read or write.
    ///
    /// For reads the buffer is truncated to the bytes read.
    pub fn take_buf(&mut self) -> Option<Vec<u8>> {
        match std::mem::take(&mut self.payload) {
            Payload::Buf(buf) => Some(buf),
            other => {
                self.payload = other;
                None
            }
        }
    }
}
