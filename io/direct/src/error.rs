use std::io;

/// Errors returned by fixed descriptor operations.
///
/// Every kind has a negative errno encoding, which is what a completion
/// carries in its `result` field.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller misuse: disallowed install flags, nonzero reserved field, or a
    /// malformed registration batch.
    #[error("invalid argument")]
    InvalidArgument,
    /// A descriptor reference did not resolve: slot out of range, slot empty,
    /// or the fixed-file marker missing where it is required.
    #[error("bad descriptor")]
    BadDescriptor,
    /// A descriptor table is full: registration exceeds the maximum table
    /// size, or an install found the process descriptor table full.
    #[error("file table limit reached")]
    ResourceExhausted,
    /// A file table is already registered.
    #[error("file table already registered")]
    Busy,
    /// No file table is registered.
    #[error("no file table registered")]
    NoTable,
    /// The ring has been shut down.
    #[error("ring shut down")]
    Shutdown,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The positive errno value for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Error::InvalidArgument => libc::EINVAL,
            Error::BadDescriptor => libc::EBADF,
            Error::ResourceExhausted => libc::EMFILE,
            Error::Busy => libc::EBUSY,
            Error::NoTable => libc::ENXIO,
            Error::Shutdown => libc::ESHUTDOWN,
            Error::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }

    /// Encode as a completion result (negative errno).
    #[inline]
    pub fn as_result(&self) -> i32 {
        -self.errno()
    }

    /// Decode a negative completion result.
    ///
    /// Non-negative values are not errors; passing one yields an `Io` error
    /// of kind `InvalidInput`.
    pub fn from_result(res: i32) -> Self {
        if res >= 0 {
            return Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("result {res} is not an error"),
            ));
        }
        match -res {
            libc::EINVAL => Error::InvalidArgument,
            libc::EBADF => Error::BadDescriptor,
            libc::EMFILE => Error::ResourceExhausted,
            libc::EBUSY => Error::Busy,
            libc::ENXIO => Error::NoTable,
            libc::ESHUTDOWN => Error::Shutdown,
            errno => Error::Io(io::Error::from_raw_os_error(errno)),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            other => io::Error::from_raw_os_error(other.errno()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_os_error() {
        let e = io::Error::from(Error::BadDescriptor);
        assert_eq!(e.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn result_encoding_is_negative_errno() {
        assert_eq!(Error::InvalidArgument.as_result(), -libc::EINVAL);
        assert_eq!(Error::BadDescriptor.as_result(), -libc::EBADF);
        assert_eq!(Error::ResourceExhausted.as_result(), -libc::EMFILE);
        assert_eq!(
            Error::Io(io::Error::from_raw_os_error(libc::EPIPE)).as_result(),
            -libc::EPIPE
        );
    }

    #[test]
    fn decode_known_kinds() {
        assert!(matches!(
            Error::from_result(-libc::EBADF),
            Error::BadDescriptor
        ));
        assert!(matches!(
            Error::from_result(-libc::EINVAL),
            Error::InvalidArgument
        ));
        assert!(matches!(Error::from_result(-libc::ENXIO), Error::NoTable));
        match Error::from_result(-libc::EAGAIN) {
            Error::Io(e) => assert_eq!(e.raw_os_error(), Some(libc::EAGAIN)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn process_table_full_decodes_as_exhausted() {
        // fcntl reports a full process table as EMFILE
        let full = Error::Io(io::Error::from_raw_os_error(libc::EMFILE));
        let decoded = Error::from_result(full.as_result());
        assert!(matches!(decoded, Error::ResourceExhausted));
        assert_eq!(decoded.to_string(), "file table limit reached");
    }

    #[test]
    fn decode_non_error() {
        match Error::from_result(3) {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidInput),
            other => panic!("unexpected {other:?}"),
        }
    }
}
