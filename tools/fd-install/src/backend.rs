//! Backends the scenarios run against.
//!
//! Both expose the same small request/reply surface so a scenario can be
//! written once and checked against the in-process table and the kernel.

use std::io;
use std::os::fd::{BorrowedFd, OwnedFd};

use io_direct::squeue::Flags;
use io_direct::types::Fixed;
use io_direct::{Ring, opcode};

/// A fixed descriptor operation.
#[derive(Debug, Clone, Copy)]
pub enum Request {
    /// Install `slot` with a raw flag word. `fixed` controls the marker.
    Install { slot: u32, flags: u32, fixed: bool },
    /// Retire `slot`.
    Close { slot: u32 },
    /// Read up to `len` bytes through `slot`.
    ReadFixed { slot: u32, len: usize },
}

/// Completion of a [`Request`].
#[derive(Debug)]
pub struct Reply {
    /// Non-negative on success, negative errno on failure.
    pub result: i32,
    /// Descriptor produced by a successful install.
    pub fd: Option<OwnedFd>,
    /// Bytes produced by a read.
    pub buf: Option<Vec<u8>>,
}

/// A fixed file table implementation under test.
pub trait Backend {
    fn name(&self) -> &'static str;

    fn register_files(&mut self, fds: &[BorrowedFd<'_>]) -> io::Result<()>;

    fn unregister_files(&mut self) -> io::Result<()>;

    /// Submit one request. Returns `Unsupported` if the backend cannot
    /// express it.
    fn submit(&mut self, request: Request) -> io::Result<()>;

    /// Wait for the next reply.
    fn wait(&mut self) -> io::Result<Reply>;
}

/// In-process fixed file table.
pub struct Emulated {
    ring: Ring,
}

impl Emulated {
    pub fn new(config: &io_direct::Config) -> io::Result<Self> {
        Ok(Self {
            ring: Ring::with_config(config)?,
        })
    }
}

impl Backend for Emulated {
    fn name(&self) -> &'static str {
        "emulated"
    }

    fn register_files(&mut self, fds: &[BorrowedFd<'_>]) -> io::Result<()> {
        Ok(self.ring.submitter().register_files(fds)?)
    }

    fn unregister_files(&mut self) -> io::Result<()> {
        Ok(self.ring.submitter().unregister_files()?)
    }

    fn submit(&mut self, request: Request) -> io::Result<()> {
        let entry = match request {
            Request::Install { slot, flags, fixed } => {
                let entry = opcode::FixedFdInstall::new(Fixed(slot), flags).build();
                if fixed {
                    entry
                } else {
                    entry.clear_flags(Flags::FIXED_FILE)
                }
            }
            Request::Close { slot } => opcode::Close::new(Fixed(slot)).build(),
            Request::ReadFixed { slot, len } => {
                opcode::Read::new(Fixed(slot), vec![0u8; len]).build()
            }
        };
        self.ring
            .push(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::WouldBlock, e))?;
        self.ring.submit()?;
        Ok(())
    }

    fn wait(&mut self) -> io::Result<Reply> {
        let mut cqe = self.ring.wait_cqe()?;
        Ok(Reply {
            result: cqe.result(),
            fd: cqe.take_fd(),
            buf: cqe.take_buf(),
        })
    }
}

#[cfg(all(target_os = "linux", feature = "io_uring"))]
pub use kernel::Kernel;

#[cfg(all(target_os = "linux", feature = "io_uring"))]
mod kernel {
    use super::*;
    use io_direct::uring::KernelRing;
    use std::collections::HashSet;
    use std::os::fd::FromRawFd;

    /// The kernel's fixed file table.
    pub struct Kernel {
        ring: KernelRing,
        /// user_data of in-flight installs, whose result is a descriptor.
        installs: HashSet<u64>,
    }

    impl Kernel {
        pub fn new(entries: u32) -> io::Result<Self> {
            Ok(Self {
                ring: KernelRing::new(entries)?,
                installs: HashSet::new(),
            })
        }
    }

    impl Backend for Kernel {
        fn name(&self) -> &'static str {
            "uring"
        }

        fn register_files(&mut self, fds: &[BorrowedFd<'_>]) -> io::Result<()> {
            self.ring.register_files(fds)
        }

        fn unregister_files(&mut self) -> io::Result<()> {
            self.ring.unregister_files()
        }

        fn submit(&mut self, request: Request) -> io::Result<()> {
            match request {
                Request::Install { fixed: false, .. } => Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "kernel install entries always carry the fixed-file flag",
                )),
                Request::Install { slot, flags, .. } => {
                    let user_data = self.ring.install_raw(slot, flags)?;
                    self.installs.insert(user_data);
                    Ok(())
                }
                Request::Close { slot } => self.ring.close(slot).map(drop),
                Request::ReadFixed { slot, len } => self.ring.read(slot, len).map(drop),
            }
        }

        fn wait(&mut self) -> io::Result<Reply> {
            let cqe = self.ring.wait()?;
            let fd = (self.installs.remove(&cqe.user_data) && cqe.result >= 0)
                // SAFETY: a successful install returns a new descriptor we own.
                .then(|| unsafe { OwnedFd::from_raw_fd(cqe.result) });
            Ok(Reply {
                result: cqe.result,
                fd,
                buf: cqe.buf,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsFd;

    #[test]
    fn emulated_round_trip() {
        let mut backend = Emulated::new(&io_direct::Config::default()).unwrap();
        let (reader, _writer) = std::io::pipe().unwrap();
        backend.register_files(&[reader.as_fd()]).unwrap();

        backend
            .submit(Request::Install {
                slot: 0,
                flags: 0,
                fixed: true,
            })
            .unwrap();
        let reply = backend.wait().unwrap();
        assert!(reply.result >= 0);
        assert!(reply.fd.is_some());

        backend.submit(Request::Close { slot: 0 }).unwrap();
        assert_eq!(backend.wait().unwrap().result, 0);
        backend.unregister_files().unwrap();
    }
}
