//! Fixed descriptor install scenarios.
//!
//! Each scenario registers its own table, exercises one behavior, and
//! unregisters before returning so the next starts from a clean backend.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};

use tracing::{debug, info, warn};

use crate::backend::{Backend, Request};

/// Process exit codes.
pub const EXIT_PASS: i32 = 0;
pub const EXIT_FAIL: i32 = 1;
pub const EXIT_SKIP: i32 = 77;

/// Result of a scenario or a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Pass,
    Skip(String),
    Fail(String),
}

impl Status {
    pub fn exit_code(&self) -> i32 {
        match self {
            Status::Pass => EXIT_PASS,
            Status::Skip(_) => EXIT_SKIP,
            Status::Fail(_) => EXIT_FAIL,
        }
    }
}

/// Why a scenario stopped early.
#[derive(Debug)]
enum Stop {
    Skip(String),
    Fail(String),
}

impl From<io::Error> for Stop {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::Unsupported {
            Stop::Skip(e.to_string())
        } else {
            Stop::Fail(e.to_string())
        }
    }
}

type Check = Result<(), Stop>;

fn fail(msg: impl Into<String>) -> Stop {
    Stop::Fail(msg.into())
}

fn expect_result(got: i32, want: i32, what: &str) -> Check {
    if got != want {
        return Err(fail(format!("{what}: unexpected result {got}, want {want}")));
    }
    Ok(())
}

/// Run every scenario in order.
///
/// If the first install is rejected with `EINVAL` the backend lacks install
/// support and the whole run is skipped.
pub fn run_all(backend: &mut dyn Backend) -> Status {
    info!(backend = backend.name(), "running fixed fd install scenarios");

    match working(backend) {
        Ok(()) => info!(scenario = "working", "pass"),
        Err(Stop::Skip(reason)) => {
            info!(scenario = "working", %reason, "skip");
            return Status::Skip(reason);
        }
        Err(Stop::Fail(reason)) => return Status::Fail(format!("working: {reason}")),
    }

    let scenarios: [(&str, fn(&mut dyn Backend) -> Check); 4] = [
        ("bad_fd 0", |b| bad_fd(b, 0)),
        ("bad_fd 500", |b| bad_fd(b, 500)),
        ("not_fixed", not_fixed),
        ("flags", flags),
    ];
    for (name, scenario) in scenarios {
        match scenario(backend) {
            Ok(()) => info!(scenario = name, "pass"),
            Err(Stop::Skip(reason)) => warn!(scenario = name, %reason, "skip"),
            Err(Stop::Fail(reason)) => return Status::Fail(format!("{name}: {reason}")),
        }
    }
    Status::Pass
}

/// Fixed read, install, retire, and the installed descriptor outliving the
/// slot.
fn working(b: &mut dyn Backend) -> Check {
    let (reader, mut writer) = io::pipe()?;
    b.register_files(&[reader.as_fd()])?;
    // the slot is now the only reference besides `writer`
    drop(reader);

    b.submit(Request::ReadFixed { slot: 0, len: 32 })?;
    writer.write_all(b"Hello")?;
    let reply = b.wait()?;
    expect_result(reply.result, 5, "fixed pipe read")?;
    if reply.buf.as_deref() != Some(b"Hello".as_slice()) {
        return Err(fail(format!("fixed pipe read: unexpected data {:?}", reply.buf)));
    }

    b.submit(Request::Install {
        slot: 0,
        flags: 0,
        fixed: true,
    })?;
    let reply = b.wait()?;
    if reply.result == -libc::EINVAL {
        return Err(Stop::Skip("fixed fd install not supported".into()));
    }
    if reply.result < 0 {
        return Err(fail(format!("failed install fd: {}", reply.result)));
    }
    let installed = reply.fd.ok_or_else(|| fail("install produced no descriptor"))?;
    debug!(fd = installed.as_raw_fd(), "installed slot 0");
    let mut installed = File::from(installed);

    let mut buf = [0u8; 32];
    writer.write_all(b"Hello")?;
    let n = installed.read(&mut buf)?;
    if n != 5 {
        return Err(fail(format!("unexpected read ret {n}")));
    }

    b.submit(Request::Close { slot: 0 })?;
    expect_result(b.wait()?.result, 0, "close fixed fd")?;

    writer.write_all(b"Hello")?;
    let n = installed.read(&mut buf)?;
    if n != 5 {
        return Err(fail(format!("read after close: unexpected ret {n}")));
    }

    b.submit(Request::ReadFixed { slot: 0, len: 32 })?;
    writer.write_all(b"Hello")?;
    expect_result(b.wait()?.result, -libc::EBADF, "fixed read after close")?;

    b.unregister_files()?;
    Ok(())
}

/// Install of a slot that does not resolve.
fn bad_fd(b: &mut dyn Backend, slot: u32) -> Check {
    b.submit(Request::Install {
        slot,
        flags: 0,
        fixed: true,
    })?;
    let reply = b.wait()?;
    expect_result(reply.result, -libc::EBADF, "install of bad slot")
}

/// Install entry with the fixed-file marker cleared.
fn not_fixed(b: &mut dyn Backend) -> Check {
    let (reader, _writer) = io::pipe()?;
    b.register_files(&[reader.as_fd()])?;

    let outcome = b
        .submit(Request::Install {
            slot: 0,
            flags: 0,
            fixed: false,
        })
        .map_err(Stop::from)
        .and_then(|()| {
            let reply = b.wait()?;
            expect_result(reply.result, -libc::EBADF, "install without fixed flag")
        });

    b.unregister_files()?;
    outcome
}

/// Only close-on-exec is accepted.
fn flags(b: &mut dyn Backend) -> Check {
    let (reader, _writer) = io::pipe()?;
    b.register_files(&[reader.as_fd()])?;

    b.submit(Request::Install {
        slot: 0,
        flags: libc::O_APPEND as u32,
        fixed: true,
    })?;
    expect_result(b.wait()?.result, -libc::EINVAL, "install with O_APPEND")?;

    b.submit(Request::Install {
        slot: 0,
        flags: libc::O_CLOEXEC as u32,
        fixed: true,
    })?;
    let reply = b.wait()?;
    if reply.result < 0 {
        return Err(fail(format!("install with O_CLOEXEC: {}", reply.result)));
    }
    let installed = reply.fd.ok_or_else(|| fail("install produced no descriptor"))?;
    if !has_cloexec(&installed)? {
        return Err(fail("installed descriptor lacks FD_CLOEXEC"));
    }

    b.unregister_files()?;
    Ok(())
}

fn has_cloexec(fd: &OwnedFd) -> io::Result<bool> {
    let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(flags & libc::FD_CLOEXEC != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Emulated, Reply};
    use std::os::fd::BorrowedFd;

    fn emulated() -> Emulated {
        Emulated::new(&io_direct::Config::default()).unwrap()
    }

    #[test]
    fn emulated_passes_all() {
        assert_eq!(run_all(&mut emulated()), Status::Pass);
    }

    #[test]
    fn emulated_scenarios_individually() {
        let mut backend = emulated();
        working(&mut backend).unwrap();
        bad_fd(&mut backend, 0).unwrap();
        bad_fd(&mut backend, 500).unwrap();
        not_fixed(&mut backend).unwrap();
        flags(&mut backend).unwrap();
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Status::Pass.exit_code(), 0);
        assert_eq!(Status::Skip(String::new()).exit_code(), 77);
        assert_eq!(Status::Fail(String::new()).exit_code(), 1);
    }

    /// Backend without install support: every install is EINVAL.
    struct NoInstall(Emulated);

    impl Backend for NoInstall {
        fn name(&self) -> &'static str {
            "no-install"
        }

        fn register_files(&mut self, fds: &[BorrowedFd<'_>]) -> io::Result<()> {
            self.0.register_files(fds)
        }

        fn unregister_files(&mut self) -> io::Result<()> {
            self.0.unregister_files()
        }

        fn submit(&mut self, request: Request) -> io::Result<()> {
            match request {
                Request::Install { .. } => self.0.submit(Request::Install {
                    slot: 0,
                    flags: libc::O_APPEND as u32,
                    fixed: true,
                }),
                other => self.0.submit(other),
            }
        }

        fn wait(&mut self) -> io::Result<Reply> {
            self.0.wait()
        }
    }

    #[test]
    fn missing_install_support_skips() {
        let status = run_all(&mut NoInstall(emulated()));
        assert!(matches!(status, Status::Skip(_)));
    }

    /// Backend that cannot clear the fixed-file flag.
    struct AlwaysFixed(Emulated);

    impl Backend for AlwaysFixed {
        fn name(&self) -> &'static str {
            "always-fixed"
        }

        fn register_files(&mut self, fds: &[BorrowedFd<'_>]) -> io::Result<()> {
            self.0.register_files(fds)
        }

        fn unregister_files(&mut self) -> io::Result<()> {
            self.0.unregister_files()
        }

        fn submit(&mut self, request: Request) -> io::Result<()> {
            if let Request::Install { fixed: false, .. } = request {
                return Err(io::Error::from(io::ErrorKind::Unsupported));
            }
            self.0.submit(request)
        }

        fn wait(&mut self) -> io::Result<Reply> {
            self.0.wait()
        }
    }

    #[test]
    fn unsupported_scenario_is_skipped_not_failed() {
        assert_eq!(run_all(&mut AlwaysFixed(emulated())), Status::Pass);
    }
}
