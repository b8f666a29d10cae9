//! The kernel's fixed descriptor install, for comparison with `Ring`.
//!
//! Tests return early on kernels without `IORING_OP_FIXED_FD_INSTALL`.

#![cfg(all(target_os = "linux", feature = "io_uring"))]

use io_direct::InstallFlags;
use io_direct::uring::{self, KernelRing};
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsFd, FromRawFd, OwnedFd};

fn kernel_ring() -> Option<KernelRing> {
    if !uring::is_supported() {
        eprintln!("fixed fd install not supported, skipping");
        return None;
    }
    Some(KernelRing::new(4).unwrap())
}

#[test]
fn kernel_install_and_close() {
    let Some(mut ring) = kernel_ring() else {
        return;
    };
    let (reader, mut writer) = std::io::pipe().unwrap();
    ring.register_files(&[reader.as_fd()]).unwrap();
    drop(reader);

    ring.install(0, InstallFlags::empty()).unwrap();
    let cqe = ring.wait().unwrap();
    assert!(cqe.result >= 0, "install failed: {}", cqe.result);
    let mut installed = File::from(unsafe { OwnedFd::from_raw_fd(cqe.result) });

    ring.close(0).unwrap();
    assert_eq!(ring.wait().unwrap().result, 0);

    writer.write_all(b"Hello").unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(installed.read(&mut buf).unwrap(), 5);

    ring.read(0, 8).unwrap();
    assert_eq!(ring.wait().unwrap().result, -libc::EBADF);
    ring.unregister_files().unwrap();
}

#[test]
fn kernel_rejects_other_flags() {
    let Some(mut ring) = kernel_ring() else {
        return;
    };
    let (reader, _writer) = std::io::pipe().unwrap();
    ring.register_files(&[reader.as_fd()]).unwrap();

    ring.install_raw(0, libc::O_APPEND as u32).unwrap();
    assert_eq!(ring.wait().unwrap().result, -libc::EINVAL);

    ring.install(0, InstallFlags::CLOEXEC).unwrap();
    let cqe = ring.wait().unwrap();
    assert!(cqe.result >= 0);
    drop(unsafe { OwnedFd::from_raw_fd(cqe.result) });
}

#[test]
fn kernel_bad_slot() {
    let Some(mut ring) = kernel_ring() else {
        return;
    };
    let (reader, _writer) = std::io::pipe().unwrap();
    ring.register_files(&[reader.as_fd()]).unwrap();
    ring.install(500, InstallFlags::empty()).unwrap();
    assert_eq!(ring.wait().unwrap().result, -libc::EBADF);
}
