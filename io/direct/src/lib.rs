//! io-direct - Fixed (direct) descriptor tables for a submission ring.
//!
//! A caller registers file descriptors into a private, index-addressed
//! table, refers to them from submitted operations by slot index, and can
//! later install a slot into the ordinary process descriptor table or retire
//! it.
//!
//! # Quick Start
//!
//! ```ignore
//! use io_direct::{Ring, opcode, types::Fixed};
//! use std::os::fd::AsFd;
//!
//! let mut ring = Ring::new(8)?;
//! let (reader, writer) = std::io::pipe()?;
//! ring.submitter().register_files(&[reader.as_fd()])?;
//!
//! // Promote slot 0 into a regular descriptor.
//! ring.push(opcode::FixedFdInstall::new(Fixed(0), 0).build().user_data(1))
//!     .expect("queue has room");
//! ring.submit()?;
//! let mut cqe = ring.wait_cqe()?;
//! let fd = cqe.take_fd().expect("install succeeded");
//!
//! // Retire the slot; `fd` keeps working.
//! ring.push(opcode::Close::new(Fixed(0)).build().user_data(2))
//!     .expect("queue has room");
//! ring.submit()?;
//! assert_eq!(ring.wait_cqe()?.result(), 0);
//! ```
//!
//! # Slot lifecycle
//!
//! `Empty --register--> Occupied --install*--> Occupied --retire--> Empty`
//!
//! Install never changes the slot. The installed descriptor and the slot
//! refer to the same open file but have independent lifetimes.
//!
//! # Kernel backend
//!
//! With the `io_uring` feature on Linux, [`uring::KernelRing`] drives the
//! kernel's own fixed file table for comparison.

mod adapter;
mod config;
mod error;
mod flags;
mod install;
mod register;
mod retire;
mod ring;
mod slot;

pub mod cqueue;
pub mod metrics;
pub mod opcode;
pub mod squeue;
pub mod types;

#[cfg(all(target_os = "linux", feature = "io_uring"))]
pub mod uring;

pub use config::{Config, DEFAULT_MAX_FILES};
pub use error::{Error, Result};
pub use flags::InstallFlags;
pub use register::Registrar;
pub use ring::{Builder, Ring};

/// Check if kernel fixed descriptor install is available on this system.
pub fn kernel_install_available() -> bool {
    #[cfg(all(target_os = "linux", feature = "io_uring"))]
    {
        uring::is_supported()
    }
    #[cfg(not(all(target_os = "linux", feature = "io_uring")))]
    {
        false
    }
}
