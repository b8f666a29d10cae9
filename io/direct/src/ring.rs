use std::collections::VecDeque;
use std::io;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{trace, warn};

use crate::adapter::{self, resolve};
use crate::config::Config;
use crate::cqueue::{self, Payload};
use crate::error::{Error, Result};
use crate::install::install;
use crate::metrics::{FIXED_READS, FIXED_WRITES};
use crate::register::Registrar;
use crate::retire::retire;
use crate::squeue::{self, Op, PushError};

/// Submission/completion ring over a fixed file table.
///
/// Entries are queued with [`Ring::push`], handed to worker threads by
/// [`Ring::submit`], and their completions collected with
/// [`Ring::wait_cqe`] or [`Ring::peek_cqe`]. Registration goes through
/// [`Ring::submitter`].
///
/// Dropping the ring stops the workers once their current entry finishes;
/// use [`Ring::shutdown`] to wait for that.
pub struct Ring {
    files: Arc<Registrar>,
    sq: Vec<squeue::Entry>,
    sq_entries: usize,
    submit_tx: Option<Sender<squeue::Entry>>,
    complete_rx: Receiver<cqueue::Entry>,
    ready: VecDeque<cqueue::Entry>,
    in_flight: usize,
    workers: Vec<thread::JoinHandle<()>>,
}

/// Builder for a [`Ring`].
#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    /// Number of worker threads.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Maximum number of slots in a registered file table.
    pub fn max_files(mut self, max_files: u32) -> Self {
        self.config.max_files = max_files;
        self
    }

    /// Build a ring with `entries` submission queue entries.
    pub fn build(mut self, entries: u32) -> Result<Ring> {
        self.config.sq_entries = entries;
        Ring::with_config(&self.config)
    }
}

impl Ring {
    /// Create a ring with default settings.
    pub fn new(entries: u32) -> Result<Self> {
        Self::builder().build(entries)
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Create a ring from a full configuration.
    pub fn with_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let files = Arc::new(Registrar::new(config.max_files));
        let (submit_tx, submit_rx) = crossbeam_channel::unbounded::<squeue::Entry>();
        let (complete_tx, complete_rx) = crossbeam_channel::unbounded::<cqueue::Entry>();

        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let files = files.clone();
            let rx = submit_rx.clone();
            let tx = complete_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("direct-{id}"))
                .spawn(move || run_worker(&files, &rx, &tx))?;
            workers.push(handle);
        }

        Ok(Ring {
            files,
            sq: Vec::with_capacity(config.sq_entries as usize),
            sq_entries: config.sq_entries as usize,
            submit_tx: Some(submit_tx),
            complete_rx,
            ready: VecDeque::new(),
            in_flight: 0,
            workers,
        })
    }

    /// Registration interface for this ring's fixed file table.
    #[inline]
    pub fn submitter(&self) -> &Registrar {
        &self.files
    }

    /// Queue an entry. Fails when `sq_entries` entries are already queued.
    pub fn push(&mut self, entry: squeue::Entry) -> std::result::Result<(), PushError> {
        if self.sq.len() >= self.sq_entries {
            return Err(PushError);
        }
        self.sq.push(entry);
        Ok(())
    }

    /// Number of queued, unsubmitted entries.
    #[inline]
    pub fn sq_len(&self) -> usize {
        self.sq.len()
    }

    /// Number of submitted entries whose completions have not been collected.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight + self.ready.len()
    }

    /// Hand all queued entries to the workers. Returns how many were submitted.
    pub fn submit(&mut self) -> Result<usize> {
        let tx = self.submit_tx.as_ref().ok_or(Error::Shutdown)?;
        let count = self.sq.len();
        for entry in self.sq.drain(..) {
            tx.send(entry).map_err(|_| Error::Shutdown)?;
            self.in_flight += 1;
        }
        Ok(count)
    }

    /// Submit queued entries, then block until at least `want` completions
    /// are ready to collect.
    pub fn submit_and_wait(&mut self, want: usize) -> Result<usize> {
        let submitted = self.submit()?;
        if want > self.in_flight() {
            return Err(no_in_flight());
        }
        while self.ready.len() < want {
            let cqe = self.recv()?;
            self.ready.push_back(cqe);
        }
        Ok(submitted)
    }

    /// Block until a completion is available and return it.
    ///
    /// Fails if nothing is in flight, since no completion could ever arrive.
    pub fn wait_cqe(&mut self) -> Result<cqueue::Entry> {
        if let Some(cqe) = self.ready.pop_front() {
            return Ok(cqe);
        }
        if self.in_flight == 0 {
            return Err(no_in_flight());
        }
        self.recv()
    }

    /// Return a completion if one is ready, without blocking.
    pub fn peek_cqe(&mut self) -> Option<cqueue::Entry> {
        if let Some(cqe) = self.ready.pop_front() {
            return Some(cqe);
        }
        let cqe = self.complete_rx.try_recv().ok()?;
        self.in_flight -= 1;
        Some(cqe)
    }

    /// Collect every completion that is ready now.
    pub fn drain_completions(&mut self) -> impl Iterator<Item = cqueue::Entry> + '_ {
        while let Ok(cqe) = self.complete_rx.try_recv() {
            self.in_flight -= 1;
            self.ready.push_back(cqe);
        }
        self.ready.drain(..)
    }

    /// Stop the workers and wait for them to exit.
    ///
    /// Entries still running are allowed to finish; their completions are
    /// discarded. A worker blocked in a read that never completes, such as a
    /// pipe whose writer stays open with no data, blocks this call until the
    /// read returns. Retiring the slot does not unblock it, since the read
    /// holds its own reference to the file; close the peer instead.
    pub fn shutdown(mut self) -> Result<()> {
        self.submit_tx = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("fixed file worker panicked");
            }
        }
        Ok(())
    }

    fn recv(&mut self) -> Result<cqueue::Entry> {
        let cqe = self.complete_rx.recv().map_err(|_| Error::Shutdown)?;
        self.in_flight -= 1;
        Ok(cqe)
    }
}

fn no_in_flight() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        "no operations in flight",
    ))
}

fn run_worker(
    files: &Registrar,
    rx: &Receiver<squeue::Entry>,
    tx: &Sender<cqueue::Entry>,
) {
    while let Ok(entry) = rx.recv() {
        let cqe = execute(files, entry);
        if tx.send(cqe).is_err() {
            break;
        }
    }
}

/// Execute one entry against the file table, producing its completion.
pub(crate) fn execute(files: &Registrar, entry: squeue::Entry) -> cqueue::Entry {
    trace!(?entry, "execute");
    let fixed = entry.is_fixed();
    let user_data = entry.user_data;

    match entry.op {
        Op::Nop => cqueue::Entry::new(user_data, 0, Payload::None),
        Op::Read {
            fd,
            mut buf,
            offset,
        } => match resolve(files, fd, fixed).and_then(|t| adapter::read(&t, &mut buf, offset)) {
            Ok(n) => {
                if fixed {
                    FIXED_READS.increment();
                }
                buf.truncate(n);
                cqueue::Entry::new(user_data, byte_count(n), Payload::Buf(buf))
            }
            Err(e) => cqueue::Entry::failed(user_data, &e, Payload::Buf(buf)),
        },
        Op::Write { fd, buf, offset } => {
            match resolve(files, fd, fixed).and_then(|t| adapter::write(&t, &buf, offset)) {
                Ok(n) => {
                    if fixed {
                        FIXED_WRITES.increment();
                    }
                    cqueue::Entry::new(user_data, byte_count(n), Payload::Buf(buf))
                }
                Err(e) => cqueue::Entry::failed(user_data, &e, Payload::Buf(buf)),
            }
        }
        Op::FixedFdInstall {
            fd,
            flags,
            reserved,
        } => match install(files, fd, flags, reserved, fixed) {
            Ok(installed) => {
                cqueue::Entry::new(user_data, installed.as_raw_fd(), Payload::Fd(installed))
            }
            Err(e) => cqueue::Entry::failed(user_data, &e, Payload::None),
        },
        Op::Close { fd } => match retire(files, fd, fixed) {
            Ok(()) => cqueue::Entry::new(user_data, 0, Payload::None),
            Err(e) => cqueue::Entry::failed(user_data, &e, Payload::None),
        },
    }
}

/// Transfers are capped at `i32::MAX` bytes before the syscall, so the
/// conversion never saturates in practice.
#[inline]
fn byte_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode;
    use crate::types::Fixed;

    #[test]
    fn nop_round_trip() {
        let mut ring = Ring::new(4).unwrap();
        ring.push(opcode::Nop::new().build().user_data(42)).unwrap();
        assert_eq!(ring.submit().unwrap(), 1);
        let cqe = ring.wait_cqe().unwrap();
        assert_eq!(cqe.user_data(), 42);
        assert_eq!(cqe.result(), 0);
        assert_eq!(ring.in_flight(), 0);
        ring.shutdown().unwrap();
    }

    #[test]
    fn push_respects_queue_depth() {
        let mut ring = Ring::new(2).unwrap();
        ring.push(opcode::Nop::new().build()).unwrap();
        ring.push(opcode::Nop::new().build()).unwrap();
        assert_eq!(ring.push(opcode::Nop::new().build()), Err(PushError));
        assert_eq!(ring.sq_len(), 2);

        ring.submit_and_wait(2).unwrap();
        assert_eq!(ring.sq_len(), 0);
        assert_eq!(ring.drain_completions().count(), 2);
    }

    #[test]
    fn wait_without_in_flight_fails() {
        let mut ring = Ring::new(2).unwrap();
        assert!(matches!(ring.wait_cqe(), Err(Error::Io(_))));
        assert!(ring.peek_cqe().is_none());
        assert!(matches!(ring.submit_and_wait(1), Err(Error::Io(_))));
    }

    #[test]
    fn invalid_config_rejected() {
        assert!(matches!(Ring::new(0), Err(Error::InvalidArgument)));
        assert!(matches!(
            Ring::builder().workers(0).build(4),
            Err(Error::InvalidArgument)
        ));
    }

    #[test]
    fn shutdown_waits_for_blocked_read() {
        use std::os::fd::AsFd;
        use std::time::Duration;

        let mut ring = Ring::new(2).unwrap();
        let (reader, writer) = std::io::pipe().unwrap();
        ring.submitter().register_files(&[reader.as_fd()]).unwrap();
        drop(reader);

        ring.push(opcode::Read::new(Fixed(0), vec![0u8; 8]).build())
            .unwrap();
        ring.submit().unwrap();

        let closer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(writer);
        });
        ring.shutdown().unwrap();
        closer.join().unwrap();
    }

    #[test]
    fn close_without_table_is_bad_descriptor() {
        let mut ring = Ring::new(2).unwrap();
        ring.push(opcode::Close::new(Fixed(0)).build()).unwrap();
        ring.submit().unwrap();
        assert_eq!(ring.wait_cqe().unwrap().result(), -libc::EBADF);
    }
}
