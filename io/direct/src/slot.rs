//! Fixed file slot table.
//!
//! Maps small indices to registered file objects. Each slot has its own lock,
//! so operations on unrelated slots never contend, while install and retire
//! on the same slot serialize and always observe a whole state.

use std::os::fd::OwnedFd;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::metrics::FILES_REGISTERED;

/// Shared handle to a registered file object.
///
/// The slot holds one reference; in-flight operations hold others for the
/// duration of the I/O. The descriptor closes when the last one drops.
pub(crate) type FileRef = Arc<OwnedFd>;

#[derive(Default)]
enum Slot {
    #[default]
    Empty,
    Occupied(FileRef),
}

impl Slot {
    fn take(&mut self) -> Option<FileRef> {
        match std::mem::take(self) {
            Slot::Empty => None,
            Slot::Occupied(file) => Some(file),
        }
    }
}

/// Fixed-capacity table of file slots.
pub struct SlotTable {
    slots: Box<[Mutex<Slot>]>,
}

impl SlotTable {
    /// Create a table with `capacity` empty slots.
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: (0..capacity).map(|_| Mutex::new(Slot::Empty)).collect(),
        }
    }

    /// Number of slots in the table.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(*slot.lock(), Slot::Occupied(_)))
            .count()
    }

    /// Whether `index` currently holds a file.
    pub fn is_occupied(&self, index: u32) -> bool {
        self.slots
            .get(index as usize)
            .is_some_and(|slot| matches!(*slot.lock(), Slot::Occupied(_)))
    }

    /// Place files into slots as one batch.
    ///
    /// Each entry is `(index, file)`; a `None` file clears the slot. The batch
    /// fails as a whole with `InvalidArgument` if any index is out of range or
    /// repeated, or if `overwrite` is false and a target slot is occupied.
    /// Returns the number of entries applied.
    pub(crate) fn register(
        &self,
        mut batch: Vec<(u32, Option<FileRef>)>,
        overwrite: bool,
    ) -> Result<usize> {
        batch.sort_unstable_by_key(|(index, _)| *index);
        if batch.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return Err(Error::InvalidArgument);
        }

        // Lock in ascending index order so concurrent batches cannot deadlock.
        let mut guards: Vec<MutexGuard<'_, Slot>> = Vec::with_capacity(batch.len());
        for (index, file) in &batch {
            let slot = self
                .slots
                .get(*index as usize)
                .ok_or(Error::InvalidArgument)?;
            let guard = slot.lock();
            if !overwrite && file.is_some() && matches!(*guard, Slot::Occupied(_)) {
                return Err(Error::InvalidArgument);
            }
            guards.push(guard);
        }

        let applied = batch.len();
        let mut released = Vec::new();
        for (guard, (_, file)) in guards.iter_mut().zip(batch) {
            let old = guard.take();
            match (&old, &file) {
                (None, Some(_)) => {
                    FILES_REGISTERED.increment();
                }
                (Some(_), None) => {
                    FILES_REGISTERED.decrement();
                }
                _ => {}
            }
            released.extend(old);
            if let Some(file) = file {
                **guard = Slot::Occupied(file);
            }
        }
        drop(guards);
        drop(released);

        Ok(applied)
    }

    /// Clear slots. Clearing an empty slot is a no-op.
    pub(crate) fn unregister(&self, indices: &[u32]) -> Result<usize> {
        let batch = indices.iter().map(|&index| (index, None)).collect();
        self.register(batch, true)
    }

    /// Resolve `index` to its file, taking a reference for the caller.
    pub(crate) fn lookup(&self, index: u32) -> Result<FileRef> {
        self.with_occupied(index, |file| Ok(file.clone()))
    }

    /// Run `f` against the file in `index` while holding the slot lock.
    ///
    /// The slot cannot be retired or replaced until `f` returns.
    pub(crate) fn with_occupied<R>(
        &self,
        index: u32,
        f: impl FnOnce(&FileRef) -> Result<R>,
    ) -> Result<R> {
        let slot = self
            .slots
            .get(index as usize)
            .ok_or(Error::BadDescriptor)?;
        let guard = slot.lock();
        match &*guard {
            Slot::Occupied(file) => f(file),
            Slot::Empty => Err(Error::BadDescriptor),
        }
    }

    /// Remove the file from `index`, leaving the slot empty.
    pub(crate) fn take(&self, index: u32) -> Result<FileRef> {
        let slot = self
            .slots
            .get(index as usize)
            .ok_or(Error::BadDescriptor)?;
        let file = slot.lock().take().ok_or(Error::BadDescriptor)?;
        FILES_REGISTERED.decrement();
        Ok(file)
    }
}

impl Drop for SlotTable {
    fn drop(&mut self) {
        let occupied = self
            .slots
            .iter_mut()
            .map(Mutex::get_mut)
            .filter(|slot| matches!(**slot, Slot::Occupied(_)))
            .count();
        FILES_REGISTERED.sub(occupied as i64);
    }
}
