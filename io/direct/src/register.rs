//! File table registration.
//!
//! Bulk registration and unregistration of external descriptors into the
//! ring's fixed file table. Registered descriptors are duplicated, so the
//! caller may close its own copy right after registering.

use std::os::fd::BorrowedFd;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::slot::{FileRef, SlotTable};

/// Registration interface for a ring's fixed file table.
///
/// At most one table exists at a time. It is created by `register_files` or
/// `register_files_sparse` and destroyed by `unregister_files` or when the
/// ring is dropped.
pub struct Registrar {
    table: RwLock<Option<Arc<SlotTable>>>,
    max_files: u32,
}

impl Registrar {
    pub(crate) fn new(max_files: u32) -> Self {
        Self {
            table: RwLock::new(None),
            max_files,
        }
    }

    /// Maximum number of slots a registered table may have.
    pub fn max_files(&self) -> u32 {
        self.max_files
    }

    /// Register a table holding `fds` at indices `0..fds.len()`.
    pub fn register_files(&self, fds: &[BorrowedFd<'_>]) -> Result<()> {
        self.check_size(fds.len())?;
        let batch = fds
            .iter()
            .enumerate()
            .map(|(index, fd)| Ok((index as u32, Some(dup(*fd)?))))
            .collect::<Result<Vec<_>>>()?;

        let table = SlotTable::new(fds.len() as u32);
        table.register(batch, false)?;
        self.install_table(table)?;
        debug!(files = fds.len(), "registered file table");
        Ok(())
    }

    /// Register a table of `count` empty slots.
    pub fn register_files_sparse(&self, count: u32) -> Result<()> {
        self.check_size(count as usize)?;
        self.install_table(SlotTable::new(count))?;
        debug!(slots = count, "registered sparse file table");
        Ok(())
    }

    /// Replace slots `offset..offset + fds.len()`.
    ///
    /// A `None` entry clears its slot. Occupied slots are overwritten and
    /// their previous files released. Returns the number of slots updated.
    pub fn register_files_update(
        &self,
        offset: u32,
        fds: &[Option<BorrowedFd<'_>>],
    ) -> Result<usize> {
        let table = self.table().ok_or(Error::NoTable)?;
        let mut batch = Vec::with_capacity(fds.len());
        for (i, &fd) in fds.iter().enumerate() {
            let index = u32::try_from(i)
                .ok()
                .and_then(|i| offset.checked_add(i))
                .ok_or(Error::InvalidArgument)?;
            let file = fd.map(dup).transpose()?;
            batch.push((index, file));
        }
        let updated = table.register(batch, true)?;
        debug!(offset, updated, "updated file table");
        Ok(updated)
    }

    /// Place descriptors at explicit indices.
    ///
    /// Unlike `register_files_update`, every target slot must be empty; if
    /// any is occupied, out of range, or named twice, nothing changes.
    pub fn register_files_at(&self, entries: &[(u32, BorrowedFd<'_>)]) -> Result<()> {
        let table = self.table().ok_or(Error::NoTable)?;
        let batch = entries
            .iter()
            .map(|(index, fd)| Ok((*index, Some(dup(*fd)?))))
            .collect::<Result<Vec<_>>>()?;
        table.register(batch, false)?;
        Ok(())
    }

    /// Clear the given slots. Already-empty slots are skipped silently.
    pub fn unregister_files_at(&self, indices: &[u32]) -> Result<()> {
        let table = self.table().ok_or(Error::NoTable)?;
        table.unregister(indices)?;
        Ok(())
    }

    /// Destroy the file table, releasing every registered file.
    pub fn unregister_files(&self) -> Result<()> {
        let table = self.table.write().take().ok_or(Error::NoTable)?;
        debug!(slots = table.capacity(), "unregistered file table");
        Ok(())
    }

    /// Capacity of the registered table, if any.
    pub fn capacity(&self) -> Option<u32> {
        self.table.read().as_ref().map(|table| table.capacity())
    }

    /// Number of occupied slots in the registered table.
    pub fn registered(&self) -> usize {
        self.table
            .read()
            .as_ref()
            .map_or(0, |table| table.occupied())
    }

    /// Whether `index` currently holds a registered file.
    pub fn is_registered(&self, index: u32) -> bool {
        self.table
            .read()
            .as_ref()
            .is_some_and(|table| table.is_occupied(index))
    }

    pub(crate) fn table(&self) -> Option<Arc<SlotTable>> {
        self.table.read().clone()
    }

    fn check_size(&self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(Error::InvalidArgument);
        }
        if count > self.max_files as usize {
            return Err(Error::ResourceExhausted);
        }
        Ok(())
    }

    fn install_table(&self, table: SlotTable) -> Result<()> {
        let mut current = self.table.write();
        if current.is_some() {
            return Err(Error::Busy);
        }
        *current = Some(Arc::new(table));
        Ok(())
    }
}

fn dup(fd: BorrowedFd<'_>) -> Result<FileRef> {
    Ok(Arc::new(fd.try_clone_to_owned()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{PipeReader, PipeWriter};
    use std::os::fd::AsFd;

    fn pipe() -> (PipeReader, PipeWriter) {
        std::io::pipe().unwrap()
    }

    #[test]
    fn register_creates_table_sized_to_batch() {
        let registrar = Registrar::new(16);
        let (r0, w0) = pipe();
        registrar
            .register_files(&[r0.as_fd(), w0.as_fd()])
            .unwrap();
        assert_eq!(registrar.capacity(), Some(2));
        assert!(registrar.is_registered(0));
        assert!(registrar.is_registered(1));
    }

    #[test]
    fn register_validates_batch() {
        let registrar = Registrar::new(1);
        assert!(matches!(
            registrar.register_files(&[]),
            Err(Error::InvalidArgument)
        ));
        let (r, w) = pipe();
        assert!(matches!(
            registrar.register_files(&[r.as_fd(), w.as_fd()]),
            Err(Error::ResourceExhausted)
        ));
        assert!(matches!(
            registrar.register_files_sparse(2),
            Err(Error::ResourceExhausted)
        ));
        assert_eq!(registrar.capacity(), None);
    }

    #[test]
    fn second_table_is_busy() {
        let registrar = Registrar::new(8);
        registrar.register_files_sparse(4).unwrap();
        let (r, _w) = pipe();
        assert!(matches!(
            registrar.register_files(&[r.as_fd()]),
            Err(Error::Busy)
        ));
        assert_eq!(registrar.capacity(), Some(4));
    }

    #[test]
    fn caller_copy_is_independent() {
        let registrar = Registrar::new(8);
        let (r, _w) = pipe();
        registrar.register_files(&[r.as_fd()]).unwrap();
        drop(r);
        assert!(registrar.is_registered(0));
    }

    #[test]
    fn update_overwrites_and_clears() {
        let registrar = Registrar::new(8);
        registrar.register_files_sparse(4).unwrap();
        let (r, w) = pipe();
        assert_eq!(
            registrar
                .register_files_update(1, &[Some(r.as_fd()), Some(w.as_fd())])
                .unwrap(),
            2
        );
        assert!(registrar.is_registered(1) && registrar.is_registered(2));

        registrar
            .register_files_update(2, &[None, None])
            .unwrap();
        assert!(registrar.is_registered(1));
        assert!(!registrar.is_registered(2));

        assert!(matches!(
            registrar.register_files_update(3, &[None, None]),
            Err(Error::InvalidArgument)
        ));
    }

    #[test]
    fn strict_placement_refuses_occupied() {
        let registrar = Registrar::new(8);
        registrar.register_files_sparse(2).unwrap();
        let (r, w) = pipe();
        registrar.register_files_at(&[(1, r.as_fd())]).unwrap();
        assert!(matches!(
            registrar.register_files_at(&[(0, w.as_fd()), (1, w.as_fd())]),
            Err(Error::InvalidArgument)
        ));
        assert!(!registrar.is_registered(0));
    }

    #[test]
    fn per_index_unregister_is_idempotent() {
        let registrar = Registrar::new(8);
        let (r, _w) = pipe();
        registrar.register_files(&[r.as_fd()]).unwrap();
        registrar.unregister_files_at(&[0]).unwrap();
        registrar.unregister_files_at(&[0]).unwrap();
        assert!(!registrar.is_registered(0));
        assert_eq!(registrar.capacity(), Some(1));
    }

    #[test]
    fn operations_without_table() {
        let registrar = Registrar::new(8);
        assert!(matches!(registrar.unregister_files(), Err(Error::NoTable)));
        assert!(matches!(
            registrar.unregister_files_at(&[0]),
            Err(Error::NoTable)
        ));
        assert!(matches!(
            registrar.register_files_update(0, &[None]),
            Err(Error::NoTable)
        ));

        registrar.register_files_sparse(1).unwrap();
        registrar.unregister_files().unwrap();
        assert_eq!(registrar.capacity(), None);
        registrar.register_files_sparse(1).unwrap();
    }
}
