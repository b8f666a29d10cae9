use serde::Deserialize;

use crate::error::{Error, Result};

/// Kernel limit on registered files, used as the default table ceiling.
pub const DEFAULT_MAX_FILES: u32 = 1 << 20;

/// Configuration for a [`crate::Ring`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of submission queue entries.
    pub sq_entries: u32,
    /// Number of worker threads executing submitted entries. With a single
    /// worker, entries complete in submission order.
    pub workers: usize,
    /// Maximum number of slots in a registered file table.
    pub max_files: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sq_entries: 64,
            workers: 1,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl Config {
    /// Check that every knob is usable.
    pub fn validate(&self) -> Result<()> {
        if self.sq_entries == 0 || self.workers == 0 || self.max_files == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }
}
