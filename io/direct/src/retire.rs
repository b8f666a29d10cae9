//! Fixed descriptor retire.

use tracing::debug;

use crate::adapter::fixed_slot;
use crate::error::{Error, Result};
use crate::metrics::RETIRES;
use crate::register::Registrar;

/// Release the file in slot `fd` and empty the slot.
///
/// Requires the fixed-file marker. Descriptors installed from the slot
/// earlier are separate references and are not affected. Operations already
/// in flight on the slot keep their own reference until they finish.
pub(crate) fn retire(files: &Registrar, fd: i32, fixed: bool) -> Result<()> {
    if !fixed {
        return Err(Error::BadDescriptor);
    }
    let index = fixed_slot(fd)?;
    let table = files.table().ok_or(Error::BadDescriptor)?;
    let file = table.take(index)?;
    drop(file);

    RETIRES.increment();
    debug!(slot = index, "retired fixed file");
    Ok(())
}
