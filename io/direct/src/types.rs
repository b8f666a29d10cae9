//! Descriptor targets for submitted operations.

/// A process descriptor, resolved through the ordinary descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fd(pub i32);

/// A fixed slot index, resolved through the registered file table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixed(pub u32);

/// Either kind of descriptor target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Fd(i32),
    Fixed(u32),
}

impl Target {
    /// The raw descriptor field as it appears in a submission entry.
    pub(crate) fn raw(self) -> i32 {
        match self {
            Target::Fd(fd) => fd,
            // Slot indices beyond i32::MAX can never resolve; keep them
            // negative so resolution rejects them.
            Target::Fixed(slot) => i32::try_from(slot).unwrap_or(-1),
        }
    }

    pub(crate) fn is_fixed(self) -> bool {
        matches!(self, Target::Fixed(_))
    }
}

impl From<Fd> for Target {
    fn from(fd: Fd) -> Self {
        Target::Fd(fd.0)
    }
}

impl From<Fixed> for Target {
    fn from(fixed: Fixed) -> Self {
        Target::Fixed(fixed.0)
    }
}
