use crate::{mem::AccessFault, paging::Level};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// The reason a virtual address could not be translated.
pub enum TranslationError {
    #[error("{level} entry is not present")]
    NotPresent { level: Level },
    #[error("Unexpected huge page at {level} level")]
    UnexpectedHugePage { level: Level },
    #[error("Memory access fault: {0}")]
    AccessFault(#[from] AccessFault),
}

impl TranslationError {
    #[must_use]
    #[inline]
    /// The paging level the walk stopped at, if the failure came from an entry.
    pub const fn level(self) -> Option<Level> {
        match self {
            Self::NotPresent { level } | Self::UnexpectedHugePage { level } => Some(level),
            Self::AccessFault(_) => None,
        }
    }
}
