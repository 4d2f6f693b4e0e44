//! Arena error types.
//!
//! Every variant is fatal for the graph build that raised it. The arena
//! never relocates memory, so there is no recovery path: the caller drops
//! the half-built graph together with the arena.

use std::error::Error;
use std::fmt;
use std::io;

/// Errors that can occur while creating or allocating from an arena.
#[derive(Debug)]
pub enum ArenaError {
    /// The configuration was rejected before any platform call was made.
    InvalidConfig {
        /// Human-readable description of the violated constraint.
        reason: String,
    },
    /// `align` was called with a value that is not a power of two.
    InvalidAlignment {
        /// The rejected alignment.
        align: usize,
    },
    /// No address range between the ceiling and the floor could be reserved.
    ReservationFailed {
        /// First (largest) size attempted, in bytes.
        ceiling: usize,
        /// Smallest size that was acceptable, in bytes.
        floor: usize,
        /// Number of reservation attempts made.
        attempts: usize,
        /// Error reported by the platform for the last attempt.
        source: io::Error,
    },
    /// The platform refused to back part of the reserved range with memory.
    ///
    /// The arena must be abandoned after this error.
    CommitFailed {
        /// Offset of the first byte that failed to commit.
        offset: usize,
        /// Length of the failed commit request, in bytes.
        len: usize,
        /// Error reported by the platform.
        source: io::Error,
    },
    /// An earlier commit failed and the arena refuses all further work.
    ///
    /// Returned by every `allocate` and `align` after a
    /// [`ArenaError::CommitFailed`]; the platform is not asked again.
    Poisoned {
        /// Offset of the commit that failed.
        offset: usize,
    },
    /// The request would run past the end of the reserved range.
    OutOfRange {
        /// Number of bytes requested.
        requested: usize,
        /// Cursor offset at the time of the request.
        used: usize,
        /// Size of the reserved range in bytes.
        reserved: usize,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
            Self::InvalidAlignment { align } => {
                write!(f, "alignment {align} is not a power of two")
            }
            Self::ReservationFailed {
                ceiling,
                floor,
                attempts,
                source,
            } => {
                write!(
                    f,
                    "could not reserve address space between {ceiling} and {floor} bytes \
                     after {attempts} attempts: {source}"
                )
            }
            Self::CommitFailed {
                offset,
                len,
                source,
            } => {
                write!(
                    f,
                    "failed to commit {len} bytes at arena offset {offset}: {source}"
                )
            }
            Self::Poisoned { offset } => {
                write!(
                    f,
                    "arena abandoned after a failed commit at offset {offset}"
                )
            }
            Self::OutOfRange {
                requested,
                used,
                reserved,
            } => {
                write!(
                    f,
                    "arena out of range: requested {requested} bytes with {used} of {reserved} bytes used"
                )
            }
        }
    }
}

impl Error for ArenaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ReservationFailed { source, .. } | Self::CommitFailed { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}
