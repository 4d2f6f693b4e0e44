//! Lazy commitment of reserved address space.
//!
//! The frontier only moves forward, in whole granules, and only when the
//! bump cursor is about to cross it. Nothing is ever de-committed while the
//! arena is alive. A failed commit is final: the frontier remembers it and
//! refuses every later request without calling the platform.

use std::cell::Cell;

use crate::error::ArenaError;
use crate::platform::VirtualMemory;
use crate::raw::VirtualRange;

/// Offset up to which the reserved range is backed by memory.
#[derive(Debug)]
pub struct CommitFrontier {
    /// Committed prefix of the range, in bytes.
    committed: Cell<usize>,
    /// Commit requests are rounded up to a multiple of this.
    granule: usize,
    /// Number of successful platform commits.
    commit_calls: Cell<usize>,
    /// Offset of the commit that failed, if one has.
    failed_at: Cell<Option<usize>>,
}

impl CommitFrontier {
    pub(crate) fn new(granule: usize) -> Self {
        debug_assert!(granule > 0);
        Self {
            committed: Cell::new(0),
            granule,
            commit_calls: Cell::new(0),
            failed_at: Cell::new(None),
        }
    }

    /// Bytes of the range currently backed by memory.
    pub fn committed(&self) -> usize {
        self.committed.get()
    }

    /// Number of platform commit calls made so far.
    pub fn commit_calls(&self) -> usize {
        self.commit_calls.get()
    }

    /// Whether a commit has failed since the last reset.
    pub fn is_poisoned(&self) -> bool {
        self.failed_at.get().is_some()
    }

    /// [`ArenaError::Poisoned`] once a commit has failed.
    pub(crate) fn ensure_usable(&self) -> Result<(), ArenaError> {
        match self.failed_at.get() {
            Some(offset) => Err(ArenaError::Poisoned { offset }),
            None => Ok(()),
        }
    }

    /// Make sure `[0, target)` is committed.
    ///
    /// Commits one contiguous sub-range from the current frontier up to
    /// `target` rounded to the next granule, capped at the range size. On
    /// failure the frontier is left where it was and poisoned: this and every
    /// later call fails without touching the platform.
    pub(crate) fn ensure_committed<P: VirtualMemory + ?Sized>(
        &self,
        platform: &P,
        range: &VirtualRange,
        target: usize,
    ) -> Result<(), ArenaError> {
        self.ensure_usable()?;
        let committed = self.committed.get();
        if target <= committed {
            return Ok(());
        }

        let frontier = target
            .checked_next_multiple_of(self.granule)
            .map_or(range.size(), |rounded| rounded.min(range.size()));
        let len = frontier - committed;

        if let Err(source) = range.commit(platform, committed, len) {
            log::error!("committing {len} bytes at arena offset {committed} failed: {source}");
            self.failed_at.set(Some(committed));
            return Err(ArenaError::CommitFailed {
                offset: committed,
                len,
                source,
            });
        }

        self.committed.set(frontier);
        self.commit_calls.set(self.commit_calls.get() + 1);
        log::trace!("commit frontier advanced {committed} -> {frontier}");
        Ok(())
    }

    /// Forget all commitment once the range has been released.
    pub(crate) fn reset(&self) {
        self.committed.set(0);
        self.commit_calls.set(0);
        self.failed_at.set(None);
    }
}
