//! The bump arena that backs a solver graph.
//!
//! [`Arena`] owns one reserved [`VirtualRange`], a commit frontier and a
//! bump cursor. Allocation is O(1): a bounds check, an occasional commit
//! when the cursor crosses the frontier, and a cursor bump. Nothing is
//! ever freed, moved or reused until the whole arena is destroyed, so every
//! address handed out stays valid for the arena's lifetime.
//!
//! ```text
//! base                      cursor        committed              base + reserved
//!  |========== used ==========|---- backed ----|------ reserved only ------|
//! ```

use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

use crate::adapter::ArenaAlloc;
use crate::commit::CommitFrontier;
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::platform::{OsMemory, VirtualMemory};
use crate::raw::VirtualRange;
use crate::reserve::reserve_range;

/// Point-in-time usage figures for an [`Arena`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Size of the reserved range in bytes (0 once destroyed).
    pub reserved: usize,
    /// Bytes backed by memory.
    pub committed: usize,
    /// Bytes handed out, including alignment padding.
    pub used: usize,
    /// Number of platform commit calls made.
    pub commit_calls: usize,
}

/// Reserve-then-commit bump allocator.
///
/// The arena performs no synchronisation and is `!Sync`; graph construction
/// runs on one thread. References placed in the arena may be shared across
/// threads once construction is over.
///
/// Allocation takes `&self` so that any number of [`ArenaAlloc`] adapters can
/// draw from the same arena at once.
pub struct Arena<P: VirtualMemory = OsMemory> {
    platform: P,
    /// `None` once destroyed.
    range: Option<VirtualRange>,
    frontier: CommitFrontier,
    /// Bump offset from the start of `range`.
    cursor: Cell<usize>,
    config: ArenaConfig,
}

impl Arena<OsMemory> {
    /// Create an arena backed by the host's virtual memory.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        Self::with_platform(config, OsMemory)
    }
}

impl<P: VirtualMemory> Arena<P> {
    /// Create an arena on top of `platform`.
    ///
    /// `Fixed` reserves exactly the configured size and commits all of it.
    /// `Speculative` reserves the largest size between ceiling and floor
    /// and commits lazily. No partially constructed arena is ever returned.
    pub fn with_platform(config: ArenaConfig, platform: P) -> Result<Self, ArenaError> {
        config.validate()?;

        let (range, granule) = match &config {
            ArenaConfig::Fixed(fixed) => {
                let size = fixed.size_bytes()?;
                (reserve_range(&platform, size, size, size)?, size)
            }
            ArenaConfig::Speculative(policy) => (
                reserve_range(&platform, policy.ceiling, policy.floor, policy.step)?,
                policy.commit_granule,
            ),
        };
        let upfront = matches!(config, ArenaConfig::Fixed(_)).then_some(range.size());

        let arena = Self {
            platform,
            range: Some(range),
            frontier: CommitFrontier::new(granule),
            cursor: Cell::new(0),
            config,
        };

        if let (Some(size), Some(range)) = (upfront, arena.range.as_ref()) {
            // On failure `arena` drops here and releases the reservation.
            arena
                .frontier
                .ensure_committed(&arena.platform, range, size)?;
            log::debug!("committed fixed arena of {size} bytes up front");
        }

        Ok(arena)
    }

    /// Pad the cursor so the next allocation starts at a multiple of `align`.
    ///
    /// The padding is allocated and never reused. No-op if already aligned.
    pub fn align(&self, align: usize) -> Result<(), ArenaError> {
        if !align.is_power_of_two() {
            return Err(ArenaError::InvalidAlignment { align });
        }
        let Some(range) = self.range.as_ref() else {
            return Err(self.out_of_range(0));
        };
        self.frontier.ensure_usable()?;
        let addr = range.base().as_ptr().addr() + self.cursor.get();
        let misalign = addr & (align - 1);
        if misalign != 0 {
            self.allocate(align - misalign)?;
        }
        Ok(())
    }

    /// Hand out `size` bytes at the current cursor.
    ///
    /// Performs no alignment; call [`Arena::align`] first when the caller
    /// needs it. Fails with [`ArenaError::OutOfRange`] if
    /// `used() + size >= reserved_size()`, and with
    /// [`ArenaError::CommitFailed`] if backing memory cannot be obtained.
    /// After a failed commit every call returns [`ArenaError::Poisoned`].
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, ArenaError> {
        let Some(range) = self.range.as_ref() else {
            return Err(self.out_of_range(size));
        };
        self.frontier.ensure_usable()?;
        let used = self.cursor.get();
        let end = match used.checked_add(size) {
            Some(end) if end < range.size() => end,
            _ => {
                log::error!(
                    "ran out of arena memory while building optimization graph: \
                     {size} bytes requested, {used} of {} used",
                    range.size()
                );
                return Err(self.out_of_range(size));
            }
        };
        self.frontier
            .ensure_committed(&self.platform, range, end)?;
        self.cursor.set(end);
        Ok(range.ptr_at(used))
    }

    fn out_of_range(&self, requested: usize) -> ArenaError {
        ArenaError::OutOfRange {
            requested,
            used: self.cursor.get(),
            reserved: self.reserved_size(),
        }
    }

    /// Typed adapter over this arena.
    pub fn typed<T>(&self) -> ArenaAlloc<'_, T, P> {
        ArenaAlloc::new(self)
    }

    /// Release the whole reserved range.
    ///
    /// Idempotent. Afterwards the arena reports zero sizes and every
    /// allocation fails with [`ArenaError::OutOfRange`].
    pub fn destroy(&mut self) {
        if let Some(range) = self.range.take() {
            log::debug!(
                "releasing arena: {} bytes reserved, {} committed, {} used",
                range.size(),
                self.frontier.committed(),
                self.cursor.get()
            );
            range.release(&self.platform);
            self.frontier.reset();
            self.cursor.set(0);
        }
    }

    /// Whether the arena still owns its range.
    pub fn is_active(&self) -> bool {
        self.range.is_some()
    }

    /// Whether a commit has failed. A poisoned arena only serves reads of
    /// what was already placed, and should be destroyed.
    pub fn is_poisoned(&self) -> bool {
        self.frontier.is_poisoned()
    }

    /// The reserved range, if not destroyed.
    pub fn range(&self) -> Option<&VirtualRange> {
        self.range.as_ref()
    }

    /// Size of the reserved range in bytes.
    pub fn reserved_size(&self) -> usize {
        self.range.as_ref().map_or(0, VirtualRange::size)
    }

    /// Bytes backed by memory.
    pub fn committed_size(&self) -> usize {
        self.frontier.committed()
    }

    /// Bytes handed out so far, padding included.
    pub fn used(&self) -> usize {
        self.cursor.get()
    }

    /// Bytes left before the reserved ceiling.
    pub fn remaining(&self) -> usize {
        self.reserved_size().saturating_sub(self.used())
    }

    /// Whether `ptr` points into the reserved range.
    pub fn contains<T: ?Sized>(&self, ptr: *const T) -> bool {
        self.range
            .as_ref()
            .is_some_and(|range| range.contains_addr(ptr.cast::<u8>().addr()))
    }

    /// Offset of `ptr` from the start of the range.
    pub fn offset_of<T: ?Sized>(&self, ptr: *const T) -> Option<usize> {
        let range = self.range.as_ref()?;
        let addr = ptr.cast::<u8>().addr();
        range
            .contains_addr(addr)
            .then(|| addr - range.base().as_ptr().addr())
    }

    /// Usage snapshot.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            reserved: self.reserved_size(),
            committed: self.committed_size(),
            used: self.used(),
            commit_calls: self.frontier.commit_calls(),
        }
    }

    /// The construction policy this arena was built with.
    pub fn policy(&self) -> &ArenaConfig {
        &self.config
    }

    /// The platform backing this arena.
    pub fn platform(&self) -> &P {
        &self.platform
    }
}

impl<P: VirtualMemory> Drop for Arena<P> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<P: VirtualMemory> fmt::Debug for Arena<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("range", &self.range)
            .field("committed", &self.frontier.committed())
            .field("used", &self.cursor.get())
            .field("config", &self.config)
            .finish()
    }
}
