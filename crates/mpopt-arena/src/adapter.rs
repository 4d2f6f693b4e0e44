//! Typed, rebindable view of an [`Arena`].
//!
//! [`ArenaAlloc`] is what graph-building code holds. It is a copyable
//! `&Arena` plus a value type: many adapters, over many types, can share one
//! arena. Releasing storage through an adapter does nothing; the arena
//! reclaims everything at once when it is destroyed.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use crate::arena::Arena;
use crate::error::ArenaError;
use crate::platform::{OsMemory, VirtualMemory};
use crate::raw;

/// Allocates storage for `T` from a shared [`Arena`].
///
/// Values placed with [`ArenaAlloc::alloc`] and the slice helpers are never
/// dropped. Types with meaningful `Drop` impls should not rely on it running.
pub struct ArenaAlloc<'a, T, P: VirtualMemory = OsMemory> {
    arena: &'a Arena<P>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T, P: VirtualMemory> ArenaAlloc<'a, T, P> {
    /// Adapter for `T` over `arena`.
    pub fn new(arena: &'a Arena<P>) -> Self {
        Self {
            arena,
            _marker: PhantomData,
        }
    }

    /// Same arena, different value type.
    pub fn rebind<U>(self) -> ArenaAlloc<'a, U, P> {
        ArenaAlloc::new(self.arena)
    }

    /// The arena this adapter draws from.
    pub fn arena(&self) -> &'a Arena<P> {
        self.arena
    }

    /// Uninitialised storage for `n` consecutive `T`s.
    ///
    /// Aligns the arena to `align_of::<T>()` first, so the result is always
    /// suitably aligned. An `n` whose byte size overflows `usize` is
    /// reported as [`ArenaError::OutOfRange`].
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>, ArenaError> {
        let bytes = n
            .checked_mul(mem::size_of::<T>())
            .ok_or_else(|| ArenaError::OutOfRange {
                requested: usize::MAX,
                used: self.arena.used(),
                reserved: self.arena.reserved_size(),
            })?;
        self.arena.align(mem::align_of::<T>())?;
        let ptr = self.arena.allocate(bytes)?.cast::<T>();
        debug_assert_eq!(ptr.as_ptr().addr() % mem::align_of::<T>(), 0);
        Ok(ptr)
    }

    /// Does nothing: arena storage is only reclaimed in bulk.
    pub fn deallocate(&self, _ptr: NonNull<T>, _n: usize) {}

    /// Move `value` into the arena.
    pub fn alloc(&self, value: T) -> Result<&'a mut T, ArenaError> {
        let slot = self.allocate(1)?;
        // SAFETY: `slot` is fresh, aligned, committed arena storage that
        // lives as long as the arena borrow.
        #[allow(unsafe_code)]
        let value = unsafe { raw::write_value(slot, value) };
        Ok(value)
    }

    /// `len` clones of `value`, contiguous in the arena.
    pub fn alloc_slice_fill(&self, len: usize, value: T) -> Result<&'a mut [T], ArenaError>
    where
        T: Clone,
    {
        let slot = self.allocate(len)?;
        // SAFETY: as for `alloc`, for `len` elements.
        #[allow(unsafe_code)]
        let slice = unsafe { raw::fill_slice(slot, len, value) };
        Ok(slice)
    }

    /// A copy of `src`, contiguous in the arena.
    pub fn alloc_slice_copy(&self, src: &[T]) -> Result<&'a mut [T], ArenaError>
    where
        T: Copy,
    {
        let slot = self.allocate(src.len())?;
        // SAFETY: as for `alloc`; fresh storage cannot overlap `src`.
        #[allow(unsafe_code)]
        let slice = unsafe { raw::copy_slice(slot, src) };
        Ok(slice)
    }
}

impl<T, P: VirtualMemory> Clone for ArenaAlloc<'_, T, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, P: VirtualMemory> Copy for ArenaAlloc<'_, T, P> {}

/// Adapters are interchangeable iff they share an arena.
impl<T, U, P: VirtualMemory> PartialEq<ArenaAlloc<'_, U, P>> for ArenaAlloc<'_, T, P> {
    fn eq(&self, other: &ArenaAlloc<'_, U, P>) -> bool {
        ptr::eq(self.arena, other.arena)
    }
}

impl<T, P: VirtualMemory> Eq for ArenaAlloc<'_, T, P> {}

impl<'a, T, P: VirtualMemory> From<&'a Arena<P>> for ArenaAlloc<'a, T, P> {
    fn from(arena: &'a Arena<P>) -> Self {
        Self::new(arena)
    }
}

impl<T, P: VirtualMemory> fmt::Debug for ArenaAlloc<'_, T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaAlloc")
            .field("type", &std::any::type_name::<T>())
            .field("arena", &ptr::from_ref(self.arena))
            .finish()
    }
}
