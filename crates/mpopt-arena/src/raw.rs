//! Low-level primitives for arena memory operations.
//!
//! Together with `platform.rs` this module holds the crate's raw pointer
//! work. Every block carries a `// SAFETY:` comment. Range operations are
//! safe functions whose preconditions are checked here; the placement
//! helpers stay `unsafe` and are called only from the typed adapter.

#![allow(unsafe_code)]

use std::io;
use std::ptr::NonNull;

use crate::platform::VirtualMemory;

/// A reserved, contiguous span of address space.
///
/// Immutable after construction. Owned by exactly one arena, which releases
/// it through [`VirtualRange::release`] on teardown.
#[derive(Debug, PartialEq, Eq)]
pub struct VirtualRange {
    base: NonNull<u8>,
    size: usize,
}

impl VirtualRange {
    /// Wrap a reservation returned by [`VirtualMemory::reserve`].
    pub(crate) fn new(base: NonNull<u8>, size: usize) -> Self {
        Self { base, size }
    }

    /// First byte of the range.
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Size of the range in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether `addr` falls inside `[base, base + size)`.
    pub fn contains_addr(&self, addr: usize) -> bool {
        let start = self.base.as_ptr().addr();
        addr >= start && addr - start < self.size
    }

    /// Pointer `offset` bytes into the range.
    ///
    /// # Panics
    ///
    /// Panics if `offset > size`.
    pub(crate) fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        assert!(
            offset <= self.size,
            "offset {offset} outside reserved range of {} bytes",
            self.size
        );
        // SAFETY: offset is at most one past the end of a live reservation,
        // which the platform guarantees does not wrap the address space.
        unsafe { self.base.add(offset) }
    }

    /// Back `[offset, offset + len)` with memory.
    ///
    /// # Panics
    ///
    /// Panics if the sub-range does not lie inside this range.
    pub(crate) fn commit<P: VirtualMemory + ?Sized>(
        &self,
        platform: &P,
        offset: usize,
        len: usize,
    ) -> io::Result<()> {
        let end = offset.checked_add(len);
        assert!(
            end.is_some_and(|end| end <= self.size),
            "commit of {len} bytes at {offset} outside reserved range of {} bytes",
            self.size
        );
        let start = self.ptr_at(offset);
        // SAFETY: the sub-range was checked against this live reservation,
        // which was obtained from `platform`.
        unsafe { platform.commit(start, len) }
    }

    /// Release the whole range, consuming it.
    pub(crate) fn release<P: VirtualMemory + ?Sized>(self, platform: &P) {
        // SAFETY: `self` is exactly one reservation from `platform`, and
        // consuming it prevents a second release.
        unsafe { platform.release(self.base, self.size) }
    }
}

/// Move `value` into uninitialised, committed storage.
///
/// # Safety
///
/// `slot` must be aligned for `T`, point to committed memory that no other
/// reference aliases, and stay valid for `'a`.
pub(crate) unsafe fn write_value<'a, T>(slot: NonNull<T>, value: T) -> &'a mut T {
    // SAFETY: caller guarantees alignment, exclusivity and lifetime.
    unsafe {
        slot.as_ptr().write(value);
        &mut *slot.as_ptr()
    }
}

/// Fill `len` uninitialised elements with clones of `value`.
///
/// # Safety
///
/// As for [`write_value`], for `len` consecutive elements.
pub(crate) unsafe fn fill_slice<'a, T: Clone>(
    slot: NonNull<T>,
    len: usize,
    value: T,
) -> &'a mut [T] {
    let ptr = slot.as_ptr();
    // SAFETY: every element written is inside the caller's storage.
    unsafe {
        for i in 0..len {
            ptr.add(i).write(value.clone());
        }
        std::slice::from_raw_parts_mut(ptr, len)
    }
}

/// Copy `src` into uninitialised storage of `src.len()` elements.
///
/// # Safety
///
/// As for [`write_value`], for `src.len()` consecutive elements. The
/// storage must not overlap `src`.
pub(crate) unsafe fn copy_slice<'a, T: Copy>(slot: NonNull<T>, src: &[T]) -> &'a mut [T] {
    let ptr = slot.as_ptr();
    // SAFETY: the destination is fresh arena storage, disjoint from `src`.
    unsafe {
        std::ptr::copy_nonoverlapping(src.as_ptr(), ptr, src.len());
        std::slice::from_raw_parts_mut(ptr, src.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_GRANULE;
    use crate::platform::OsMemory;

    fn reserve(size: usize) -> VirtualRange {
        VirtualRange::new(OsMemory.reserve(size).unwrap(), size)
    }

    #[test]
    fn contains_addr_covers_half_open_range() {
        let range = reserve(MIN_GRANULE);
        let start = range.base().as_ptr().addr();
        assert!(range.contains_addr(start));
        assert!(range.contains_addr(start + MIN_GRANULE - 1));
        assert!(!range.contains_addr(start + MIN_GRANULE));
        assert!(!range.contains_addr(start.wrapping_sub(1)));
        range.release(&OsMemory);
    }

    #[test]
    fn ptr_at_end_is_one_past() {
        let range = reserve(MIN_GRANULE);
        let end = range.ptr_at(MIN_GRANULE);
        assert_eq!(
            end.as_ptr().addr() - range.base().as_ptr().addr(),
            MIN_GRANULE
        );
        range.release(&OsMemory);
    }

    #[test]
    #[should_panic(expected = "outside reserved range")]
    fn ptr_at_past_end_panics() {
        let range = reserve(MIN_GRANULE);
        let _ = range.ptr_at(MIN_GRANULE + 1);
    }

    #[test]
    #[should_panic(expected = "outside reserved range")]
    fn commit_past_end_panics() {
        let range = reserve(MIN_GRANULE);
        let _ = range.commit(&OsMemory, 0, 2 * MIN_GRANULE);
    }

    #[test]
    fn placement_helpers_initialise_storage() {
        let range = reserve(MIN_GRANULE);
        range.commit(&OsMemory, 0, MIN_GRANULE).unwrap();
        let base = range.base().cast::<f64>();
        unsafe {
            let v = write_value(base, 1.5);
            assert_eq!(*v, 1.5);
            let filled = fill_slice(base.add(1), 4, 2.0);
            assert_eq!(filled, &[2.0; 4]);
            let copied = copy_slice(base.add(5), &[3.0, 4.0]);
            assert_eq!(copied, &[3.0, 4.0]);
        }
        range.release(&OsMemory);
    }
}
