//! Host virtual-memory primitives.
//!
//! The arena core is written once against [`VirtualMemory`]; each host
//! supplies one implementation of its three operations. [`OsMemory`] covers
//! Unix (`mmap`/`mprotect`/`munmap`) and Windows
//! (`VirtualAlloc`/`VirtualFree`).

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::io;
use std::ptr::NonNull;

/// Reserve, commit and release address space.
///
/// # Safety
///
/// Implementors guarantee that:
/// - `reserve(size)` returns the start of `size` bytes of address space that
///   nothing else in the process uses until `release` is called;
/// - after `commit(ptr, size)` succeeds, `[ptr, ptr + size)` is readable and
///   writable until the enclosing reservation is released;
/// - `release(base, size)` undoes both reservation and commitment of a range
///   previously returned by `reserve(size)`.
pub unsafe trait VirtualMemory {
    /// Claim `size` bytes of address space without backing it.
    fn reserve(&self, size: usize) -> io::Result<NonNull<u8>>;

    /// Back `[ptr, ptr + size)` with read/write memory.
    ///
    /// # Safety
    ///
    /// The range must lie inside a live reservation made by this platform.
    /// `ptr` and `size` must be page aligned.
    unsafe fn commit(&self, ptr: NonNull<u8>, size: usize) -> io::Result<()>;

    /// Release a reservation and everything committed inside it.
    ///
    /// # Safety
    ///
    /// `base` and `size` must be exactly a live reservation from `reserve`.
    /// No reference into the range may be used afterwards.
    unsafe fn release(&self, base: NonNull<u8>, size: usize);
}

// SAFETY: forwards to an implementation that upholds the contract.
unsafe impl<T: VirtualMemory + ?Sized> VirtualMemory for &T {
    fn reserve(&self, size: usize) -> io::Result<NonNull<u8>> {
        (**self).reserve(size)
    }

    unsafe fn commit(&self, ptr: NonNull<u8>, size: usize) -> io::Result<()> {
        // SAFETY: caller's guarantees are passed through unchanged.
        unsafe { (**self).commit(ptr, size) }
    }

    unsafe fn release(&self, base: NonNull<u8>, size: usize) {
        // SAFETY: caller's guarantees are passed through unchanged.
        unsafe { (**self).release(base, size) }
    }
}

/// The host operating system's virtual-memory calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsMemory;

#[cfg(unix)]
// SAFETY: mmap with PROT_NONE hands out a fresh private mapping; mprotect
// grants read/write inside it; munmap removes the whole mapping.
unsafe impl VirtualMemory for OsMemory {
    fn reserve(&self, size: usize) -> io::Result<NonNull<u8>> {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

        // SAFETY: anonymous mapping at a kernel-chosen address; no existing
        // memory is affected.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_NONE,
                flags,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| io::Error::other("mmap returned null"))
    }

    unsafe fn commit(&self, ptr: NonNull<u8>, size: usize) -> io::Result<()> {
        // SAFETY: caller guarantees the range is inside a live reservation.
        let rc = unsafe {
            libc::mprotect(
                ptr.as_ptr().cast::<c_void>(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    unsafe fn release(&self, base: NonNull<u8>, size: usize) {
        // SAFETY: caller guarantees this is exactly one live reservation.
        let rc = unsafe { libc::munmap(base.as_ptr().cast::<c_void>(), size) };
        if rc != 0 {
            log::error!(
                "munmap of {size} bytes at {base:p} failed: {}",
                io::Error::last_os_error()
            );
        }
    }
}

#[cfg(windows)]
// SAFETY: MEM_RESERVE hands out fresh address space; MEM_COMMIT backs pages
// inside it; MEM_RELEASE frees the whole allocation.
unsafe impl VirtualMemory for OsMemory {
    fn reserve(&self, size: usize) -> io::Result<NonNull<u8>> {
        use windows_sys::Win32::System::Memory::{VirtualAlloc, MEM_RESERVE, PAGE_NOACCESS};

        // SAFETY: reserving at a system-chosen address affects no existing memory.
        let ptr = unsafe { VirtualAlloc(std::ptr::null(), size, MEM_RESERVE, PAGE_NOACCESS) };
        NonNull::new(ptr.cast::<u8>()).ok_or_else(io::Error::last_os_error)
    }

    unsafe fn commit(&self, ptr: NonNull<u8>, size: usize) -> io::Result<()> {
        use windows_sys::Win32::System::Memory::{VirtualAlloc, MEM_COMMIT, PAGE_READWRITE};

        // SAFETY: caller guarantees the range is inside a live reservation.
        let p = unsafe { VirtualAlloc(ptr.as_ptr().cast::<c_void>(), size, MEM_COMMIT, PAGE_READWRITE) };
        if p.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    unsafe fn release(&self, base: NonNull<u8>, _size: usize) {
        use windows_sys::Win32::System::Memory::{VirtualFree, MEM_RELEASE};

        // Size must be zero with MEM_RELEASE.
        // SAFETY: caller guarantees `base` is a live reservation.
        let ok = unsafe { VirtualFree(base.as_ptr().cast::<c_void>(), 0, MEM_RELEASE) };
        if ok == 0 {
            log::error!(
                "VirtualFree at {base:p} failed: {}",
                io::Error::last_os_error()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_GRANULE;

    #[test]
    fn reserve_commit_write_release() {
        let os = OsMemory;
        let size = 4 * MIN_GRANULE;
        let base = os.reserve(size).unwrap();
        unsafe {
            os.commit(base, MIN_GRANULE).unwrap();
            base.as_ptr().write(7);
            base.as_ptr().add(MIN_GRANULE - 1).write(9);
            assert_eq!(base.as_ptr().read(), 7);
            assert_eq!(base.as_ptr().add(MIN_GRANULE - 1).read(), 9);
            os.release(base, size);
        }
    }

    #[test]
    fn reservations_are_page_aligned() {
        let os = OsMemory;
        let base = os.reserve(MIN_GRANULE).unwrap();
        assert_eq!(base.as_ptr() as usize % 4096, 0);
        unsafe { os.release(base, MIN_GRANULE) };
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn huge_reservation_costs_no_physical_memory() {
        let os = OsMemory;
        let size = 16usize << 30;
        let base = os.reserve(size).unwrap();
        unsafe { os.release(base, size) };
    }
}
