//! Test utilities and mock platforms for mpopt-arena development.
//!
//! Provides [`ScriptedMemory`], a [`VirtualMemory`] that forwards to the
//! host but can refuse reservations or commits on demand and records every
//! call, plus QAP graph fixtures in [`fixtures`] that exercise the arena the
//! way a solver graph builder does.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::{Cell, RefCell};
use std::io;
use std::ptr::NonNull;

use mpopt_arena::{OsMemory, VirtualMemory};

pub use fixtures::{GraphShape, GraphView, QapGraph};

/// One call made against a [`ScriptedMemory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryCall {
    /// A reservation attempt and whether it was granted.
    Reserve {
        /// Bytes requested.
        size: usize,
        /// Whether the host handed out the range.
        granted: bool,
    },
    /// A commit request and whether it succeeded.
    Commit {
        /// First byte to back.
        addr: usize,
        /// Bytes to back.
        size: usize,
        /// Whether the commit went through.
        ok: bool,
    },
    /// A release of a whole reservation.
    Release {
        /// Base of the reservation.
        addr: usize,
        /// Size of the reservation.
        size: usize,
    },
}

/// Host memory with scripted failures and a call log.
///
/// Builder-style setup:
///
/// ```ignore
/// let platform = ScriptedMemory::new().with_reserve_limit(4 << 30);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedMemory {
    reserve_limit: Option<usize>,
    fail_commit_at: Option<usize>,
    commits_seen: Cell<usize>,
    calls: RefCell<Vec<MemoryCall>>,
}

impl ScriptedMemory {
    /// Host memory with no scripted failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every reservation larger than `limit` bytes.
    pub fn with_reserve_limit(mut self, limit: usize) -> Self {
        self.reserve_limit = Some(limit);
        self
    }

    /// Fail the `n`th commit call (0-based) and every one after it.
    pub fn with_commit_failure_at(mut self, n: usize) -> Self {
        self.fail_commit_at = Some(n);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<MemoryCall> {
        self.calls.borrow().clone()
    }

    /// Sizes of all reservation attempts, granted or not.
    pub fn reserve_attempts(&self) -> Vec<usize> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match *call {
                MemoryCall::Reserve { size, .. } => Some(size),
                _ => None,
            })
            .collect()
    }

    /// Sizes of successful commits.
    pub fn commits(&self) -> Vec<usize> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match *call {
                MemoryCall::Commit { size, ok: true, .. } => Some(size),
                _ => None,
            })
            .collect()
    }

    /// Number of releases.
    pub fn releases(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, MemoryCall::Release { .. }))
            .count()
    }

    fn record(&self, call: MemoryCall) {
        self.calls.borrow_mut().push(call);
    }
}

#[allow(unsafe_code)]
// SAFETY: every granted request is forwarded unchanged to `OsMemory`.
unsafe impl VirtualMemory for ScriptedMemory {
    fn reserve(&self, size: usize) -> io::Result<NonNull<u8>> {
        if self.reserve_limit.is_some_and(|limit| size > limit) {
            self.record(MemoryCall::Reserve {
                size,
                granted: false,
            });
            return Err(io::Error::from(io::ErrorKind::OutOfMemory));
        }
        let result = OsMemory.reserve(size);
        self.record(MemoryCall::Reserve {
            size,
            granted: result.is_ok(),
        });
        result
    }

    unsafe fn commit(&self, ptr: NonNull<u8>, size: usize) -> io::Result<()> {
        let n = self.commits_seen.get();
        self.commits_seen.set(n + 1);
        let addr = ptr.as_ptr().addr();
        if self.fail_commit_at.is_some_and(|at| n >= at) {
            self.record(MemoryCall::Commit {
                addr,
                size,
                ok: false,
            });
            return Err(io::Error::from(io::ErrorKind::OutOfMemory));
        }
        // SAFETY: forwarded with the caller's guarantees.
        let result = unsafe { OsMemory.commit(ptr, size) };
        self.record(MemoryCall::Commit {
            addr,
            size,
            ok: result.is_ok(),
        });
        result
    }

    unsafe fn release(&self, base: NonNull<u8>, size: usize) {
        self.record(MemoryCall::Release {
            addr: base.as_ptr().addr(),
            size,
        });
        // SAFETY: forwarded with the caller's guarantees.
        unsafe { OsMemory.release(base, size) }
    }
}
