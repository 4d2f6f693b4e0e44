//! Construction-time memory arena for message-passing QAP solver graphs.
//!
//! The solver stores direct references between graph nodes, so storage
//! handed out while the graph is being built may never move or be freed
//! individually. This crate provides that storage as a bump arena over one
//! large, lazily committed virtual-memory reservation.
//!
//! # Architecture
//!
//! ```text
//! Arena<P: VirtualMemory>
//! ├── VirtualRange      (reserved once, shrink-retry from ceiling to floor)
//! ├── CommitFrontier    (backs the range in granules as the cursor advances)
//! └── cursor            (bump offset, only ever moves forward)
//!
//! ArenaAlloc<'a, T>     (copyable, rebindable typed view; deallocate is a no-op)
//! ```
//!
//! # Construction policies
//!
//! - **Fixed:** one size given up front, reserved and committed at once.
//!   Use [`GraphFootprint`] to size it from the graph's node counts.
//! - **Speculative:** reserve as much as the host allows (hundreds of GiB
//!   of address space, no physical cost) and commit on demand.
//!
//! # Lifecycle
//!
//! An arena is active from successful construction until
//! [`Arena::destroy`] or drop, which release the whole range at once.
//! A failed commit poisons it: every later allocation fails with
//! [`ArenaError::Poisoned`] and the platform is not asked again.
//! Once the graph is built the arena is no longer mutated, and references
//! into it may be read from many threads.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod adapter;
pub mod arena;
pub mod config;
pub mod error;
pub mod estimate;
pub mod platform;
mod commit;
mod raw;
mod reserve;

// Public re-exports for the primary API surface.
pub use adapter::ArenaAlloc;
pub use arena::{Arena, ArenaStats};
pub use config::{ArenaConfig, FixedConfig, SpeculativeConfig, MIN_GRANULE};
pub use error::ArenaError;
pub use estimate::GraphFootprint;
pub use platform::{OsMemory, VirtualMemory};
pub use raw::VirtualRange;
