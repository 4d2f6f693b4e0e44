//! Benchmark profiles for the mpopt arena.
//!
//! Provides pre-built graph shapes and arenas for benchmarking:
//!
//! - [`reference_profile`]: 2K unaries, up to 8 labels, ~3 edges each
//! - [`stress_profile`]: 20K unaries, up to 16 labels, ~4 edges each
//! - [`profile_arena`]: a speculative arena sized for any profile

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use mpopt_arena::{Arena, ArenaConfig, ArenaError, SpeculativeConfig};
use mpopt_test_utils::GraphShape;

/// Reference graph: 2000 unaries with 1..=8 labels and up to 3 forward
/// edges per unary.
pub fn reference_profile(seed: u64) -> GraphShape {
    GraphShape::random(seed, 2_000, 8, 3)
}

/// Stress graph: 20000 unaries with 1..=16 labels and up to 4 forward
/// edges per unary.
///
/// Same generator as [`reference_profile`] at 10x the node count.
pub fn stress_profile(seed: u64) -> GraphShape {
    GraphShape::random(seed, 20_000, 16, 4)
}

/// A speculative arena with the default reservation ceiling.
///
/// Large enough for [`stress_profile`] on any 64-bit host.
pub fn profile_arena() -> Result<Arena, ArenaError> {
    Arena::new(ArenaConfig::Speculative(SpeculativeConfig::default()))
}

/// A fixed arena sized from the shape's memory estimate.
pub fn estimated_arena(shape: &GraphShape) -> Result<Arena, ArenaError> {
    Arena::new(shape.footprint().fixed_config())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_profile_builds_in_estimated_arena() {
        let shape = reference_profile(42);
        let arena = estimated_arena(&shape).unwrap();
        let graph = shape.build(&arena).unwrap();
        assert_eq!(graph.unaries.len(), 2_000);
    }

    #[test]
    fn profiles_are_deterministic() {
        assert_eq!(reference_profile(1), reference_profile(1));
        assert_ne!(reference_profile(1), reference_profile(2));
    }
}
