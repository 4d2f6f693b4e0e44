//! Integration test: reservation, commit and teardown behaviour observed
//! through a scripted platform.
//!
//! Every test hands the arena a `&ScriptedMemory`, so the platform's call
//! log stays inspectable after the arena is destroyed or dropped.

use mpopt_arena::{Arena, ArenaConfig, ArenaError, SpeculativeConfig, MIN_GRANULE};
use mpopt_test_utils::{MemoryCall, ScriptedMemory};

const MIB: usize = 1024 * 1024;
const GRANULE: usize = SpeculativeConfig::DEFAULT_COMMIT_GRANULE;

fn speculative(ceiling: usize, floor: usize, step: usize) -> ArenaConfig {
    ArenaConfig::Speculative(SpeculativeConfig {
        ceiling,
        floor,
        step,
        commit_granule: GRANULE,
    })
}

fn small_policy() -> SpeculativeConfig {
    SpeculativeConfig {
        ceiling: 64 * MIB,
        floor: 4 * MIB,
        step: 4 * MIB,
        commit_granule: GRANULE,
    }
}

fn small() -> ArenaConfig {
    ArenaConfig::Speculative(small_policy())
}

// ── Reservation ─────────────────────────────────────────────────────

#[cfg(target_pointer_width = "64")]
#[test]
fn huge_reservation_shrinks_in_fixed_steps_until_granted() {
    const GIB: usize = 1024 * MIB;
    let platform = ScriptedMemory::new().with_reserve_limit(4 * GIB);
    let policy = SpeculativeConfig {
        ceiling: 256 * GIB,
        floor: GIB,
        step: 512 * MIB,
        commit_granule: GRANULE,
    };
    let max_attempts = policy.max_attempts();

    let arena = Arena::with_platform(ArenaConfig::Speculative(policy), &platform).unwrap();

    assert!(arena.is_active());
    assert_eq!(arena.reserved_size(), 4 * GIB);
    let attempts = platform.reserve_attempts();
    assert_eq!(attempts.len(), (256 - 4) * 2 + 1);
    assert!(attempts.len() <= max_attempts);
    assert_eq!(max_attempts, (256 - 1) * 2 + 1);
    assert_eq!(attempts[0], 256 * GIB);
    assert_eq!(attempts[1], 256 * GIB - 512 * MIB);
    assert_eq!(*attempts.last().unwrap(), 4 * GIB);
    assert!(attempts.windows(2).all(|w| w[0] - w[1] == 512 * MIB));
}

#[test]
fn reservation_below_floor_fails_without_arena() {
    let platform = ScriptedMemory::new().with_reserve_limit(2 * MIB);
    let err = Arena::with_platform(small(), &platform).unwrap_err();
    match err {
        ArenaError::ReservationFailed {
            ceiling,
            floor,
            attempts,
            ..
        } => {
            assert_eq!(ceiling, 64 * MIB);
            assert_eq!(floor, 4 * MIB);
            assert_eq!(attempts, 16);
            assert_eq!(attempts, small_policy().max_attempts());
        }
        other => panic!("expected ReservationFailed, got {other:?}"),
    }
    assert_eq!(platform.releases(), 0);
    assert!(platform.commits().is_empty());
}

#[test]
fn invalid_config_never_reaches_platform() {
    let platform = ScriptedMemory::new();
    let err = Arena::with_platform(speculative(64 * MIB, 4 * MIB, 0), &platform).unwrap_err();
    assert!(matches!(err, ArenaError::InvalidConfig { .. }));
    assert!(platform.calls().is_empty());
}

// ── Commit ──────────────────────────────────────────────────────────

#[test]
fn crossing_a_granule_commits_two_granules_at_once() {
    let platform = ScriptedMemory::new();
    let arena = Arena::with_platform(small(), &platform).unwrap();
    assert!(platform.commits().is_empty());

    arena.allocate(GRANULE + 1).unwrap();

    assert_eq!(platform.commits(), vec![2 * GRANULE]);
    assert_eq!(arena.committed_size(), 2 * GRANULE);
}

#[test]
fn allocations_inside_frontier_do_not_commit() {
    let platform = ScriptedMemory::new();
    let arena = Arena::with_platform(small(), &platform).unwrap();
    for _ in 0..1000 {
        arena.allocate(64).unwrap();
    }
    assert_eq!(platform.commits(), vec![GRANULE]);
}

#[test]
fn commits_are_contiguous_and_never_shrink() {
    let platform = ScriptedMemory::new();
    let arena = Arena::with_platform(small(), &platform).unwrap();
    let base = arena.range().unwrap().base().as_ptr().addr();
    for size in [10, GRANULE, 3 * GRANULE, 1, GRANULE / 2] {
        arena.allocate(size).unwrap();
    }
    let mut expected_addr = base;
    for call in platform.calls() {
        if let MemoryCall::Commit { addr, size, ok } = call {
            assert!(ok);
            assert_eq!(addr, expected_addr);
            assert_eq!(size % GRANULE, 0);
            expected_addr += size;
        }
    }
    assert_eq!(expected_addr - base, arena.committed_size());
}

#[test]
fn commit_failure_is_fatal_and_leaves_state() {
    let platform = ScriptedMemory::new().with_commit_failure_at(1);
    let arena = Arena::with_platform(small(), &platform).unwrap();
    arena.allocate(16).unwrap();

    let err = arena.allocate(GRANULE).unwrap_err();

    match err {
        ArenaError::CommitFailed { offset, len, .. } => {
            assert_eq!(offset, GRANULE);
            assert_eq!(len, GRANULE);
        }
        other => panic!("expected CommitFailed, got {other:?}"),
    }
    assert_eq!(arena.used(), 16);
    assert_eq!(arena.committed_size(), GRANULE);
}

#[test]
fn failed_commit_leaves_arena_unusable() {
    let platform = ScriptedMemory::new().with_commit_failure_at(1);
    let arena = Arena::with_platform(small(), &platform).unwrap();
    let first = arena.allocate(16).unwrap();
    assert!(matches!(
        arena.allocate(GRANULE),
        Err(ArenaError::CommitFailed { .. })
    ));
    assert!(arena.is_poisoned());

    // Fits in the committed prefix, yet still refused.
    assert!(matches!(
        arena.allocate(64),
        Err(ArenaError::Poisoned { offset }) if offset == GRANULE
    ));
    assert!(matches!(
        arena.allocate(GRANULE),
        Err(ArenaError::Poisoned { .. })
    ));
    assert!(matches!(arena.align(8), Err(ArenaError::Poisoned { .. })));
    assert!(matches!(
        arena.typed::<u64>().alloc(7),
        Err(ArenaError::Poisoned { .. })
    ));

    let commit_calls = arena
        .platform()
        .calls()
        .into_iter()
        .filter(|call| matches!(call, MemoryCall::Commit { .. }))
        .count();
    assert_eq!(commit_calls, 2);
    assert_eq!(arena.platform().commits(), vec![GRANULE]);
    assert_eq!(arena.used(), 16);
    assert!(arena.contains(first.as_ptr()));
}

#[test]
fn fixed_policy_commit_failure_releases_reservation() {
    let platform = ScriptedMemory::new().with_commit_failure_at(0);
    let err = Arena::with_platform(ArenaConfig::fixed_kib(256), &platform).unwrap_err();
    assert!(matches!(err, ArenaError::CommitFailed { offset: 0, .. }));
    assert_eq!(platform.releases(), 1);
}

#[test]
fn fixed_policy_commits_once_up_front() {
    let platform = ScriptedMemory::new();
    let arena = Arena::with_platform(ArenaConfig::fixed_kib(256), &platform).unwrap();
    assert_eq!(platform.reserve_attempts(), vec![256 * 1024]);
    assert_eq!(platform.commits(), vec![256 * 1024]);
    arena.allocate(100 * 1024).unwrap();
    assert_eq!(platform.commits().len(), 1);
}

#[test]
fn fixed_size_rounds_to_min_granule() {
    let platform = ScriptedMemory::new();
    let arena = Arena::with_platform(ArenaConfig::fixed_kib(10), &platform).unwrap();
    assert_eq!(arena.reserved_size(), MIN_GRANULE);
}

// ── Teardown ────────────────────────────────────────────────────────

#[test]
fn destroy_releases_whole_range_once() {
    let platform = ScriptedMemory::new();
    let mut arena = Arena::with_platform(small(), &platform).unwrap();
    let base = arena.range().unwrap().base().as_ptr().addr();
    for _ in 0..50 {
        arena.allocate(100_000).unwrap();
    }

    arena.destroy();
    arena.destroy();

    let releases: Vec<_> = platform
        .calls()
        .into_iter()
        .filter(|call| matches!(call, MemoryCall::Release { .. }))
        .collect();
    assert_eq!(
        releases,
        vec![MemoryCall::Release {
            addr: base,
            size: 64 * MIB
        }]
    );

    drop(arena);
    assert_eq!(platform.releases(), 1);
}

#[test]
fn drop_releases_range() {
    let platform = ScriptedMemory::new();
    {
        let arena = Arena::with_platform(small(), &platform).unwrap();
        arena.allocate(1).unwrap();
    }
    assert_eq!(platform.releases(), 1);
}
