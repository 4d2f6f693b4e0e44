//! Arena construction policies.
//!
//! The two policies make different assumptions about the largest graph an
//! arena can hold, so [`ArenaConfig`] has no `Default`: every
//! caller names the policy it relies on.

use crate::error::ArenaError;

/// Smallest unit the arena ever commits, and the unit every configured size
/// must be a multiple of.
///
/// 64 KiB is a multiple of the page size on all supported hosts and equals
/// the Windows allocation granularity, so no page-size query is needed.
pub const MIN_GRANULE: usize = 64 * 1024;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// How an arena obtains its address range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaConfig {
    /// Reserve and commit one range of a caller-provided size up front.
    Fixed(FixedConfig),
    /// Reserve as much address space as possible and commit lazily.
    Speculative(SpeculativeConfig),
}

/// Legacy policy: a single size given up front, fully committed at creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedConfig {
    /// Size of the arena in KiB. Rounded up to [`MIN_GRANULE`].
    pub size_kib: usize,
}

/// Speculative policy: maximal reservation with shrink-retry and lazy commit.
///
/// Reservation is attempted at `ceiling`, then at `ceiling - step`,
/// `ceiling - 2 * step`, and so on, as long as the size stays at or above
/// `floor`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeculativeConfig {
    /// First (largest) reservation size attempted, in bytes.
    pub ceiling: usize,
    /// Smallest acceptable reservation size, in bytes.
    pub floor: usize,
    /// Amount the request shrinks by after each failed attempt, in bytes.
    pub step: usize,
    /// Commit requests are rounded up to a multiple of this, in bytes.
    ///
    /// Must be a power of two and at least [`MIN_GRANULE`].
    pub commit_granule: usize,
}

impl SpeculativeConfig {
    /// Default reservation ceiling.
    #[cfg(target_pointer_width = "64")]
    pub const DEFAULT_CEILING: usize = 256 * GIB;
    /// Default reservation ceiling.
    #[cfg(not(target_pointer_width = "64"))]
    pub const DEFAULT_CEILING: usize = GIB;

    /// Default reservation floor.
    #[cfg(target_pointer_width = "64")]
    pub const DEFAULT_FLOOR: usize = GIB;
    /// Default reservation floor.
    #[cfg(not(target_pointer_width = "64"))]
    pub const DEFAULT_FLOOR: usize = 64 * MIB;

    /// Default shrink step between reservation attempts.
    #[cfg(target_pointer_width = "64")]
    pub const DEFAULT_STEP: usize = 512 * MIB;
    /// Default shrink step between reservation attempts.
    #[cfg(not(target_pointer_width = "64"))]
    pub const DEFAULT_STEP: usize = 64 * MIB;

    /// Default commit granule: 4 MiB.
    pub const DEFAULT_COMMIT_GRANULE: usize = 4 * MIB;

    /// Create a speculative config with the default tiers.
    pub fn new() -> Self {
        Self {
            ceiling: Self::DEFAULT_CEILING,
            floor: Self::DEFAULT_FLOOR,
            step: Self::DEFAULT_STEP,
            commit_granule: Self::DEFAULT_COMMIT_GRANULE,
        }
    }

    /// Number of reservation attempts this config allows before giving up.
    pub fn max_attempts(&self) -> usize {
        if self.step == 0 || self.floor > self.ceiling {
            return 0;
        }
        (self.ceiling - self.floor) / self.step + 1
    }
}

impl Default for SpeculativeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaConfig {
    /// Fixed policy of `size_kib` KiB.
    pub fn fixed_kib(size_kib: usize) -> Self {
        Self::Fixed(FixedConfig { size_kib })
    }

    /// Speculative policy with the default tiers.
    pub fn speculative() -> Self {
        Self::Speculative(SpeculativeConfig::new())
    }

    /// Check every size constraint without touching the platform.
    pub fn validate(&self) -> Result<(), ArenaError> {
        match self {
            Self::Fixed(fixed) => {
                if fixed.size_kib == 0 {
                    return Err(invalid("fixed size must be non-zero".to_string()));
                }
                fixed.size_bytes().map(|_| ())
            }
            Self::Speculative(policy) => {
                let granule = policy.commit_granule;
                if !granule.is_power_of_two() || granule < MIN_GRANULE {
                    return Err(invalid(format!(
                        "commit_granule must be a power of two >= {MIN_GRANULE} (got {granule})"
                    )));
                }
                if policy.step == 0 {
                    return Err(invalid("step must be non-zero".to_string()));
                }
                if policy.floor == 0 {
                    return Err(invalid("floor must be non-zero".to_string()));
                }
                if policy.floor > policy.ceiling {
                    return Err(invalid(format!(
                        "floor ({}) exceeds ceiling ({})",
                        policy.floor, policy.ceiling
                    )));
                }
                for (name, value) in [
                    ("ceiling", policy.ceiling),
                    ("floor", policy.floor),
                    ("step", policy.step),
                ] {
                    if value % granule != 0 {
                        return Err(invalid(format!(
                            "{name} ({value}) is not a multiple of commit_granule ({granule})"
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

impl FixedConfig {
    /// Reservation size in bytes, rounded up to [`MIN_GRANULE`].
    pub fn size_bytes(&self) -> Result<usize, ArenaError> {
        self.size_kib
            .checked_mul(KIB)
            .and_then(|bytes| bytes.checked_next_multiple_of(MIN_GRANULE))
            .ok_or_else(|| invalid(format!("fixed size of {} KiB overflows", self.size_kib)))
    }
}

fn invalid(reason: String) -> ArenaError {
    ArenaError::InvalidConfig { reason }
}
