//! Sizing a fixed arena from the shape of a QAP graph.
//!
//! Under [`ArenaConfig::Fixed`] the whole graph has to fit into a size given
//! up front. The graph's cost storage is dominated by per-node `f64` arrays
//! whose lengths follow directly from each node's label counts, so counting
//! them while the caller enumerates nodes gives a usable bound. The result is
//! doubled to cover node headers and alignment padding.

use crate::config::{ArenaConfig, FixedConfig};

/// Bytes per stored cost value.
const COST_BYTES: usize = std::mem::size_of::<f64>();

/// Running estimate of the arena memory a QAP graph needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphFootprint {
    cost_bytes: usize,
    unaries: usize,
    uniquenesses: usize,
    pairwise: usize,
}

impl GraphFootprint {
    /// Headroom applied on top of the raw cost storage.
    pub const SAFETY_FACTOR: usize = 2;

    /// An empty estimate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a unary node with `labels` labels and the given number of
    /// forward and backward pairwise connections.
    pub fn add_unary(&mut self, labels: usize, forward: usize, backward: usize) -> &mut Self {
        self.unaries += 1;
        self.add_costs(2 * labels + forward + backward)
    }

    /// Account for a uniqueness node over `unaries` unary nodes.
    ///
    /// The extra slot is the dummy that lets a label stay unassigned.
    pub fn add_uniqueness(&mut self, unaries: usize) -> &mut Self {
        self.uniquenesses += 1;
        self.add_costs(2 * unaries + 1)
    }

    /// Account for a pairwise node between label sets of the given sizes.
    pub fn add_pairwise(&mut self, labels0: usize, labels1: usize) -> &mut Self {
        self.pairwise += 1;
        self.add_costs(labels0.saturating_mul(labels1))
    }

    fn add_costs(&mut self, values: usize) -> &mut Self {
        self.cost_bytes = self
            .cost_bytes
            .saturating_add(values.saturating_mul(COST_BYTES));
        self
    }

    /// Raw cost storage counted so far, in bytes.
    pub fn cost_bytes(&self) -> usize {
        self.cost_bytes
    }

    /// Number of nodes counted, as `(unary, uniqueness, pairwise)`.
    pub fn node_counts(&self) -> (usize, usize, usize) {
        (self.unaries, self.uniquenesses, self.pairwise)
    }

    /// Recommended fixed arena size in KiB, headroom included.
    ///
    /// Never zero, so the result is always a valid fixed size.
    pub fn size_kib(&self) -> usize {
        self.cost_bytes
            .saturating_mul(Self::SAFETY_FACTOR)
            .div_ceil(1024)
            .max(1)
    }

    /// A fixed-size arena config large enough for the counted graph.
    pub fn fixed_config(&self) -> ArenaConfig {
        ArenaConfig::Fixed(FixedConfig {
            size_kib: self.size_kib(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_still_gets_one_kib() {
        let fp = GraphFootprint::new();
        assert_eq!(fp.cost_bytes(), 0);
        assert_eq!(fp.size_kib(), 1);
    }

    #[test]
    fn unary_counts_two_per_label_plus_links() {
        let mut fp = GraphFootprint::new();
        fp.add_unary(10, 3, 2);
        assert_eq!(fp.cost_bytes(), 8 * 25);
    }

    #[test]
    fn uniqueness_counts_dummy_slot() {
        let mut fp = GraphFootprint::new();
        fp.add_uniqueness(4);
        assert_eq!(fp.cost_bytes(), 8 * 9);
    }

    #[test]
    fn pairwise_is_label_product() {
        let mut fp = GraphFootprint::new();
        fp.add_pairwise(30, 40);
        assert_eq!(fp.cost_bytes(), 8 * 1200);
    }

    #[test]
    fn size_applies_safety_factor_and_rounds_up() {
        let mut fp = GraphFootprint::new();
        fp.add_pairwise(64, 1); // 512 bytes
        assert_eq!(fp.size_kib(), 1);
        fp.add_pairwise(64, 1); // 1024 bytes -> 2048 with headroom
        assert_eq!(fp.size_kib(), 2);
        fp.add_pairwise(1, 1); // 1032 bytes -> 2064
        assert_eq!(fp.size_kib(), 3);
    }

    #[test]
    fn chained_counts_and_fixed_config() {
        let mut fp = GraphFootprint::new();
        fp.add_unary(5, 1, 1)
            .add_unary(5, 1, 1)
            .add_uniqueness(2)
            .add_pairwise(5, 5);
        assert_eq!(fp.node_counts(), (2, 1, 1));
        let config = fp.fixed_config();
        assert!(config.validate().is_ok());
        assert_eq!(config, ArenaConfig::fixed_kib(fp.size_kib()));
    }

    #[test]
    fn huge_counts_saturate() {
        let mut fp = GraphFootprint::new();
        fp.add_pairwise(usize::MAX, 2);
        assert_eq!(fp.cost_bytes(), usize::MAX);
    }
}
