//! QAP graph fixtures built on top of the arena.
//!
//! A stand-in for the solver's graph builder: nodes are placed through
//! [`ArenaAlloc`] adapters, each node's costs sit in an arena-backed array,
//! and pairwise and uniqueness nodes hold plain references to the unary
//! nodes they connect. None of it would be sound if the arena ever moved
//! memory.
//!
//! - [`GraphShape`]: node counts and label sizes, optionally random.
//! - [`QapGraph`]: incremental builder over one arena.
//! - [`GraphView`]: the finished, read-only graph.

use mpopt_arena::{Arena, ArenaAlloc, ArenaError, GraphFootprint, OsMemory, VirtualMemory};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A variable with one cost per label.
#[derive(Debug)]
pub struct UnaryNode<'a> {
    /// Position in [`GraphView::unaries`].
    pub idx: usize,
    /// One cost per label.
    pub costs: &'a [f64],
}

/// Costs for every label pair of two unary nodes, row-major.
#[derive(Debug)]
pub struct PairwiseNode<'a> {
    /// Position in [`GraphView::pairwise`].
    pub idx: usize,
    /// Row node.
    pub unary0: &'a UnaryNode<'a>,
    /// Column node.
    pub unary1: &'a UnaryNode<'a>,
    /// `labels(unary0) * labels(unary1)` costs.
    pub costs: &'a [f64],
}

impl PairwiseNode<'_> {
    /// Cost of assigning `label0` to `unary0` and `label1` to `unary1`.
    pub fn cost(&self, label0: usize, label1: usize) -> f64 {
        self.costs[label0 * self.unary1.costs.len() + label1]
    }
}

/// At most one of `unaries` may take `label`; the last cost slot is the
/// dummy that leaves the label unassigned.
#[derive(Debug)]
pub struct UniquenessNode<'a> {
    /// Position in [`GraphView::uniqueness`].
    pub idx: usize,
    /// The label this node constrains.
    pub label: usize,
    /// Unary nodes competing for `label`.
    pub unaries: &'a [&'a UnaryNode<'a>],
    /// One cost per member plus the dummy slot.
    pub costs: &'a [f64],
}

/// Builds a graph node by node inside one arena.
pub struct QapGraph<'a, P: VirtualMemory = OsMemory> {
    alloc: ArenaAlloc<'a, u8, P>,
    view: GraphView<'a>,
}

impl<'a, P: VirtualMemory> QapGraph<'a, P> {
    /// An empty graph drawing from `arena`.
    pub fn new(arena: &'a Arena<P>) -> Self {
        Self {
            alloc: ArenaAlloc::from(arena),
            view: GraphView::default(),
        }
    }

    /// Place a unary node and a copy of its costs.
    pub fn add_unary(&mut self, costs: &[f64]) -> Result<&'a UnaryNode<'a>, ArenaError> {
        let costs = self.alloc.rebind::<f64>().alloc_slice_copy(costs)?;
        let node: &'a UnaryNode<'a> = self.alloc.rebind::<UnaryNode<'a>>().alloc(UnaryNode {
            idx: self.view.unaries.len(),
            costs,
        })?;
        self.view.unaries.push(node);
        Ok(node)
    }

    /// Place a pairwise node linking two existing unary nodes.
    ///
    /// # Panics
    ///
    /// Panics if either index is unknown or `costs` is not
    /// `labels(u0) * labels(u1)` long.
    pub fn add_pairwise(
        &mut self,
        u0: usize,
        u1: usize,
        costs: &[f64],
    ) -> Result<&'a PairwiseNode<'a>, ArenaError> {
        let unary0 = self.view.unaries[u0];
        let unary1 = self.view.unaries[u1];
        assert_eq!(
            costs.len(),
            unary0.costs.len() * unary1.costs.len(),
            "pairwise cost table has wrong size"
        );
        let costs = self.alloc.rebind::<f64>().alloc_slice_copy(costs)?;
        let node: &'a PairwiseNode<'a> = self.alloc.rebind::<PairwiseNode<'a>>().alloc(PairwiseNode {
            idx: self.view.pairwise.len(),
            unary0,
            unary1,
            costs,
        })?;
        self.view.pairwise.push(node);
        Ok(node)
    }

    /// Place a uniqueness node over `members` with zeroed costs.
    ///
    /// # Panics
    ///
    /// Panics if a member index is unknown.
    pub fn add_uniqueness(
        &mut self,
        label: usize,
        members: &[usize],
    ) -> Result<&'a UniquenessNode<'a>, ArenaError> {
        let refs: Vec<&'a UnaryNode<'a>> = members.iter().map(|&i| self.view.unaries[i]).collect();
        let unaries = self.alloc.rebind::<&'a UnaryNode<'a>>().alloc_slice_copy(&refs)?;
        let costs = self
            .alloc
            .rebind::<f64>()
            .alloc_slice_fill(members.len() + 1, 0.0)?;
        let node: &'a UniquenessNode<'a> = self
            .alloc
            .rebind::<UniquenessNode<'a>>()
            .alloc(UniquenessNode {
                idx: self.view.uniqueness.len(),
                label,
                unaries,
                costs,
            })?;
        self.view.uniqueness.push(node);
        Ok(node)
    }

    /// End construction. The arena is not touched again through this graph.
    pub fn finish(self) -> GraphView<'a> {
        self.view
    }
}

/// A finished graph. `Sync`, so solver phases can read it from many threads.
#[derive(Debug, Default)]
pub struct GraphView<'a> {
    /// Unary nodes in insertion order.
    pub unaries: Vec<&'a UnaryNode<'a>>,
    /// Pairwise nodes in insertion order.
    pub pairwise: Vec<&'a PairwiseNode<'a>>,
    /// Uniqueness nodes, one per label.
    pub uniqueness: Vec<&'a UniquenessNode<'a>>,
}

impl GraphView<'_> {
    /// Total cost of a full labeling.
    pub fn evaluate(&self, labeling: &[usize]) -> f64 {
        let unary: f64 = self
            .unaries
            .iter()
            .map(|u| u.costs[labeling[u.idx]])
            .sum();
        let pairwise: f64 = self
            .pairwise
            .iter()
            .map(|p| p.cost(labeling[p.unary0.idx], labeling[p.unary1.idx]))
            .sum();
        unary + pairwise
    }

    /// Sum of every node's cheapest entry; a trivial lower bound.
    pub fn naive_lower_bound(&self) -> f64 {
        let min = |costs: &[f64]| costs.iter().copied().fold(f64::INFINITY, f64::min);
        let unary: f64 = self.unaries.iter().map(|u| min(u.costs)).sum();
        let pairwise: f64 = self.pairwise.iter().map(|p| min(p.costs)).sum();
        unary + pairwise
    }
}

/// Node counts and label sizes of a QAP graph, without any costs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphShape {
    /// Label count of each unary node.
    pub labels: Vec<usize>,
    /// Pairwise connections between unary nodes, `(lower, higher)` index.
    pub edges: Vec<(usize, usize)>,
}

impl GraphShape {
    /// A seeded random sparse graph.
    ///
    /// Every unary gets `1..=max_labels` labels and up to
    /// `edges_per_unary` connections to later unaries.
    pub fn random(seed: u64, unaries: usize, max_labels: usize, edges_per_unary: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let labels = (0..unaries)
            .map(|_| 1 + below(&mut rng, max_labels.max(1)))
            .collect();
        let mut edges = Vec::new();
        for i in 0..unaries.saturating_sub(1) {
            let mut partners: Vec<usize> = (0..edges_per_unary)
                .map(|_| i + 1 + below(&mut rng, unaries - i - 1))
                .collect();
            partners.sort_unstable();
            partners.dedup();
            edges.extend(partners.into_iter().map(|j| (i, j)));
        }
        Self { labels, edges }
    }

    /// Unary indices that own `label`, one uniqueness node per label.
    pub fn uniqueness_members(&self) -> Vec<Vec<usize>> {
        let max = self.labels.iter().copied().max().unwrap_or(0);
        (0..max)
            .map(|label| {
                self.labels
                    .iter()
                    .enumerate()
                    .filter(|&(_, &n)| n > label)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect()
    }

    /// Arena memory estimate for this shape.
    pub fn footprint(&self) -> GraphFootprint {
        let mut fp = GraphFootprint::new();
        for (i, &labels) in self.labels.iter().enumerate() {
            let forward = self.edges.iter().filter(|&&(a, _)| a == i).count();
            let backward = self.edges.iter().filter(|&&(_, b)| b == i).count();
            fp.add_unary(labels, forward, backward);
        }
        for members in self.uniqueness_members() {
            fp.add_uniqueness(members.len());
        }
        for &(a, b) in &self.edges {
            fp.add_pairwise(self.labels[a], self.labels[b]);
        }
        fp
    }

    /// Place the whole graph in `arena` with deterministic costs.
    pub fn build<'a, P: VirtualMemory>(
        &self,
        arena: &'a Arena<P>,
    ) -> Result<GraphView<'a>, ArenaError> {
        let mut graph = QapGraph::new(arena);
        for (i, &labels) in self.labels.iter().enumerate() {
            let costs: Vec<f64> = (0..labels).map(|l| unary_cost(i, l)).collect();
            graph.add_unary(&costs)?;
        }
        for (idx, &(a, b)) in self.edges.iter().enumerate() {
            let (la, lb) = (self.labels[a], self.labels[b]);
            let costs: Vec<f64> = (0..la * lb)
                .map(|k| pairwise_cost(idx, k / lb, k % lb))
                .collect();
            graph.add_pairwise(a, b, &costs)?;
        }
        for (label, members) in self.uniqueness_members().iter().enumerate() {
            graph.add_uniqueness(label, members)?;
        }
        Ok(graph.finish())
    }
}

/// Deterministic unary cost used by [`GraphShape::build`].
pub fn unary_cost(node: usize, label: usize) -> f64 {
    ((node * 7 + label * 3) % 11) as f64
}

/// Deterministic pairwise cost used by [`GraphShape::build`].
pub fn pairwise_cost(node: usize, label0: usize, label1: usize) -> f64 {
    ((node + label0 + 2 * label1) % 5) as f64
}

fn below(rng: &mut ChaCha8Rng, n: usize) -> usize {
    (rng.next_u64() % n as u64) as usize
}
