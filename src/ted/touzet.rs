//! Threshold-bounded tree edit distance.
//!
//! [Touzet] computes the exact edit distance between two trees whenever it
//! is at most a threshold `k`, in `O(n·k³)` instead of the unconstrained
//! cubic algorithms. Three prunings keep the subproblem set small:
//!
//! - only subtree pairs inside the postorder band `|x − y| ≤ k` can take
//!   part in a mapping of cost `≤ k`;
//! - [Touzet::k_relevant] discards pairs whose surrounding span mismatch
//!   already forces more than `k` edits;
//! - each surviving pair gets an error budget `e ≤ k`
//!   ([Touzet::e_budget]); its forest distances are evaluated only in the
//!   `|i − j| ≤ e` strip, and subtree links whose depths below the pair's
//!   roots differ by more than `e` are pruned outright.
//!
//! A computed subtree distance is committed to the `td` matrix only when it
//! does not exceed the pair's budget. Strip values above the budget are
//! upper bounds rather than exact distances, so committing them would let a
//! later pass mistake an estimate for the real thing; with the guard, every
//! stored cell is exact and an untouched cell reads `+∞`.

use crate::ted::band::BandMatrix;
use crate::tree::index::TreeIndex;
use crate::tree::labels::CostModel;

/// Threshold-bounded TED engine.
///
/// Owns the subtree-distance band matrix `td`, the forest-distance scratch
/// band `fd`, and the subproblem counter. One engine is reused across
/// passes; every pass reinitializes both matrices.
#[derive(Debug)]
pub struct Touzet<C: CostModel> {
    cost: C,
    pub(crate) td: BandMatrix,
    fd: BandMatrix,
    subproblems: u64,
}

impl<C: CostModel> Touzet<C> {
    /// Creates an engine over the given cost model.
    pub fn new(cost: C) -> Self {
        Self {
            cost,
            td: BandMatrix::default(),
            fd: BandMatrix::default(),
            subproblems: 0,
        }
    }

    /// Forest-distance evaluations performed by the most recent pass.
    pub fn subproblems(&self) -> u64 {
        self.subproblems
    }

    /// Allocates fresh matrices for a pass over `n1`-row bands of width `k`.
    pub(crate) fn init_matrices(&mut self, n1: usize, k: i64) {
        self.td = BandMatrix::new(n1, k);
        self.fd = BandMatrix::new(n1 + 1, k + 1);
        self.subproblems = 0;
    }

    /// Bound-finding distance: grows `k` until the result is feasible.
    ///
    /// Identical trees (equal index arrays) short-circuit to 0 without
    /// touching the matrices; the incremental driver reads that as "the
    /// preparation pass has nothing to offer". Otherwise `k` starts at the
    /// size difference plus one and is quadrupled until the distance fits:
    /// each retry costs roughly `(k'/k)²` subproblems, so the 4× step keeps
    /// the wasted work a geometric series while the retry count stays
    /// logarithmic.
    pub fn ted(&mut self, t1: &TreeIndex, t2: &TreeIndex) -> f64 {
        if t1 == t2 {
            self.subproblems = 0;
            return 0.0;
        }
        let mut k = (t1.tree_size() as i64 - t2.tree_size() as i64).abs() + 1;
        let mut distance = self.ted_k(t1, t2, k);
        while distance > k as f64 {
            k <<= 2;
            distance = self.ted_k(t1, t2, k);
        }
        distance
    }

    /// Distance under threshold `k`: exact when the distance is `≤ k`,
    /// `+∞` otherwise.
    ///
    /// After the call, `td` holds the exact subtree-pair distance for every
    /// in-band pair whose computation fit its budget; all other cells are
    /// `+∞`.
    ///
    /// # Panics
    /// Panics if `k < 0`.
    pub fn ted_k(&mut self, t1: &TreeIndex, t2: &TreeIndex, k: i64) -> f64 {
        assert!(k >= 0, "threshold must be non-negative, got {k}");
        let n1 = t1.tree_size();
        let n2 = t2.tree_size();

        self.init_matrices(n1, k);

        if (n1 as i64 - n2 as i64).abs() > k {
            return f64::INFINITY;
        }

        for x in 0..n1 {
            let lo = (x as i64 - k).max(0) as usize;
            let hi = ((x as i64 + k).min(n2 as i64 - 1)) as usize;
            for y in lo..=hi {
                if self.k_relevant(t1, t2, x, y, k) {
                    let e = self.e_budget(t1, t2, x, y, k);
                    let d = self.tree_dist(t1, t2, x, y, k, e);
                    if d <= e as f64 {
                        *self.td.at_mut(x, y) = d;
                    }
                }
            }
        }

        self.td.read_at(n1 - 1, n2 - 1)
    }

    /// Whether the subtree pair `(x, y)` can appear in any mapping of cost
    /// `≤ k`.
    ///
    /// The span lower bound adds up the mismatches the pair forces outside
    /// itself: nodes after the subtrees, the subtree sizes, and nodes to
    /// their left. The bound composes through the DP decomposition, which
    /// is what lets irrelevant cells stay `+∞` without hurting exactness.
    pub(crate) fn k_relevant(
        &self,
        t1: &TreeIndex,
        t2: &TreeIndex,
        x: usize,
        y: usize,
        k: i64,
    ) -> bool {
        let n1 = t1.tree_size() as i64;
        let n2 = t2.tree_size() as i64;
        let (xi, yi) = (x as i64, y as i64);
        let x_size = t1.postl_to_size(x) as i64;
        let y_size = t2.postl_to_size(y) as i64;

        let nodes_after = ((n1 - (xi + 1)) - (n2 - (yi + 1))).abs();
        let size_diff = (x_size - y_size).abs();
        let nodes_left = (((xi + 1) - x_size) - ((yi + 1) - y_size)).abs();

        nodes_after + size_diff + nodes_left <= k
    }

    /// Error budget left for the pair `(x, y)` after paying for the span
    /// mismatch around it. Non-negative whenever [Touzet::k_relevant] held.
    pub(crate) fn e_budget(
        &self,
        t1: &TreeIndex,
        t2: &TreeIndex,
        x: usize,
        y: usize,
        k: i64,
    ) -> i64 {
        let n1 = t1.tree_size() as i64;
        let n2 = t2.tree_size() as i64;
        let (xi, yi) = (x as i64, y as i64);
        let x_size = t1.postl_to_size(x) as i64;
        let y_size = t2.postl_to_size(y) as i64;

        let nodes_after = ((n1 - (xi + 1)) - (n2 - (yi + 1))).abs();
        let nodes_left = (((xi + 1) - x_size) - ((yi + 1) - y_size)).abs();

        k - nodes_after - nodes_left
    }

    /// Strip-bounded forest-distance DP for the subtrees rooted at
    /// postorder `x` in `t1` and `y` in `t2`.
    ///
    /// Evaluates prefix-forest distances `fd(i, j)` for `|i − j| ≤ e` over
    /// the postorder sequences of the two subtrees, reading distances of
    /// strictly smaller subtree pairs out of `td`. The result is exact when
    /// the true distance is `≤ e`, otherwise an upper bound; the caller
    /// decides whether to commit it.
    pub(crate) fn tree_dist(
        &mut self,
        t1: &TreeIndex,
        t2: &TreeIndex,
        x: usize,
        y: usize,
        k: i64,
        e: i64,
    ) -> f64 {
        debug_assert!((0..=k).contains(&e), "budget {e} outside 0..={k}");
        let x_size = t1.postl_to_size(x);
        let y_size = t2.postl_to_size(y);
        // Postorder id of the leftmost node in each subtree; row i / column
        // j stand for the prefix holding the first i / j subtree nodes.
        let x_base = x + 1 - x_size;
        let y_base = y + 1 - y_size;

        // Reads clamp to the strip, so cells beyond it act as +inf and
        // leftovers from earlier passes are never observed.
        let strip = |fd: &BandMatrix, i: usize, j: usize| -> f64 {
            if (i as i64 - j as i64).abs() <= e {
                fd.read_at(i, j)
            } else {
                f64::INFINITY
            }
        };

        *self.fd.at_mut(0, 0) = 0.0;
        for j in 1..=y_size.min(e as usize) {
            let ins = self.cost.ins(t2.postl_to_label_id(y_base + j - 1));
            *self.fd.at_mut(0, j) = self.fd.read_at(0, j - 1) + ins;
        }
        for i in 1..=x_size.min(e as usize) {
            let del = self.cost.del(t1.postl_to_label_id(x_base + i - 1));
            *self.fd.at_mut(i, 0) = self.fd.read_at(i - 1, 0) + del;
        }

        let x_depth = t1.postl_to_depth(x) as i64;
        let y_depth = t2.postl_to_depth(y) as i64;

        for i in 1..=x_size {
            let u = x_base + i - 1;
            let u_label = t1.postl_to_label_id(u);
            // Nodes of the prefix lying left of the subtree rooted at u.
            let i1 = t1.postl_to_lld(u) - x_base;
            let u_depth = t1.postl_to_depth(u) as i64 - x_depth;
            let lo = (i as i64 - e).max(1) as usize;
            let hi = ((i as i64 + e).min(y_size as i64)) as usize;
            for j in lo..=hi {
                self.subproblems += 1;
                let v = y_base + j - 1;
                let v_label = t2.postl_to_label_id(v);
                let j1 = t2.postl_to_lld(v) - y_base;

                let mut d = strip(&self.fd, i - 1, j) + self.cost.del(u_label);
                d = d.min(strip(&self.fd, i, j - 1) + self.cost.ins(v_label));
                if i1 == 0 && j1 == 0 {
                    // Both prefixes are single trees rooted at u and v.
                    d = d.min(strip(&self.fd, i - 1, j - 1) + self.cost.ren(u_label, v_label));
                } else {
                    // Match the rightmost trees wholesale. Depth pruning:
                    // pairing subtrees whose depths below the roots differ
                    // by more than e leaves more than e ancestors
                    // unmatched, so the link cannot beat plain deletion
                    // and insertion, which the strip already covers.
                    let v_depth = t2.postl_to_depth(v) as i64 - y_depth;
                    if (u_depth - v_depth).abs() <= e {
                        d = d.min(strip(&self.fd, i1, j1) + self.td.read_at(u, v));
                    }
                }
                *self.fd.at_mut(i, j) = d;
            }
        }

        strip(&self.fd, x_size, y_size)
    }
}
