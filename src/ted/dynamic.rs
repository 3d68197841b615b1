//! Incremental distance driver.
//!
//! [DynamicTed] answers a sequence of distance queries over evolving trees.
//! The first, baseline query runs a plain bound-finding pass and caches its
//! subtree-distance band. Every later query receives the predecessor and
//! successor of whichever tree changed, plus the parser's retain map, and
//! reuses cached cross-tree distances wherever a preparation pass proves
//! the relevant subtrees survived unchanged.
//!
//! A retained node only guarantees that the *node* came over from the old
//! tree; reuse needs the whole subtree under it to be identical. The
//! preparation pass (old tree vs. new tree, same engine) provides exactly
//! that evidence for free: a zero in its band at `(old_postl, new_postl)`
//! says the two subtrees are equal, and only then may the old cross-tree
//! row stand in for the new one.

use crate::parser::RetainMap;
use crate::ted::band::BandMatrix;
use crate::ted::touzet::Touzet;
use crate::tree::index::TreeIndex;
use crate::tree::labels::CostModel;
use std::collections::HashMap;

/// Mapping `new postorder id → old postorder id` of verified-identical
/// subtrees.
pub type PreservedSubtrees = HashMap<usize, usize>;

/// Incremental TED driver with a cross-call distance cache.
///
/// Owns a [Touzet] engine plus the cache of the previous cross-tree pass:
/// its band matrix, final distance, and band parameter. The cache starts
/// empty, is populated by [DynamicTed::ted], and is refreshed by every
/// incremental call. One driver serves one evolving tree pair; independent
/// pairs need independent drivers.
#[derive(Debug)]
pub struct DynamicTed<C: CostModel> {
    touzet: Touzet<C>,

    td_old: BandMatrix,
    d_old: f64,
    k_old: i64,
    primed: bool,

    t1_preserved: PreservedSubtrees,
    t2_preserved: PreservedSubtrees,

    t1_d: f64,
    t2_d: f64,
    t1_prep_subproblems: u64,
    t2_prep_subproblems: u64,
    hit: u64,
    missed: u64,
    retries: u32,
}

impl<C: CostModel> DynamicTed<C> {
    /// Creates a driver with an empty cache.
    pub fn new(cost: C) -> Self {
        Self {
            touzet: Touzet::new(cost),
            td_old: BandMatrix::default(),
            d_old: 0.0,
            k_old: 0,
            primed: false,
            t1_preserved: PreservedSubtrees::new(),
            t2_preserved: PreservedSubtrees::new(),
            t1_d: 0.0,
            t2_d: 0.0,
            t1_prep_subproblems: 0,
            t2_prep_subproblems: 0,
            hit: 0,
            missed: 0,
            retries: 0,
        }
    }

    /// Baseline distance; primes the cache.
    ///
    /// Runs the threshold pass at `k = |n1 − n2| + 1` and quadruples `k`
    /// until the distance fits, then commits the filled band as the cache.
    /// Unlike the preparation passes this never short-circuits on equal
    /// trees: an incremental successor needs the band even when the
    /// baseline distance was 0.
    pub fn ted(&mut self, t1: &TreeIndex, t2: &TreeIndex) -> f64 {
        self.reset_statistics();

        let mut k = (t1.tree_size() as i64 - t2.tree_size() as i64).abs() + 1;
        let mut distance = self.touzet.ted_k(t1, t2, k);
        while distance > k as f64 {
            k <<= 2;
            self.retries += 1;
            distance = self.touzet.ted_k(t1, t2, k);
        }

        self.d_old = distance;
        self.k_old = distance.ceil() as i64;
        self.td_old = std::mem::take(&mut self.touzet.td);
        self.primed = true;
        distance
    }

    /// Incremental distance after both trees changed.
    ///
    /// `r1`/`r2` are the parser's retain maps (`new_prel → old_prel`).
    /// Runs a preparation pass per tree, derives `k` from the triangle
    /// inequality `d(T1', T2') ≤ d(T1', T1) + d(T1, T2) + d(T2, T2')` (an
    /// upper bound, so no retry loop is needed), then one cross-tree pass
    /// that reuses every cached distance the preserved subtrees license.
    ///
    /// # Panics
    /// Panics if no baseline call primed the cache.
    pub fn ted_incremental(
        &mut self,
        t1_old: &TreeIndex,
        t1_new: &TreeIndex,
        r1: &RetainMap,
        t2_old: &TreeIndex,
        t2_new: &TreeIndex,
        r2: &RetainMap,
    ) -> f64 {
        assert!(self.primed, "incremental query before any baseline");
        self.reset_statistics();
        self.t1_preserved.clear();
        self.t2_preserved.clear();

        (self.t1_d, self.t1_prep_subproblems) =
            prepare(&mut self.touzet, &mut self.t1_preserved, t1_old, t1_new, r1);
        (self.t2_d, self.t2_prep_subproblems) =
            prepare(&mut self.touzet, &mut self.t2_preserved, t2_old, t2_new, r2);

        let k = (self.t1_d + self.t2_d + self.d_old).ceil() as i64;

        let changed = self.t1_d > 0.0 || self.t2_d > 0.0;
        let distance = if self.t1_d > 0.0 && self.t2_d > 0.0 {
            self.dynamic_ted_k::<false, false>(t1_new, t2_new, k)
        } else if self.t1_d > 0.0 {
            self.dynamic_ted_k::<false, true>(t1_new, t2_new, k)
        } else if self.t2_d > 0.0 {
            self.dynamic_ted_k::<true, false>(t1_new, t2_new, k)
        } else {
            // Neither tree moved: the cache answers verbatim.
            self.d_old
        };

        self.commit(distance, k, changed);
        distance
    }

    /// Incremental distance after only the first tree changed.
    ///
    /// # Panics
    /// Panics if no baseline call primed the cache.
    pub fn ted_incremental_t1(
        &mut self,
        t1_old: &TreeIndex,
        t1_new: &TreeIndex,
        r1: &RetainMap,
        t2_old: &TreeIndex,
    ) -> f64 {
        assert!(self.primed, "incremental query before any baseline");
        self.reset_statistics();
        self.t1_preserved.clear();
        self.t2_preserved.clear();

        (self.t1_d, self.t1_prep_subproblems) =
            prepare(&mut self.touzet, &mut self.t1_preserved, t1_old, t1_new, r1);

        let k = (self.t1_d + self.d_old).ceil() as i64;
        let changed = self.t1_d > 0.0;
        let distance = if changed {
            self.dynamic_ted_k::<false, true>(t1_new, t2_old, k)
        } else {
            self.d_old
        };

        self.commit(distance, k, changed);
        distance
    }

    /// Incremental distance after only the second tree changed.
    ///
    /// # Panics
    /// Panics if no baseline call primed the cache.
    pub fn ted_incremental_t2(
        &mut self,
        t1_old: &TreeIndex,
        t2_old: &TreeIndex,
        t2_new: &TreeIndex,
        r2: &RetainMap,
    ) -> f64 {
        assert!(self.primed, "incremental query before any baseline");
        self.reset_statistics();
        self.t1_preserved.clear();
        self.t2_preserved.clear();

        (self.t2_d, self.t2_prep_subproblems) =
            prepare(&mut self.touzet, &mut self.t2_preserved, t2_old, t2_new, r2);

        let k = (self.t2_d + self.d_old).ceil() as i64;
        let changed = self.t2_d > 0.0;
        let distance = if changed {
            self.dynamic_ted_k::<true, false>(t1_old, t2_new, k)
        } else {
            self.d_old
        };

        self.commit(distance, k, changed);
        distance
    }

    /// Cross-tree pass that splices cached distances into a fresh band.
    ///
    /// The flag pair selects the reuse strategy and is monomorphized so the
    /// hot loop carries no per-cell mode dispatch; only the three
    /// combinations `(false, false)`, `(true, false)` and `(false, true)`
    /// are ever instantiated. Every cache read is guarded by the old band
    /// parameter: cells outside `|a − b| ≤ k_old` were never filled.
    fn dynamic_ted_k<const T1_SAME: bool, const T2_SAME: bool>(
        &mut self,
        t1: &TreeIndex,
        t2: &TreeIndex,
        k: i64,
    ) -> f64 {
        let n1 = t1.tree_size();
        let n2 = t2.tree_size();

        self.touzet.init_matrices(n1, k);

        if (n1 as i64 - n2 as i64).abs() > k {
            return f64::INFINITY;
        }

        for x in 0..n1 {
            let lo = (x as i64 - k).max(0) as usize;
            let hi = ((x as i64 + k).min(n2 as i64 - 1)) as usize;
            for y in lo..=hi {
                let mut distance = f64::INFINITY;

                if !T1_SAME && !T2_SAME {
                    if let (Some(&xo), Some(&yo)) =
                        (self.t1_preserved.get(&x), self.t2_preserved.get(&y))
                    {
                        if (xo as i64 - yo as i64).abs() <= self.k_old {
                            distance = self.td_old.read_at(xo, yo);
                        }
                    }
                } else if T1_SAME {
                    if let Some(&yo) = self.t2_preserved.get(&y) {
                        if (x as i64 - yo as i64).abs() <= self.k_old {
                            distance = self.td_old.read_at(x, yo);
                        }
                    }
                } else if T2_SAME {
                    if let Some(&xo) = self.t1_preserved.get(&x) {
                        if (xo as i64 - y as i64).abs() <= self.k_old {
                            distance = self.td_old.read_at(xo, y);
                        }
                    }
                }

                if distance.is_finite() {
                    *self.touzet.td.at_mut(x, y) = distance;
                    self.hit += 1;
                } else if self.touzet.k_relevant(t1, t2, x, y, k) {
                    let e = self.touzet.e_budget(t1, t2, x, y, k);
                    let d = self.touzet.tree_dist(t1, t2, x, y, k, e);
                    if d <= e as f64 {
                        *self.touzet.td.at_mut(x, y) = d;
                    }
                    self.missed += 1;
                }
                // Anything else was irrelevant before and still is.
            }
        }

        self.touzet.td.read_at(n1 - 1, n2 - 1)
    }

    fn commit(&mut self, distance: f64, k: i64, changed: bool) {
        self.k_old = k;
        self.d_old = distance;
        if changed {
            self.td_old = std::mem::take(&mut self.touzet.td);
        }
    }

    fn reset_statistics(&mut self) {
        self.t1_d = 0.0;
        self.t2_d = 0.0;
        self.t1_prep_subproblems = 0;
        self.t2_prep_subproblems = 0;
        self.hit = 0;
        self.missed = 0;
        self.retries = 0;
    }

    /// Distance committed by the most recent query.
    pub fn distance(&self) -> f64 {
        self.d_old
    }

    /// Band parameter the cache was filled at.
    pub fn band_bound(&self) -> i64 {
        self.k_old
    }

    /// Distance of the first tree's preparation pass.
    pub fn t1_prep_distance(&self) -> f64 {
        self.t1_d
    }

    /// Distance of the second tree's preparation pass.
    pub fn t2_prep_distance(&self) -> f64 {
        self.t2_d
    }

    /// Forest evaluations spent on the first preparation pass.
    pub fn t1_prep_subproblems(&self) -> u64 {
        self.t1_prep_subproblems
    }

    /// Forest evaluations spent on the second preparation pass.
    pub fn t2_prep_subproblems(&self) -> u64 {
        self.t2_prep_subproblems
    }

    /// Forest evaluations spent on the most recent cross-tree pass.
    pub fn subproblems(&self) -> u64 {
        self.touzet.subproblems()
    }

    /// Cross-tree cells answered from the cache in the last query.
    pub fn hits(&self) -> u64 {
        self.hit
    }

    /// Cross-tree cells recomputed in the last query.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Threshold escalations during the last baseline query.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Cached distance between the subtree pair `(x, y)` of the previous
    /// query's trees, postorder-indexed; `+∞` when the cache holds nothing
    /// for that pair.
    ///
    /// Reads are clamped to the band the cache was filled at, so a cell the
    /// previous pass never touched can never leak a stale value.
    pub fn cached_subtree_distance(&self, x: usize, y: usize) -> f64 {
        if (x as i64 - y as i64).abs() <= self.k_old {
            self.td_old.read_at(x, y)
        } else {
            f64::INFINITY
        }
    }

    /// Verified-identical subtrees of the first tree, `new → old` postorder.
    pub fn t1_preserved_subtrees(&self) -> &PreservedSubtrees {
        &self.t1_preserved
    }

    /// Verified-identical subtrees of the second tree, `new → old` postorder.
    pub fn t2_preserved_subtrees(&self) -> &PreservedSubtrees {
        &self.t2_preserved
    }
}

/// Preparation pass: distance between the old and new revision of one tree,
/// plus the preserved-subtree evidence extracted from its band.
///
/// Equal revisions short-circuit inside [Touzet::ted]; a changed revision
/// walks the retain map, translates both sides to postorder, and keeps the
/// pairs whose cached distance is exactly zero. Retained ids outside either
/// tree are ignored: the retain map is caller input, not trusted evidence.
fn prepare<C: CostModel>(
    touzet: &mut Touzet<C>,
    preserved: &mut PreservedSubtrees,
    old: &TreeIndex,
    new: &TreeIndex,
    retained: &RetainMap,
) -> (f64, u64) {
    let distance = touzet.ted(old, new);
    if distance > 0.0 {
        for (&new_prel, &old_prel) in retained {
            if new_prel >= new.tree_size() || old_prel >= old.tree_size() {
                continue;
            }
            let new_postl = new.prel_to_postl(new_prel);
            let old_postl = old.prel_to_postl(old_prel);
            if touzet.td.read_at(old_postl, new_postl) == 0.0 {
                preserved.insert(new_postl, old_postl);
            }
        }
    }
    (distance, touzet.subproblems())
}
