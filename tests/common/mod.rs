//! Shared builders and an independent reference implementation.

#![allow(dead_code)]

use std::collections::HashMap;

use tedi::parser::parse;
use tedi::tree::index::TreeIndex;
use tedi::tree::labels::{LabelDictionary, UnitCostModel};
use tedi::DynamicTed;

/// Parses and indexes a bracket source against the shared dictionary.
pub fn index_of(source: &str, labels: &mut LabelDictionary) -> TreeIndex {
    let tree = parse(source).expect("test tree must parse");
    TreeIndex::build(&tree, labels).expect("test tree must index")
}

/// A fresh unit-cost driver.
pub fn driver() -> DynamicTed<UnitCostModel> {
    DynamicTed::new(UnitCostModel)
}

/// Baseline distance from a throwaway driver.
pub fn fresh_baseline(t1: &TreeIndex, t2: &TreeIndex) -> f64 {
    driver().ted(t1, t2)
}

/// A small catalog of structurally varied trees for property sweeps.
pub fn catalog() -> Vec<&'static str> {
    vec![
        "{(a)}",
        "{(b)}",
        "{(a){(b)}}",
        "{(a){(b)}{(c)}}",
        "{(a){(b){(d)}{(e)}}{(c)}}",
        "{(a){(b){(c){(d)}}}}",
        "{(x){(y)}{(y)}{(y)}}",
        "{(a){(c)}{(b){(d)}}}",
    ]
}

/// A root-to-leaf chain over the given labels.
pub fn chain(labels: &[&str]) -> String {
    let mut out = String::new();
    for label in labels {
        out.push('{');
        out.push('(');
        out.push_str(label);
        out.push(')');
    }
    out.push_str(&"}".repeat(labels.len()));
    out
}

/// Unit-cost reference distance: the keyroot-driven quadratic algorithm,
/// kept obvious rather than fast. Shares nothing with the banded engine
/// beyond the tree index arrays.
pub fn reference_ted(t1: &TreeIndex, t2: &TreeIndex) -> f64 {
    reference_subtree_distances(t1, t2)[t1.tree_size() - 1][t2.tree_size() - 1]
}

/// Reference distances for every subtree pair, postorder-indexed.
pub fn reference_subtree_distances(t1: &TreeIndex, t2: &TreeIndex) -> Vec<Vec<f64>> {
    let n1 = t1.tree_size();
    let n2 = t2.tree_size();
    let kr1 = keyroots(t1);
    let kr2 = keyroots(t2);
    let mut td = vec![vec![0.0f64; n2]; n1];

    for &i in &kr1 {
        for &j in &kr2 {
            keyroot_pass(t1, t2, i, j, &mut td);
        }
    }
    td
}

/// Keyroots: per leftmost-leaf value, the highest node owning it.
fn keyroots(t: &TreeIndex) -> Vec<usize> {
    let mut last: HashMap<usize, usize> = HashMap::new();
    for x in 0..t.tree_size() {
        last.insert(t.postl_to_lld(x), x);
    }
    let mut kr: Vec<usize> = last.into_values().collect();
    kr.sort_unstable();
    kr
}

fn keyroot_pass(t1: &TreeIndex, t2: &TreeIndex, i: usize, j: usize, td: &mut [Vec<f64>]) {
    let li = t1.postl_to_lld(i);
    let lj = t2.postl_to_lld(j);
    let m = i - li + 2;
    let n = j - lj + 2;
    let mut fd = vec![vec![0.0f64; n]; m];

    for a in 1..m {
        fd[a][0] = fd[a - 1][0] + 1.0;
    }
    for b in 1..n {
        fd[0][b] = fd[0][b - 1] + 1.0;
    }
    for a in 1..m {
        let u = li + a - 1;
        for b in 1..n {
            let v = lj + b - 1;
            if t1.postl_to_lld(u) == li && t2.postl_to_lld(v) == lj {
                let ren = if t1.postl_to_label_id(u) == t2.postl_to_label_id(v) {
                    0.0
                } else {
                    1.0
                };
                fd[a][b] = (fd[a - 1][b] + 1.0)
                    .min(fd[a][b - 1] + 1.0)
                    .min(fd[a - 1][b - 1] + ren);
                td[u][v] = fd[a][b];
            } else {
                let a1 = t1.postl_to_lld(u) - li;
                let b1 = t2.postl_to_lld(v) - lj;
                fd[a][b] = (fd[a - 1][b] + 1.0)
                    .min(fd[a][b - 1] + 1.0)
                    .min(fd[a1][b1] + td[u][v]);
            }
        }
    }
}
