//! The central property: an incremental driver answers every step of an
//! edit sequence with exactly the distance a fresh baseline would compute.

mod common;
use common::*;

use tedi::parser::{parse_incremental, RetainMap};
use tedi::tree::index::TreeIndex;
use tedi::tree::labels::{LabelDictionary, UnitCostModel};
use tedi::DynamicTed;

/// One evolving tree pair driven the way the CLI drives it: annotated
/// sources, labels recovered through the shared dictionary.
struct Session {
    labels: LabelDictionary,
    driver: DynamicTed<UnitCostModel>,
    t1: TreeIndex,
    t2: TreeIndex,
}

impl Session {
    fn start(t1_src: &str, t2_src: &str) -> (Self, f64) {
        let mut labels = LabelDictionary::new();
        let t1 = index_of(t1_src, &mut labels);
        let t2 = index_of(t2_src, &mut labels);
        let mut driver = driver();
        let d = driver.ted(&t1, &t2);
        (
            Self {
                labels,
                driver,
                t1,
                t2,
            },
            d,
        )
    }

    fn step(&mut self, t1_src: Option<&str>, t2_src: Option<&str>) -> f64 {
        match (t1_src, t2_src) {
            (Some(s1), Some(s2)) => {
                let (t1_new, r1) = load(&mut self.labels, &self.t1, s1);
                let (t2_new, r2) = load(&mut self.labels, &self.t2, s2);
                let d = self
                    .driver
                    .ted_incremental(&self.t1, &t1_new, &r1, &self.t2, &t2_new, &r2);
                self.t1 = t1_new;
                self.t2 = t2_new;
                d
            }
            (Some(s1), None) => {
                let (t1_new, r1) = load(&mut self.labels, &self.t1, s1);
                let d = self.driver.ted_incremental_t1(&self.t1, &t1_new, &r1, &self.t2);
                self.t1 = t1_new;
                d
            }
            (None, Some(s2)) => {
                let (t2_new, r2) = load(&mut self.labels, &self.t2, s2);
                let d = self.driver.ted_incremental_t2(&self.t1, &self.t2, &t2_new, &r2);
                self.t2 = t2_new;
                d
            }
            (None, None) => unreachable!("a step must change something"),
        }
    }

    /// Steps, then checks the answer against a fresh baseline driver and
    /// the reference algorithm.
    fn checked_step(&mut self, t1_src: Option<&str>, t2_src: Option<&str>) -> f64 {
        let d = self.step(t1_src, t2_src);
        assert_eq!(
            d,
            fresh_baseline(&self.t1, &self.t2),
            "incremental diverged from a fresh baseline"
        );
        assert_eq!(
            d,
            reference_ted(&self.t1, &self.t2),
            "incremental diverged from the reference"
        );
        d
    }
}

fn load(
    labels: &mut LabelDictionary,
    old: &TreeIndex,
    source: &str,
) -> (TreeIndex, RetainMap) {
    let (tree, retain) = {
        let lookup = |old_prel: usize| {
            (old_prel < old.tree_size())
                .then(|| labels.resolve(old.prel_to_label_id(old_prel)))
                .flatten()
                .map(str::to_string)
        };
        parse_incremental(source, lookup).expect("step source parses")
    };
    let index = TreeIndex::build(&tree, labels).expect("step source indexes");
    (index, retain)
}

#[test]
fn mixed_edit_sequence_matches_baseline_at_every_step() {
    // T1: a(b(d,e),c)   T2: a(b(d,e),f)
    let (mut session, d0) = Session::start(
        "{(a){(b){(d)}{(e)}}{(c)}}",
        "{(a){(b){(d)}{(e)}}{(f)}}",
    );
    assert_eq!(d0, 1.0);

    // T2 relabels e → g.
    let d1 = session.checked_step(None, Some("{[0]{[1]{[2]}{(g)}}{[4]}}"));
    assert_eq!(d1, 2.0);
    assert_eq!(session.driver.t2_preserved_subtrees().len(), 2);

    // T1 inserts x under the root; T2 deletes d.
    let d2 = session.checked_step(
        Some("{[0]{[1]{[2]}{[3]}}{(x)}{[4]}}"),
        Some("{[0]{[1]{[3]}}{[4]}}"),
    );
    assert!(d2 > 0.0);

    // T1 removes x again.
    session.checked_step(Some("{[0]{[1]{[2]}{[3]}}{[5]}}"), None);

    // T2 rebuilds the d leaf and renames f back to c.
    session.checked_step(None, Some("{[0]{[1]{(d)}{[2]}}{(c)}}"));
}

#[test]
fn chain_sequence_matches_baseline_at_every_step() {
    let source = chain(&["a", "b", "c", "d", "e", "f"]);
    let (mut session, d0) = Session::start(&source, &source);
    assert_eq!(d0, 0.0);

    // T2 grows a new leaf.
    let d1 = session.checked_step(None, Some("{[0]{[1]{[2]{[3]{[4]{[5]{(g)}}}}}}}"));
    assert_eq!(d1, 1.0);

    // T1 relabels its root.
    let d2 = session.checked_step(Some("{(z){[1]{[2]{[3]{[4]{[5]}}}}}}"), None);
    assert_eq!(d2, 2.0);

    // Both move: T1 grows the same leaf, T2 relabels its root to z.
    let d3 = session.checked_step(
        Some("{[0]{[1]{[2]{[3]{[4]{[5]{(g)}}}}}}}"),
        Some("{(z){[1]{[2]{[3]{[4]{[5]{[6]}}}}}}}"),
    );
    assert_eq!(d3, 0.0);
}

#[test]
fn identity_step_takes_the_fast_path() {
    let source = "{(a){(b)}{(c)}}";
    let (mut session, d0) = Session::start(source, source);
    assert_eq!(d0, 0.0);

    // Both successors are fully retained and unchanged.
    let d = session.step(Some("{[0]{[1]}{[2]}}"), Some("{[0]{[1]}{[2]}}"));
    assert_eq!(d, 0.0);
    assert_eq!(session.driver.t1_prep_distance(), 0.0);
    assert_eq!(session.driver.t2_prep_distance(), 0.0);
    assert_eq!(session.driver.hits(), 0);
    assert_eq!(session.driver.missed(), 0);
    // The cache still answers: it was never discarded.
    assert_eq!(session.driver.cached_subtree_distance(0, 0), 0.0);
}

#[test]
fn incremental_relabel_hits_the_cache() {
    // Spec scenario: baseline a(b,c) vs a(b,d), then T2 relabels d → e.
    let (mut session, d0) = Session::start("{(a){(b)}{(c)}}", "{(a){(b)}{(d)}}");
    assert_eq!(d0, 1.0);

    let d = session.checked_step(None, Some("{[0](a){[1](b)}{(e)}}"));
    assert_eq!(d, 1.0);
    assert!(
        session.driver.hits() > 0,
        "the preserved (b) subtree pair must come from the cache"
    );
}

#[test]
fn incremental_insert_reuses_the_zero_distance_band() {
    // Spec scenario: identical two-node trees, then T2 gains a leaf.
    let (mut session, d0) = Session::start("{(a){(b)}}", "{(a){(b)}}");
    assert_eq!(d0, 0.0);

    let d = session.checked_step(None, Some("{[0](a){[1](b)}{(x)}}"));
    assert_eq!(d, 1.0);
    assert!(session.driver.hits() >= 1, "(b, b) must be answered by the cache");
}

#[test]
fn deep_relabel_preserves_every_non_ancestor() {
    // Edit exactly one deep label with everything retained: the preserved
    // map must hold every node except the edited one and its ancestors.
    let (mut session, _) = Session::start(
        "{(a){(b){(d)}{(e)}}{(c)}}",
        "{(a){(b){(d)}{(e)}}{(c)}}",
    );

    // New T1: e becomes z. Postorder old: d0 e1 b2 c3 a4; new: d0 z1 b2 c3 a4.
    session.step(Some("{[0]{[1]{[2]}{[3](z)}}{[4]}}"), None);
    let preserved = session.driver.t1_preserved_subtrees();
    assert_eq!(preserved.len(), 2, "exactly d and c survive: {preserved:?}");
    assert_eq!(preserved[&0], 0); // d
    assert_eq!(preserved[&3], 3); // c
}

#[test]
fn sequence_survives_shape_changes_around_preserved_leaves() {
    // Larger sweep: successive structural edits that keep a core of leaves
    // intact, exercising all three reuse specializations in turn.
    let (mut session, _) = Session::start(
        "{(r){(s){(t)}{(u)}}{(v){(w)}}}",
        "{(r){(s){(t)}{(u)}}{(v){(w)}}}",
    );

    // T2: delete w.                     prels: r0 s1 t2 u3 v4 w5
    session.checked_step(None, Some("{[0]{[1]{[2]}{[3]}}{[4]}}"));
    // T1: relabel s → q, keep children. prels unchanged in T1.
    session.checked_step(Some("{[0]{(q){[2]}{[3]}}{[4]{[5]}}}"), None);
    // Both: T1 deletes u; T2 gains a new child under v.
    session.checked_step(
        Some("{[0]{[1]{[2]}}{[4]{[5]}}}"),
        Some("{[0]{[1]{[2]}{[3]}}{[4]{(x)}}}"),
    );
    // T2: rename the root.
    session.checked_step(None, Some("{(p){[1]{[2]}{[3]}}{[4]{[5]}}}"));
}
