//! Label interning and edit-cost models.
//!
//! Every tree that takes part in a distance computation interns its labels
//! into one shared [LabelDictionary], so that two nodes carry the same
//! [LabelId] exactly when their labels are equal strings. Cost models work
//! on ids only and never see the strings again.

use std::collections::HashMap;

/// Dense identifier of an interned label.
pub type LabelId = usize;

/// Bidirectional map between label strings and dense [LabelId]s.
///
/// Labels are deduplicated: interning the same string twice returns the same
/// id. Ids are assigned in first-seen order starting at 0.
///
/// # Example
/// ```
/// use tedi::tree::labels::LabelDictionary;
///
/// let mut labels = LabelDictionary::new();
/// let a = labels.get_or_insert("a");
/// let b = labels.get_or_insert("b");
/// assert_ne!(a, b);
/// assert_eq!(labels.get_or_insert("a"), a);
/// assert_eq!(labels.resolve(b), Some("b"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LabelDictionary {
    labels: Vec<String>,
    map: HashMap<String, LabelId>,
}

impl LabelDictionary {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `label`, interning it if it is new.
    pub fn get_or_insert(&mut self, label: &str) -> LabelId {
        if let Some(&id) = self.map.get(label) {
            return id;
        }
        let id = self.labels.len();
        self.labels.push(label.to_string());
        self.map.insert(label.to_string(), id);
        id
    }

    /// Returns the string for an id, or `None` for an unknown id.
    pub fn resolve(&self, id: LabelId) -> Option<&str> {
        self.labels.get(id).map(|s| s.as_str())
    }

    /// Number of distinct labels interned so far.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no label has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Edit costs consumed by the distance core.
///
/// Implementations must return non-negative costs and a zero rename cost
/// for equal ids; the band pruning bounds assume unit-or-larger costs for
/// structural edits.
pub trait CostModel {
    /// Cost of deleting a node with the given label.
    fn del(&self, label: LabelId) -> f64;

    /// Cost of inserting a node with the given label.
    fn ins(&self, label: LabelId) -> f64;

    /// Cost of renaming `from` into `to`.
    fn ren(&self, from: LabelId, to: LabelId) -> f64;
}

/// The standard unit cost model: deletions and insertions cost 1, renames
/// cost 1 unless the labels are equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitCostModel;

impl CostModel for UnitCostModel {
    fn del(&self, _label: LabelId) -> f64 {
        1.0
    }

    fn ins(&self, _label: LabelId) -> f64 {
        1.0
    }

    fn ren(&self, from: LabelId, to: LabelId) -> f64 {
        if from == to {
            0.0
        } else {
            1.0
        }
    }
}
