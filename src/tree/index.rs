//! Traversal arrays consumed by the distance core.
//!
//! A [TreeIndex] is computed once per tree and is read-only afterwards. It
//! fixes the preorder/postorder numbering (root at preorder 0, postorder
//! n − 1), interns every label, and precomputes per-node subtree size,
//! depth, and leftmost leaf descendant in postorder numbering.

use crate::tree::labels::{LabelDictionary, LabelId};
use crate::tree::Tree;
use thiserror::Error;

/// Errors surfaced while indexing a tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// The tree has more nodes than the band arithmetic can address.
    #[error("tree of {size} nodes exceeds the supported maximum of {max}")]
    TreeTooLarge {
        /// Number of nodes in the offending tree.
        size: usize,
        /// Largest supported node count.
        max: usize,
    },

    /// The arena's child references do not describe a single rooted tree.
    #[error("arena is not a single rooted tree: reached {reached} of {size} nodes")]
    MalformedTree {
        /// Nodes reachable from the root.
        reached: usize,
        /// Nodes in the arena.
        size: usize,
    },
}

/// Largest node count the index accepts.
///
/// Band offsets are mixed-sign `i64` expressions; capping sizes at `i32`
/// range keeps every intermediate exact.
pub const MAX_TREE_SIZE: usize = i32::MAX as usize;

/// Precomputed traversal arrays for one tree.
///
/// Two indexes compare equal exactly when they describe structurally and
/// labelwise identical trees (labels interned through the same dictionary);
/// the distance engine uses that as its tree-identity signal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TreeIndex {
    tree_size: usize,
    prel_to_postl: Vec<usize>,
    postl_to_prel: Vec<usize>,
    prel_to_label_id: Vec<LabelId>,
    postl_to_label_id: Vec<LabelId>,
    postl_to_size: Vec<usize>,
    postl_to_depth: Vec<usize>,
    postl_to_lld: Vec<usize>,
}

impl TreeIndex {
    /// Builds the index for `tree`, interning labels into `labels`.
    ///
    /// Trees that will be compared against each other must share one
    /// dictionary, otherwise equal labels may intern to different ids.
    pub fn build(tree: &Tree, labels: &mut LabelDictionary) -> Result<Self, IndexError> {
        let n = tree.len();
        if n > MAX_TREE_SIZE {
            return Err(IndexError::TreeTooLarge {
                size: n,
                max: MAX_TREE_SIZE,
            });
        }

        let mut prel_to_postl = vec![0usize; n];
        let mut postl_to_prel = vec![0usize; n];
        let mut prel_to_label_id = vec![0 as LabelId; n];
        let mut postl_to_label_id = vec![0 as LabelId; n];
        let mut postl_to_size = vec![0usize; n];
        let mut postl_to_depth = vec![0usize; n];
        let mut postl_to_lld = vec![0usize; n];

        // Subtree sizes keyed by arena id, filled as nodes are popped.
        let mut size_of = vec![0usize; n];

        // Iterative depth-first walk: preorder on push, postorder on pop.
        let mut next_prel = 0usize;
        let mut next_postl = 0usize;
        let mut stack: Vec<(usize, usize, usize, usize)> = Vec::with_capacity(16);
        // (arena id, depth, prel, next child position)
        stack.push((tree.root(), 0, 0, 0));

        while let Some((id, depth, prel, cursor)) = stack.pop() {
            if cursor == 0 {
                // First visit: assign the preorder slot. A shared child
                // would be visited twice and overrun the numbering.
                if prel >= n {
                    return Err(IndexError::MalformedTree { reached: prel, size: n });
                }
                prel_to_label_id[prel] = labels.get_or_insert(tree.node(id).label());
                next_prel += 1;
            }
            match tree.node(id).children().get(cursor) {
                Some(&child) => {
                    stack.push((id, depth, prel, cursor + 1));
                    stack.push((child, depth + 1, next_prel, 0));
                }
                None => {
                    let postl = next_postl;
                    next_postl += 1;
                    let size = tree
                        .node(id)
                        .children()
                        .iter()
                        .map(|&c| size_of[c])
                        .sum::<usize>()
                        + 1;
                    size_of[id] = size;
                    prel_to_postl[prel] = postl;
                    postl_to_prel[postl] = prel;
                    postl_to_label_id[postl] = prel_to_label_id[prel];
                    postl_to_size[postl] = size;
                    postl_to_depth[postl] = depth;
                    // In postorder a subtree is contiguous and ends at its
                    // root, so the leftmost leaf is size - 1 slots earlier.
                    postl_to_lld[postl] = postl + 1 - size;
                }
            }
        }

        if next_prel != n {
            return Err(IndexError::MalformedTree { reached: next_prel, size: n });
        }

        Ok(Self {
            tree_size: n,
            prel_to_postl,
            postl_to_prel,
            prel_to_label_id,
            postl_to_label_id,
            postl_to_size,
            postl_to_depth,
            postl_to_lld,
        })
    }

    /// Number of nodes.
    pub fn tree_size(&self) -> usize {
        self.tree_size
    }

    /// Postorder id of the node at preorder `prel`.
    pub fn prel_to_postl(&self, prel: usize) -> usize {
        self.prel_to_postl[prel]
    }

    /// Preorder id of the node at postorder `postl`.
    pub fn postl_to_prel(&self, postl: usize) -> usize {
        self.postl_to_prel[postl]
    }

    /// Interned label of the node at preorder `prel`.
    pub fn prel_to_label_id(&self, prel: usize) -> LabelId {
        self.prel_to_label_id[prel]
    }

    /// Interned label of the node at postorder `postl`.
    pub fn postl_to_label_id(&self, postl: usize) -> LabelId {
        self.postl_to_label_id[postl]
    }

    /// Subtree size of the node at postorder `postl`.
    pub fn postl_to_size(&self, postl: usize) -> usize {
        self.postl_to_size[postl]
    }

    /// Depth (root = 0) of the node at postorder `postl`.
    pub fn postl_to_depth(&self, postl: usize) -> usize {
        self.postl_to_depth[postl]
    }

    /// Postorder id of the leftmost leaf descendant of the node at `postl`.
    pub fn postl_to_lld(&self, postl: usize) -> usize {
        self.postl_to_lld[postl]
    }
}
