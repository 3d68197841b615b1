//! # Incremental Tree Edit Distance
//!
//! This library computes the edit distance between ordered, labeled trees
//! and keeps enough state between queries to answer the next one cheaply
//! when the trees barely moved.
//!
//! ## How a query runs
//!
//! 1. **Parse**: bracketed text (`{(a){(b)}}`) becomes an arena [tree::Tree];
//!    in incremental mode the text may annotate nodes carried over from the
//!    previous revision (`{[3](b)}`), which yields a retain map.
//! 2. **Index**: [tree::index::TreeIndex] fixes preorder/postorder numbering
//!    and the per-node arrays the distance core reads.
//! 3. **Distance**: [ted::Touzet] computes the exact distance below a
//!    threshold `k` inside a diagonal band of subtree pairs.
//! 4. **Reuse**: [ted::DynamicTed] caches the band, proves which subtrees
//!    survived an edit, and answers the next query by splicing cached
//!    distances into a fresh pass.
//!
//! ## Usage example
//!
//! ```
//! use tedi::parser::parse;
//! use tedi::ted::DynamicTed;
//! use tedi::tree::index::TreeIndex;
//! use tedi::tree::labels::{LabelDictionary, UnitCostModel};
//!
//! let mut labels = LabelDictionary::new();
//! let t1 = TreeIndex::build(&parse("{(a){(b)}{(c)}}").unwrap(), &mut labels).unwrap();
//! let t2 = TreeIndex::build(&parse("{(a){(b)}{(d)}}").unwrap(), &mut labels).unwrap();
//!
//! let mut driver = DynamicTed::new(UnitCostModel);
//! assert_eq!(driver.ted(&t1, &t2), 1.0);
//! ```
//!
//! All computation is synchronous and single-threaded; a driver owns its
//! cache outright, so independent tree pairs want independent drivers.

#![warn(missing_docs, missing_debug_implementations)]

pub mod parser;
pub mod ted;
pub mod tree;

pub use parser::{parse, parse_incremental, ParseError, RetainMap};
pub use ted::{BandMatrix, DynamicTed, Touzet};
pub use tree::index::{IndexError, TreeIndex};
pub use tree::labels::{CostModel, LabelDictionary, UnitCostModel};
pub use tree::Tree;
