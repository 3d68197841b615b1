//! Parser for bracketed tree notation.
//!
//! The grammar is
//!
//! ```text
//! tree       := node
//! node       := '{' preamble child* '}'
//! preamble   := annotation? label?
//! annotation := '[' digits ']'
//! label      := '(' any bytes except ')' ')'
//! ```
//!
//! Whitespace outside labels and annotations is insignificant; label bytes
//! are taken literally up to the first `)`. A node's preamble ends at its
//! first child's `{` or at its own `}`.
//!
//! [parse] handles plain trees and rejects annotations. [parse_incremental]
//! additionally emits the retain map `new preorder id → old preorder id`
//! for every annotated node; an annotated node may omit its label, which is
//! then resolved through the caller's lookup. The retain map is the
//! caller's assertion that those nodes were carried over unchanged; the
//! distance engine re-verifies it before trusting it.
//!
//! The scan is a single left-to-right pass over an explicit stack of open
//! nodes; the arena therefore numbers nodes in preorder.

use crate::tree::Tree;
use std::collections::HashMap;
use thiserror::Error;

/// Errors produced by the bracketed-tree parser.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Input is empty or all whitespace.
    #[error("empty input")]
    Empty,

    /// A `}` appeared with no node open.
    #[error("unbalanced '}}' at byte {0}")]
    Unbalanced(usize),

    /// A byte that fits no production appeared outside a label.
    #[error("unexpected character '{ch}' at byte {pos}")]
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// Byte offset into the source.
        pos: usize,
    },

    /// A node ended without a label and without a resolvable annotation.
    #[error("node at preorder {prel} has no label")]
    MissingLabel {
        /// Preorder id the node would have received.
        prel: usize,
    },

    /// Annotation brackets containing anything but digits.
    #[error("annotation at byte {pos} is not a number")]
    InvalidAnnotation {
        /// Byte offset of the annotation's opening bracket.
        pos: usize,
    },

    /// An annotated, label-free node whose old id the lookup cannot resolve.
    #[error("no label recorded for retained node {old_prel}")]
    UnknownRetained {
        /// The old preorder id the annotation referred to.
        old_prel: usize,
    },

    /// Non-whitespace input after the top-level `}`.
    #[error("trailing input after tree at byte {0}")]
    TrailingInput(usize),

    /// The input ended inside a node, label, or annotation.
    #[error("unexpected end of input")]
    UnexpectedEof,
}

/// Mapping `new preorder id → old preorder id` for retained nodes.
pub type RetainMap = HashMap<usize, usize>;

/// Parses a plain bracketed tree.
///
/// Annotations are rejected in this mode; every node must carry a label.
pub fn parse(source: &str) -> Result<Tree, ParseError> {
    let (tree, _) = scan(source, None)?;
    Ok(tree)
}

/// Parses an annotated bracketed tree.
///
/// `lookup` resolves an old preorder id to its label and is consulted for
/// annotated nodes that omit their label. Returns the tree together with
/// the retain map.
pub fn parse_incremental<F>(source: &str, lookup: F) -> Result<(Tree, RetainMap), ParseError>
where
    F: Fn(usize) -> Option<String>,
{
    scan(source, Some(&lookup))
}

/// Preamble of the most recently opened node, not yet in the arena.
#[derive(Debug, Default)]
struct Pending {
    annotation: Option<usize>,
    label: Option<String>,
}

type Lookup<'a> = &'a dyn Fn(usize) -> Option<String>;

fn scan(source: &str, lookup: Option<Lookup<'_>>) -> Result<(Tree, RetainMap), ParseError> {
    let bytes = source.as_bytes();
    let mut pos = 0usize;

    let mut tree: Option<Tree> = None;
    let mut stack: Vec<usize> = Vec::new();
    let mut pending: Option<Pending> = None;
    let mut retain = RetainMap::new();
    let mut done = false;

    while pos < bytes.len() {
        let byte = bytes[pos];
        match byte {
            b'{' => {
                if done {
                    return Err(ParseError::TrailingInput(pos));
                }
                if let Some(p) = pending.take() {
                    let id = close_preamble(p, &mut tree, &stack, &mut retain, lookup)?;
                    stack.push(id);
                } else if tree.is_some() && stack.is_empty() {
                    return Err(ParseError::TrailingInput(pos));
                }
                pending = Some(Pending::default());
                pos += 1;
            }
            b'}' => {
                if done {
                    return Err(ParseError::TrailingInput(pos));
                }
                if let Some(p) = pending.take() {
                    let id = close_preamble(p, &mut tree, &stack, &mut retain, lookup)?;
                    stack.push(id);
                }
                if stack.pop().is_none() {
                    return Err(ParseError::Unbalanced(pos));
                }
                done = stack.is_empty();
                pos += 1;
            }
            b'[' => {
                let open = pos;
                match (&mut pending, lookup) {
                    (Some(p), Some(_)) if p.annotation.is_none() && p.label.is_none() => {
                        let start = pos + 1;
                        let mut end = start;
                        while end < bytes.len() && bytes[end] != b']' {
                            end += 1;
                        }
                        if end == bytes.len() {
                            return Err(ParseError::UnexpectedEof);
                        }
                        let digits = &source[start..end];
                        let old_prel = digits
                            .parse::<usize>()
                            .map_err(|_| ParseError::InvalidAnnotation { pos: open })?;
                        p.annotation = Some(old_prel);
                        pos = end + 1;
                    }
                    _ => {
                        return Err(ParseError::UnexpectedChar { ch: '[', pos });
                    }
                }
            }
            b'(' => {
                match &mut pending {
                    Some(p) if p.label.is_none() => {
                        let start = pos + 1;
                        let mut end = start;
                        while end < bytes.len() && bytes[end] != b')' {
                            end += 1;
                        }
                        if end == bytes.len() {
                            return Err(ParseError::UnexpectedEof);
                        }
                        p.label = Some(source[start..end].to_string());
                        pos = end + 1;
                    }
                    _ => {
                        return Err(ParseError::UnexpectedChar { ch: '(', pos });
                    }
                }
            }
            b if b.is_ascii_whitespace() => {
                pos += 1;
            }
            _ => {
                if done {
                    return Err(ParseError::TrailingInput(pos));
                }
                // Safe to slice: the offending byte starts a character.
                let ch = source[pos..].chars().next().unwrap_or('\u{fffd}');
                return Err(ParseError::UnexpectedChar { ch, pos });
            }
        }
    }

    if pending.is_some() || !stack.is_empty() {
        return Err(ParseError::UnexpectedEof);
    }
    tree.ok_or(ParseError::Empty).map(|t| (t, retain))
}

/// Materializes a finished preamble as an arena node and records retention.
fn close_preamble(
    pending: Pending,
    tree: &mut Option<Tree>,
    stack: &[usize],
    retain: &mut RetainMap,
    lookup: Option<Lookup<'_>>,
) -> Result<usize, ParseError> {
    let next_prel = tree.as_ref().map_or(0, Tree::len);
    let label = match (pending.label, pending.annotation, lookup) {
        (Some(label), _, _) => label,
        (None, Some(old_prel), Some(resolve)) => {
            resolve(old_prel).ok_or(ParseError::UnknownRetained { old_prel })?
        }
        _ => return Err(ParseError::MissingLabel { prel: next_prel }),
    };
    let id = match tree {
        None => {
            *tree = Some(Tree::with_root(label));
            0
        }
        Some(t) => {
            // The caller pushes children only while an ancestor is open.
            let parent = *stack.last().expect("open node below a child");
            t.push_child(parent, label)
        }
    };
    if let Some(old_prel) = pending.annotation {
        retain.insert(id, old_prel);
    }
    Ok(id)
}
