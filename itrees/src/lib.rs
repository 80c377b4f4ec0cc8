//! Interval-container engines for half-open integer intervals.
//!
//! This crate provides three independent data structures for the same job:
//! storing intervals `[start, end)` with attached payloads and enumerating
//! every stored interval that overlaps a query range. They differ in how
//! they trade mutability against query speed:
//!
//! - [`AvlTree`] — a balanced dynamic tree (AVL, augmented with subtree
//!   max-ends). Predictable worst case, supports insert and remove between
//!   queries, reports ranks.
//! - [`SplayTree`] — a self-adjusting dynamic tree. Every successful access
//!   rotates the touched node to the root, which wins on access patterns
//!   with locality and loses on adversarial random access. Reads mutate,
//!   so every access takes `&mut self`.
//! - [`ContigTree`] — an implicit static tree: a flat record array sorted
//!   by start with a complete binary tree overlaid through index
//!   arithmetic, partitioned across named contigs. Extremely cache
//!   friendly, but mutations require an explicit [`ContigTree::index`]
//!   step before querying.
//!
//! ## Quick start
//!
//! ```rust
//! use itrees::{AvlTree, Interval};
//!
//! let mut tree = AvlTree::new();
//! tree.insert(Interval { start: 100u32, end: 200, val: "gene1" });
//! tree.insert(Interval { start: 150, end: 300, val: "gene2" });
//! tree.insert(Interval { start: 400, end: 500, val: "gene3" });
//!
//! let hits = tree.find_overlaps(180, 250);
//! assert_eq!(hits.len(), 2); // gene1 and gene2
//! ```
//!
//! Partitioned static indexing with the implicit engine:
//!
//! ```rust
//! use itrees::ContigTree;
//!
//! let mut tree = ContigTree::new();
//! tree.add("chr1", 1000, 2000, "BRCA1").unwrap();
//! tree.add("chr1", 1500, 2500, "TP53").unwrap();
//! tree.add("chr2", 5000, 6000, "EGFR").unwrap();
//! tree.index();
//!
//! let hits = tree.find_overlaps("chr1", 1800, 2200);
//! assert_eq!(hits.len(), 2);
//! assert!(tree.find_overlaps("chrX", 0, 100).is_empty());
//! ```
//!
//! All engines agree on the overlap predicate re-exported as
//! [`overlaps`]: two intervals overlap iff each starts before the other
//! ends, so adjacent intervals do not overlap and zero-length intervals
//! overlap nothing adjacent to them.

/// Balanced dynamic interval tree.
///
/// See [`AvlTree`] for details.
pub mod avl;

/// Self-adjusting dynamic interval tree.
///
/// See [`SplayTree`] for details.
pub mod splay;

/// Implicit static interval tree partitioned by contig.
///
/// See [`ContigTree`] for details.
pub mod implicit;

/// Per-engine query counters, compiled in with the `stats` feature.
#[cfg(feature = "stats")]
pub mod stats;

#[cfg(not(feature = "stats"))]
pub(crate) mod stats;

// re-exports
pub use self::avl::AvlTree;
pub use self::implicit::{ContigTree, ContigTreeError, Hit};
pub use self::splay::{NodeId, SplayTree};
pub use itrees_core::{overlaps, Interval, Span};
