//! Shared data model for the `itrees` interval engines.
//!
//! This crate holds the types every engine agrees on: the [`Interval`]
//! record with its total `(start, end)` ordering, the [`Span`] capability
//! trait for anything exposing a half-open extent, and the free
//! [`overlaps`] predicate. Engine code lives in the `itrees` crate; nothing
//! here knows about trees.
//!
//! ```rust
//! use itrees_core::{overlaps, Interval};
//!
//! let stored = Interval { start: 10u32, end: 20, val: "exon" };
//!
//! // queries may use a lighter carrier than the stored record
//! assert!(overlaps(&stored, &(15u32..25u32)));
//! assert!(!overlaps(&stored, &(20u32..30u32))); // adjacency is not overlap
//! ```

pub mod models;

// re-export for cleaner imports
pub use self::models::interval::Interval;
pub use self::models::span::{overlaps, Span};
