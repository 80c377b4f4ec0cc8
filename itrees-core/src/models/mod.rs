pub mod interval;
pub mod span;

// re-export for cleaner imports
pub use self::interval::Interval;
pub use self::span::{overlaps, Span};
