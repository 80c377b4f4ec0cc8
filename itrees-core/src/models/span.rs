use std::ops::Range;

use num_traits::{PrimInt, Unsigned};

use crate::models::Interval;

/// Capability trait for anything that exposes a half-open `[start, end)`
/// extent over an unsigned integer coordinate.
///
/// Stored records and query carriers need not share a type: a fat record
/// type can live in a tree while queries arrive as `Range<u32>` or plain
/// `(start, end)` pairs.
pub trait Span {
    type Coord: PrimInt + Unsigned;

    fn start(&self) -> Self::Coord;
    fn end(&self) -> Self::Coord;
}

impl<I, T> Span for Interval<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    type Coord = I;

    #[inline]
    fn start(&self) -> I {
        self.start
    }

    #[inline]
    fn end(&self) -> I {
        self.end
    }
}

impl<I> Span for (I, I)
where
    I: PrimInt + Unsigned,
{
    type Coord = I;

    #[inline]
    fn start(&self) -> I {
        self.0
    }

    #[inline]
    fn end(&self) -> I {
        self.1
    }
}

impl<I> Span for Range<I>
where
    I: PrimInt + Unsigned,
{
    type Coord = I;

    #[inline]
    fn start(&self) -> I {
        self.start
    }

    #[inline]
    fn end(&self) -> I {
        self.end
    }
}

/// Two spans overlap iff each starts before the other ends.
///
/// Half-open semantics: adjacent spans (`a.end == b.start`) do not overlap.
/// Total over all inputs and branch-free on integer coordinates.
#[inline]
pub fn overlaps<A, B>(a: &A, b: &B) -> bool
where
    A: Span,
    B: Span<Coord = A::Coord>,
{
    a.start() < b.end() && b.start() < a.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 10, 5, 15, true)]
    #[case(0, 10, 10, 20, false)] // adjacency
    #[case(10, 20, 0, 10, false)]
    #[case(0, 10, 2, 3, true)] // containment
    #[case(5, 5, 5, 5, false)] // empty vs empty
    fn test_overlaps_pairs(
        #[case] a0: u32,
        #[case] a1: u32,
        #[case] b0: u32,
        #[case] b1: u32,
        #[case] expected: bool,
    ) {
        assert_eq!(overlaps(&(a0, a1), &(b0, b1)), expected);
        // the predicate is symmetric
        assert_eq!(overlaps(&(b0, b1), &(a0, a1)), expected);
    }

    #[rstest]
    fn test_heterogeneous_carriers() {
        let stored = Interval {
            start: 100u32,
            end: 200,
            val: "peak",
        };
        assert!(overlaps(&stored, &(150u32..250u32)));
        assert!(overlaps(&(150u32, 250u32), &stored));
        assert!(!overlaps(&stored, &(200u32..300u32)));
    }
}
