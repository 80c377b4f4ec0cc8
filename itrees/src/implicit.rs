use std::collections::HashMap;

use log::warn;
use thiserror::Error;

use crate::stats;

/// Largest storable coordinate: the `aux` word of a record keeps the
/// subtree max-end in 31 bits, so coordinates must fit below the flag bit.
pub const MAX_COORD: u32 = (1 << 31) - 1;

const FLAG_BIT: u32 = 1 << 31;
const MAX_MASK: u32 = MAX_COORD;

/// Fixed walk-stack capacity. A contig of `n` records has `root_k =
/// floor(log2(n)) <= 30`, and the walk holds at most `root_k + 2` frames.
const STACK_CAP: usize = 64;

/// Errors raised when feeding records into a [`ContigTree`].
#[derive(Debug, Error)]
pub enum ContigTreeError {
    /// The record's start lies beyond its end.
    #[error("invalid interval: start {0} exceeds end {1}")]
    InvalidInterval(u32, u32),
    /// A coordinate does not fit the 31-bit record layout.
    #[error("coordinate {0} does not fit the 31-bit record layout")]
    CoordinateOverflow(u32),
}

/// One stored record.
///
/// `packed` is two-phase: before [`ContigTree::index`] the high 32 bits
/// hold the contig id and the low 32 bits the start, so a single `u64`
/// sort produces `(contig, start)` order. Indexing re-packs it to
/// `start << 32 | end`. `aux` carries the record's own end before
/// indexing and the 31-bit subtree max-end after; its top bit is a free
/// flag that rides along through both phases.
#[derive(Debug, Clone)]
struct Record<T> {
    packed: u64,
    aux: u32,
    val: T,
}

#[derive(Debug, Clone)]
struct Contig {
    name: String,
    /// Offset of this contig's run in the record array. Valid once indexed.
    off: usize,
    /// Number of records on this contig.
    n: usize,
    /// Level of the contig's implicit-tree root, `floor(log2(n))`.
    root_k: u32,
    /// Largest end seen, seeded by the `hint_len` of
    /// [`ContigTree::add_contig`].
    len: u32,
}

/// Borrowed view of a stored record, produced by [`ContigTree::record`].
#[derive(Debug)]
pub struct Hit<'a, T> {
    pub start: u32,
    pub end: u32,
    pub val: &'a T,
}

#[derive(Debug, Clone, Copy, Default)]
struct Frame {
    pos: usize,
    level: u32,
    left_done: bool,
}

/// An implicit static interval tree partitioned by named contigs.
///
/// Records live in one flat array, sorted by `(contig, start)` at
/// [`index`](Self::index) time. A complete binary tree is overlaid on each
/// contig's run through index arithmetic alone — a node at position `pos`
/// with subtree radius `2^k` has children at `pos ± 2^(k-1)` — and each
/// position carries the maximum end of its implicit subtree, so overlap
/// queries prune the same way the dynamic trees do. No per-node
/// allocations, no pointers; the whole index is the record array plus a
/// small contig table.
///
/// The price of the layout is staleness: after any [`add`](Self::add) the
/// tree is dirty and must be re-[`index`](Self::index)ed. Queries on a
/// dirty tree fall back to a linear scan (and warn in debug builds)
/// rather than walking a stale overlay.
///
/// # Examples
///
/// ```
/// use itrees::ContigTree;
///
/// let mut tree = ContigTree::new();
/// tree.add("chr1", 3, 10, ()).unwrap();
/// tree.add("chr1", 4, 6, ()).unwrap();
/// tree.add("chr2", 5, 12, ()).unwrap();
/// tree.index();
///
/// let hits = tree.find_overlaps("chr1", 5, 8);
/// assert_eq!(hits.len(), 2);
/// let first = tree.record(hits[0]);
/// assert_eq!((first.start, first.end), (3, 10));
/// ```
#[derive(Debug, Clone)]
pub struct ContigTree<T> {
    records: Vec<Record<T>>,
    contigs: Vec<Contig>,
    ids: HashMap<String, u32>,
    indexed: bool,
}

impl<T> Default for ContigTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ContigTree<T> {
    pub fn new() -> Self {
        ContigTree {
            records: Vec::new(),
            contigs: Vec::new(),
            ids: HashMap::new(),
            indexed: false,
        }
    }

    /// Total number of stored records across all contigs.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of known contigs, including ones without records.
    pub fn num_contigs(&self) -> usize {
        self.contigs.len()
    }

    /// Returns `true` until the first `add` after the last `index`.
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Append a record to a contig, allocating the contig on first sight.
    ///
    /// Amortized O(1); marks the tree dirty. Returns the record's
    /// insertion ordinal, which stays meaningful only until the next
    /// [`index`](Self::index) re-sorts the array.
    pub fn add(&mut self, contig: &str, start: u32, end: u32, val: T) -> Result<usize, ContigTreeError> {
        if start > end {
            return Err(ContigTreeError::InvalidInterval(start, end));
        }
        if end > MAX_COORD {
            return Err(ContigTreeError::CoordinateOverflow(end));
        }
        if self.indexed {
            // fold the array back to pre-index packing so that every
            // record is in one representation while dirty
            self.unindex();
        }
        let id = self.add_contig(contig, 0);
        let pos = self.records.len();
        self.records.push(Record {
            packed: u64::from(id) << 32 | u64::from(start),
            aux: end,
            val,
        });
        let contig = &mut self.contigs[id as usize];
        contig.n += 1;
        if end > contig.len {
            contig.len = end;
        }
        Ok(pos)
    }

    /// Resolve a contig name to its id, allocating a fresh id for an
    /// unknown name. `hint_len` seeds the contig's recorded length, which
    /// later grows to the largest end added.
    pub fn add_contig(&mut self, name: &str, hint_len: u32) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.contigs.len() as u32;
        self.ids.insert(name.to_string(), id);
        self.contigs.push(Contig {
            name: name.to_string(),
            off: 0,
            n: 0,
            root_k: 0,
            len: hint_len,
        });
        id
    }

    /// Id of a known contig.
    pub fn contig_id(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Name of a known contig id.
    pub fn contig_name(&self, id: u32) -> Option<&str> {
        self.contigs.get(id as usize).map(|c| c.name.as_str())
    }

    /// Recorded length of a contig: the largest end added, or the
    /// `hint_len` it was declared with if that is larger.
    pub fn contig_len(&self, name: &str) -> Option<u32> {
        let id = self.contig_id(name)?;
        Some(self.contigs[id as usize].len)
    }

    /// Sort the records and build the per-contig implicit trees in place.
    ///
    /// May be called repeatedly; each call rebuilds from scratch. Until it
    /// runs, queries degrade to a linear scan.
    pub fn index(&mut self) {
        if self.indexed {
            self.unindex();
        }
        self.records.sort_unstable_by_key(|rec| rec.packed);
        let mut off = 0;
        for contig in &mut self.contigs {
            contig.off = off;
            off += contig.n;
        }
        for ci in 0..self.contigs.len() {
            let (off, n) = (self.contigs[ci].off, self.contigs[ci].n);
            let run = &mut self.records[off..off + n];
            for rec in run.iter_mut() {
                let start = rec.packed as u32;
                let end = rec.aux & MAX_MASK;
                rec.packed = u64::from(start) << 32 | u64::from(end);
            }
            self.contigs[ci].root_k = build_max_tree(run);
        }
        self.indexed = true;
    }

    /// Collect the positions of every record on `contig` overlapping
    /// `[start, end)`. Unknown contigs yield an empty result, not an
    /// error. Positions index into [`record`](Self::record) and come out
    /// in ascending start order.
    pub fn find_overlaps(&self, contig: &str, start: u32, end: u32) -> Vec<usize> {
        let mut hits = Vec::new();
        self.find_overlaps_into(contig, start, end, &mut hits);
        hits
    }

    /// Like [`find_overlaps`](Self::find_overlaps) but reuses a caller
    /// buffer, clearing it first. Capacity is kept across calls.
    pub fn find_overlaps_into(&self, contig: &str, start: u32, end: u32, hits: &mut Vec<usize>) {
        hits.clear();
        let Some(&id) = self.ids.get(contig) else {
            return;
        };
        if !self.indexed {
            self.warn_dirty();
            self.scan_dirty(id, start, end, |pos| hits.push(pos));
            return;
        }
        self.walk_overlaps(&self.contigs[id as usize], start, end, |pos| hits.push(pos));
    }

    /// Count overlapping records without materializing their positions.
    pub fn count(&self, contig: &str, start: u32, end: u32) -> usize {
        let mut count = 0;
        let Some(&id) = self.ids.get(contig) else {
            return 0;
        };
        if !self.indexed {
            self.warn_dirty();
            self.scan_dirty(id, start, end, |_| count += 1);
            return count;
        }
        self.walk_overlaps(&self.contigs[id as usize], start, end, |_| count += 1);
        count
    }

    /// View of the record at `pos`, in whichever packing phase the tree
    /// is currently in.
    pub fn record(&self, pos: usize) -> Hit<'_, T> {
        let rec = &self.records[pos];
        if self.indexed {
            Hit {
                start: (rec.packed >> 32) as u32,
                end: rec.packed as u32,
                val: &rec.val,
            }
        } else {
            Hit {
                start: rec.packed as u32,
                end: rec.aux & MAX_MASK,
                val: &rec.val,
            }
        }
    }

    /// The reserved flag bit of the record at `pos`.
    pub fn flag(&self, pos: usize) -> bool {
        self.records[pos].aux & FLAG_BIT != 0
    }

    /// Set the reserved flag bit of the record at `pos`. The bit rides
    /// along through sorting and indexing and has no effect on overlap
    /// semantics, but note that `index()` re-sorts the array, so
    /// positions observed before indexing do not name the same record
    /// afterwards.
    pub fn set_flag(&mut self, pos: usize, on: bool) {
        if on {
            self.records[pos].aux |= FLAG_BIT;
        } else {
            self.records[pos].aux &= !FLAG_BIT;
        }
    }

    /// Revert every record to pre-index packing using the contig table's
    /// run boundaries. Leaves the tree dirty.
    fn unindex(&mut self) {
        for (ci, contig) in self.contigs.iter().enumerate() {
            for rec in &mut self.records[contig.off..contig.off + contig.n] {
                let start = (rec.packed >> 32) as u32;
                let end = rec.packed as u32;
                rec.aux = (rec.aux & FLAG_BIT) | end;
                rec.packed = (ci as u64) << 32 | u64::from(start);
            }
        }
        self.indexed = false;
    }

    fn warn_dirty(&self) {
        if cfg!(debug_assertions) {
            warn!("overlap query on a dirty ContigTree; call index() after add()");
        }
    }

    /// Correct but linear fallback for queries on a dirty tree, where
    /// records are uniformly in pre-index packing.
    fn scan_dirty<F: FnMut(usize)>(&self, id: u32, start: u32, end: u32, mut emit: F) {
        for (pos, rec) in self.records.iter().enumerate() {
            if (rec.packed >> 32) as u32 != id {
                continue;
            }
            let rec_start = rec.packed as u32;
            let rec_end = rec.aux & MAX_MASK;
            if rec_start < end && start < rec_end {
                emit(pos);
            }
        }
    }

    /// Depth-limited iterative descent over one contig's implicit tree.
    ///
    /// Frames record `(position, level, visited_left)`. Going down, a
    /// real node whose subtree max-end cannot reach the query start is
    /// pruned with its whole subtree. Coming back up, the node itself is
    /// tested and the right subtree is entered only while starts can
    /// still precede the query end. Positions at or past the run length
    /// are virtual: they are never tested and their right subtrees hold
    /// no real records.
    fn walk_overlaps<F: FnMut(usize)>(&self, contig: &Contig, start: u32, end: u32, mut emit: F) {
        let (off, n) = (contig.off, contig.n);
        if n == 0 {
            return;
        }
        let run = &self.records[off..off + n];
        let mut stack = [Frame::default(); STACK_CAP];
        stack[0] = Frame {
            pos: (1usize << contig.root_k) - 1,
            level: contig.root_k,
            left_done: false,
        };
        let mut top = 1usize;
        while top > 0 {
            top -= 1;
            let Frame {
                pos,
                level,
                left_done,
            } = stack[top];
            if !left_done {
                stats::bump(stats::Engine::Implicit);
                if pos < n && run[pos].aux & MAX_MASK <= start {
                    // nothing below ends past the query start
                    continue;
                }
                stack[top] = Frame {
                    pos,
                    level,
                    left_done: true,
                };
                top += 1;
                if level > 0 {
                    stack[top] = Frame {
                        pos: pos - (1usize << (level - 1)),
                        level: level - 1,
                        left_done: false,
                    };
                    top += 1;
                }
            } else if pos < n {
                let rec_start = (run[pos].packed >> 32) as u32;
                if rec_start >= end {
                    // this node and its whole right subtree start too late
                    continue;
                }
                if start < run[pos].packed as u32 {
                    emit(off + pos);
                }
                if level > 0 {
                    stack[top] = Frame {
                        pos: pos + (1usize << (level - 1)),
                        level: level - 1,
                        left_done: false,
                    };
                    top += 1;
                }
            }
        }
    }
}

/// Fill the 31-bit `aux` max-end slots of one sorted contig run, walking
/// levels bottom-up: leaves take their own end, interior positions fold
/// in both children, and `last` tracks the max along the ragged right
/// edge where subtrees are only partially real. Returns the root level.
fn build_max_tree<T>(run: &mut [Record<T>]) -> u32 {
    let n = run.len();
    if n == 0 {
        return 0;
    }
    let mut last_i = 0usize;
    let mut last = 0u32;
    let mut i = 0usize;
    while i < n {
        last_i = i;
        last = run[i].packed as u32;
        run[i].aux = (run[i].aux & FLAG_BIT) | last;
        i += 2;
    }
    let mut k = 1u32;
    while (1usize << k) <= n {
        let half = 1usize << (k - 1);
        let step = 1usize << (k + 1);
        let mut i = (1usize << k) - 1;
        while i < n {
            let left_max = run[i - half].aux & MAX_MASK;
            let right_max = if i + half < n {
                run[i + half].aux & MAX_MASK
            } else {
                last
            };
            let mut max = run[i].packed as u32;
            if left_max > max {
                max = left_max;
            }
            if right_max > max {
                max = right_max;
            }
            run[i].aux = (run[i].aux & FLAG_BIT) | max;
            i += step;
        }
        last_i = if (last_i >> k) & 1 != 0 {
            last_i - half
        } else {
            last_i + half
        };
        if last_i < n {
            let edge = run[last_i].aux & MAX_MASK;
            if edge > last {
                last = edge;
            }
        }
        k += 1;
    }
    k - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    impl<T> ContigTree<T> {
        /// Verify per-contig sortedness, root levels, and every implicit
        /// subtree max against a brute-force recomputation.
        fn check_index_invariants(&self) {
            assert!(self.indexed, "checker expects an indexed tree");
            for contig in &self.contigs {
                let run = &self.records[contig.off..contig.off + contig.n];
                let n = run.len();
                if n == 0 {
                    continue;
                }
                for pair in run.windows(2) {
                    assert!(pair[0].packed >> 32 <= pair[1].packed >> 32, "run not sorted");
                }
                assert_eq!(contig.root_k, n.ilog2());

                for pos in 0..n {
                    let level = (pos + 1).trailing_zeros();
                    let radius = (1usize << level) - 1;
                    let lo = pos - radius;
                    let hi = (pos + radius).min(n - 1);
                    let expected = run[lo..=hi]
                        .iter()
                        .map(|rec| rec.packed as u32)
                        .max()
                        .expect("non-empty range");
                    assert_eq!(
                        run[pos].aux & MAX_MASK,
                        expected,
                        "stale max at position {pos}"
                    );
                }
            }
        }
    }

    #[fixture]
    fn five_on_x() -> ContigTree<usize> {
        let mut tree = ContigTree::new();
        for (i, (start, end)) in [(3u32, 10u32), (4, 6), (5, 12), (6, 20), (7, 15)]
            .into_iter()
            .enumerate()
        {
            tree.add("x", start, end, i).unwrap();
        }
        tree.index();
        tree
    }

    #[rstest]
    fn test_add_index_query(five_on_x: ContigTree<usize>) {
        let tree = five_on_x;
        tree.check_index_invariants();

        let hits = tree.find_overlaps("x", 7, 8);
        let mut spans: Vec<(u32, u32)> = hits
            .iter()
            .map(|&pos| {
                let rec = tree.record(pos);
                (rec.start, rec.end)
            })
            .collect();
        spans.sort();
        assert_eq!(spans, vec![(3, 10), (5, 12), (6, 20), (7, 15)]);
    }

    #[rstest]
    fn test_results_come_out_start_sorted(five_on_x: ContigTree<usize>) {
        let starts: Vec<u32> = five_on_x
            .find_overlaps("x", 0, 100)
            .iter()
            .map(|&pos| five_on_x.record(pos).start)
            .collect();
        assert_eq!(starts, vec![3, 4, 5, 6, 7]);
    }

    #[rstest]
    fn test_full_range_returns_everything(five_on_x: ContigTree<usize>) {
        assert_eq!(five_on_x.find_overlaps("x", 0, MAX_COORD).len(), 5);
        assert_eq!(five_on_x.count("x", 0, MAX_COORD), 5);
    }

    #[rstest]
    fn test_unknown_contig_is_empty(five_on_x: ContigTree<usize>) {
        assert!(five_on_x.find_overlaps("y", 0, 100).is_empty());
        assert_eq!(five_on_x.count("y", 0, 100), 0);
    }

    #[rstest]
    fn test_empty_tree_is_empty() {
        let mut tree: ContigTree<()> = ContigTree::new();
        tree.index();
        assert!(tree.is_empty());
        assert!(tree.find_overlaps("x", 0, 100).is_empty());
    }

    #[rstest]
    fn test_contigs_partition_records() {
        let mut tree = ContigTree::new();
        tree.add("a", 0, 5, ()).unwrap();
        tree.add("b", 0, 5, ()).unwrap();
        tree.index();
        tree.check_index_invariants();

        assert_eq!(tree.find_overlaps("a", 0, 5).len(), 1);
        assert_eq!(tree.find_overlaps("b", 0, 5).len(), 1);
        assert!(tree.find_overlaps("c", 0, 5).is_empty());
    }

    #[rstest]
    fn test_contig_table() {
        let mut tree: ContigTree<()> = ContigTree::new();
        let a = tree.add_contig("chr1", 1000);
        let b = tree.add_contig("chr2", 0);
        assert_eq!(tree.add_contig("chr1", 0), a);
        assert_ne!(a, b);

        assert_eq!(tree.contig_id("chr1"), Some(a));
        assert_eq!(tree.contig_id("chrX"), None);
        assert_eq!(tree.contig_name(b), Some("chr2"));
        assert_eq!(tree.num_contigs(), 2);
        assert_eq!(tree.contig_len("chr1"), Some(1000));

        tree.add("chr1", 10, 2000, ()).unwrap();
        assert_eq!(tree.contig_len("chr1"), Some(2000));
    }

    #[rstest]
    fn test_contig_without_records_queries_empty() {
        let mut tree: ContigTree<()> = ContigTree::new();
        tree.add_contig("bare", 500);
        tree.add("full", 0, 10, ()).unwrap();
        tree.index();
        assert!(tree.find_overlaps("bare", 0, 500).is_empty());
        assert_eq!(tree.find_overlaps("full", 0, 10).len(), 1);
    }

    #[rstest]
    fn test_add_rejects_bad_records() {
        let mut tree: ContigTree<()> = ContigTree::new();
        assert!(matches!(
            tree.add("x", 10, 5, ()),
            Err(ContigTreeError::InvalidInterval(10, 5))
        ));
        assert!(matches!(
            tree.add("x", 0, MAX_COORD + 1, ()),
            Err(ContigTreeError::CoordinateOverflow(_))
        ));
        assert!(tree.is_empty());
    }

    #[rstest]
    fn test_dirty_query_falls_back_to_scan() {
        let mut tree = ContigTree::new();
        tree.add("x", 0, 10, "a").unwrap();
        tree.add("x", 20, 30, "b").unwrap();

        // no index() yet: results are still correct
        assert!(!tree.is_indexed());
        let hits = tree.find_overlaps("x", 5, 25);
        assert_eq!(hits.len(), 2);
        assert_eq!(tree.count("x", 5, 25), 2);
    }

    #[rstest]
    fn test_reindex_after_more_adds() {
        let mut tree = ContigTree::new();
        tree.add("x", 0, 10, ()).unwrap();
        tree.index();
        assert_eq!(tree.find_overlaps("x", 0, 100).len(), 1);

        tree.add("x", 50, 60, ()).unwrap();
        tree.add("y", 5, 15, ()).unwrap();
        assert!(!tree.is_indexed());
        tree.index();
        tree.check_index_invariants();

        assert_eq!(tree.find_overlaps("x", 0, 100).len(), 2);
        assert_eq!(tree.find_overlaps("y", 0, 100).len(), 1);
    }

    #[rstest]
    fn test_adjacency_is_not_overlap() {
        let mut tree = ContigTree::new();
        tree.add("x", 0, 10, ()).unwrap();
        tree.add("x", 10, 20, ()).unwrap();
        tree.index();

        assert!(tree.find_overlaps("x", 10, 10).is_empty());
        assert_eq!(tree.find_overlaps("x", 9, 10).len(), 1);
        assert_eq!(tree.find_overlaps("x", 9, 11).len(), 2);
    }

    #[rstest]
    fn test_flag_bit_survives_indexing() {
        let mut tree = ContigTree::new();
        let pos = tree.add("x", 5, 9, ()).unwrap();
        tree.set_flag(pos, true);
        tree.index();

        // single record: position 0 before and after
        assert!(tree.flag(0));
        let rec = tree.record(0);
        assert_eq!((rec.start, rec.end), (5, 9));

        tree.set_flag(0, false);
        assert!(!tree.flag(0));
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(7)]
    #[case(8)]
    #[case(100)]
    #[case(257)]
    fn test_max_tree_invariants_across_sizes(#[case] n: u32) {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(u64::from(n));
        let mut tree = ContigTree::new();
        for i in 0..n {
            let start = rng.gen_range(0..10_000u32);
            let end = start + rng.gen_range(0..500u32);
            tree.add("z", start, end, i).unwrap();
        }
        tree.index();
        tree.check_index_invariants();
    }

    #[rstest]
    fn test_overlap_walk_against_oracle() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(1234);
        let mut tree = ContigTree::new();
        let mut stored: Vec<(u32, u32)> = Vec::new();

        for i in 0..500u32 {
            let start = rng.gen_range(0..5_000u32);
            let end = start + rng.gen_range(0..300u32);
            tree.add("c", start, end, i).unwrap();
            stored.push((start, end));
        }
        tree.index();
        tree.check_index_invariants();

        for _ in 0..100 {
            let qs = rng.gen_range(0..5_000u32);
            let qe = qs + rng.gen_range(0..400u32);
            let mut expected: Vec<(u32, u32)> = stored
                .iter()
                .copied()
                .filter(|(s, e)| *s < qe && qs < *e)
                .collect();
            let mut actual: Vec<(u32, u32)> = tree
                .find_overlaps("c", qs, qe)
                .iter()
                .map(|&pos| {
                    let rec = tree.record(pos);
                    (rec.start, rec.end)
                })
                .collect();
            expected.sort();
            actual.sort();
            assert_eq!(expected, actual, "query [{qs}, {qe})");
            assert_eq!(tree.count("c", qs, qe), actual.len());
        }
    }
}
