use std::cmp::Ordering;

use num_traits::{PrimInt, Unsigned};
use rand::Rng;

use crate::stats;
use itrees_core::models::Interval;

const STACK_HINT: usize = 64;

/// Stable handle to a node in a [`SplayTree`].
///
/// Handles survive splays and removals of other nodes; a handle to a
/// removed node is dangling and [`SplayTree::get`] reports it as absent
/// (or as a different interval once the slot is reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

#[derive(Debug, Clone)]
struct Node<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    interval: Interval<I, T>,
    /// Maximum `end` over the subtree rooted here.
    max: I,
    left: Option<u32>,
    right: Option<u32>,
    /// Non-owning back-edge; always mirrors one of the parent's child
    /// links. The arena owns every node.
    parent: Option<u32>,
}

impl<I, T> Node<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    fn new(interval: Interval<I, T>, parent: Option<u32>) -> Self {
        let max = interval.end;
        Node {
            interval,
            max,
            left: None,
            right: None,
            parent,
        }
    }
}

/// A self-adjusting dynamic interval tree.
///
/// Same augmentation as [`AvlTree`](crate::AvlTree) — every node caches
/// the maximum end position of its subtree — but instead of keeping
/// balance, every successful access rotates the touched node to the root
/// through zig / zig-zig / zig-zag steps. Runs of nearby accesses then hit
/// shallow nodes; adversarial access patterns degrade to linear depth.
///
/// Nodes live in an arena and are addressed by [`NodeId`]; the parent
/// back-references are plain indices, so ownership stays strictly
/// root-to-leaf.
///
/// Because reads restructure the tree, every access takes `&mut self` and
/// the type is unsuitable for shared concurrent use, even read-only.
///
/// # Examples
///
/// ```
/// use itrees::{Interval, SplayTree};
///
/// let mut tree = SplayTree::new();
/// let (id, inserted) = tree.insert(Interval { start: 100u32, end: 200, val: "a" });
/// assert!(inserted);
///
/// // a duplicate hands back the first node
/// let (dup, inserted) = tree.insert(Interval { start: 100, end: 200, val: "a" });
/// assert!(!inserted);
/// assert_eq!(dup, id);
/// assert_eq!(tree.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SplayTree<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    slots: Vec<Option<Node<I, T>>>,
    free: Vec<u32>,
    root: Option<u32>,
    len: usize,
    /// Probability that an access actually splays; the `max` augmentation
    /// is correct whether or not the splay runs.
    splay_probability: f64,
}

impl<I, T> Default for SplayTree<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, T> SplayTree<I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    pub fn new() -> Self {
        SplayTree {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
            splay_probability: 1.0,
        }
    }

    /// A tree that splays on each access only with probability `rho`.
    ///
    /// `rho` must lie in `(0, 1]`; 1.0 is the ordinary splay tree. Lower
    /// values trade amortized locality for fewer rotations.
    ///
    /// # Panics
    ///
    /// Panics if `rho` is outside `(0, 1]`.
    pub fn with_splay_probability(rho: f64) -> Self {
        assert!(
            rho > 0.0 && rho <= 1.0,
            "splay probability must be in (0, 1], got {rho}"
        );
        SplayTree {
            splay_probability: rho,
            ..Self::new()
        }
    }

    /// Number of stored intervals.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree holds no intervals.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Handle of the current root, if any.
    pub fn root(&self) -> Option<NodeId> {
        self.root.map(NodeId)
    }

    /// The stored interval with the smallest key, `None` when empty.
    /// Reading the minimum does not splay.
    pub fn min(&self) -> Option<&Interval<I, T>> {
        let mut cur = self.root?;
        while let Some(left) = self.node(cur).left {
            cur = left;
        }
        Some(&self.node(cur).interval)
    }

    /// The interval behind a handle, or `None` for a dangling handle.
    pub fn get(&self, id: NodeId) -> Option<&Interval<I, T>> {
        self.slots
            .get(id.0 as usize)
            .and_then(|slot| slot.as_ref())
            .map(|node| &node.interval)
    }

    /// Insert an interval, splaying the affected node to the root.
    ///
    /// If an equal `(start, end)` key is already stored, the existing
    /// node's handle is returned with `false`, the argument is dropped,
    /// and the existing node is splayed — so a repeated insert still ends
    /// with its node at the root.
    pub fn insert(&mut self, interval: Interval<I, T>) -> (NodeId, bool) {
        let Some(mut cur) = self.root else {
            let id = self.alloc(Node::new(interval, None));
            self.root = Some(id);
            return (NodeId(id), true);
        };
        loop {
            match interval.cmp(&self.node(cur).interval) {
                Ordering::Equal => {
                    self.maybe_splay(cur);
                    return (NodeId(cur), false);
                }
                Ordering::Less => {
                    // the new node lands in this subtree; raise the
                    // augmentation on the way down (a no-op when the key
                    // turns out to be a duplicate further down)
                    if interval.end > self.node(cur).max {
                        self.node_mut(cur).max = interval.end;
                    }
                    match self.node(cur).left {
                        Some(next) => cur = next,
                        None => {
                            let id = self.alloc(Node::new(interval, Some(cur)));
                            self.node_mut(cur).left = Some(id);
                            self.maybe_splay(id);
                            return (NodeId(id), true);
                        }
                    }
                }
                Ordering::Greater => {
                    if interval.end > self.node(cur).max {
                        self.node_mut(cur).max = interval.end;
                    }
                    match self.node(cur).right {
                        Some(next) => cur = next,
                        None => {
                            let id = self.alloc(Node::new(interval, Some(cur)));
                            self.node_mut(cur).right = Some(id);
                            self.maybe_splay(id);
                            return (NodeId(id), true);
                        }
                    }
                }
            }
        }
    }

    /// Exact-key lookup by `(start, end)`.
    ///
    /// A hit splays the found node; a miss leaves the tree untouched.
    pub fn find(&mut self, start: I, end: I) -> Option<NodeId> {
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = self.node(id);
            match (start, end).cmp(&(node.interval.start, node.interval.end)) {
                Ordering::Less => cur = node.left,
                Ordering::Greater => cur = node.right,
                Ordering::Equal => {
                    self.maybe_splay(id);
                    return Some(NodeId(id));
                }
            }
        }
        None
    }

    /// Collect handles of every stored interval overlapping `[start, end)`.
    ///
    /// Same pruned stack walk as the balanced engine. When the result is a
    /// single node, that node is splayed; zero or many matches leave the
    /// top of the tree stable, so wide queries do not churn it. Result
    /// order is unspecified.
    pub fn find_overlaps(&mut self, start: I, end: I) -> Vec<NodeId> {
        let mut hits = Vec::new();
        let mut stack: Vec<u32> = Vec::with_capacity(STACK_HINT);
        if let Some(root) = self.root {
            stack.push(root);
        }
        while let Some(id) = stack.pop() {
            stats::bump(stats::Engine::Splay);
            let node = self.node(id);
            if start >= node.max {
                continue;
            }
            if end <= node.interval.start {
                if let Some(left) = node.left {
                    stack.push(left);
                }
                continue;
            }
            if node.interval.overlap(start, end) {
                hits.push(NodeId(id));
            }
            if let Some(left) = node.left {
                stack.push(left);
            }
            if let Some(right) = node.right {
                stack.push(right);
            }
        }
        if let [only] = hits[..] {
            self.maybe_splay(only.0);
        }
        hits
    }

    /// Remove the interval with exactly this `(start, end)` key.
    ///
    /// The target is splayed to the root and the two detached subtrees are
    /// rejoined by splaying the left subtree's maximum, which then has a
    /// free right slot. Removing an absent key is not an error.
    pub fn remove(&mut self, start: I, end: I) -> Option<Interval<I, T>> {
        let mut cur = self.root;
        let target = loop {
            let id = cur?;
            let node = self.node(id);
            match (start, end).cmp(&(node.interval.start, node.interval.end)) {
                Ordering::Less => cur = node.left,
                Ordering::Greater => cur = node.right,
                Ordering::Equal => break id,
            }
        };

        // removal relies on the root position, so this splay is not
        // subject to the probability knob
        self.splay(target);
        let node = self.release(target);
        if let Some(left) = node.left {
            self.node_mut(left).parent = None;
        }
        if let Some(right) = node.right {
            self.node_mut(right).parent = None;
        }
        match (node.left, node.right) {
            (None, right) => self.root = right,
            (left @ Some(_), None) => self.root = left,
            (Some(left), Some(right)) => {
                let mut max_node = left;
                while let Some(next) = self.node(max_node).right {
                    max_node = next;
                }
                self.root = Some(left);
                self.splay(max_node);
                self.node_mut(max_node).right = Some(right);
                self.node_mut(right).parent = Some(max_node);
                self.refresh_max(max_node);
            }
        }
        Some(node.interval)
    }

    /// In-order iterator over the stored intervals. Does not splay.
    pub fn iter(&self) -> Iter<'_, I, T> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::with_capacity(STACK_HINT),
        };
        iter.push_left_spine(self.root);
        iter
    }

    fn node(&self, id: u32) -> &Node<I, T> {
        self.slots[id as usize].as_ref().expect("live node id")
    }

    fn node_mut(&mut self, id: u32) -> &mut Node<I, T> {
        self.slots[id as usize].as_mut().expect("live node id")
    }

    fn alloc(&mut self, node: Node<I, T>) -> u32 {
        self.len += 1;
        match self.free.pop() {
            Some(id) => {
                self.slots[id as usize] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                (self.slots.len() - 1) as u32
            }
        }
    }

    fn release(&mut self, id: u32) -> Node<I, T> {
        self.len -= 1;
        self.free.push(id);
        self.slots[id as usize].take().expect("live node id")
    }

    /// Recompute `max` from the node's own end and its children. O(1).
    fn refresh_max(&mut self, id: u32) {
        let node = self.node(id);
        let mut max = node.interval.end;
        if let Some(left) = node.left {
            let left_max = self.node(left).max;
            if left_max > max {
                max = left_max;
            }
        }
        if let Some(right) = node.right {
            let right_max = self.node(right).max;
            if right_max > max {
                max = right_max;
            }
        }
        self.node_mut(id).max = max;
    }

    /// Rotate `x` above its parent, repairing the augmentation locally:
    /// `x` takes over the old subtree root's `max`, the demoted parent
    /// recomputes its own. Subtrees whose parent did not change keep
    /// their `max`.
    fn rotate_up(&mut self, x: u32) {
        let p = self.node(x).parent.expect("rotate_up needs a parent");
        let g = self.node(p).parent;
        let p_max = self.node(p).max;

        if self.node(p).left == Some(x) {
            let inner = self.node(x).right;
            self.node_mut(p).left = inner;
            if let Some(inner) = inner {
                self.node_mut(inner).parent = Some(p);
            }
            self.node_mut(x).right = Some(p);
        } else {
            let inner = self.node(x).left;
            self.node_mut(p).right = inner;
            if let Some(inner) = inner {
                self.node_mut(inner).parent = Some(p);
            }
            self.node_mut(x).left = Some(p);
        }
        self.node_mut(p).parent = Some(x);
        self.node_mut(x).parent = g;
        match g {
            Some(g) => {
                if self.node(g).left == Some(p) {
                    self.node_mut(g).left = Some(x);
                } else {
                    self.node_mut(g).right = Some(x);
                }
            }
            None => self.root = Some(x),
        }

        self.refresh_max(p);
        self.node_mut(x).max = p_max;
    }

    /// Bring `x` to the root with zig / zig-zig / zig-zag steps.
    fn splay(&mut self, x: u32) {
        while let Some(p) = self.node(x).parent {
            match self.node(p).parent {
                // zig
                None => self.rotate_up(x),
                Some(g) => {
                    let x_is_left = self.node(p).left == Some(x);
                    let p_is_left = self.node(g).left == Some(p);
                    if x_is_left == p_is_left {
                        // zig-zig: grandparent-first
                        self.rotate_up(p);
                        self.rotate_up(x);
                    } else {
                        // zig-zag
                        self.rotate_up(x);
                        self.rotate_up(x);
                    }
                }
            }
        }
    }

    fn maybe_splay(&mut self, x: u32) {
        if self.splay_probability >= 1.0 {
            self.splay(x);
        } else if rand::thread_rng().gen_bool(self.splay_probability) {
            self.splay(x);
        }
    }
}

/// In-order iterator over a [`SplayTree`], created by [`SplayTree::iter`].
#[derive(Debug)]
pub struct Iter<'a, I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    tree: &'a SplayTree<I, T>,
    stack: Vec<u32>,
}

impl<'a, I, T> Iter<'a, I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync,
{
    fn push_left_spine(&mut self, mut cur: Option<u32>) {
        while let Some(id) = cur {
            self.stack.push(id);
            cur = self.tree.node(id).left;
        }
    }
}

impl<'a, I, T> Iterator for Iter<'a, I, T>
where
    I: PrimInt + Unsigned + Send + Sync,
    T: Eq + Clone + Send + Sync + 'a,
{
    type Item = &'a Interval<I, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let tree = self.tree;
        let node = tree.node(id);
        self.push_left_spine(node.right);
        Some(&node.interval)
    }
}
