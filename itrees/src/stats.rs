//! Process-wide counters of nodes visited by overlap queries.
//!
//! Compiled in only with the `stats` cargo feature; without it every hook
//! in the engines collapses to an empty inline call. The counters are
//! cumulative across all trees of an engine kind in the process — they
//! exist to compare engine behavior under a workload, not to meter a
//! single tree.

#[cfg(feature = "stats")]
use std::sync::atomic::{AtomicU64, Ordering};

/// Which engine a visit is charged to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Engine {
    Avl,
    Splay,
    Implicit,
}

#[cfg(feature = "stats")]
static AVL_VISITED: AtomicU64 = AtomicU64::new(0);
#[cfg(feature = "stats")]
static SPLAY_VISITED: AtomicU64 = AtomicU64::new(0);
#[cfg(feature = "stats")]
static IMPLICIT_VISITED: AtomicU64 = AtomicU64::new(0);

#[cfg(feature = "stats")]
#[inline]
pub(crate) fn bump(engine: Engine) {
    let counter = match engine {
        Engine::Avl => &AVL_VISITED,
        Engine::Splay => &SPLAY_VISITED,
        Engine::Implicit => &IMPLICIT_VISITED,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

#[cfg(not(feature = "stats"))]
#[inline(always)]
pub(crate) fn bump(_engine: Engine) {}

/// Snapshot of every counter as `(engine, nodes_visited)` pairs.
#[cfg(feature = "stats")]
pub fn counters() -> [(&'static str, u64); 3] {
    [
        ("avl", AVL_VISITED.load(Ordering::Relaxed)),
        ("splay", SPLAY_VISITED.load(Ordering::Relaxed)),
        ("implicit", IMPLICIT_VISITED.load(Ordering::Relaxed)),
    ]
}

/// Zero every counter.
#[cfg(feature = "stats")]
pub fn reset() {
    AVL_VISITED.store(0, Ordering::Relaxed);
    SPLAY_VISITED.store(0, Ordering::Relaxed);
    IMPLICIT_VISITED.store(0, Ordering::Relaxed);
}
