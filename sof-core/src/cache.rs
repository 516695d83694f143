//! Cache-line padding and explicit writeback/invalidate bookkeeping.
//!
//! There is no real data cache on the host this crate runs its tests
//! on. `CoherenceCounters` stands in for the dcache maintenance
//! instructions a target platform would issue, so the discipline in
//! [`crate::stream`]-described buffers stays load-bearing and testable
//! rather than becoming a no-op.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache-line padded wrapper, avoiding false sharing between
/// producer- and consumer-owned header words on real hardware.
#[repr(align(64))]
pub struct CachePadded<T>(pub T);

impl<T> CachePadded<T> {
    /// Wraps `value`, padding it out to a 64-byte cache line.
    pub const fn new(value: T) -> Self {
        CachePadded(value)
    }
}

impl<T> std::ops::Deref for CachePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> std::ops::DerefMut for CachePadded<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Counts writeback/invalidate operations performed around a
/// cross-core hand-off.
///
/// A real target issues dcache clean/invalidate instructions over a
/// byte range; here the count itself is the observable, since the
/// property tests only need to know that exactly one writeback and one
/// invalidate happened per period, not that specific cache lines were
/// touched.
#[derive(Default)]
pub struct CoherenceCounters {
    writebacks: AtomicU64,
    invalidates: AtomicU64,
}

impl CoherenceCounters {
    /// Creates a counter pair starting at zero.
    pub const fn new() -> Self {
        Self {
            writebacks: AtomicU64::new(0),
            invalidates: AtomicU64::new(0),
        }
    }

    /// Records a writeback of a dirty region to the shared view.
    pub fn writeback(&self) {
        self.writebacks.fetch_add(1, Ordering::AcqRel);
    }

    /// Records an invalidation of a stale local view.
    pub fn invalidate(&self) {
        self.invalidates.fetch_add(1, Ordering::AcqRel);
    }

    /// Total writebacks recorded so far.
    pub fn writeback_count(&self) -> u64 {
        self.writebacks.load(Ordering::Acquire)
    }

    /// Total invalidations recorded so far.
    pub fn invalidate_count(&self) -> u64 {
        self.invalidates.load(Ordering::Acquire)
    }
}
