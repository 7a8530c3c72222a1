//! Sequence counter for the even/odd write protocol

use std::hint;
use std::sync::atomic::{AtomicU64, Ordering, fence};

/// Sequence counter using even/odd optimistic versioning
///
/// Even means the payload is stable, odd means a write is in progress.
/// Every completed write advances the counter by exactly 2.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct SeqCounter {
    counter: AtomicU64,
}

impl SeqCounter {
    /// Create a new counter starting at 0 (even, nothing written)
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Get current value with acquire ordering
    #[inline]
    pub fn load(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Reload after a payload copy.
    ///
    /// The acquire fence keeps the preceding payload reads from moving
    /// below this load.
    #[inline]
    pub fn reload(&self) -> u64 {
        fence(Ordering::Acquire);
        self.counter.load(Ordering::Relaxed)
    }

    /// Begin write operation - move from even to odd.
    ///
    /// Threads of the same process sharing one writer take turns here; an
    /// odd value left by another thread is waited out with spin hints.
    /// Returns the odd value now published.
    #[inline]
    pub fn begin_write(&self) -> u64 {
        let mut current = self.counter.load(Ordering::Relaxed);
        loop {
            if Self::is_writing(current) {
                hint::spin_loop();
                current = self.counter.load(Ordering::Relaxed);
                continue;
            }
            match self.counter.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        // Payload stores below must not become visible before the odd value.
        fence(Ordering::Release);
        current + 1
    }

    /// Complete write operation - publish the next even value
    #[inline]
    pub fn end_write(&self, odd: u64) -> u64 {
        debug_assert!(Self::is_writing(odd));
        let next = odd + 1;
        self.counter.store(next, Ordering::Release);
        next
    }

    /// Odd value left behind by a writer that died mid-write.
    ///
    /// The counter stays odd so readers keep discarding the half-written
    /// payload; the caller owns the unfinished write and closes it with
    /// [`end_write`](Self::end_write) once the payload is whole again.
    pub fn interrupted(&self) -> Option<u64> {
        let current = self.counter.load(Ordering::Acquire);
        Self::is_writing(current).then_some(current)
    }

    /// Check if version is stable (even)
    #[inline]
    pub const fn is_stable(version: u64) -> bool {
        version % 2 == 0
    }

    /// Check if version indicates write in progress (odd)
    #[inline]
    pub const fn is_writing(version: u64) -> bool {
        version % 2 == 1
    }
}
