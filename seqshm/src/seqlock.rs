//! Single-writer, multi-reader sequence lock
//!
//! The writer never waits for readers. Readers copy the payload
//! optimistically and retry when the counter shows the copy may be torn:
//!
//! ```text
//! writer                          reader
//! ------                          ------
//! seq = 2k + 1   (odd, busy)      s1 = seq          (retry if odd)
//! copy value -> payload           copy payload -> local
//! seq = 2k + 2   (even, stable)   s2 = seq          (retry if s1 != s2)
//! ```
//!
//! `SeqLock<T>` is `#[repr(C)]` so the same layout can be placed at the
//! base of a shared memory mapping and seen by every attached process.

use crate::payload::ShmPayload;
use crate::version::SeqCounter;
use seqshm_common::config::IpcConfig;
use seqshm_common::consts::{CACHE_LINE_SIZE, DEFAULT_MAX_READ_ATTEMPTS, DEFAULT_SPIN_LIMIT};
use static_assertions::const_assert_eq;
use std::cell::UnsafeCell;
use std::mem::{MaybeUninit, align_of, size_of};
use std::{hint, ptr, thread};

/// Counter and payload sharing one mapping.
#[repr(C, align(64))]
pub struct SeqLock<T> {
    seq: SeqCounter,
    data: UnsafeCell<MaybeUninit<T>>,
}

const_assert_eq!(align_of::<SeqLock<u8>>(), CACHE_LINE_SIZE);
const_assert_eq!(size_of::<SeqLock<u64>>(), CACHE_LINE_SIZE);

// SAFETY: all cross-thread access goes through the sequence protocol; the
// payload is only ever copied, never borrowed.
unsafe impl<T: ShmPayload> Sync for SeqLock<T> {}

/// A torn-free copy together with the even counter it was observed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot<T> {
    /// The payload.
    pub value: T,
    /// Counter value; `sequence / 2` completed writes precede this copy.
    pub sequence: u64,
}

/// How long a reader keeps retrying under write contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPolicy {
    /// Failed attempts answered with a spin hint before switching to yield.
    pub spin_limit: u32,
    /// Give up after this many attempts; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ReadPolicy {
    /// Retry until a stable copy is obtained, however long it takes.
    pub const fn unbounded() -> Self {
        Self {
            spin_limit: DEFAULT_SPIN_LIMIT,
            max_attempts: None,
        }
    }
}

impl Default for ReadPolicy {
    fn default() -> Self {
        Self {
            spin_limit: DEFAULT_SPIN_LIMIT,
            max_attempts: Some(DEFAULT_MAX_READ_ATTEMPTS),
        }
    }
}

impl From<&IpcConfig> for ReadPolicy {
    fn from(config: &IpcConfig) -> Self {
        Self {
            spin_limit: config.spin_limit,
            max_attempts: config.read_attempt_limit(),
        }
    }
}

impl<T: ShmPayload> SeqLock<T> {
    /// In-process lock with counter 0 and a zeroed payload.
    pub fn new() -> Self {
        Self {
            seq: SeqCounter::new(),
            data: UnsafeCell::new(MaybeUninit::zeroed()),
        }
    }

    /// View the lock placed at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be aligned to `align_of::<SeqLock<T>>()`, point to at
    /// least `size_of::<SeqLock<T>>()` bytes that stay mapped for `'a`, and
    /// those bytes must be zero-filled or previously written by a `SeqLock<T>`.
    pub unsafe fn from_ptr<'a>(base: *const u8) -> &'a Self {
        debug_assert_eq!(base as usize % align_of::<Self>(), 0);
        unsafe { &*(base as *const Self) }
    }

    /// Publish `value`. Never blocks on readers.
    #[inline]
    pub fn write(&self, value: &T) {
        let odd = self.seq.begin_write();
        // SAFETY: the odd counter tells readers to discard what they copy;
        // begin_write made this thread the only writer in the process.
        unsafe {
            ptr::write_volatile(self.data.get(), MaybeUninit::new(*value));
        }
        self.seq.end_write(odd);
    }

    /// One optimistic read. `None` if a write overlapped the copy.
    #[inline]
    pub fn try_read(&self) -> Option<Snapshot<T>> {
        let before = self.seq.load();
        if SeqCounter::is_writing(before) {
            return None;
        }

        // SAFETY: reading into MaybeUninit never asserts validity; the value
        // is only assumed initialized after the counter check below.
        let copy = unsafe { ptr::read_volatile(self.data.get()) };

        let after = self.seq.reload();
        if before != after {
            return None;
        }

        Some(Snapshot {
            // SAFETY: stable counter, and ShmPayload accepts every bit
            // pattern including the zero fill of a fresh segment.
            value: unsafe { copy.assume_init() },
            sequence: before,
        })
    }

    /// Retry [`try_read`](Self::try_read) according to `policy`.
    ///
    /// Returns the number of attempts made when the policy runs out.
    pub fn read(&self, policy: &ReadPolicy) -> Result<Snapshot<T>, u32> {
        let mut attempts: u32 = 0;
        loop {
            if let Some(snapshot) = self.try_read() {
                return Ok(snapshot);
            }
            attempts = attempts.saturating_add(1);
            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(attempts);
            }
            if attempts <= policy.spin_limit {
                hint::spin_loop();
            } else {
                thread::yield_now();
            }
        }
    }

    /// Current counter value.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.seq.load()
    }

    /// Completed writes so far.
    #[inline]
    pub fn writes(&self) -> u64 {
        self.seq.load() / 2
    }

    /// Odd counter left by a writer that died mid-write, if any.
    ///
    /// Readers keep retrying until the write is closed with
    /// [`resume_write`](Self::resume_write).
    pub fn interrupted_write(&self) -> Option<u64> {
        self.seq.interrupted()
    }

    /// Close the interrupted write `odd` by storing a complete `value`.
    ///
    /// The payload left by the dead writer is overwritten before the
    /// counter turns even, so it is never published.
    #[inline]
    pub fn resume_write(&self, odd: u64, value: &T) {
        // SAFETY: the counter is still odd, so readers discard what they
        // copy; the caller holds the only claim on `odd`.
        unsafe {
            ptr::write_volatile(self.data.get(), MaybeUninit::new(*value));
        }
        self.seq.end_write(odd);
    }
}

impl<T: ShmPayload> Default for SeqLock<T> {
    fn default() -> Self {
        Self::new()
    }
}
