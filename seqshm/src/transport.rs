//! Typed writer and reader bound to one segment
//!
//! Construction performs the OS calls (open, size, map); afterwards
//! `write` and `read` are plain memory accesses through the [`SeqLock`].

use crate::error::{ShmError, ShmResult};
use crate::payload::ShmPayload;
use crate::segment::{OpenMode, Segment};
use crate::seqlock::{ReadPolicy, SeqLock, Snapshot};
use parking_lot::{RwLock, const_rwlock};
use seqshm_common::consts::{DEFAULT_MAX_READ_ATTEMPTS, DEFAULT_SPIN_LIMIT};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Which side of a stream a transport serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Publishes values
    Writer,
    /// Observes values
    Reader,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Writer => f.write_str("writer"),
            Role::Reader => f.write_str("reader"),
        }
    }
}

/// A transport the registry can construct lazily from a resolved name
pub trait Transport: Any + Send + Sync + Sized {
    /// Side of the stream
    const ROLE: Role;

    /// Open the segment behind `name`
    fn open(name: &str) -> ShmResult<Self>;

    /// Resolved segment name
    fn name(&self) -> &str;
}

static DEFAULT_READ_POLICY: RwLock<ReadPolicy> = const_rwlock(ReadPolicy {
    spin_limit: DEFAULT_SPIN_LIMIT,
    max_attempts: Some(DEFAULT_MAX_READ_ATTEMPTS),
});

/// Install the policy used by readers constructed from now on
pub fn set_default_read_policy(policy: ReadPolicy) {
    *DEFAULT_READ_POLICY.write() = policy;
}

/// Policy new readers start with
pub fn default_read_policy() -> ReadPolicy {
    *DEFAULT_READ_POLICY.read()
}

/// Size of the segment backing a payload of type `T`
pub const fn segment_size<T: ShmPayload>() -> usize {
    size_of::<SeqLock<T>>()
}

/// Single writer for one stream.
///
/// Creates the segment if no process has yet, attaches otherwise.
pub struct Writer<T> {
    segment: Segment,
    // Odd counter adopted from a writer that died mid-write; 0 when none
    interrupted: AtomicU64,
    _payload: PhantomData<fn(T) -> T>,
}

impl<T: ShmPayload> Writer<T> {
    /// Create or attach the segment `name`.
    ///
    /// If the previous writer died mid-write the counter is left odd:
    /// readers keep retrying until this writer's first [`write`](Self::write)
    /// replaces the half-written payload.
    pub fn create(name: &str) -> ShmResult<Self> {
        let segment = Segment::open(name, segment_size::<T>(), OpenMode::Create)?;
        let writer = Self {
            segment,
            interrupted: AtomicU64::new(0),
            _payload: PhantomData,
        };

        if let Some(odd) = writer.lock().interrupted_write() {
            writer.interrupted.store(odd, Ordering::Relaxed);
            warn!(
                name = %name,
                sequence = odd,
                "Previous writer died mid-write; readers wait for the next write"
            );
        }
        Ok(writer)
    }

    fn lock(&self) -> &SeqLock<T> {
        // SAFETY: the mapping is page aligned, exactly segment_size::<T>()
        // bytes, and lives as long as self.
        unsafe { SeqLock::from_ptr(self.segment.as_ptr()) }
    }

    /// Publish `value`. Cannot fail once the writer exists.
    #[inline]
    pub fn write(&self, value: &T) {
        if self.interrupted.load(Ordering::Relaxed) != 0 {
            let odd = self.interrupted.swap(0, Ordering::AcqRel);
            if odd != 0 {
                self.lock().resume_write(odd, value);
                return;
            }
        }
        self.lock().write(value);
    }

    /// Current sequence counter
    pub fn sequence(&self) -> u64 {
        self.lock().sequence()
    }

    /// Whether this process created the segment
    pub fn is_creator(&self) -> bool {
        self.segment.is_creator()
    }
}

impl<T: ShmPayload> Transport for Writer<T> {
    const ROLE: Role = Role::Writer;

    fn open(name: &str) -> ShmResult<Self> {
        Self::create(name)
    }

    fn name(&self) -> &str {
        self.segment.name()
    }
}

impl<T> fmt::Debug for Writer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer").field("segment", &self.segment).finish()
    }
}

/// Reader for one stream. Never creates the segment.
pub struct Reader<T> {
    segment: Segment,
    policy: ReadPolicy,
    _payload: PhantomData<fn() -> T>,
}

impl<T: ShmPayload> Reader<T> {
    /// Attach to `name` with the process default read policy
    pub fn attach(name: &str) -> ShmResult<Self> {
        Self::attach_with(name, default_read_policy())
    }

    /// Attach to `name` with an explicit read policy
    pub fn attach_with(name: &str, policy: ReadPolicy) -> ShmResult<Self> {
        let segment = Segment::open(name, segment_size::<T>(), OpenMode::Attach)?;
        Ok(Self {
            segment,
            policy,
            _payload: PhantomData,
        })
    }

    fn lock(&self) -> &SeqLock<T> {
        // SAFETY: see Writer::lock; the lock is only read through this view.
        unsafe { SeqLock::from_ptr(self.segment.as_ptr()) }
    }

    /// Latest published value
    #[inline]
    pub fn read(&self) -> ShmResult<T> {
        self.read_snapshot().map(|snapshot| snapshot.value)
    }

    /// Latest published value into `entry`, left untouched on error
    #[inline]
    pub fn read_into(&self, entry: &mut T) -> ShmResult<()> {
        *entry = self.read()?;
        Ok(())
    }

    /// Latest published value with the sequence it was observed at
    pub fn read_snapshot(&self) -> ShmResult<Snapshot<T>> {
        let lock = self.lock();
        if lock.sequence() == 0 {
            return Err(self.no_data());
        }
        match lock.read(&self.policy) {
            Ok(snapshot) if snapshot.sequence == 0 => Err(self.no_data()),
            Ok(snapshot) => Ok(snapshot),
            Err(attempts) => Err(ShmError::RetryExhausted {
                name: self.segment.name().to_string(),
                attempts,
            }),
        }
    }

    /// Whether a write completed after the one observed at `since`
    pub fn has_changed(&self, since: u64) -> bool {
        let current = self.lock().sequence();
        current > since + 1
    }

    /// Current sequence counter
    pub fn sequence(&self) -> u64 {
        self.lock().sequence()
    }

    /// Retry policy in use
    pub fn policy(&self) -> ReadPolicy {
        self.policy
    }

    fn no_data(&self) -> ShmError {
        ShmError::NoData {
            name: self.segment.name().to_string(),
        }
    }
}

impl<T: ShmPayload> Transport for Reader<T> {
    const ROLE: Role = Role::Reader;

    fn open(name: &str) -> ShmResult<Self> {
        Self::attach(name)
    }

    fn name(&self) -> &str {
        self.segment.name()
    }
}

impl<T> fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("segment", &self.segment)
            .field("policy", &self.policy)
            .finish()
    }
}
