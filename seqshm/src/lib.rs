//! # seqshm
//!
//! Low-latency, lock-free publication of small fixed-size values between
//! processes on one host. One writer per stream publishes the current
//! value into a named POSIX shared memory segment; any number of readers
//! in any process take torn-free copies without ever blocking the writer.
//!
//! ## Features
//!
//! - **Sequence lock**: writes never wait, reads retry only while a write
//!   overlaps their copy
//! - **Latest value wins**: each write overwrites the single current value,
//!   nothing is queued
//! - **Path-like stream ids**: `/sensor/gps` resolves to a collision
//!   resistant segment name, leading slashes are insignificant
//! - **Lazy transports**: segments are opened on first use and reused
//!   for the process lifetime, safe under concurrent first use
//! - **Teardown**: one call unlinks every segment this crate created
//!
//! ## Architecture Overview
//!
//! ```text
//!   write(&v, "/demo")                        read("/demo")
//!          │                                        │
//!   ┌──────▼───────┐   /demo ->             ┌───────▼──────┐
//!   │   naming     │   <prefix>_<h>_demo    │   naming     │
//!   └──────┬───────┘                        └───────┬──────┘
//!   ┌──────▼───────┐   one transport per    ┌───────▼──────┐
//!   │  Writer<T>   │   (type, name) per     │  Reader<T>   │
//!   │  (registry)  │   process              │  (registry)  │
//!   └──────┬───────┘                        └───────┬──────┘
//!          │      ┌──────────────────────────┐      │
//!          └─────►│ segment: [seq | payload] │◄─────┘
//!                 └──────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Dynamic ids
//!
//! ```rust,no_run
//! # fn main() -> Result<(), seqshm::ShmError> {
//! // Producer process
//! seqshm::write(&7i32, "/demo")?;
//!
//! // Consumer process
//! let value: i32 = seqshm::read("/demo")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Static ids
//!
//! A literal id binds the transport to the call site; after the first call
//! no registry lookup happens.
//!
//! ```rust,no_run
//! use seqshm::{ipc_read, ipc_write};
//!
//! # fn main() -> Result<(), seqshm::ShmError> {
//! ipc_write!(1.5f64, "/motor/speed")?;
//! let speed = ipc_read!(f64, "/motor/speed")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Custom payloads
//!
//! ```rust,no_run
//! use seqshm::{ShmPayload, Writer, Reader, naming};
//!
//! #[derive(Clone, Copy)]
//! #[repr(C)]
//! struct Wrench {
//!     force: [f32; 3],
//!     torque: [f32; 3],
//! }
//!
//! unsafe impl ShmPayload for Wrench {}
//!
//! # fn main() -> Result<(), seqshm::ShmError> {
//! let name = naming::resolve("/arm/wrench");
//! let writer = Writer::<Wrench>::create(&name)?;
//! writer.write(&Wrench { force: [0.0; 3], torque: [0.0; 3] });
//!
//! let reader = Reader::<Wrench>::attach(&name)?;
//! let snapshot = reader.read_snapshot()?;
//! if reader.has_changed(snapshot.sequence) {
//!     // a newer value is available
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Writers fail only at construction (segment create/attach). Readers
//! additionally report [`ShmError::NotFound`] before any writer created the
//! segment, [`ShmError::NoData`] before the first completed write, and
//! [`ShmError::RetryExhausted`] when the [`ReadPolicy`] gives up. None of
//! these failures is cached; the next call tries again.
//!
//! ## Thread Safety
//!
//! - **Writer**: `Sync`; concurrent `write` calls from one process serialize
//!   on the sequence counter. Writers in different processes must not share
//!   a stream.
//! - **Reader**: `Sync`; never blocks anyone.
//! - **Registry**: the insert path is the only lock; steady-state lookups
//!   take it shared.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod discovery;
pub mod error;
pub mod lifecycle;
pub mod naming;
pub mod payload;
pub mod platform;
pub mod registry;
pub mod segment;
pub mod seqlock;
pub mod transport;
pub mod version;

pub use discovery::SegmentInfo;
pub use error::{ShmError, ShmResult};
pub use lifecycle::cleanup;
pub use payload::ShmPayload;
pub use registry::{Registry, StaticSlot, global_registry};
pub use segment::{OpenMode, Segment};
pub use seqlock::{ReadPolicy, SeqLock, Snapshot};
pub use transport::{Reader, Role, Transport, Writer, set_default_read_policy};

use seqshm_common::config::IpcConfig;

/// Publish `value` on logical `id`.
///
/// The first call for a (type, id) pair creates or attaches the segment;
/// later calls are a registry lookup and a memory copy.
pub fn write<T: ShmPayload>(value: &T, id: &str) -> ShmResult<()> {
    global_registry().get_or_open::<Writer<T>>(id)?.write(value);
    Ok(())
}

/// Latest value published on logical `id`
pub fn read<T: ShmPayload>(id: &str) -> ShmResult<T> {
    global_registry().get_or_open::<Reader<T>>(id)?.read()
}

/// Latest value published on logical `id` into `entry`.
///
/// `entry` is left untouched on error.
pub fn read_into<T: ShmPayload>(entry: &mut T, id: &str) -> ShmResult<()> {
    global_registry()
        .get_or_open::<Reader<T>>(id)?
        .read_into(entry)
}

/// Apply process-wide IPC settings.
///
/// Readers constructed afterwards use the configured retry policy. With
/// `cleanup_on_start` set, every segment under the build prefix is
/// unlinked; the number removed is returned.
pub fn configure(config: &IpcConfig) -> ShmResult<usize> {
    set_default_read_policy(ReadPolicy::from(config));
    tracing::debug!(
        spin_limit = config.spin_limit,
        max_read_attempts = config.max_read_attempts,
        "Default read policy updated"
    );

    if config.cleanup_on_start {
        cleanup()
    } else {
        Ok(0)
    }
}

/// Publish a value, binding a literal id to the call site.
///
/// With a string literal id the transport is cached in a static at the
/// call site; any other expression goes through the dynamic registry.
#[macro_export]
macro_rules! ipc_write {
    ($value:expr, $id:literal) => {{
        static SLOT: $crate::StaticSlot = $crate::StaticSlot::new($id);
        SLOT.write(&$value)
    }};
    ($value:expr, $id:expr) => {
        $crate::write(&$value, &$id)
    };
}

/// Read the latest value, binding a literal id to the call site.
///
/// `ipc_read!(T, id)` names the payload type, `ipc_read!(id)` infers it.
#[macro_export]
macro_rules! ipc_read {
    ($t:ty, $id:literal) => {{
        static SLOT: $crate::StaticSlot = $crate::StaticSlot::new($id);
        SLOT.read::<$t>()
    }};
    ($t:ty, $id:expr) => {
        $crate::read::<$t>(&$id)
    };
    ($id:literal) => {{
        static SLOT: $crate::StaticSlot = $crate::StaticSlot::new($id);
        SLOT.read()
    }};
    ($id:expr) => {
        $crate::read(&$id)
    };
}

/// Initialize tracing with `RUST_LOG` filtering. Later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
