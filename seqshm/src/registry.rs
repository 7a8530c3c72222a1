//! Lazy transport registry
//!
//! Transports are expensive to build (several syscalls) and cheap to use,
//! so each process keeps exactly one per (transport type, resolved name).
//!
//! Two lookup paths exist:
//!
//! - **Dynamic ids** go through [`Registry::get_or_open`]: a read-locked
//!   linear scan in the steady state, and a write-locked re-check plus
//!   construction on first use.
//! - **Static ids** go through a [`StaticSlot`] placed at the call site by
//!   [`ipc_write!`](crate::ipc_write) / [`ipc_read!`](crate::ipc_read).
//!   After the first call the slot hands out its cached transport without
//!   touching the registry lock or comparing strings.
//!
//! Entries are never removed. Bulk teardown unlinks segment names but
//! leaves already constructed transports mapped.

use crate::error::ShmResult;
use crate::naming;
use crate::payload::ShmPayload;
use crate::transport::{Reader, Role, Transport, Writer};
use parking_lot::RwLock;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};
use tracing::{debug, error};

type Erased = Arc<dyn Any + Send + Sync>;

struct Entry {
    type_id: TypeId,
    name: String,
    transport: Erased,
}

impl Entry {
    fn matches<Tr: Transport>(&self, name: &str) -> bool {
        self.type_id == TypeId::of::<Tr>() && self.name == name
    }
}

/// One transport per (transport type, resolved name)
pub struct Registry {
    entries: RwLock<Vec<Entry>>,
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Process-wide registry used by the free functions and macros
pub fn global_registry() -> &'static Registry {
    &GLOBAL
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Transport for logical `id`, constructed on first use
    pub fn get_or_open<Tr: Transport>(&self, id: &str) -> ShmResult<Arc<Tr>> {
        self.get_or_open_resolved(&naming::resolve(id))
    }

    /// Transport for an already resolved segment name.
    ///
    /// Writers are constructed under the write lock so exactly one handle
    /// ever creates the segment. Readers attach before the lock is taken:
    /// polling a stream that does not exist yet never blocks lookups of
    /// other ids, and a reader that loses the insert race is dropped.
    pub fn get_or_open_resolved<Tr: Transport>(&self, name: &str) -> ShmResult<Arc<Tr>> {
        if let Some(transport) = self.lookup::<Tr>(name) {
            return Ok(transport);
        }

        let attached = match Tr::ROLE {
            Role::Reader => Some(construct::<Tr>(name)?),
            Role::Writer => None,
        };

        let mut entries = self.entries.write();
        // Another thread may have won the race while we waited
        if let Some(transport) = find::<Tr>(&entries, name) {
            return Ok(transport);
        }

        let transport = match attached {
            Some(transport) => transport,
            None => construct::<Tr>(name)?,
        };

        entries.push(Entry {
            type_id: TypeId::of::<Tr>(),
            name: name.to_string(),
            transport: transport.clone(),
        });
        debug!(
            name = %name,
            role = %Tr::ROLE,
            transport = type_name::<Tr>(),
            entries = entries.len(),
            "Registered transport"
        );
        Ok(transport)
    }

    fn lookup<Tr: Transport>(&self, name: &str) -> Option<Arc<Tr>> {
        find::<Tr>(&self.entries.read(), name)
    }

    /// Number of transports held
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no transport has been constructed yet
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Transports of any type bound to resolved `name`
    pub fn count(&self, name: &str) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.name == name)
            .count()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        f.debug_list()
            .entries(entries.iter().map(|entry| &entry.name))
            .finish()
    }
}

fn construct<Tr: Transport>(name: &str) -> ShmResult<Arc<Tr>> {
    Tr::open(name).map(Arc::new).map_err(|e| {
        match Tr::ROLE {
            Role::Writer => error!(
                name = %name,
                errno = e.status_code(),
                "Failed to construct writer: {}", e
            ),
            Role::Reader => debug!(name = %name, "Reader not ready: {}", e),
        }
        e
    })
}

fn find<Tr: Transport>(entries: &[Entry], name: &str) -> Option<Arc<Tr>> {
    entries
        .iter()
        .find(|entry| entry.matches::<Tr>(name))
        .and_then(|entry| Arc::downcast::<Tr>(entry.transport.clone()).ok())
}

/// Call-site cache for a logical id fixed at compile time.
///
/// Each `ipc_write!`/`ipc_read!` expansion owns one slot. The first call
/// resolves the id and fetches the transport from the global registry,
/// later calls return the cached `Arc` directly. A slot reached with a
/// different payload type than the one it cached (a generic caller
/// instantiated twice) falls back to the registry, which still keeps one
/// transport per type.
pub struct StaticSlot {
    id: &'static str,
    writer: OnceLock<Erased>,
    reader: OnceLock<Erased>,
}

impl StaticSlot {
    /// Slot for `id`; nothing is resolved until first use
    pub const fn new(id: &'static str) -> Self {
        Self {
            id,
            writer: OnceLock::new(),
            reader: OnceLock::new(),
        }
    }

    /// Logical id this slot is bound to
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Writer for this slot's id
    #[inline]
    pub fn writer<T: ShmPayload>(&self) -> ShmResult<Arc<Writer<T>>> {
        self.get::<Writer<T>>(&self.writer)
    }

    /// Reader for this slot's id
    #[inline]
    pub fn reader<T: ShmPayload>(&self) -> ShmResult<Arc<Reader<T>>> {
        self.get::<Reader<T>>(&self.reader)
    }

    /// Publish `value` under this slot's id
    #[inline]
    pub fn write<T: ShmPayload>(&self, value: &T) -> ShmResult<()> {
        self.writer::<T>()?.write(value);
        Ok(())
    }

    /// Latest value under this slot's id
    #[inline]
    pub fn read<T: ShmPayload>(&self) -> ShmResult<T> {
        self.reader::<T>()?.read()
    }

    fn get<Tr: Transport>(&self, cell: &OnceLock<Erased>) -> ShmResult<Arc<Tr>> {
        if let Some(cached) = cell.get() {
            if let Ok(transport) = Arc::downcast::<Tr>(cached.clone()) {
                return Ok(transport);
            }
            return global_registry().get_or_open(self.id);
        }

        let transport = global_registry().get_or_open::<Tr>(self.id)?;
        // Losing this race is fine: the registry returned the same Arc
        let _ = cell.set(transport.clone());
        Ok(transport)
    }
}

impl fmt::Debug for StaticSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSlot")
            .field("id", &self.id)
            .field("writer", &self.writer.get().is_some())
            .field("reader", &self.reader.get().is_some())
            .finish()
    }
}
