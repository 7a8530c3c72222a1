//! Platform-specific shared memory plumbing

pub mod linux;

pub use linux::{
    LinuxMemoryConfig, create_exclusive, list_objects, map_read_only,
    map_read_write, open_existing, unlink,
};
