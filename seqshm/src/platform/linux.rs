//! Linux-specific shared memory operations

use memmap2::{Mmap, MmapMut, MmapOptions};
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use seqshm_common::consts::SHM_DIR;
use std::fs::File;
use std::io;

/// Linux-specific memory mapping configuration
#[derive(Debug, Clone, Copy)]
pub struct LinuxMemoryConfig {
    /// Prefault pages (`MAP_POPULATE`) so the first access does not page-fault
    pub populate: bool,
    /// Permission bits for newly created objects
    pub mode: Mode,
}

impl Default for LinuxMemoryConfig {
    fn default() -> Self {
        Self {
            populate: true,
            mode: Mode::S_IRUSR | Mode::S_IWUSR,
        }
    }
}

/// POSIX object name for a segment name (`/name`)
fn object_name(name: &str) -> String {
    format!("/{name}")
}

/// Create a new object, failing with `EEXIST` if the name is taken
pub fn create_exclusive(name: &str, config: &LinuxMemoryConfig) -> nix::Result<File> {
    let fd = shm_open(
        object_name(name).as_str(),
        OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
        config.mode,
    )?;
    Ok(File::from(fd))
}

/// Open an existing object
pub fn open_existing(name: &str, writable: bool) -> nix::Result<File> {
    let flags = if writable {
        OFlag::O_RDWR
    } else {
        OFlag::O_RDONLY
    };
    let fd = shm_open(object_name(name).as_str(), flags, Mode::empty())?;
    Ok(File::from(fd))
}

/// Remove an object name
pub fn unlink(name: &str) -> nix::Result<()> {
    shm_unlink(object_name(name).as_str())
}

/// Map an object read-write
pub fn map_read_write(file: &File, len: usize, config: &LinuxMemoryConfig) -> io::Result<MmapMut> {
    let mut options = MmapOptions::new();
    options.len(len);
    if config.populate {
        options.populate();
    }
    unsafe { options.map_mut(file) }
}

/// Map an object read-only
pub fn map_read_only(file: &File, len: usize, config: &LinuxMemoryConfig) -> io::Result<Mmap> {
    let mut options = MmapOptions::new();
    options.len(len);
    if config.populate {
        options.populate();
    }
    unsafe { options.map(file) }
}

/// Names of all shared memory objects starting with `prefix`
#[cfg(target_os = "linux")]
pub fn list_objects(prefix: &str) -> io::Result<Vec<(String, u64)>> {
    let mut objects = Vec::new();
    for entry in std::fs::read_dir(SHM_DIR)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.starts_with(prefix) {
            continue;
        }
        // Object may vanish between readdir and stat
        let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
        objects.push((name, size));
    }
    objects.sort();
    Ok(objects)
}

/// Shared memory objects cannot be enumerated without `/dev/shm`
#[cfg(not(target_os = "linux"))]
pub fn list_objects(_prefix: &str) -> io::Result<Vec<(String, u64)>> {
    tracing::warn!(dir = SHM_DIR, "Segment enumeration unsupported on this platform");
    Ok(Vec::new())
}
