//! Named shared memory segments: create, attach, map, unlink

use crate::error::{ShmError, ShmResult};
use crate::platform::{self, LinuxMemoryConfig};
use memmap2::{Mmap, MmapMut};
use nix::errno::Errno;
use seqshm_common::consts::{SHM_DIR, SHM_NAME_MAX};
use std::fmt;
use std::fs::File;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How [`Segment::open`] treats a missing object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the object if absent, attach otherwise. Mapped read-write.
    Create,
    /// Attach to an existing object only. Mapped read-only.
    Attach,
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenMode::Create => f.write_str("create"),
            OpenMode::Attach => f.write_str("attach"),
        }
    }
}

enum Mapping {
    ReadWrite(MmapMut),
    ReadOnly(Mmap),
}

/// A mapped, fixed-size, OS-named memory region.
///
/// Dropping the segment unmaps it and closes the descriptor. The OS object
/// itself survives until [`Segment::unlink`] or a reboot.
pub struct Segment {
    name: String,
    size: usize,
    mode: OpenMode,
    creator: bool,
    mapping: Mapping,
    // Held for the lifetime of the mapping
    _file: File,
}

impl Segment {
    /// Open `name` with exactly `size` bytes.
    ///
    /// In [`OpenMode::Create`] a missing object is created and zero-filled;
    /// an existing one is attached. Either way an existing object of a
    /// different size is rejected with [`ShmError::SizeMismatch`].
    pub fn open(name: &str, size: usize, mode: OpenMode) -> ShmResult<Self> {
        Self::open_with(name, size, mode, &LinuxMemoryConfig::default())
    }

    /// [`open`](Self::open) with explicit mapping configuration
    pub fn open_with(
        name: &str,
        size: usize,
        mode: OpenMode,
        config: &LinuxMemoryConfig,
    ) -> ShmResult<Self> {
        validate_name(name)?;

        let (file, creator) = match mode {
            OpenMode::Create => create_or_attach(name, size, config)?,
            OpenMode::Attach => (attach(name, size)?, false),
        };

        let mapping = match mode {
            OpenMode::Create => platform::map_read_write(&file, size, config).map(Mapping::ReadWrite),
            OpenMode::Attach => platform::map_read_only(&file, size, config).map(Mapping::ReadOnly),
        };
        let mapping = match mapping {
            Ok(mapping) => mapping,
            Err(e) => {
                if creator {
                    discard(name);
                }
                return Err(ShmError::segment("mmap", name, e));
            }
        };

        if creator {
            info!(name = %name, size, "Created shared memory segment");
        } else {
            debug!(name = %name, size, mode = %mode, "Attached shared memory segment");
        }

        Ok(Self {
            name: name.to_string(),
            size,
            mode,
            creator,
            mapping,
            _file: file,
        })
    }

    /// Unmap this process's view. Other processes are unaffected.
    pub fn close(self) {
        debug!(name = %self.name, "Closing shared memory segment");
    }

    /// Remove `name` from the system.
    ///
    /// Processes that already mapped it keep their view until they unmap.
    pub fn unlink(name: &str) -> ShmResult<()> {
        validate_name(name)?;
        match platform::unlink(name) {
            Ok(()) => {
                debug!(name = %name, "Unlinked shared memory segment");
                Ok(())
            }
            Err(Errno::ENOENT) => Err(ShmError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(ShmError::segment("shm_unlink", name, e)),
        }
    }

    /// Unlink every object whose name starts with `prefix`.
    ///
    /// Objects that vanish concurrently are skipped; other unlink failures
    /// are logged and skipped. Returns how many objects were removed.
    pub fn unlink_all(prefix: &str) -> ShmResult<usize> {
        if prefix.is_empty() {
            return Err(ShmError::InvalidName {
                name: String::new(),
                reason: "cleanup prefix must not be empty",
            });
        }

        let objects =
            platform::list_objects(prefix).map_err(|e| ShmError::segment("readdir", SHM_DIR, e))?;

        let mut removed = 0;
        for (name, _) in objects {
            match Self::unlink(&name) {
                Ok(()) => removed += 1,
                Err(ShmError::NotFound { .. }) => {
                    debug!(name = %name, "Segment already gone");
                }
                Err(e) => {
                    warn!(name = %name, error = %e, "Failed to unlink segment");
                }
            }
        }
        Ok(removed)
    }

    /// Segment name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mapped size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Mode the segment was opened with
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Whether this handle created the OS object
    pub fn is_creator(&self) -> bool {
        self.creator
    }

    /// Base address of the mapping, stable for the handle's lifetime
    pub fn as_ptr(&self) -> *const u8 {
        match &self.mapping {
            Mapping::ReadWrite(mmap) => mmap.as_ptr(),
            Mapping::ReadOnly(mmap) => mmap.as_ptr(),
        }
    }

    /// Whether the mapping permits writes
    pub fn is_writable(&self) -> bool {
        matches!(self.mapping, Mapping::ReadWrite(_))
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mode", &self.mode)
            .field("creator", &self.creator)
            .finish()
    }
}

/// Validate a POSIX shared memory name (without the leading slash)
pub fn validate_name(name: &str) -> ShmResult<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains('/') {
        "name contains '/'"
    } else if name.contains('\0') {
        "name contains NUL"
    } else if name.len() > SHM_NAME_MAX {
        "name exceeds NAME_MAX"
    } else {
        return Ok(());
    };
    Err(ShmError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Unlink an object this handle created but could not finish setting up
fn discard(name: &str) {
    if let Err(e) = platform::unlink(name) {
        warn!(name = %name, error = %e, "Failed to unlink partially created segment");
    }
}

fn create_or_attach(name: &str, size: usize, config: &LinuxMemoryConfig) -> ShmResult<(File, bool)> {
    // The object can be unlinked between our EEXIST and the reopen; go round again.
    const ATTEMPTS: usize = 3;
    const SIZE_WAIT_ATTEMPTS: u32 = 50;
    const SIZE_WAIT: Duration = Duration::from_micros(100);

    for _ in 0..ATTEMPTS {
        match platform::create_exclusive(name, config) {
            Ok(file) => {
                if let Err(e) = file.set_len(size as u64) {
                    discard(name);
                    return Err(ShmError::segment("ftruncate", name, e));
                }
                return Ok((file, true));
            }
            Err(Errno::EEXIST) => {}
            Err(e) => return Err(ShmError::segment("shm_open", name, e)),
        }

        let file = match platform::open_existing(name, true) {
            Ok(file) => file,
            Err(Errno::ENOENT) => continue,
            Err(e) => return Err(ShmError::segment("shm_open", name, e)),
        };

        // Only the creator sizes the object; wait for its ftruncate
        let mut actual = object_len(&file, name)?;
        let mut waited = 0;
        while actual == 0 && waited < SIZE_WAIT_ATTEMPTS {
            thread::sleep(SIZE_WAIT);
            waited += 1;
            actual = object_len(&file, name)?;
        }

        if actual == 0 {
            warn!(name = %name, "Segment exists but was never sized");
            return Err(ShmError::NotFound {
                name: name.to_string(),
            });
        } else if actual != size as u64 {
            return Err(ShmError::SizeMismatch {
                name: name.to_string(),
                expected: size,
                actual,
            });
        }
        return Ok((file, false));
    }

    Err(ShmError::segment("shm_open", name, Errno::ENOENT))
}

fn attach(name: &str, size: usize) -> ShmResult<File> {
    let file = match platform::open_existing(name, false) {
        Ok(file) => file,
        Err(Errno::ENOENT) => {
            return Err(ShmError::NotFound {
                name: name.to_string(),
            });
        }
        Err(e) => return Err(ShmError::segment("shm_open", name, e)),
    };

    match object_len(&file, name)? {
        // Creator is between shm_open and ftruncate
        0 => Err(ShmError::NotFound {
            name: name.to_string(),
        }),
        actual if actual != size as u64 => Err(ShmError::SizeMismatch {
            name: name.to_string(),
            expected: size,
            actual,
        }),
        _ => Ok(file),
    }
}

fn object_len(file: &File, name: &str) -> ShmResult<u64> {
    file.metadata()
        .map(|meta| meta.len())
        .map_err(|e| ShmError::segment("fstat", name, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_name(tag: &str) -> String {
        format!("seqshm_segment_test_{}_{}", tag, std::process::id())
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("abc_123_sensor_gps").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\0b").is_err());
        assert!(validate_name(&"x".repeat(SHM_NAME_MAX)).is_ok());
        assert!(matches!(
            validate_name(&"x".repeat(SHM_NAME_MAX + 1)),
            Err(ShmError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_create_then_attach() {
        let name = test_name("create_attach");
        let writer = Segment::open(&name, 128, OpenMode::Create).unwrap();
        assert!(writer.is_creator());
        assert!(writer.is_writable());
        assert_eq!(writer.size(), 128);

        // Fresh objects are zero-filled
        let bytes = unsafe { std::slice::from_raw_parts(writer.as_ptr(), 128) };
        assert!(bytes.iter().all(|&b| b == 0));

        let reader = Segment::open(&name, 128, OpenMode::Attach).unwrap();
        assert!(!reader.is_creator());
        assert!(!reader.is_writable());
        assert_eq!(reader.mode(), OpenMode::Attach);
        assert_eq!(writer.mode(), OpenMode::Create);

        let second_writer = Segment::open(&name, 128, OpenMode::Create).unwrap();
        assert!(!second_writer.is_creator());

        Segment::unlink(&name).unwrap();
    }

    #[test]
    fn test_writes_visible_through_other_mapping() {
        let name = test_name("shared_view");
        let writer = Segment::open(&name, 64, OpenMode::Create).unwrap();
        let reader = Segment::open(&name, 64, OpenMode::Attach).unwrap();
        assert_ne!(writer.as_ptr(), reader.as_ptr());

        unsafe { (writer.as_ptr() as *mut u8).add(10).write_volatile(0xAB) };
        let seen = unsafe { reader.as_ptr().add(10).read_volatile() };
        assert_eq!(seen, 0xAB);

        Segment::unlink(&name).unwrap();
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let name = test_name("mismatch");
        let _writer = Segment::open(&name, 128, OpenMode::Create).unwrap();

        let attach = Segment::open(&name, 256, OpenMode::Attach);
        assert!(matches!(
            attach,
            Err(ShmError::SizeMismatch {
                expected: 256,
                actual: 128,
                ..
            })
        ));
        let create = Segment::open(&name, 64, OpenMode::Create);
        assert!(matches!(create, Err(ShmError::SizeMismatch { .. })));

        Segment::unlink(&name).unwrap();
    }

    #[test]
    fn test_unsized_object_is_not_resized_by_attacher() {
        let name = test_name("unsized");
        // Creator stalled between shm_open and ftruncate
        let stalled = platform::create_exclusive(&name, &LinuxMemoryConfig::default()).unwrap();

        assert!(matches!(
            Segment::open(&name, 64, OpenMode::Create),
            Err(ShmError::NotFound { .. })
        ));
        assert_eq!(stalled.metadata().unwrap().len(), 0);

        // Creator's own size wins; a different payload size is rejected
        stalled.set_len(128).unwrap();
        assert!(matches!(
            Segment::open(&name, 64, OpenMode::Create),
            Err(ShmError::SizeMismatch {
                expected: 64,
                actual: 128,
                ..
            })
        ));
        let attached = Segment::open(&name, 128, OpenMode::Create).unwrap();
        assert!(!attached.is_creator());

        Segment::unlink(&name).unwrap();
    }

    #[test]
    fn test_discard_unlinks_and_tolerates_missing() {
        let name = test_name("discard");
        Segment::open(&name, 64, OpenMode::Create).unwrap().close();

        discard(&name);
        assert!(matches!(
            Segment::open(&name, 64, OpenMode::Attach),
            Err(ShmError::NotFound { .. })
        ));
        // Already gone: logged, not fatal
        discard(&name);
    }

    #[test]
    fn test_attach_missing_segment() {
        let result = Segment::open(&test_name("missing"), 64, OpenMode::Attach);
        assert!(matches!(result, Err(ShmError::NotFound { .. })));
    }

    #[test]
    fn test_unlink_keeps_existing_mapping() {
        let name = test_name("unlink");
        let writer = Segment::open(&name, 64, OpenMode::Create).unwrap();
        unsafe { (writer.as_ptr() as *mut u8).write_volatile(42) };

        Segment::unlink(&name).unwrap();
        assert_eq!(unsafe { writer.as_ptr().read_volatile() }, 42);

        assert!(matches!(
            Segment::open(&name, 64, OpenMode::Attach),
            Err(ShmError::NotFound { .. })
        ));
        assert!(matches!(
            Segment::unlink(&name),
            Err(ShmError::NotFound { .. })
        ));
        writer.close();
    }

    #[test]
    fn test_unlink_all_by_prefix() {
        let prefix = test_name("bulk");
        for i in 0..3 {
            let segment = Segment::open(&format!("{prefix}_{i}"), 64, OpenMode::Create).unwrap();
            segment.close();
        }

        let bulk = format!("{prefix}_");
        assert_eq!(Segment::unlink_all(&bulk).unwrap(), 3);
        assert_eq!(Segment::unlink_all(&bulk).unwrap(), 0);
        assert!(matches!(
            Segment::open(&format!("{prefix}_0"), 64, OpenMode::Attach),
            Err(ShmError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unlink_all_rejects_empty_prefix() {
        assert!(matches!(
            Segment::unlink_all(""),
            Err(ShmError::InvalidName { .. })
        ));
    }
}
