//! Segment discovery
//!
//! Enumerates the segments currently present on the host and decodes
//! their resolved names back into hash and sanitized id. The logical
//! id itself cannot be recovered exactly (slashes and underscores
//! collapse), which is what the hash is for.

use crate::error::{ShmError, ShmResult};
use crate::naming;
use crate::platform;
use seqshm_common::consts::{NAME_SEPARATOR, SHM_DIR, SHM_PREFIX};
use serde::Serialize;

/// One segment found on the host
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Resolved segment name
    pub name: String,
    /// Id hash, when the name follows the naming scheme
    pub hash: Option<u32>,
    /// Sanitized id (`/` replaced by `_`), when the name follows the naming scheme
    pub id: Option<String>,
    /// Object size in bytes
    pub size: u64,
}

impl SegmentInfo {
    fn decode(prefix: &str, name: String, size: u64) -> Self {
        let (hash, id) = match naming::parse(prefix, &name) {
            Some((hash, id)) => (Some(hash), Some(id.to_string())),
            None => (None, None),
        };
        Self {
            name,
            hash,
            id,
            size,
        }
    }

    /// Whether `logical_id` resolves to this segment under `prefix`
    pub fn matches(&self, prefix: &str, logical_id: &str) -> bool {
        naming::resolve_with_prefix(prefix, logical_id) == self.name
    }
}

/// Segments whose names belong to `prefix`, sorted by name
pub fn list_segments(prefix: &str) -> ShmResult<Vec<SegmentInfo>> {
    let mut scoped = String::with_capacity(prefix.len() + 1);
    scoped.push_str(prefix);
    scoped.push(NAME_SEPARATOR);

    let objects =
        platform::list_objects(&scoped).map_err(|e| ShmError::segment("readdir", SHM_DIR, e))?;

    Ok(objects
        .into_iter()
        .map(|(name, size)| SegmentInfo::decode(prefix, name, size))
        .collect())
}

/// Segments under the build prefix
pub fn list() -> ShmResult<Vec<SegmentInfo>> {
    list_segments(SHM_PREFIX)
}
