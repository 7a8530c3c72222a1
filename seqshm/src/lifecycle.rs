//! Bulk teardown of this subsystem's segments
//!
//! Per-stream segments are never unlinked during normal operation; they
//! outlive their writer so a restarted writer or late reader finds them.
//! Teardown is the out-of-band hygiene step for process start, crash
//! recovery and test fixtures.

use crate::error::{ShmError, ShmResult};
use crate::segment::Segment;
use seqshm_common::consts::{NAME_SEPARATOR, SHM_PREFIX};
use tracing::info;

/// Unlink every segment created under the build prefix.
///
/// Succeeds when nothing matches, so it can be called repeatedly. Already
/// mapped transports (including this process's registry entries) keep
/// working; only new opens are affected.
pub fn cleanup() -> ShmResult<usize> {
    cleanup_with_prefix(SHM_PREFIX)
}

/// Unlink every segment whose name is `<prefix>_...`
pub fn cleanup_with_prefix(prefix: &str) -> ShmResult<usize> {
    if prefix.is_empty() {
        return Err(ShmError::InvalidName {
            name: String::new(),
            reason: "teardown prefix is empty",
        });
    }

    let mut scoped = String::with_capacity(prefix.len() + 1);
    scoped.push_str(prefix);
    scoped.push(NAME_SEPARATOR);

    let removed = Segment::unlink_all(&scoped)?;
    info!(prefix = %prefix, removed, "Shared memory teardown complete");
    Ok(removed)
}
