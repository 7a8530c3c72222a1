//! Error types for shared memory operations

use thiserror::Error;

/// Errors that can occur during shared memory operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// OS call on a segment failed (permission, out of space, name too long, ...)
    #[error("{op} failed for segment {name}: {source}")]
    Segment {
        /// Failing system call
        op: &'static str,
        /// Segment name
        name: String,
        /// OS error, carries the errno
        #[source]
        source: std::io::Error,
    },

    /// Segment not found
    #[error("Segment not found: {name}")]
    NotFound {
        /// Segment name
        name: String,
    },

    /// Existing segment has a different size than the payload requires
    #[error("Segment {name} size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        /// Segment name
        name: String,
        /// Size required by the payload type
        expected: usize,
        /// Size of the existing object
        actual: u64,
    },

    /// Name cannot be used as a POSIX shared memory name
    #[error("Invalid segment name {name:?}: {reason}")]
    InvalidName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Reader gave up under sustained write activity
    #[error("Read of {name} gave up after {attempts} attempts")]
    RetryExhausted {
        /// Segment name
        name: String,
        /// Attempts made
        attempts: u32,
    },

    /// Segment exists but no write has completed yet
    #[error("Segment {name} has not been written yet")]
    NoData {
        /// Segment name
        name: String,
    },
}

impl ShmError {
    pub(crate) fn segment(op: &'static str, name: &str, source: impl Into<std::io::Error>) -> Self {
        ShmError::Segment {
            op,
            name: name.to_string(),
            source: source.into(),
        }
    }

    /// OS error code behind this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            ShmError::Segment { source, .. } => source.raw_os_error(),
            ShmError::NotFound { .. } => Some(nix::libc::ENOENT),
            _ => None,
        }
    }

    /// C-style status: the errno for OS failures, `-1` otherwise. Never `0`.
    pub fn status_code(&self) -> i32 {
        match self.raw_os_error() {
            Some(code) if code != 0 => code,
            _ => -1,
        }
    }
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;

    #[test]
    fn test_segment_error_keeps_errno() {
        let err = ShmError::segment("shm_open", "x", Errno::EACCES);
        assert_eq!(err.raw_os_error(), Some(Errno::EACCES as i32));
        assert_eq!(err.status_code(), Errno::EACCES as i32);
        assert!(err.to_string().contains("shm_open"));
    }

    #[test]
    fn test_not_found_maps_to_enoent() {
        let err = ShmError::NotFound {
            name: "missing".to_string(),
        };
        assert_eq!(err.raw_os_error(), Some(Errno::ENOENT as i32));
    }

    #[test]
    fn test_non_os_errors_have_nonzero_status() {
        let err = ShmError::NoData {
            name: "fresh".to_string(),
        };
        assert_eq!(err.raw_os_error(), None);
        assert_eq!(err.status_code(), -1);
    }
}
