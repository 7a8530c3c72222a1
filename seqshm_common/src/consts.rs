//! Shared memory constants.
//!
//! These constants are the single source of truth for segment naming and
//! reader tuning. All other crates import from here.

/// Segment name prefix compiled into the binary.
///
/// Overridable at build time with the `SEQSHM_PREFIX` environment variable.
/// The default is `seqshm` followed by the SHA-1 of `"seqshm\n"`.
pub const SHM_PREFIX: &str = match option_env!("SEQSHM_PREFIX") {
    Some(prefix) => prefix,
    None => DEFAULT_SHM_PREFIX,
};

/// Prefix used when `SEQSHM_PREFIX` is not set at build time.
pub const DEFAULT_SHM_PREFIX: &str = "seqshmcdcf0a671fea8b0da3d545edb4fc1b094ef3c7bb";

/// Separator between the prefix, hash and sanitized id of a resolved name.
pub const NAME_SEPARATOR: char = '_';

/// Longest shared memory object name accepted by the OS (`NAME_MAX`).
pub const SHM_NAME_MAX: usize = 255;

/// Directory where Linux exposes POSIX shared memory objects.
pub const SHM_DIR: &str = "/dev/shm";

/// CPU cache line size in bytes.
///
/// The sequence lock header is aligned to this to keep the counter
/// off cache lines shared with unrelated data.
pub const CACHE_LINE_SIZE: usize = 64;

/// Failed read attempts that spin before the reader starts yielding.
pub const DEFAULT_SPIN_LIMIT: u32 = 64;

/// Read attempts before a reader gives up with `RetryExhausted`.
pub const DEFAULT_MAX_READ_ATTEMPTS: u32 = 1_000_000;
