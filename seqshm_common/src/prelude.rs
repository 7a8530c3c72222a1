//! Prelude module for common re-exports.
//!
//! ```rust
//! use seqshm_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, IpcConfig, SharedConfig};

// ─── Naming ─────────────────────────────────────────────────────────
pub use crate::consts::{SHM_NAME_MAX, SHM_PREFIX};
