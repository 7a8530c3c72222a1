//! seqshm Common Library
//!
//! This crate provides shared constants and configuration loading utilities
//! for all seqshm workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Segment naming and reader tuning constants
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use seqshm_common::consts::SHM_PREFIX;
//! use seqshm_common::config::{ConfigLoader, IpcConfig};
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
