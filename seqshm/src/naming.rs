//! Logical id to segment name resolution
//!
//! A logical id is a path-like stream name such as `/sensor/gps`. Leading
//! slashes are insignificant. The resolved name is
//!
//! ```text
//! <prefix>_<fnv1a32(stripped id)>_<stripped id with '/' -> '_'>
//! ```
//!
//! The hash keeps ids apart that collapse to the same text after slash
//! substitution, e.g. `/my/topic` and `my_topic`.

use seqshm_common::consts::{NAME_SEPARATOR, SHM_PREFIX};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash
pub const fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Strip leading slashes: `/a/b`, `//a/b` and `a/b` are the same id
pub fn normalize(id: &str) -> &str {
    id.trim_start_matches('/')
}

/// Resolve `id` with the build-time prefix
pub fn resolve(id: &str) -> String {
    resolve_with_prefix(SHM_PREFIX, id)
}

/// Resolve `id` with an explicit prefix
pub fn resolve_with_prefix(prefix: &str, id: &str) -> String {
    let id = normalize(id);
    let hash = fnv1a_32(id.as_bytes());

    let mut name = String::with_capacity(prefix.len() + id.len() + 12);
    name.push_str(prefix);
    name.push(NAME_SEPARATOR);
    name.push_str(&hash.to_string());
    name.push(NAME_SEPARATOR);
    name.extend(id.chars().map(|c| if c == '/' { NAME_SEPARATOR } else { c }));
    name
}

/// Split a resolved name back into hash and sanitized id.
///
/// Returns `None` for names that were not produced under `prefix`.
pub fn parse<'a>(prefix: &str, name: &'a str) -> Option<(u32, &'a str)> {
    let rest = name.strip_prefix(prefix)?.strip_prefix(NAME_SEPARATOR)?;
    let (hash, id) = rest.split_once(NAME_SEPARATOR)?;
    if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((hash.parse().ok()?, id))
}
