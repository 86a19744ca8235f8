//! Cross-platform utilities and helpers.
//!
//! Currently this is filesystem plumbing: directory creation, recursive
//! copy/removal, atomic writes, and size accounting. Everything here is
//! synchronous; callers that care wrap the calls in `spawn_blocking` or accept
//! the inline cost (the tool performs its work synchronously by design).

pub mod fs;
