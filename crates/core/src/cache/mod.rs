//! Artifact and API-response caching.
//!
//! The cache is a plain directory tree shared across processes:
//!
//! - artifacts at the paths chosen by [`CacheManager::path_within_cache`]
//! - `.scidd/api/` with one record per idempotent resolver response
//! - `.scidd/entries/` with size and checksum of each downloaded artifact
//! - `.scidd/staging/` for in-flight downloads
//!
//! There is no locking. Every write is a temp file followed by a rename, so
//! readers only ever see complete files.

pub mod api;
pub mod atomic;
pub mod entry;
pub mod fs;
pub mod hash;
pub mod manager;

pub use api::LocalApiCache;
pub use atomic::{Placement, place_staged, stage_file};
pub use entry::{CacheEntry, Verification};
pub use fs::{FsCacheManager, default_path_within_cache};
pub use hash::compute_cache_key;
pub use manager::{BOOKKEEPING_DIR, CacheManager, conforms_to_interface, default_cache_manager, set_default_cache_manager};
