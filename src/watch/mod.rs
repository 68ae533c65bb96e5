// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling the `[watch]` globs and extensions into a watch set.
//! - Wiring up a cross-platform filesystem watcher (`notify`) with debouncing.
//! - (Optionally) content hashing to ignore saves that did not change bytes.
//!
//! It knows nothing about phases; it only turns filesystem changes into
//! [`WatchEvent`]s for the controller.

pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod source;
pub mod watcher;

pub use hash::{ContentHashes, compute_file_hash};
pub use patterns::{WatchPatterns, collect_matching_files};
pub use source::{FileChangeSource, WatchEvent, WatchSubscription};
pub use watcher::NotifySource;
