//! Utility functions for timestamps and filesystem publishing.

pub mod fs;
pub mod timestamps;

pub use fs::{publish_dir_contents, sanitize_file_stem, write_atomic};
pub use timestamps::{dir_timestamp, format_elapsed, format_iso, iso_timestamp, now_utc, Timestamp};
