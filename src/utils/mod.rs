//! Shared utility functions.
//!
//! - `dates`: date cell normalization
//! - `text`: whitespace cleanup, view counters, notice markers
//! - `format`: human-readable sizes and durations

pub mod dates;
pub mod format;
pub mod text;

pub use dates::{extract_date, normalize_date, normalize_date_with};
pub use format::{format_elapsed, format_size};
