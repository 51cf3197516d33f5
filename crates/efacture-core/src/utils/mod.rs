//! Utility functions for string formatting and manipulation.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_bytes, format_timestamp, preview_secret, truncate_string};
