pub mod time;

// Re-export time utilities
pub use time::{current_time_millis, format_time_diff, millis_since};
