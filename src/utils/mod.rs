//! Shared helpers

pub mod error;

pub use error::{AppError, AppResult, ErrorResponse};

/// Format a number of seconds as `m:ss`
pub fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(8), "0:08");
        assert_eq!(format_time(75), "1:15");
    }
}
