//! Artifact naming.
//!
//! Names embed a fixed-width `YYYYMMDD_HHMMSS` token right after the prefix,
//! so lexicographic order of names is chronological order.

use chrono::{DateTime, Utc};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn timestamp_token(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// `{prefix}_{timestamp}{ext}` (database dumps).
pub fn dump_file_name(prefix: &str, at: DateTime<Utc>, ext: &str) -> String {
    format!("{prefix}_{}{ext}", timestamp_token(at))
}

/// `{prefix}_backup_{timestamp}{ext}` (snapshot archives).
pub fn archive_file_name(prefix: &str, at: DateTime<Utc>, ext: &str) -> String {
    format!("{prefix}_backup_{}{ext}", timestamp_token(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retention::prefix_matches;
    use chrono::TimeZone;

    #[test]
    fn names_embed_fixed_width_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(dump_file_name("shop", at, ".sql"), "shop_20240305_070809.sql");
        assert_eq!(
            archive_file_name("notes", at, ".tar.gz"),
            "notes_backup_20240305_070809.tar.gz"
        );
    }

    #[test]
    fn generated_names_match_their_prefix() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(prefix_matches(&dump_file_name("shop", at, ".sql"), "shop"));
        assert!(prefix_matches(&archive_file_name("notes", at, ".tar.gz"), "notes"));
    }

    #[test]
    fn lexicographic_order_is_chronological() {
        let earlier = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(dump_file_name("db", earlier, ".sql") < dump_file_name("db", later, ".sql"));
    }
}
