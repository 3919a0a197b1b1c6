//! RetentionPolicy - どの古い artifact を消すかを決める純粋関数
//!
//! # 判定ルール
//! - 名前が `{prefix}_` で始まり、続きが（任意の `backup_` の後に）数字で始まる
//!   → その prefix の artifact とみなす（単なる部分一致ではない）
//! - 拡張子が許可リストのどれかで終わる
//! - 一致集合は重複排除し、辞書順（= タイムスタンプ順）に並べる
//! - 先頭から `len - max_backups` 件を削除対象にする
//!
//! 名前に埋め込まれた固定幅 `YYYYMMDD_HHMMSS` が prefix の直後にあることが前提。

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

/// Returns true when `name` is an artifact written under `prefix`.
///
/// `foo` matches `foo_20240101_000000.zip` and `foo_backup_20240101_000000.zip`
/// but neither `foobar_20240101_000000.zip` nor `foo_bar_20240101_000000.zip`.
pub fn prefix_matches(name: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    let Some(rest) = name.strip_prefix(prefix).and_then(|r| r.strip_prefix('_')) else {
        return false;
    };
    let rest = rest.strip_prefix("backup_").unwrap_or(rest);
    rest.starts_with(|c: char| c.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    primary_prefix: String,
    alternate_prefixes: Vec<String>,
    allowed_extensions: Vec<String>,
    max_backups: NonZeroUsize,
}

impl RetentionPolicy {
    pub fn new(
        primary_prefix: impl Into<String>,
        alternate_prefixes: Vec<String>,
        allowed_extensions: Vec<String>,
        max_backups: NonZeroUsize,
    ) -> Self {
        Self {
            primary_prefix: primary_prefix.into(),
            alternate_prefixes,
            allowed_extensions,
            max_backups,
        }
    }

    pub fn max_backups(&self) -> NonZeroUsize {
        self.max_backups
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_prefix.as_str())
            .chain(self.alternate_prefixes.iter().map(String::as_str))
    }

    /// Does `name` belong to this series?
    pub fn matches(&self, name: &str) -> bool {
        self.prefixes().any(|p| prefix_matches(name, p))
            && self.allowed_extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    /// Matching names, deduplicated, oldest first.
    pub fn matched<'a, I>(&self, names: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter(|name| self.matches(name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Names to delete so that at most `max_backups` matching names remain.
    ///
    /// Returned oldest first. Empty when nothing exceeds the limit, including
    /// for an empty listing.
    pub fn select_for_deletion<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let matched = self.matched(names.iter().map(AsRef::as_ref));
        let excess = matched.len().saturating_sub(self.max_backups.get());
        matched
            .into_iter()
            .take(excess)
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy(prefix: &str, alternates: &[&str], max: usize) -> RetentionPolicy {
        RetentionPolicy::new(
            prefix,
            alternates.iter().map(|s| s.to_string()).collect(),
            vec![".zip".to_string(), ".tar.gz".to_string(), ".7z".to_string()],
            NonZeroUsize::new(max).unwrap(),
        )
    }

    fn names(count: usize, prefix: &str) -> Vec<String> {
        (0..count)
            .map(|i| format!("{prefix}_202401{:02}_120000.zip", i + 1))
            .collect()
    }

    #[rstest]
    #[case::plain("foo_20240101_000000.zip", "foo", true)]
    #[case::backup_infix("foo_backup_20240101_000000.tar.gz", "foo", true)]
    #[case::longer_name("foobar_20240101.zip", "foo", false)]
    #[case::underscore_name("foo_bar_20240101_000000.zip", "foo", false)]
    #[case::no_timestamp("foo_backup_latest.zip", "foo", false)]
    #[case::bare_prefix("foo.zip", "foo", false)]
    #[case::empty_prefix("_20240101_000000.zip", "", false)]
    #[case::prefix_with_underscore("foo_bar_20240101_000000.zip", "foo_bar", true)]
    fn prefix_matching(#[case] name: &str, #[case] prefix: &str, #[case] expected: bool) {
        assert_eq!(prefix_matches(name, prefix), expected);
    }

    #[test]
    fn substring_is_not_enough() {
        let p = policy("foo", &[], 1);
        assert!(!p.matches("foobar_20240101.zip"));

        let p = policy("foo", &["foobar"], 1);
        assert!(p.matches("foobar_20240101.zip"));
    }

    #[test]
    fn extension_must_be_allowed() {
        let p = policy("foo", &[], 1);
        assert!(p.matches("foo_20240101_000000.7z"));
        assert!(!p.matches("foo_20240101_000000.sql"));
        assert!(!p.matches("foo_20240101_000000.zip.part"));
    }

    #[test]
    fn deletes_oldest_excess() {
        let p = policy("notes", &[], 2);
        let listing = names(5, "notes");
        let deleted = p.select_for_deletion(&listing);
        assert_eq!(deleted, listing[..3].to_vec());
    }

    #[test]
    fn nothing_to_delete_within_limit() {
        let p = policy("notes", &[], 2);
        assert!(p.select_for_deletion(&names(2, "notes")).is_empty());
        assert!(p.select_for_deletion(&names(1, "notes")).is_empty());
    }

    #[test]
    fn empty_listing_yields_empty_set() {
        let p = policy("notes", &[], 2);
        let empty: Vec<String> = Vec::new();
        assert!(p.select_for_deletion(&empty).is_empty());
    }

    #[test]
    fn other_targets_are_never_selected() {
        let p = policy("foo", &[], 1);
        let mut listing = names(3, "foobar");
        listing.extend(names(3, "foo"));
        listing.push("README.md".to_string());

        let deleted = p.select_for_deletion(&listing);
        assert_eq!(deleted.len(), 2);
        assert!(deleted.iter().all(|n| n.starts_with("foo_")));
    }

    #[test]
    fn alternate_prefixes_are_reconciled_without_duplicates() {
        // "sjg" の過去の artifact は "sillytavern" 名義で残っている
        let p = policy("sjg", &["sillytavern", "sjg"], 2);
        let listing = vec![
            "sillytavern_20240101_000000.zip".to_string(),
            "sillytavern_20240102_000000.zip".to_string(),
            "sjg_backup_20240103_000000.tar.gz".to_string(),
            "sjg_backup_20240103_000000.tar.gz".to_string(),
        ];
        let matched = p.matched(listing.iter().map(String::as_str));
        assert_eq!(matched.len(), 3);

        let deleted = p.select_for_deletion(&listing);
        assert_eq!(deleted, vec!["sillytavern_20240101_000000.zip".to_string()]);
    }

    #[test]
    fn remaining_count_is_min_of_matched_and_limit() {
        for max in 1..=4 {
            for count in 0..=7 {
                let p = policy("ds", &[], max);
                let listing = names(count, "ds");
                let deleted = p.select_for_deletion(&listing);

                assert_eq!(count - deleted.len(), count.min(max));
                let mut sorted = listing.clone();
                sorted.sort();
                assert_eq!(deleted, sorted[..count.saturating_sub(max)].to_vec());
            }
        }
    }

    #[test]
    fn second_pass_is_idempotent() {
        let p = policy("ds", &[], 2);
        let listing = names(6, "ds");
        let deleted = p.select_for_deletion(&listing);

        let remaining: Vec<String> = listing
            .into_iter()
            .filter(|n| !deleted.contains(n))
            .collect();
        assert!(p.select_for_deletion(&remaining).is_empty());
    }

    #[test]
    fn per_target_deletion_counts() {
        let counts = [1, 3, 2, 5, 0];
        let deletions: Vec<usize> = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let prefix = format!("t{i}");
                policy(&prefix, &[], 2).select_for_deletion(&names(count, &prefix)).len()
            })
            .collect();
        assert_eq!(deletions, vec![0, 1, 0, 3, 0]);
    }
}
