//! Wildcard patterns: `*` matches any run of characters, `?` exactly one.
//!
//! A pattern is parsed once and then translated to each backend's native
//! matching primitive: an anchored regex for in-process filtering, a LIKE
//! expression for SQL backends, and a glob for redis MATCH. Only `*` and
//! `?` are wildcard tokens; every other character matches literally.

use crate::error::ConfigError;
use regex::Regex;

/// The pattern that matches every key.
pub const MATCH_ALL: &str = "*";

/// A parsed wildcard pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    regex: Regex,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut expr = String::with_capacity(raw.len() + 2);
        expr.push('^');
        for ch in raw.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');
        let regex = Regex::new(&expr).map_err(|e| ConfigError::Parse {
            reason: format!("invalid pattern '{raw}': {e}"),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            regex,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// In-process match against a user-facing key.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// SQL LIKE expression with `\` as the escape character. Literal `%`,
    /// `_`, and `\` in the pattern are escaped.
    pub fn to_sql_like(&self) -> String {
        let mut like = String::with_capacity(self.raw.len());
        for ch in self.raw.chars() {
            match ch {
                '*' => like.push('%'),
                '?' => like.push('_'),
                '%' | '_' | '\\' => {
                    like.push('\\');
                    like.push(ch);
                }
                other => like.push(other),
            }
        }
        like
    }

    /// Redis glob for SCAN MATCH. `*` and `?` pass through; characters that
    /// are significant to redis globbing but literal in our contract are
    /// escaped.
    pub fn to_redis_glob(&self) -> String {
        let mut glob = String::with_capacity(self.raw.len());
        for ch in self.raw.chars() {
            match ch {
                '[' | ']' | '^' | '-' | '\\' => {
                    glob.push('\\');
                    glob.push(ch);
                }
                other => glob.push(other),
            }
        }
        glob
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Pattern {}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> Pattern {
        Pattern::parse(raw).expect("pattern should parse")
    }

    #[test]
    fn test_star_matches_any_run() {
        let p = pattern("user:*");
        assert!(p.matches("user:1"));
        assert!(p.matches("user:"));
        assert!(p.matches("user:very:long:suffix"));
        assert!(!p.matches("session:1"));
    }

    #[test]
    fn test_question_mark_matches_exactly_one() {
        let p = pattern("key?");
        assert!(p.matches("key1"));
        assert!(p.matches("keyX"));
        assert!(!p.matches("key"));
        assert!(!p.matches("key12"));
    }

    #[test]
    fn test_pattern_is_anchored() {
        let p = pattern("user");
        assert!(p.matches("user"));
        assert!(!p.matches("user:1"));
        assert!(!p.matches("a_user"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = pattern("a.b+c");
        assert!(p.matches("a.b+c"));
        assert!(!p.matches("aXb+c"));
    }

    #[test]
    fn test_match_all() {
        assert!(pattern(MATCH_ALL).matches(""));
        assert!(pattern(MATCH_ALL).matches("anything"));
    }

    #[test]
    fn test_sql_like_translation() {
        assert_eq!(pattern("user:*").to_sql_like(), "user:%");
        assert_eq!(pattern("key?").to_sql_like(), "key_");
        assert_eq!(pattern("100%_done").to_sql_like(), "100\\%\\_done");
        assert_eq!(pattern("a\\b").to_sql_like(), "a\\\\b");
    }

    #[test]
    fn test_redis_glob_translation() {
        assert_eq!(pattern("user:*").to_redis_glob(), "user:*");
        assert_eq!(pattern("k?y").to_redis_glob(), "k?y");
        assert_eq!(pattern("a[1]").to_redis_glob(), "a\\[1\\]");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// A pattern with no wildcard tokens matches exactly itself.
        #[test]
        fn prop_literal_pattern_matches_only_itself(
            key in "[a-zA-Z0-9:._%+-]{0,32}",
            other in "[a-zA-Z0-9:._%+-]{0,32}",
        ) {
            let p = Pattern::parse(&key).expect("literal pattern should parse");
            prop_assert!(p.matches(&key));
            if other != key {
                prop_assert!(!p.matches(&other));
            }
        }

        /// The all-match wildcard matches every key.
        #[test]
        fn prop_star_matches_everything(key in ".{0,64}") {
            let p = Pattern::parse(MATCH_ALL).expect("star should parse");
            prop_assert!(p.matches(&key));
        }

        /// A `prefix*` pattern matches exactly the keys with that prefix.
        #[test]
        fn prop_prefix_star(
            prefix in "[a-z]{1,8}",
            suffix in "[a-z0-9:]{0,16}",
            other in "[A-Z]{1,8}",
        ) {
            let p = Pattern::parse(&format!("{prefix}*")).expect("pattern should parse");
            let matching = format!("{prefix}{suffix}");
            let non_matching = format!("{other}{suffix}");
            prop_assert!(p.matches(&matching));
            prop_assert!(!p.matches(&non_matching));
        }
    }
}
