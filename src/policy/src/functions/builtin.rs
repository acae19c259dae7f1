//! Built-in matching predicates
//!
//! Each takes the concrete value first and the pattern second, the argument
//! order used when role links are resolved in pattern mode.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Compiled patterns keyed by source; `None` marks an invalid pattern
static REGEX_CACHE: Lazy<DashMap<String, Option<Regex>>> = Lazy::new(DashMap::new);

/// `/foo/bar` matches `/foo/*`; without `*` the keys must be equal
pub fn key_match(key: &str, pattern: &str) -> bool {
    match pattern.find('*') {
        None => key == pattern,
        Some(i) => key.get(..i).map_or(key == &pattern[..i], |prefix| prefix == &pattern[..i]),
    }
}

/// `/resource/42` matches `/resource/:id`; `*` matches any remainder
pub fn key_match2(key: &str, pattern: &str) -> bool {
    let pattern = pattern.replace("/*", "/.*");
    let mut translated = String::with_capacity(pattern.len());

    for (i, segment) in pattern.split('/').enumerate() {
        if i > 0 {
            translated.push('/');
        }
        if segment.starts_with(':') && segment.len() > 1 {
            translated.push_str("[^/]+");
        } else {
            translated.push_str(segment);
        }
    }

    compile_and_match(&format!("^{}$", translated), key)
}

/// `key` matches the regular expression `pattern` anywhere
pub fn regex_match(key: &str, pattern: &str) -> bool {
    compile_and_match(pattern, key)
}

/// Shell-style glob: `*` stays within a `/` segment, `**` crosses them, `?` is one character
pub fn glob_match(key: &str, pattern: &str) -> bool {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", "[^/]");

    compile_and_match(&format!("^{}$", escaped), key)
}

fn compile_and_match(pattern: &str, value: &str) -> bool {
    if let Some(cached) = REGEX_CACHE.get(pattern) {
        return cached.as_ref().map_or(false, |regex| regex.is_match(value));
    }

    let compiled = match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Invalid match pattern '{}': {}", pattern, e);
            None
        }
    };
    let matched = compiled.as_ref().map_or(false, |regex| regex.is_match(value));
    REGEX_CACHE.insert(pattern.to_string(), compiled);
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_match() {
        assert!(key_match("/foo/bar", "/foo/*"));
        assert!(key_match("/foo", "/foo*"));
        assert!(key_match("/foo/bar", "/foo/bar"));
        assert!(!key_match("/foo/bar", "/foo"));
        assert!(!key_match("/bar/foo", "/foo/*"));
        assert!(!key_match("/fo", "/foo/*"));
    }

    #[test]
    fn test_key_match2() {
        assert!(key_match2("/resource/42", "/resource/:id"));
        assert!(!key_match2("/resource/42/edit", "/resource/:id"));
        assert!(key_match2("/resource/42/edit", "/resource/:id/edit"));
        assert!(key_match2("/alice_data/file", "/alice_data/*"));
        assert!(!key_match2("/bob_data/file", "/alice_data/*"));
    }

    #[test]
    fn test_regex_match() {
        assert!(regex_match("book_group_1", "^book_group_\\d+$"));
        assert!(!regex_match("pen_group_1", "^book_group_\\d+$"));
        // Invalid pattern never matches
        assert!(!regex_match("anything", "(unclosed"));
    }

    #[test]
    fn test_patterns_compiled_once() {
        let pattern = "^cached_key_[0-9]+$";
        assert!(regex_match("cached_key_1", pattern));
        assert!(REGEX_CACHE.get(pattern).map_or(false, |cached| cached.is_some()));
        assert!(regex_match("cached_key_2", pattern));
        assert!(!regex_match("cached_key_x", pattern));

        let invalid = "(cached_unclosed";
        assert!(!regex_match("x", invalid));
        assert!(REGEX_CACHE.get(invalid).map_or(false, |cached| cached.is_none()));
        assert!(!regex_match("x", invalid));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("/data/report.txt", "/data/*.txt"));
        assert!(!glob_match("/data/nested/report.txt", "/data/*.txt"));
        assert!(glob_match("/data/nested/report.txt", "/data/**"));
        assert!(glob_match("user1", "user?"));
        assert!(!glob_match("userX1", "user?"));
    }
}
