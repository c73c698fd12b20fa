//! Per-feed-URL article-drop rules, plus always-download / reset-unread lists.

use regex::RegexBuilder;
use thiserror::Error;

use crate::matcher::{Attributed, Matcher, ParseError};

#[derive(Debug, Error)]
pub enum IgnoreConfigError {
    #[error("invalid regex selector `{0}`: {1}")]
    InvalidRegex(String, String),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

enum Selector {
    Exact(String),
    Wildcard,
    Regex(regex::Regex),
}

struct IgnoreRule {
    selector: Selector,
    matcher: Matcher,
}

/// `ignore-article <selector> <expr>` rules, consulted in order: exact-URL,
/// then `*`, then regex.
#[derive(Default)]
pub struct Ignores {
    exact: Vec<IgnoreRule>,
    wildcard: Vec<IgnoreRule>,
    regex: Vec<IgnoreRule>,
    always_download: Vec<String>,
    reset_unread_on_update: Vec<String>,
}

impl Ignores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ignore_rule(
        &mut self,
        url_selector: &str,
        expr: &str,
    ) -> Result<(), IgnoreConfigError> {
        let matcher = Matcher::parse(expr)?;
        if url_selector == "*" {
            self.wildcard.push(IgnoreRule {
                selector: Selector::Wildcard,
                matcher,
            });
        } else if let Some(pattern) = url_selector.strip_prefix("regex:") {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| IgnoreConfigError::InvalidRegex(pattern.to_string(), e.to_string()))?;
            self.regex.push(IgnoreRule {
                selector: Selector::Regex(re),
                matcher,
            });
        } else {
            self.exact.push(IgnoreRule {
                selector: Selector::Exact(url_selector.to_string()),
                matcher,
            });
        }
        Ok(())
    }

    pub fn add_always_download(&mut self, url: &str) {
        self.always_download.push(url.to_string());
    }

    pub fn add_reset_unread_on_update(&mut self, url: &str) {
        self.reset_unread_on_update.push(url.to_string());
    }

    pub fn is_always_download(&self, feed_url: &str) -> bool {
        self.always_download.iter().any(|u| u == feed_url)
    }

    pub fn resets_unread_on_update(&self, feed_url: &str) -> bool {
        self.reset_unread_on_update.iter().any(|u| u == feed_url)
    }

    /// True if any rule whose selector matches `feed_url` also matches `item`.
    pub fn matches(&self, feed_url: &str, item: &dyn Attributed) -> bool {
        for rule in &self.exact {
            if let Selector::Exact(u) = &rule.selector {
                if u == feed_url && rule.matcher.matches(item).unwrap_or(false) {
                    return true;
                }
            }
        }
        for rule in &self.wildcard {
            if rule.matcher.matches(item).unwrap_or(false) {
                return true;
            }
        }
        for rule in &self.regex {
            if let Selector::Regex(re) = &rule.selector {
                if re.is_match(feed_url) && rule.matcher.matches(item).unwrap_or(false) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Map(HashMap<&'static str, String>);
    impl Attributed for Map {
        fn attribute_value(&self, name: &str) -> Option<String> {
            self.0.get(name).cloned()
        }
    }

    #[test]
    fn regex_selector_drops_matching_item() {
        let mut ig = Ignores::new();
        ig.add_ignore_rule(r"regex:^https://blog\..*", "author = \"Spam\"")
            .unwrap();
        let item = Map(HashMap::from([("author", "Spam".to_string())]));
        assert!(ig.matches("https://blog.example.com/x", &item));
        assert!(!ig.matches("https://other.example.com/x", &item));
    }

    #[test]
    fn exact_beats_wildcard_when_wildcard_would_also_match() {
        let mut ig = Ignores::new();
        ig.add_ignore_rule("*", "author = \"Spam\"").unwrap();
        let item = Map(HashMap::from([("author", "NotSpam".to_string())]));
        assert!(!ig.matches("https://a/feed", &item));
    }
}
