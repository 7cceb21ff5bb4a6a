//! Builds a `drydock_core::GroupFilter` from the `debug --filter-group`/
//! `--exact` flags.

use failure::Error;
use regex::Regex;

pub use drydock_core::GroupFilter;

pub type Result<T> = std::result::Result<T, Error>;

/// Builds a filter from `--filter-group`. `exact` anchors the pattern with
/// `^...$` when it isn't already anchored. An empty pattern matches
/// everything. Wraps the single regex filter in `Combine`, the same shape
/// `debug` builds it in the original (a `filterFns` slice fed to
/// `CombineFilter`, even when it only ever holds the one regex entry).
pub fn build_group_filter(pattern: &str, exact: bool) -> Result<GroupFilter> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Ok(GroupFilter::combine(Vec::new()));
    }
    let mut anchored = trimmed.to_string();
    if exact {
        if !anchored.starts_with('^') {
            anchored = format!("^{}", anchored);
        }
        if !anchored.ends_with('$') {
            anchored = format!("{}$", anchored);
        }
    }
    let re = Regex::new(&anchored)?;
    Ok(GroupFilter::combine(vec![GroupFilter::by_regex(re)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_matches_everything() {
        let f = build_group_filter("", false).unwrap();
        assert!(f.matches("anything"));
    }

    #[test]
    fn substring_pattern_matches_loosely() {
        let f = build_group_filter("web", false).unwrap();
        assert!(f.matches("web-frontend"));
    }

    #[test]
    fn exact_pattern_anchors_the_regex() {
        let f = build_group_filter("web", true).unwrap();
        assert!(f.matches("web"));
        assert!(!f.matches("web-frontend"));
    }
}
