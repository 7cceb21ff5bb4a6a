//! The group filter predicate that `Project::filter` holds, mirroring the
//! original's small `FilterFunc` combinator: `Combine` ORs several filters
//! together, matching everything when it (or any filter list) is empty.

use std::collections::BTreeSet;

use regex::Regex;

/// A predicate over a `ResourceGroup`'s name. `Any` matches every name;
/// `Combine` is the `CombineFilter` equivalent.
#[derive(Debug, Clone)]
pub enum GroupFilter {
    Any,
    Regex(Regex),
    Names(BTreeSet<String>),
    Combine(Vec<GroupFilter>),
}

impl GroupFilter {
    pub fn none() -> GroupFilter {
        GroupFilter::Any
    }

    pub fn by_regex(pattern: Regex) -> GroupFilter {
        GroupFilter::Regex(pattern)
    }

    /// An exact-name-list filter; an empty list matches everything.
    pub fn by_names(names: &[String]) -> GroupFilter {
        GroupFilter::Names(names.iter().cloned().collect())
    }

    pub fn combine(filters: Vec<GroupFilter>) -> GroupFilter {
        GroupFilter::Combine(filters)
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            GroupFilter::Any => true,
            GroupFilter::Regex(re) => re.is_match(name),
            GroupFilter::Names(set) => set.is_empty() || set.contains(name),
            GroupFilter::Combine(fns) => fns.is_empty() || fns.iter().any(|f| f.matches(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_everything() {
        assert!(GroupFilter::none().matches("anything"));
    }

    #[test]
    fn names_filter_matches_only_listed_names() {
        let f = GroupFilter::by_names(&["a".to_string(), "b".to_string()]);
        assert!(f.matches("a"));
        assert!(!f.matches("c"));
    }

    #[test]
    fn combine_matches_if_any_member_matches() {
        let f = GroupFilter::combine(vec![
            GroupFilter::by_names(&["a".to_string()]),
            GroupFilter::by_names(&["b".to_string()]),
        ]);
        assert!(f.matches("a"));
        assert!(f.matches("b"));
        assert!(!f.matches("c"));
    }

    #[test]
    fn empty_combine_matches_everything() {
        assert!(GroupFilter::combine(Vec::new()).matches("anything"));
    }
}
