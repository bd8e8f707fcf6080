//! Small helpers shared by the connection and registry (SPEC_FULL.md §4.5,
//! §4.6).

use std::collections::HashSet;

use serde_json::Value;

/// Normalizes the polymorphic `spaces` field accepted by `join`, `leave`,
/// and the relay wildcard's `meta.spaces`: absent/empty → empty list, a
/// single comma-delimited string → trimmed tokens, a sequence → coerced to
/// a list of strings. Anything else yields an empty list.
pub fn parse_space_names(value: Option<&Value>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => {
            if s.is_empty() {
                Vec::new()
            } else {
                s.split(',').map(|token| token.trim().to_string()).collect()
            }
        }
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(_) => Vec::new(),
    }
}

/// A filter set as used by the outbound filter rules (§4.5): either
/// permit-all (the `"*"` sentinel) or an explicit set of names. Collapses
/// the repeated `"*" in set OR name in set` check into one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSet {
    All,
    Named(HashSet<String>),
}

impl FilterSet {
    pub fn all() -> Self {
        FilterSet::All
    }

    pub fn named(names: impl IntoIterator<Item = String>) -> Self {
        FilterSet::Named(names.into_iter().collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            FilterSet::All => true,
            FilterSet::Named(names) => names.contains(name),
        }
    }

    /// Adds `name` to the set. A no-op on `All`, which already allows
    /// everything.
    pub fn insert(&mut self, name: impl Into<String>) {
        if let FilterSet::Named(names) = self {
            names.insert(name.into());
        }
    }
}

impl Default for FilterSet {
    /// The initial filter set for every kind is permit-all (§4.5).
    fn default() -> Self {
        FilterSet::All
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn absent_or_null_yields_empty() {
        assert_eq!(parse_space_names(None), Vec::<String>::new());
        assert_eq!(parse_space_names(Some(&Value::Null)), Vec::<String>::new());
    }

    #[test]
    fn comma_delimited_string_is_split_and_trimmed() {
        let value = json!("alpha, beta ,gamma");
        assert_eq!(
            parse_space_names(Some(&value)),
            vec!["alpha", "beta", "gamma"]
        );
    }

    #[test]
    fn empty_string_yields_empty() {
        let value = json!("");
        assert_eq!(parse_space_names(Some(&value)), Vec::<String>::new());
    }

    #[test]
    fn sequence_is_coerced_to_list() {
        let value = json!(["alpha", "beta"]);
        assert_eq!(parse_space_names(Some(&value)), vec!["alpha", "beta"]);
    }

    #[test]
    fn filter_set_all_contains_everything() {
        let set = FilterSet::all();
        assert!(set.contains("anything"));
    }

    #[test]
    fn filter_set_named_only_contains_named() {
        let set = FilterSet::named(["ping".to_string()]);
        assert!(set.contains("ping"));
        assert!(!set.contains("pong"));
        assert!(!set.contains("*"));
    }

    #[test]
    fn default_filter_set_is_permit_all() {
        assert_eq!(FilterSet::default(), FilterSet::All);
    }

    #[test]
    fn insert_on_named_set_extends_it() {
        let mut set = FilterSet::named(["ping".to_string()]);
        set.insert("pong");
        assert!(set.contains("pong"));
    }

    #[test]
    fn insert_on_all_set_is_a_no_op() {
        let mut set = FilterSet::all();
        set.insert("anything");
        assert_eq!(set, FilterSet::All);
    }
}
