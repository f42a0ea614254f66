//! Path template helpers
//!
//! Both `{name}` and `:name` placeholder styles are recognized. Colon placeholders
//! only count at the start of a segment so literals like `items:batchGet` survive.

use std::{
    collections::BTreeMap,
    sync::LazyLock,
};

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z0-9_.\-]+)\}|(^|/):([A-Za-z0-9_]+)").expect("placeholder pattern")
});

/// Placeholder names in the order they appear in the template.
pub fn placeholder_names(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|captures| placeholder_name(&captures).map(str::to_string))
        .collect()
}

pub fn segment_placeholder(segment: &str) -> Option<&str> {
    if let Some(name) = segment.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
        return Some(name);
    }
    segment.strip_prefix(':').filter(|name| !name.is_empty())
}

/// Replaces every placeholder that has a value; unmatched placeholders are left intact.
/// Values are percent-encoded so each one fills exactly one segment.
pub fn substitute(template: &str, values: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |captures: &Captures<'_>| {
            let whole = captures.get(0).map_or("", |m| m.as_str());
            let Some(name) = placeholder_name(captures) else {
                return whole.to_string();
            };
            match values.get(name) {
                Some(value) => {
                    let lead = captures.get(2).map_or("", |m| m.as_str());
                    format!("{lead}{}", encode_segment(value))
                }
                None => whole.to_string(),
            }
        })
        .into_owned()
}

/// Encodes everything outside the unreserved set, including `/`, `?` and `#`.
fn encode_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `.` and `..` survive encoding and would be collapsed by URL normalization.
pub fn is_dot_segment(value: &str) -> bool {
    matches!(value, "." | "..")
}

fn placeholder_name<'c>(captures: &Captures<'c>) -> Option<&'c str> {
    captures
        .get(1)
        .or_else(|| captures.get(3))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn finds_brace_and_colon_placeholders() {
        assert_eq!(
            placeholder_names("/orgs/{org}/users/:userId/posts"),
            vec!["org".to_string(), "userId".to_string()]
        );
        assert!(placeholder_names("/v1/items:batchGet").is_empty());
    }

    #[test]
    fn substitutes_every_matched_placeholder() {
        let path = substitute(
            "/orgs/{org}/users/:userId",
            &values(&[("org", "acme"), ("userId", "42")]),
        );
        assert_eq!(path, "/orgs/acme/users/42");
        assert!(placeholder_names(&path).is_empty());
    }

    #[test]
    fn substituted_values_stay_in_one_segment() {
        let template = "/users/{id}";
        assert_eq!(
            substitute(template, &values(&[("id", "../admin")])),
            "/users/..%2Fadmin"
        );
        assert_eq!(
            substitute(template, &values(&[("id", "a?role=root")])),
            "/users/a%3Frole%3Droot"
        );
        assert_eq!(substitute(template, &values(&[("id", "x#y")])), "/users/x%23y");
        assert_eq!(
            substitute("/files/:name", &values(&[("name", "a b/c")])),
            "/files/a%20b%2Fc"
        );
        assert!(is_dot_segment(".."));
        assert!(!is_dot_segment("..a"));
    }

    #[test]
    fn leaves_unmatched_placeholders() {
        let path = substitute("/users/{id}/posts/{postId}", &values(&[("id", "5")]));
        assert_eq!(path, "/users/5/posts/{postId}");
    }

    #[test]
    fn segment_placeholder_recognizes_both_styles() {
        assert_eq!(segment_placeholder("{id}"), Some("id"));
        assert_eq!(segment_placeholder(":id"), Some("id"));
        assert_eq!(segment_placeholder("users"), None);
    }
}
