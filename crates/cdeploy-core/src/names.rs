//! resource name helpers.

use regex::Regex;
use std::sync::OnceLock;

/// last path segment of a (possibly fully qualified) resource name.
pub fn short_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// true when two names refer to the same resource, comparing short forms.
pub fn names_match(left: &str, right: &str) -> bool {
    short_name(left) == short_name(right)
}

/// `projects/{project}/locations/{location}`.
pub fn parent_path(project: &str, location: &str) -> String {
    format!("projects/{project}/locations/{location}")
}

/// `projects/{project}/locations/{location}/{collection}/{name}`.
pub fn resource_name(project: &str, location: &str, collection: &str, name: &str) -> String {
    format!(
        "{}/{collection}/{}",
        parent_path(short_name(project), short_name(location)),
        short_name(name)
    )
}

fn resource_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-z]([a-z0-9-]{0,61}[a-z0-9])?$").ok())
        .as_ref()
}

/// resource ids are lowercase, start with a letter and are at most 63 chars.
pub fn is_valid_resource_id(id: &str) -> bool {
    resource_id_pattern().is_some_and(|pattern| pattern.is_match(short_name(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_full_names_match() {
        assert!(names_match(
            "projects/p/locations/us-central1/targets/prod",
            "prod"
        ));
        assert!(!names_match("projects/p/locations/l/targets/prod", "staging"));
    }

    #[test]
    fn resource_name_normalizes_segments() {
        assert_eq!(
            resource_name("projects/p", "l", "targets", "projects/p/locations/l/targets/t"),
            "projects/p/locations/l/targets/t"
        );
    }

    #[test]
    fn resource_ids() {
        assert!(is_valid_resource_id("prod-1"));
        assert!(!is_valid_resource_id("Prod"));
        assert!(!is_valid_resource_id("1prod"));
        assert!(!is_valid_resource_id("prod-"));
    }
}
