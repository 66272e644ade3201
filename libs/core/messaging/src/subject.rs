//! Subject Template Resolver (component C).
//!
//! Endpoint authors write subject patterns like
//! `"[controller].v{version:apiVersion}.{id}.get"` rather than hand-building
//! NATS subjects; this module turns a pattern plus a handler's metadata into
//! the concrete subscribe filter and back again.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

const DEFAULT_VERSION: &str = "1";

fn placeholder_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(\w+)(?::\w+)?\}").expect("static pattern is valid"))
}

/// Derive the `[controller]` substitution from a handler type name, stripping
/// the conventional `EventController` or `Controller` suffix and lowercasing.
pub fn controller_name(handler_class: &str) -> String {
    let stripped = handler_class
        .strip_suffix("EventController")
        .or_else(|| handler_class.strip_suffix("Controller"))
        .unwrap_or(handler_class);
    stripped.to_ascii_lowercase()
}

/// Resolve a subject pattern into a concrete subscribe filter.
///
/// `[controller]` is replaced by `controller_name(handler_class)`; `[action]`
/// is replaced by `method_name` (spec §4.C, §6 reserved literals). The
/// reserved `{version}`/`{version:apiVersion}` placeholder is replaced by
/// `version`, defaulting to `"1"` when none is supplied. Every other
/// placeholder becomes a single-segment wildcard (`*`); a trailing `>`
/// segment passes through unchanged. The result is lowercased.
pub fn resolve(pattern: &str, handler_class: &str, method_name: Option<&str>, version: Option<&str>) -> String {
    let version = version.unwrap_or(DEFAULT_VERSION);
    let controller = controller_name(handler_class);
    let action = method_name.unwrap_or_default();

    let segments: Vec<String> = pattern
        .split('.')
        .map(|segment| resolve_segment(segment, &controller, action, version))
        .collect();

    segments.join(".").to_ascii_lowercase()
}

fn resolve_segment(segment: &str, controller: &str, action: &str, version: &str) -> String {
    if segment == "[controller]" {
        return controller.to_string();
    }
    if segment == "[action]" {
        return action.to_string();
    }
    if segment == ">" {
        return segment.to_string();
    }
    if let Some(name) = placeholder_name(segment) {
        if name == "version" {
            return version.to_string();
        }
        return "*".to_string();
    }
    segment.to_string()
}

fn placeholder_name(segment: &str) -> Option<String> {
    placeholder_pattern()
        .captures(segment)
        .filter(|c| c.get(0).map(|m| m.as_str()) == Some(segment))
        .map(|c| c[1].to_string())
}

/// Names of every non-reserved `{name}`/`{name:kind}` placeholder in the
/// pattern, in left-to-right order, excluding the reserved `version` slot.
pub fn placeholder_names(pattern: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(pattern)
        .map(|c| c[1].to_string())
        .filter(|name| name != "version")
        .collect()
}

/// Extract placeholder values from a concrete subject by matching it
/// segment-by-segment against the pattern. Returns an empty map if the
/// segment counts differ rather than erroring — a malformed subject simply
/// fails to bind any arguments downstream.
pub fn parse_subject(pattern: &str, handler_class: &str, method_name: Option<&str>, version: Option<&str>, subject: &str) -> HashMap<String, String> {
    let version = version.unwrap_or(DEFAULT_VERSION);
    let controller = controller_name(handler_class);
    let action = method_name.unwrap_or_default();

    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    let subject_segments: Vec<&str> = subject.split('.').collect();

    if pattern_segments.len() != subject_segments.len() {
        return HashMap::new();
    }

    let mut values = HashMap::new();
    for (pattern_segment, subject_segment) in pattern_segments.iter().zip(subject_segments.iter()) {
        if *pattern_segment == "[controller]" {
            continue;
        }
        if *pattern_segment == "[action]" {
            continue;
        }
        if *pattern_segment == ">" {
            continue;
        }
        if let Some(name) = placeholder_name(pattern_segment) {
            if name == "version" {
                continue;
            }
            values.insert(name, subject_segment.to_string());
        }
    }

    let _ = (controller, action, version);
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_employee_get_pattern() {
        let resolved = resolve(
            "[controller].v{version:apiVersion}.{id}.get",
            "EmployeeEventController",
            None,
            None,
        );
        assert_eq!(resolved, "employee.v1.*.get");
    }

    #[test]
    fn placeholder_names_excludes_version() {
        let names = placeholder_names("[controller].v{version:apiVersion}.{id}.get");
        assert_eq!(names, vec!["id".to_string()]);
    }

    #[test]
    fn parse_subject_extracts_id() {
        let values = parse_subject(
            "[controller].v{version:apiVersion}.{id}.get",
            "EmployeeEventController",
            None,
            None,
            "employee.v1.123.get",
        );
        assert_eq!(values.get("id"), Some(&"123".to_string()));
    }

    #[test]
    fn parse_subject_segment_mismatch_returns_empty() {
        let values = parse_subject(
            "[controller].v{version:apiVersion}.{id}.get",
            "EmployeeEventController",
            None,
            None,
            "employee.v1.get",
        );
        assert!(values.is_empty());
    }

    #[test]
    fn controller_name_strips_conventional_suffixes() {
        assert_eq!(controller_name("EmployeeEventController"), "employee");
        assert_eq!(controller_name("EmployeeController"), "employee");
        assert_eq!(controller_name("Employee"), "employee");
    }

    #[test]
    fn remainder_wildcard_passes_through() {
        let resolved = resolve("[controller].events.>", "EmployeeEventController", None, None);
        assert_eq!(resolved, "employee.events.>");
    }

    #[test]
    fn resolves_action_placeholder_to_method_name() {
        let resolved = resolve(
            "[controller].[action]",
            "EmployeeEventController",
            Some("GetEmployee"),
            None,
        );
        assert_eq!(resolved, "employee.getemployee");
    }

    #[test]
    fn parse_subject_skips_action_segment() {
        let values = parse_subject(
            "[controller].[action].{id}",
            "EmployeeEventController",
            Some("GetEmployee"),
            None,
            "employee.getemployee.123",
        );
        assert_eq!(values.get("id"), Some(&"123".to_string()));
        assert!(!values.contains_key("action"));
    }
}
