//! Small string helpers shared across modules.

/// The last segment of a namespace-qualified name.
///
/// `"App\\Models\\User"` → `"User"`, `"User"` → `"User"`.
pub fn short_name(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

/// Upper-case the first character (`"name"` → `"Name"`).
pub(crate) fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether `name` lives in `namespace` or one of its sub-namespaces.
pub(crate) fn in_namespace(name: &str, namespace: &str) -> bool {
    let namespace = namespace.trim_matches('\\');
    if namespace.is_empty() {
        return true;
    }
    name.get(..namespace.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(namespace))
        && name[namespace.len()..].starts_with('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_takes_last_segment() {
        assert_eq!(short_name("App\\Models\\User"), "User");
        assert_eq!(short_name("User"), "User");
    }

    #[test]
    fn ucfirst_handles_empty_and_ascii() {
        assert_eq!(ucfirst("name"), "Name");
        assert_eq!(ucfirst(""), "");
    }

    #[test]
    fn namespace_prefix_requires_separator() {
        assert!(in_namespace("App\\Foo", "App"));
        assert!(in_namespace("App\\Foo", "\\App\\"));
        assert!(!in_namespace("Application\\Foo", "App"));
        assert!(!in_namespace("App", "App"));
    }
}
