/// Composer autoload support.
///
/// This module reads the PSR-4 autoload mappings from `composer.json`.
/// They serve two purposes: the symbol index uses them to locate the
/// file declaring a class it has not seen yet, and the configuration
/// layer uses the primary (non-dev) mapping as the default root
/// namespace and root path for link resolution.
///
/// # PSR-4 Resolution
///
/// Given a mapping like `"App\\" => "src/"`, a class name like
/// `App\Models\Book` is resolved by:
///   1. Stripping the matching prefix (`App\`) from the class name
///   2. Converting remaining namespace separators to directory separators
///   3. Appending `.php`
///   4. Prepending the mapped base directory
///
/// Result: `<project>/src/Models/Book.php`
use std::path::{Path, PathBuf};

/// A single PSR-4 namespace-to-directory mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Psr4Mapping {
    /// The namespace prefix, always ending with `\` (e.g. `"App\"`), or
    /// empty for the fallback mapping.
    pub prefix: String,
    /// The base directory relative to the project root (e.g. `"src/"`).
    pub base_path: String,
    /// Declared under `autoload-dev` rather than `autoload`.
    pub dev: bool,
}

impl Psr4Mapping {
    /// The prefix without its trailing separator (`"App"`).
    pub fn namespace(&self) -> &str {
        self.prefix.trim_end_matches('\\')
    }
}

/// Parse `composer.json` in `project_root` and extract all PSR-4 autoload
/// mappings from both `autoload` and `autoload-dev` sections, longest
/// prefix first.
///
/// Returns an empty `Vec` if the file doesn't exist, can't be read, or
/// contains no PSR-4 mappings.
pub fn parse_composer_json(project_root: &Path) -> Vec<Psr4Mapping> {
    let composer_path = project_root.join("composer.json");
    let content = match std::fs::read_to_string(&composer_path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let json: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(path = %composer_path.display(), error = %err, "invalid composer.json");
            return Vec::new();
        }
    };

    let mut mappings = Vec::new();
    for (section_key, dev) in [("autoload", false), ("autoload-dev", true)] {
        if let Some(psr4_obj) = json
            .get(section_key)
            .and_then(|section| section.get("psr-4"))
            .and_then(|psr4| psr4.as_object())
        {
            for (prefix, paths) in psr4_obj {
                extract_psr4_entries(prefix, paths, dev, &mut mappings);
            }
        }
    }

    // Stable sort keeps declaration order among equal-length prefixes.
    mappings.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

    tracing::debug!(count = mappings.len(), "loaded PSR-4 mappings");
    mappings
}

/// The mapping that names the project's own code: the longest non-dev
/// prefix, or the longest dev prefix when there is no `autoload` section.
pub fn primary_mapping(mappings: &[Psr4Mapping]) -> Option<&Psr4Mapping> {
    mappings
        .iter()
        .filter(|m| !m.prefix.is_empty())
        .find(|m| !m.dev)
        .or_else(|| mappings.iter().find(|m| !m.prefix.is_empty()))
}

/// Extract PSR-4 entries from a single prefix → path(s) pair.
///
/// The value can be either a string (`"src/"`) or an array of strings
/// (`["src/", "lib/"]`).
fn extract_psr4_entries(
    prefix: &str,
    paths: &serde_json::Value,
    dev: bool,
    mappings: &mut Vec<Psr4Mapping>,
) {
    let prefix = prefix.trim_start_matches('\\');
    let normalised_prefix = if prefix.is_empty() || prefix.ends_with('\\') {
        prefix.to_string()
    } else {
        format!("{}\\", prefix)
    };

    let mut push = |path: &str| {
        mappings.push(Psr4Mapping {
            prefix: normalised_prefix.clone(),
            base_path: normalise_path(path),
            dev,
        })
    };

    match paths {
        serde_json::Value::String(path) => push(path),
        serde_json::Value::Array(arr) => {
            for path in arr.iter().filter_map(|e| e.as_str()) {
                push(path);
            }
        }
        _ => {}
    }
}

/// Normalise a directory path: forward slashes, trailing `/`.
fn normalise_path(path: &str) -> String {
    let p = path.replace('\\', "/");
    if p.ends_with('/') || p.is_empty() {
        p
    } else {
        format!("{}/", p)
    }
}

/// Resolve a fully-qualified PHP class name to a file path using PSR-4
/// mappings.
///
/// A leading `\` is stripped.  Returns the first candidate that exists on
/// disk, or `None` if no mapping matches or no file exists.
pub fn resolve_class_path(
    mappings: &[Psr4Mapping],
    project_root: &Path,
    class_name: &str,
) -> Option<PathBuf> {
    let name = class_name.strip_prefix('\\').unwrap_or(class_name);

    if is_builtin_type(name) {
        return None;
    }

    for mapping in mappings {
        let relative = if mapping.prefix.is_empty() {
            Some(name)
        } else {
            name.strip_prefix(&mapping.prefix)
        };

        if let Some(relative_class) = relative {
            let relative_path = relative_class.replace('\\', "/");
            let file_path = project_root
                .join(&mapping.base_path)
                .join(format!("{}.php", relative_path));

            if file_path.is_file() {
                return Some(file_path);
            }
        }
    }

    None
}

/// Type keywords that can never name a class file.
fn is_builtin_type(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "self"
            | "static"
            | "parent"
            | "string"
            | "int"
            | "float"
            | "bool"
            | "array"
            | "object"
            | "mixed"
            | "void"
            | "never"
            | "null"
            | "true"
            | "false"
            | "callable"
            | "iterable"
    )
}
