//! Link resolution.
//!
//! Decides where a type reference points: a page generated for a class
//! under the root namespace, the PHP manual for a core class, the
//! documentation root of a known third-party ecosystem, or nowhere.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::introspection::IntrospectionProvider;
use crate::types::{TypeKind, TypeRef};
use crate::util::in_namespace;

/// URL template for core classes; `{}` is the lower-cased class name.
const CORE_CLASS_URL: &str = "https://www.php.net/manual/en/class.{}.php";

/// Known ecosystems, keyed by namespace prefix.
pub const DEFAULT_THIRD_PARTY: &[(&str, &str)] = &[
    ("Psr", "https://www.php-fig.org/psr/"),
    ("Symfony", "https://symfony.com/doc/current/"),
    ("Illuminate", "https://laravel.com/api/master/"),
    ("Doctrine", "https://www.doctrine-project.org/projects/"),
];

/// Configuration the link resolver needs from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkContext {
    /// Namespace whose classes get local pages (`App`).
    pub root_namespace: String,
    /// Directory the root namespace's sources live in.
    pub root_path: PathBuf,
    /// URL the generated pages are published under.
    pub base_url: String,
    /// Namespaces under the root that are not generated.
    pub exclude: Vec<String>,
    /// Namespace prefix → documentation root, consulted after the core
    /// class table.
    pub third_party: BTreeMap<String, String>,
}

impl LinkContext {
    pub fn new(
        root_namespace: impl Into<String>,
        root_path: impl Into<PathBuf>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            root_namespace: root_namespace.into().trim_matches('\\').to_string(),
            root_path: root_path.into(),
            base_url: base_url.into(),
            exclude: Vec::new(),
            third_party: DEFAULT_THIRD_PARTY
                .iter()
                .map(|(prefix, url)| (prefix.to_string(), url.to_string()))
                .collect(),
        }
    }

    pub fn with_exclude(mut self, exclude: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude.extend(exclude.into_iter().map(Into::into));
        self
    }

    pub fn with_third_party(mut self, prefix: impl Into<String>, url: impl Into<String>) -> Self {
        self.third_party.insert(prefix.into(), url.into());
        self
    }

    /// Whether `class_name` lives under the root namespace.
    pub fn is_local(&self, class_name: &str) -> bool {
        !self.root_namespace.is_empty() && in_namespace(class_name, &self.root_namespace)
    }

    pub fn is_excluded(&self, class_name: &str) -> bool {
        self.exclude.iter().any(|prefix| {
            let prefix = prefix.trim_matches('\\');
            class_name.eq_ignore_ascii_case(prefix) || in_namespace(class_name, prefix)
        })
    }

    /// The longest configured third-party prefix `class_name` falls under.
    fn third_party_url(&self, class_name: &str) -> Option<&str> {
        self.third_party
            .iter()
            .filter(|(prefix, _)| in_namespace(class_name, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, url)| url.as_str())
    }
}

/// Resolves [`TypeRef`]s to link targets.
pub struct LinkResolver<'a> {
    provider: &'a dyn IntrospectionProvider,
    context: &'a LinkContext,
}

impl<'a> LinkResolver<'a> {
    pub fn new(provider: &'a dyn IntrospectionProvider, context: &'a LinkContext) -> Self {
        Self { provider, context }
    }

    /// The link target for one type alternative.
    pub fn resolve(&self, type_ref: &TypeRef) -> Option<String> {
        if type_ref.kind() != TypeKind::Object {
            return None;
        }
        self.resolve_class(type_ref.class_name()?.as_str())
    }

    /// The link target for a class name.
    pub fn resolve_class(&self, class_name: &str) -> Option<String> {
        let class_name = class_name.trim_start_matches('\\');

        if self.context.is_local(class_name) {
            if self.context.is_excluded(class_name) {
                tracing::debug!(class = class_name, "excluded class; no link");
                return None;
            }
            return self.local_link(class_name);
        }

        if self.provider.is_internal(class_name) {
            return Some(CORE_CLASS_URL.replace("{}", &class_name.to_ascii_lowercase()));
        }

        if let Some(url) = self.context.third_party_url(class_name) {
            return Some(url.to_string());
        }

        None
    }

    /// `base_url` joined with the class's source path relative to
    /// `root_path`, extension stripped.
    fn local_link(&self, class_name: &str) -> Option<String> {
        let Ok(symbol) = self.provider.describe(class_name) else {
            tracing::debug!(class = class_name, "local class not found; no link");
            return None;
        };
        let file = Path::new(symbol.file.as_str());
        let relative = match file.strip_prefix(&self.context.root_path) {
            Ok(relative) => relative,
            Err(_) => {
                tracing::debug!(
                    class = class_name,
                    file = %file.display(),
                    "class file outside the root path; no link"
                );
                return None;
            }
        };
        let relative = relative.with_extension("");
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some(format!("{}/{}", self.context.base_url.trim_end_matches('/'), path))
    }
}
