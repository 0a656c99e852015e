//! Render-ready views.
//!
//! These are the only values handed to a renderer.  They hold resolved
//! strings and links, no behavior, and serialize with camelCase keys.
//! `ClassView::parent_class` nests the parent by value, so a view tree is
//! always finite.
use serde::Serialize;

use crate::types::{ClassLikeKind, Separator, TypeKind, Visibility};

/// One resolved type alternative with its link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeView {
    /// Short name for classes, the keyword otherwise.
    pub name: String,
    pub kind: TypeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub nullable: bool,
    pub is_collection: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_types: Vec<TypeView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub value_types: Vec<TypeView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `None` when the type has no page to point at.
    pub link: Option<String>,
}

impl TypeView {
    /// Compact rendering used by tests and the fixture format:
    /// `?name<key, value> -> link`.
    pub fn signature(&self) -> String {
        let mut out = String::new();
        if self.nullable {
            out.push('?');
        }
        out.push_str(&self.name);
        if !self.value_types.is_empty() {
            let inner: Vec<String> = self
                .key_types
                .iter()
                .chain(&self.value_types)
                .map(TypeView::signature)
                .collect();
            out.push('<');
            out.push_str(&inner.join(", "));
            out.push('>');
        }
        out
    }
}

/// Render a type list with its separator (`?int`, `Foo&Bar`).
pub fn join_types(types: &[TypeView], separator: Separator) -> String {
    types
        .iter()
        .map(TypeView::signature)
        .collect::<Vec<_>>()
        .join(separator.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrowsView {
    pub types: Vec<TypeView>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstantView {
    pub name: String,
    pub visibility: Visibility,
    pub is_final: bool,
    /// An enum case rather than a `const`.
    pub is_case: bool,
    pub types: Vec<TypeView>,
    pub separator: Separator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub summary: String,
    pub description: String,
    pub deprecated: bool,
    pub see: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyView {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_readonly: bool,
    /// Declared through a constructor parameter.
    pub is_promoted: bool,
    pub types: Vec<TypeView>,
    pub separator: Separator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub summary: String,
    pub description: String,
    /// `get`/`is`/`has` methods for this property, as declared.
    pub accessors: Vec<String>,
    /// Set when a trait contributed the property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_trait: Option<String>,
    pub deprecated: bool,
    pub see: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterView {
    pub name: String,
    pub types: Vec<TypeView>,
    pub separator: Separator,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub is_optional: bool,
    pub is_variadic: bool,
    pub is_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodView {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub parameters: Vec<ParameterView>,
    pub return_types: Vec<TypeView>,
    pub return_separator: Separator,
    pub return_description: String,
    pub summary: String,
    pub description: String,
    pub throws: Vec<ThrowsView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_trait: Option<String>,
    pub deprecated: bool,
    pub see: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassView {
    /// Fully-qualified name.
    pub name: String,
    pub short_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub kind: ClassLikeKind,
    pub is_abstract: bool,
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub summary: String,
    pub description: String,
    pub deprecated: bool,
    pub see: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<Box<ClassView>>,
    pub interfaces: Vec<TypeView>,
    pub traits: Vec<TypeView>,
    /// Backing type of an enum.
    pub backing_types: Vec<TypeView>,
    pub constants: Vec<ConstantView>,
    pub properties: Vec<PropertyView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constructor: Option<MethodView>,
    pub methods: Vec<MethodView>,
}

impl ClassView {
    pub fn property(&self, name: &str) -> Option<&PropertyView> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodView> {
        self.methods
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn constant(&self, name: &str) -> Option<&ConstantView> {
        self.constants.iter().find(|c| c.name == name)
    }

    /// Names of this class and its ancestors, nearest first.
    pub fn lineage(&self) -> Vec<&str> {
        std::iter::successors(Some(self), |view| view.parent_class.as_deref())
            .map(|view| view.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_type() -> TypeView {
        TypeView {
            name: "string".to_string(),
            kind: TypeKind::Builtin,
            class_name: None,
            nullable: false,
            is_collection: false,
            key_types: Vec::new(),
            value_types: Vec::new(),
            description: None,
            link: None,
        }
    }

    #[test]
    fn signature_renders_collections() {
        let tags = TypeView {
            name: "array".to_string(),
            kind: TypeKind::Array,
            is_collection: true,
            value_types: vec![string_type()],
            ..string_type()
        };
        assert_eq!(tags.signature(), "array<string>");
        let nullable = TypeView {
            nullable: true,
            ..string_type()
        };
        assert_eq!(join_types(&[nullable, tags], Separator::Union), "?string|array<string>");
    }

    #[test]
    fn serializes_camel_case_and_skips_empty_lists() {
        let json = serde_json::to_value(string_type()).unwrap();
        assert_eq!(json["isCollection"], false);
        assert_eq!(json["kind"], "builtin");
        assert!(json.get("valueTypes").is_none());
        assert!(json["link"].is_null());
    }
}
