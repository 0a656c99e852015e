//! Type unification.
//!
//! Merges a member's native declared type with the type carried by its
//! docblock tag into one ordered list of [`TypeRef`]s.  A parsed annotation
//! type wins outright over the native type; the two sources are never
//! mixed in one list.  The exception is a generic class annotation
//! (`Collection<int, User>`) over a native class type: it only fills in
//! the key and value types of the native class it names.  Both go through the same conversion, so the
//! pseudo-type table applies to native hints too (`mixed` disappears,
//! `void` becomes `null`).
//!
//! # Nullable compression
//!
//! A union of `null` and exactly one other type collapses into that type
//! with `nullable` set.  With several other types:
//!
//! - a native union keeps an explicit trailing `null` member;
//! - an annotation union folds the nullability into its first concrete
//!   type and records [`Degradation::AmbiguousType`].
//!
//! A union of nothing but `null` is a single `null` type.
use ustr::Ustr;

use crate::docblock::{AnnotationDoc, Literal, Tag, TagKind, TagValue, TypeNode};
use crate::error::Degradation;
use crate::types::*;

/// The ordered alternatives of a member's type and how they are joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedType {
    pub types: Vec<TypeRef>,
    pub separator: Separator,
}

impl UnifiedType {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Which source a type list came from; only affects nullable compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Native,
    Annotation,
}

/// Converts pseudo-type vocabulary to canonical builtins.
///
/// Returns `None` for names the table does not cover.
fn table_lookup(lower: &str) -> Option<Vec<TypeRef>> {
    let builtins =
        |names: &[&str]| -> Vec<TypeRef> { names.iter().map(|n| TypeRef::builtin(n)).collect() };
    Some(match lower {
        "integer" | "positive-int" | "negative-int" => builtins(&["int"]),
        "double" => builtins(&["float"]),
        "numeric-string" | "literal-string" | "trait-string" | "interface-string"
        | "class-string" | "html-escaped-string" | "lowercase-string" | "non-empty-string" => {
            builtins(&["string"])
        }
        "scalar" => builtins(&["int", "float", "string", "bool"]),
        "number" => builtins(&["int", "float"]),
        "numeric" => builtins(&["int", "float", "string"]),
        "array-key" => builtins(&["string", "int"]),
        "mixed" => Vec::new(),
        "void" | "null" => vec![TypeRef::null()],
        _ => return None,
    })
}

/// Keywords that name a builtin rather than a class.
const BUILTIN_KEYWORDS: &[&str] = &[
    "int", "float", "string", "bool", "boolean", "true", "false", "object", "iterable",
    "never", "resource", "never-return", "never-returns", "no-return",
];

/// Per-member conversion context.
pub struct TypeUnifier<'a> {
    /// Scope of the file the member is written in.
    scope: &'a NameScope,
    /// The class under documentation; `self`, `static` and `$this` resolve
    /// to it.
    root_class: Ustr,
    /// Parent of the class declaring the member, for `parent`.
    parent_class: Option<Ustr>,
    /// `@template` names in effect.
    templates: Vec<String>,
    /// Describes the member in degradation reports.
    owner: String,
}

impl<'a> TypeUnifier<'a> {
    pub fn new(scope: &'a NameScope, root_class: Ustr, owner: impl Into<String>) -> Self {
        Self {
            scope,
            root_class,
            parent_class: None,
            templates: Vec::new(),
            owner: owner.into(),
        }
    }

    pub fn with_parent(mut self, parent_class: Option<Ustr>) -> Self {
        self.parent_class = parent_class;
        self
    }

    pub fn with_templates<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.templates.extend(templates.into_iter().map(Into::into));
        self
    }

    /// Unify one member's tag and native type.
    pub fn unify(
        &self,
        tag: Option<&Tag>,
        native: Option<&TypeNode>,
        issues: &mut Vec<Degradation>,
    ) -> UnifiedType {
        match tag.map(|t| &t.value) {
            Some(TagValue::Typed(node)) => match native {
                Some(native_node) if self.has_class_generic(node) => {
                    return self.refine_native(node, native_node, issues);
                }
                _ => {
                    tracing::trace!(owner = %self.owner, "using annotation type");
                    return self.unify_node(node, Source::Annotation, issues);
                }
            },
            Some(TagValue::Malformed { raw, reason }) => {
                tracing::warn!(owner = %self.owner, raw = %raw, reason = %reason, "malformed annotation type; using native type");
                issues.push(Degradation::MalformedAnnotation {
                    owner: self.owner.clone(),
                    raw: raw.clone(),
                    reason: reason.clone(),
                });
            }
            Some(TagValue::Untyped) | None => {}
        }
        match native {
            Some(node) => self.unify_node(node, Source::Native, issues),
            None => UnifiedType::default(),
        }
    }

    pub fn unify_property(
        &self,
        property: &PropertySymbol,
        doc: Option<&AnnotationDoc>,
        issues: &mut Vec<Degradation>,
    ) -> UnifiedType {
        let tag = doc.and_then(|d| d.first_tag(&TagKind::Var));
        self.unify(tag, property.declared_type.as_ref(), issues)
    }

    pub fn unify_constant(
        &self,
        constant: &ConstantSymbol,
        doc: Option<&AnnotationDoc>,
        issues: &mut Vec<Degradation>,
    ) -> UnifiedType {
        let tag = doc.and_then(|d| d.first_tag(&TagKind::Var));
        self.unify(tag, constant.declared_type.as_ref(), issues)
    }

    /// Parameters match their `@param` tag by name.
    pub fn unify_parameter(
        &self,
        parameter: &ParameterSymbol,
        method_doc: Option<&AnnotationDoc>,
        issues: &mut Vec<Degradation>,
    ) -> UnifiedType {
        let tag = method_doc.and_then(|d| d.param_tag(&parameter.name));
        self.unify(tag, parameter.declared_type.as_ref(), issues)
    }

    pub fn unify_return(
        &self,
        method: &MethodSymbol,
        doc: Option<&AnnotationDoc>,
        issues: &mut Vec<Degradation>,
    ) -> UnifiedType {
        let tag = doc.and_then(|d| d.first_tag(&TagKind::Return));
        self.unify(tag, method.return_type.as_ref(), issues)
    }

    /// Whether `node` names a generic class such as `Collection<int, User>`,
    /// on its own, under `?` or as a union member.
    fn has_class_generic(&self, node: &TypeNode) -> bool {
        match node {
            TypeNode::Generic { base, params } => self
                .convert_generic(base, params)
                .iter()
                .any(|t| t.kind() == TypeKind::Object),
            TypeNode::Nullable(inner) => self.has_class_generic(inner),
            TypeNode::Union(members) => members.iter().any(|m| self.has_class_generic(m)),
            _ => false,
        }
    }

    /// A generic class annotation parameterizes the native class it names
    /// but never replaces the native list.  Native class types with a
    /// matching annotated class take its key and value types; a native list
    /// without any class type defers to the annotation.
    fn refine_native(
        &self,
        annotation: &TypeNode,
        native: &TypeNode,
        issues: &mut Vec<Degradation>,
    ) -> UnifiedType {
        let mut unified = self.unify_node(native, Source::Native, issues);
        if !unified.types.iter().any(|t| t.kind() == TypeKind::Object) {
            return self.unify_node(annotation, Source::Annotation, issues);
        }

        let annotated = self.convert(annotation);
        let mut refined = false;
        for slot in unified.types.iter_mut() {
            let Some(class_name) = slot.class_name() else {
                continue;
            };
            let matching = annotated.iter().find(|a| {
                a.is_collection()
                    && a.class_name()
                        .is_some_and(|c| c.as_str().eq_ignore_ascii_case(class_name.as_str()))
            });
            if let Some(generic) = matching {
                *slot = generic.clone().with_nullable(slot.nullable());
                refined = true;
            }
        }
        if !refined {
            tracing::debug!(owner = %self.owner, "generic annotation names no native class; keeping native type");
        }
        unified
    }

    /// Convert an annotation type on its own, e.g. for `@throws`.
    pub fn unify_annotation(&self, node: &TypeNode, issues: &mut Vec<Degradation>) -> UnifiedType {
        self.unify_node(node, Source::Annotation, issues)
    }

    fn unify_node(&self, node: &TypeNode, source: Source, issues: &mut Vec<Degradation>) -> UnifiedType {
        let separator = match node {
            TypeNode::Intersection(_) => Separator::Intersection,
            _ => Separator::Union,
        };
        let types = self.compress(self.convert(node), source, issues);
        UnifiedType { types, separator }
    }

    /// Apply nullable compression and drop duplicates.
    fn compress(&self, types: Vec<TypeRef>, source: Source, issues: &mut Vec<Degradation>) -> Vec<TypeRef> {
        let mut saw_null = false;
        let mut concrete: Vec<TypeRef> = Vec::with_capacity(types.len());
        for t in types {
            if t.is_null() {
                saw_null = true;
            } else if !concrete.contains(&t) {
                concrete.push(t);
            }
        }

        if !saw_null {
            return concrete;
        }
        match concrete.len() {
            0 => vec![TypeRef::null()],
            1 => concrete
                .into_iter()
                .map(|t| t.with_nullable(true))
                .collect(),
            _ if source == Source::Native => {
                concrete.push(TypeRef::null());
                concrete
            }
            _ => {
                let absorbed_by = concrete[0].name().to_string();
                tracing::warn!(owner = %self.owner, absorbed_by = %absorbed_by, "ambiguous nullable union");
                issues.push(Degradation::AmbiguousType {
                    owner: self.owner.clone(),
                    absorbed_by,
                });
                let mut iter = concrete.into_iter();
                let mut out: Vec<TypeRef> = iter.next().map(|t| t.with_nullable(true)).into_iter().collect();
                out.extend(iter);
                out
            }
        }
    }

    /// Nested unions inside collections compress on their own, without
    /// reporting: ambiguity only matters for the member's top-level list.
    fn nested(&self, node: &TypeNode) -> Vec<TypeRef> {
        self.compress(self.convert(node), Source::Native, &mut Vec::new())
    }

    /// Convert a node to its flat list of alternatives.
    fn convert(&self, node: &TypeNode) -> Vec<TypeRef> {
        match node {
            TypeNode::Identifier(name) => self.convert_identifier(name),
            TypeNode::Nullable(inner) => {
                let mut types = self.convert(inner);
                types.push(TypeRef::null());
                // `?T` is explicit, so it never counts as ambiguous.
                self.compress(types, Source::Native, &mut Vec::new())
            }
            TypeNode::Union(members) | TypeNode::Intersection(members) => {
                members.iter().flat_map(|m| self.convert(m)).collect()
            }
            TypeNode::Array(inner) => vec![TypeRef::array(Vec::new(), self.nested(inner))],
            TypeNode::Generic { base, params } => self.convert_generic(base, params),
            TypeNode::Shape { base, fields } => {
                if base.eq_ignore_ascii_case("object") {
                    return vec![TypeRef::builtin("object")];
                }
                let named = fields.iter().any(|f| {
                    f.key
                        .as_deref()
                        .is_some_and(|k| !k.chars().all(|c| c.is_ascii_digit()))
                });
                let key = TypeRef::builtin(if named { "string" } else { "int" });
                let mut values: Vec<TypeRef> = Vec::new();
                for field in fields {
                    for t in self.nested(&field.value) {
                        if !values.contains(&t) {
                            values.push(t);
                        }
                    }
                }
                vec![TypeRef::array(vec![key], values)]
            }
            TypeNode::Callable { base, .. } => {
                if base.trim_start_matches('\\').eq_ignore_ascii_case("closure") {
                    vec![TypeRef::object("Closure")]
                } else {
                    vec![TypeRef::callable()]
                }
            }
            TypeNode::Literal(literal) => vec![TypeRef::builtin(match literal {
                Literal::String(_) => "string",
                Literal::Int(_) => "int",
                Literal::Float(_) => "float",
            })],
            TypeNode::Conditional { then, otherwise } => {
                let mut types = self.convert(then);
                types.extend(self.convert(otherwise));
                types
            }
        }
    }

    fn convert_identifier(&self, name: &str) -> Vec<TypeRef> {
        let lower = name.to_ascii_lowercase();
        if let Some(mapped) = table_lookup(&lower) {
            return mapped;
        }
        match lower.as_str() {
            "self" | "static" | "$this" => vec![TypeRef::object(&self.root_class)],
            "parent" => match self.parent_class {
                Some(parent) => vec![TypeRef::object(&parent)],
                None => {
                    tracing::debug!(owner = %self.owner, "`parent` used without a parent class");
                    Vec::new()
                }
            },
            "array" | "non-empty-array" => vec![TypeRef::array(Vec::new(), Vec::new())],
            "list" | "non-empty-list" => {
                vec![TypeRef::array(vec![TypeRef::builtin("int")], Vec::new())]
            }
            "callable" | "pure-callable" => vec![TypeRef::callable()],
            _ if BUILTIN_KEYWORDS.contains(&lower.as_str()) => vec![TypeRef::builtin(&lower)],
            _ if self.templates.iter().any(|t| t == name) => vec![TypeRef::builtin(name)],
            // Unknown pseudo-types such as `non-falsy-string` or `Foo::BAR`.
            _ if name.contains('-') || name.contains("::") => vec![TypeRef::builtin(name)],
            _ => vec![TypeRef::object(&self.scope.resolve_class_name(name))],
        }
    }

    fn convert_generic(&self, base: &str, params: &[TypeNode]) -> Vec<TypeRef> {
        let lower = base.to_ascii_lowercase();
        let (keys, values) = match params {
            [] => (Vec::new(), Vec::new()),
            [value] => (Vec::new(), self.nested(value)),
            [key, value, ..] => (self.nested(key), self.nested(value)),
        };

        match lower.as_str() {
            "array" | "non-empty-array" => vec![TypeRef::array(keys, values)],
            "list" | "non-empty-list" => {
                let values = params.last().map(|v| self.nested(v)).unwrap_or_default();
                vec![TypeRef::array(vec![TypeRef::builtin("int")], values)]
            }
            "iterable" => vec![TypeRef::builtin_collection("iterable", keys, values)],
            // `int<0, max>` is still an int.
            "int" => vec![TypeRef::builtin("int")],
            _ if table_lookup(&lower).is_some()
                || BUILTIN_KEYWORDS.contains(&lower.as_str())
                || lower.contains('-') =>
            {
                self.convert_identifier(base)
            }
            _ if self.templates.iter().any(|t| t == base) => vec![TypeRef::builtin(base)],
            _ => {
                let class_name = match lower.as_str() {
                    "self" | "static" | "$this" => self.root_class.to_string(),
                    _ => self.scope.resolve_class_name(base),
                };
                vec![TypeRef::object_collection(&class_name, keys, values)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docblock::{parse_docblock, parse_type};

    fn scope() -> NameScope {
        NameScope {
            namespace: Some("App".to_string()),
            uses: [("carbon".to_string(), "Carbon\\Carbon".to_string())]
                .into_iter()
                .collect(),
        }
    }

    fn unify_annotation(scope: &NameScope, ty: &str) -> (UnifiedType, Vec<Degradation>) {
        let unifier = TypeUnifier::new(scope, ustr::ustr("App\\Book"), "App\\Book::$x")
            .with_parent(Some(ustr::ustr("App\\Base")))
            .with_templates(["T"]);
        let mut issues = Vec::new();
        let node = parse_type(ty).unwrap();
        (unifier.unify_annotation(&node, &mut issues), issues)
    }

    fn names(unified: &UnifiedType) -> Vec<String> {
        unified.types.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn annotation_wins_over_native() {
        let scope = scope();
        let unifier = TypeUnifier::new(&scope, ustr::ustr("App\\Book"), "x");
        let doc = parse_docblock("/** @var string[] */");
        let native = parse_type("array").unwrap();
        let unified = unifier.unify(doc.first_tag(&TagKind::Var), Some(&native), &mut Vec::new());
        assert_eq!(names(&unified), vec!["array<string>"]);
    }

    #[test]
    fn generic_annotation_refines_native_class() {
        let scope = NameScope {
            namespace: Some("App".to_string()),
            uses: [
                ("collection".to_string(), "Illuminate\\Support\\Collection".to_string()),
                ("user".to_string(), "App\\Models\\User".to_string()),
            ]
            .into_iter()
            .collect(),
        };
        let unifier = TypeUnifier::new(&scope, ustr::ustr("App\\Book"), "x");
        let doc = parse_docblock("/** @return Collection<int, User> */");
        let tag = doc.first_tag(&TagKind::Return);

        let native = parse_type("?Collection").unwrap();
        let unified = unifier.unify(tag, Some(&native), &mut Vec::new());
        assert_eq!(unified.types.len(), 1);
        let collection = &unified.types[0];
        assert_eq!(
            collection.class_name().map(|c| c.to_string()).as_deref(),
            Some("Illuminate\\Support\\Collection")
        );
        assert!(collection.nullable());
        assert!(collection.is_collection());
        assert_eq!(collection.key_types(), &[TypeRef::builtin("int")]);
        assert_eq!(collection.value_types(), &[TypeRef::object("App\\Models\\User")]);

        // A different native class is kept as declared.
        let native = parse_type("Countable").unwrap();
        let unified = unifier.unify(tag, Some(&native), &mut Vec::new());
        assert_eq!(names(&unified), vec!["App\\Countable"]);

        // Without a native class type the annotation is used as written.
        let native = parse_type("iterable").unwrap();
        let unified = unifier.unify(tag, Some(&native), &mut Vec::new());
        assert!(unified.types[0].is_collection());
        assert_eq!(
            unified.types[0].class_name().map(|c| c.to_string()).as_deref(),
            Some("Illuminate\\Support\\Collection")
        );
    }

    #[test]
    fn malformed_annotation_falls_back_to_native() {
        let scope = scope();
        let unifier = TypeUnifier::new(&scope, ustr::ustr("App\\Book"), "App\\Book::$x");
        let doc = parse_docblock("/** @var array<int */");
        let native = parse_type("?int").unwrap();
        let mut issues = Vec::new();
        let unified = unifier.unify(doc.first_tag(&TagKind::Var), Some(&native), &mut issues);
        assert_eq!(names(&unified), vec!["?int"]);
        assert!(matches!(issues[0], Degradation::MalformedAnnotation { .. }));
    }

    #[test]
    fn native_union_with_null_keeps_explicit_null() {
        let scope = scope();
        let unifier = TypeUnifier::new(&scope, ustr::ustr("App\\Book"), "x");
        let native = parse_type("int|string|null").unwrap();
        let mut issues = Vec::new();
        let unified = unifier.unify(None, Some(&native), &mut issues);
        assert_eq!(names(&unified), vec!["int", "string", "null"]);
        assert!(issues.is_empty());
    }

    #[test]
    fn annotation_union_folds_null_into_first_type() {
        let (unified, issues) = unify_annotation(&scope(), "int|string|null");
        assert_eq!(names(&unified), vec!["?int", "string"]);
        assert_eq!(
            issues,
            vec![Degradation::AmbiguousType {
                owner: "App\\Book::$x".to_string(),
                absorbed_by: "int".to_string()
            }]
        );
    }

    #[test]
    fn only_null_stays_null() {
        let (unified, _) = unify_annotation(&scope(), "null");
        assert_eq!(unified.types, vec![TypeRef::null()]);
        let (unified, _) = unify_annotation(&scope(), "void");
        assert_eq!(unified.types, vec![TypeRef::null()]);
    }

    #[test]
    fn nullable_forms_are_identical() {
        let scope = scope();
        assert_eq!(
            unify_annotation(&scope, "Carbon|null").0,
            unify_annotation(&scope, "?Carbon").0
        );
        assert_eq!(names(&unify_annotation(&scope, "null|Carbon").0), vec!["?Carbon\\Carbon"]);
    }

    #[test]
    fn nested_nullable_compresses_inside_collections() {
        let (unified, issues) = unify_annotation(&scope(), "array<string, Carbon|null>");
        assert!(issues.is_empty());
        let values = unified.types[0].value_types();
        assert_eq!(values.len(), 1);
        assert!(values[0].nullable());
    }

    #[test]
    fn self_static_this_and_parent() {
        let scope = scope();
        assert_eq!(names(&unify_annotation(&scope, "static").0), vec!["App\\Book"]);
        assert_eq!(names(&unify_annotation(&scope, "$this").0), vec!["App\\Book"]);
        assert_eq!(names(&unify_annotation(&scope, "parent").0), vec!["App\\Base"]);
    }

    #[test]
    fn collections() {
        let scope = scope();
        assert_eq!(
            names(&unify_annotation(&scope, "list<Carbon>").0),
            vec!["array<int, Carbon\\Carbon>"]
        );
        assert_eq!(
            names(&unify_annotation(&scope, "array<int, string>").0),
            vec!["array<int, string>"]
        );
        assert_eq!(
            names(&unify_annotation(&scope, "array{id: int, name?: string}").0),
            vec!["array<string, int, string>"]
        );
        assert_eq!(
            names(&unify_annotation(&scope, "Collection<int, T>").0),
            vec!["App\\Collection<int, T>"]
        );
        assert_eq!(names(&unify_annotation(&scope, "class-string<Carbon>").0), vec!["string"]);
        assert_eq!(names(&unify_annotation(&scope, "int<0, max>").0), vec!["int"]);
    }

    #[test]
    fn intersection_sets_separator() {
        let (unified, _) = unify_annotation(&scope(), "Countable&Traversable");
        assert_eq!(unified.separator, Separator::Intersection);
        assert_eq!(unified.types.len(), 2);
    }

    #[test]
    fn conditional_and_callable() {
        let scope = scope();
        assert_eq!(
            names(&unify_annotation(&scope, "($x is int ? string : bool)").0),
            vec!["string", "bool"]
        );
        assert_eq!(
            unify_annotation(&scope, "callable(int): void").0.types[0].kind(),
            TypeKind::Callable
        );
        assert_eq!(
            unify_annotation(&scope, "\\Closure(): void").0.types[0].kind(),
            TypeKind::Object
        );
    }

    #[test]
    fn mixed_is_dropped() {
        assert!(unify_annotation(&scope(), "mixed").0.is_empty());
    }
}
