//! Data types used throughout phpantom_docs.
//!
//! This module contains the symbol model produced by introspection
//! (classes, constants, properties, methods, parameters) and the
//! canonical [`TypeRef`] that the type unifier produces for every member.
//! All cross-references between symbols are by interned class name, never
//! by handle, so the graph can be walked lazily without ownership cycles.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use ustr::Ustr;

use crate::docblock::TypeNode;

// ─── Type Reference Model ───────────────────────────────────────────────────

/// Broad classification of a [`TypeRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// A scalar or other language keyword type (`int`, `string`, `iterable`, …).
    Builtin,
    /// A class, interface, enum or trait name.
    Object,
    /// `array`, `list<…>`, `T[]`, array shapes.
    Array,
    /// `callable` and callable signatures.
    Callable,
    Null,
}

/// How the alternatives of a unified type list are joined for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Separator {
    #[default]
    #[serde(rename = "|")]
    Union,
    #[serde(rename = "&")]
    Intersection,
}

impl Separator {
    pub fn as_str(self) -> &'static str {
        match self {
            Separator::Union => "|",
            Separator::Intersection => "&",
        }
    }
}

/// One resolved type alternative.
///
/// Fields are private so the invariants hold for every value: a class name
/// is present exactly for [`TypeKind::Object`], and only collections carry
/// key/value types.  Values are never mutated; the `with_*` methods consume
/// and return a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    kind: TypeKind,
    name: String,
    nullable: bool,
    class_name: Option<Ustr>,
    is_collection: bool,
    key_types: Vec<TypeRef>,
    value_types: Vec<TypeRef>,
    description: Option<String>,
}

impl TypeRef {
    fn new(kind: TypeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            nullable: false,
            class_name: None,
            is_collection: false,
            key_types: Vec::new(),
            value_types: Vec::new(),
            description: None,
        }
    }

    pub fn builtin(name: &str) -> Self {
        Self::new(TypeKind::Builtin, name)
    }

    /// A builtin that iterates (`iterable<K, V>`).
    pub fn builtin_collection(name: &str, key_types: Vec<TypeRef>, value_types: Vec<TypeRef>) -> Self {
        Self {
            is_collection: true,
            key_types,
            value_types,
            ..Self::new(TypeKind::Builtin, name)
        }
    }

    pub fn object(class_name: &str) -> Self {
        let class_name = class_name.strip_prefix('\\').unwrap_or(class_name);
        Self {
            class_name: Some(ustr::ustr(class_name)),
            ..Self::new(TypeKind::Object, class_name)
        }
    }

    /// A generic class such as `Collection<int, User>`.
    pub fn object_collection(
        class_name: &str,
        key_types: Vec<TypeRef>,
        value_types: Vec<TypeRef>,
    ) -> Self {
        Self {
            is_collection: true,
            key_types,
            value_types,
            ..Self::object(class_name)
        }
    }

    pub fn array(key_types: Vec<TypeRef>, value_types: Vec<TypeRef>) -> Self {
        Self {
            is_collection: true,
            key_types,
            value_types,
            ..Self::new(TypeKind::Array, "array")
        }
    }

    pub fn callable() -> Self {
        Self::new(TypeKind::Callable, "callable")
    }

    pub fn null() -> Self {
        Self::new(TypeKind::Null, "null")
    }

    pub fn with_nullable(self, nullable: bool) -> Self {
        Self { nullable, ..self }
    }

    pub fn with_description(self, description: Option<String>) -> Self {
        Self {
            description,
            ..self
        }
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Canonical name: the builtin keyword, or the fully-qualified class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn class_name(&self) -> Option<Ustr> {
        self.class_name
    }

    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    pub fn key_types(&self) -> &[TypeRef] {
        &self.key_types
    }

    pub fn value_types(&self) -> &[TypeRef] {
        &self.value_types
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_null(&self) -> bool {
        self.kind == TypeKind::Null
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            f.write_str("?")?;
        }
        f.write_str(&self.name)?;
        if !self.value_types.is_empty() {
            f.write_str("<")?;
            for (i, t) in self.key_types.iter().chain(&self.value_types).enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{t}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

// ─── Symbol Model ───────────────────────────────────────────────────────────

/// Visibility of a class member (method, property, or constant).
///
/// In PHP, members without an explicit visibility modifier default to `Public`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassLikeKind {
    Class,
    Interface,
    Trait,
    Enum,
    /// A class carrying the `#[Attribute]` attribute.
    Attribute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Constant,
    Property,
    Method,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemberKind::Constant => "constant",
            MemberKind::Property => "property",
            MemberKind::Method => "method",
        })
    }
}

/// Where a member of a flattened class comes from, relative to the class
/// that was queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberOrigin {
    /// Declared in the class body itself.
    Own,
    /// Reached through the parent chain or an implemented interface.
    Inherited,
    /// Copied in by a `use SomeTrait;` statement (the directly used trait).
    Trait(Ustr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modifiers {
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_readonly: bool,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            visibility: Visibility::Public,
            is_static: false,
            is_abstract: false,
            is_final: false,
            is_readonly: false,
        }
    }
}

/// Namespace and `use` imports in effect where a class was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameScope {
    pub namespace: Option<String>,
    /// Lower-cased alias → fully-qualified name.
    pub uses: HashMap<String, String>,
}

impl NameScope {
    /// Resolve a class name as written in source to its fully-qualified
    /// form (without a leading `\`).
    pub fn resolve_class_name(&self, raw: &str) -> String {
        if let Some(fq) = raw.strip_prefix('\\') {
            return fq.to_string();
        }
        let (first, rest) = match raw.split_once('\\') {
            Some((first, rest)) => (first, Some(rest)),
            None => (raw, None),
        };
        if let Some(imported) = self.uses.get(&first.to_ascii_lowercase()) {
            return match rest {
                Some(rest) => format!("{imported}\\{rest}"),
                None => imported.clone(),
            };
        }
        match &self.namespace {
            Some(ns) => format!("{ns}\\{raw}"),
            None => raw.to_string(),
        }
    }
}

/// Fields shared by every kind of class member.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub name: String,
    /// Class reported as declaring the member.  For trait members this is
    /// the class using the trait.
    pub declaring_class: Ustr,
    /// File the member's source text physically lives in.
    pub source_file: Ustr,
    pub modifiers: Modifiers,
    pub raw_comment: Option<String>,
    pub origin: MemberOrigin,
    /// Scope of the file the member is written in, for resolving names
    /// inside its declared type and docblock.
    pub scope: Arc<NameScope>,
}

#[derive(Debug, Clone)]
pub struct ConstantSymbol {
    pub info: MemberInfo,
    pub declared_type: Option<TypeNode>,
    /// Initializer as source text.
    pub value: Option<String>,
    pub is_case: bool,
}

#[derive(Debug, Clone)]
pub struct PropertySymbol {
    pub info: MemberInfo,
    pub declared_type: Option<TypeNode>,
    pub default_value: Option<String>,
    /// Declared through a constructor parameter with a visibility modifier.
    pub is_promoted: bool,
}

#[derive(Debug, Clone)]
pub struct ParameterSymbol {
    /// Name without the `$` prefix.
    pub name: String,
    pub declared_type: Option<TypeNode>,
    pub default_value: Option<String>,
    pub is_variadic: bool,
    pub is_reference: bool,
}

impl ParameterSymbol {
    pub fn is_optional(&self) -> bool {
        self.default_value.is_some() || self.is_variadic
    }
}

#[derive(Debug, Clone)]
pub struct MethodSymbol {
    pub info: MemberInfo,
    pub parameters: Vec<ParameterSymbol>,
    pub return_type: Option<TypeNode>,
}

impl MethodSymbol {
    pub fn is_constructor(&self) -> bool {
        self.info.name.eq_ignore_ascii_case("__construct")
    }
}

/// A borrowed view of any member, as returned by `describe_member`.
#[derive(Debug, Clone, Copy)]
pub enum MemberRef<'a> {
    Constant(&'a ConstantSymbol),
    Property(&'a PropertySymbol),
    Method(&'a MethodSymbol),
}

impl<'a> MemberRef<'a> {
    pub fn info(&self) -> &'a MemberInfo {
        match self {
            MemberRef::Constant(c) => &c.info,
            MemberRef::Property(p) => &p.info,
            MemberRef::Method(m) => &m.info,
        }
    }

    pub fn kind(&self) -> MemberKind {
        match self {
            MemberRef::Constant(_) => MemberKind::Constant,
            MemberRef::Property(_) => MemberKind::Property,
            MemberRef::Method(_) => MemberKind::Method,
        }
    }
}

/// A class-like declaration.
///
/// As produced by the parser it holds only the members written in its own
/// body.  The introspection layer flattens it, adding trait and inherited
/// members tagged with their [`MemberOrigin`].
#[derive(Debug, Clone)]
pub struct ClassSymbol {
    /// Fully-qualified name without a leading `\`.
    pub name: Ustr,
    pub kind: ClassLikeKind,
    pub file: Ustr,
    pub parent_name: Option<Ustr>,
    /// Directly implemented interfaces, in declaration order.  For an
    /// interface these are the interfaces it extends.
    pub interface_names: Vec<Ustr>,
    pub trait_names: Vec<Ustr>,
    pub is_abstract: bool,
    pub is_final: bool,
    pub backing_type: Option<TypeNode>,
    pub raw_comment: Option<String>,
    pub constants: Vec<ConstantSymbol>,
    pub properties: Vec<PropertySymbol>,
    pub methods: Vec<MethodSymbol>,
    pub scope: Arc<NameScope>,
}

impl ClassSymbol {
    /// The last segment of the fully-qualified name.
    pub fn short_name(&self) -> &str {
        crate::util::short_name(&self.name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.name.as_str().rsplit_once('\\').map(|(ns, _)| ns)
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodSymbol> {
        self.methods
            .iter()
            .find(|m| m.info.name.eq_ignore_ascii_case(name))
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertySymbol> {
        self.properties.iter().find(|p| p.info.name == name)
    }

    pub fn find_constant(&self, name: &str) -> Option<&ConstantSymbol> {
        self.constants.iter().find(|c| c.info.name == name)
    }

    pub fn find_member(&self, name: &str, kind: MemberKind) -> Option<MemberRef<'_>> {
        match kind {
            MemberKind::Constant => self.find_constant(name).map(MemberRef::Constant),
            MemberKind::Property => self.find_property(name).map(MemberRef::Property),
            MemberKind::Method => self.find_method(name).map(MemberRef::Method),
        }
    }

    pub fn constructor(&self) -> Option<&MethodSymbol> {
        self.methods.iter().find(|m| m.is_constructor())
    }
}
