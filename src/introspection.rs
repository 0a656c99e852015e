//! Symbol introspection.
//!
//! [`IntrospectionProvider`] is the seam between the documentation core
//! and wherever class declarations come from.  [`SymbolIndex`] is the
//! static-analysis implementation: it parses PHP files with the parser
//! module, keeps the resulting symbols in memory, and loads further files
//! on demand through the project's PSR-4 mappings.
//!
//! # Flattening
//!
//! `describe` returns a *flattened* symbol holding every member visible on
//! the class, each tagged with its [`MemberOrigin`]:
//!
//!   class own > traits > parent chain > interfaces
//!
//! Trait members (including private ones) are copied in as if written in
//! the using class.  Parent members that are not private, and interface
//! constants and methods, are added with `MemberOrigin::Inherited` when
//! the class does not already have a member of the same name.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use ustr::Ustr;

use crate::composer::{self, Psr4Mapping};
use crate::error::DocError;
use crate::parser;
use crate::types::*;

/// Maximum depth of trait-use nesting followed while flattening.
const MAX_TRAIT_DEPTH: u32 = 20;

/// State of one [`SymbolIndex::flatten`] walk.
#[derive(Default)]
struct Walk {
    /// Keys of the classes being flattened, outermost first.
    stack: Vec<String>,
    /// Set when the current subtree ran into `stack`.
    cyclic: bool,
}

/// PHP core classes and interfaces, lower-cased.  A class in this list
/// that the project does not declare itself is reported as internal.
pub const CORE_CLASSES: &[&str] = &[
    "argumentcounterror",
    "arithmeticerror",
    "arrayaccess",
    "arrayiterator",
    "arrayobject",
    "attribute",
    "backedenum",
    "badfunctioncallexception",
    "badmethodcallexception",
    "closure",
    "countable",
    "dateinterval",
    "dateperiod",
    "datetime",
    "datetimeimmutable",
    "datetimeinterface",
    "datetimezone",
    "divisionbyzeroerror",
    "domainexception",
    "error",
    "errorexception",
    "exception",
    "generator",
    "invalidargumentexception",
    "iterator",
    "iteratoraggregate",
    "iteratoriterator",
    "jsonexception",
    "jsonserializable",
    "lengthexception",
    "logicexception",
    "outofboundsexception",
    "outofrangeexception",
    "outeriterator",
    "overflowexception",
    "pdo",
    "pdoexception",
    "pdostatement",
    "rangeexception",
    "recursiveiterator",
    "reflectionclass",
    "runtimeexception",
    "seekableiterator",
    "serializable",
    "spldoublylinkedlist",
    "splfileinfo",
    "splfileobject",
    "splfixedarray",
    "splheap",
    "splobjectstorage",
    "splpriorityqueue",
    "splqueue",
    "splstack",
    "stdclass",
    "stringable",
    "throwable",
    "traversable",
    "typeerror",
    "underflowexception",
    "unexpectedvalueexception",
    "unitenum",
    "valueerror",
    "weakmap",
    "weakreference",
];

/// Source of class symbols for the documentation core.
///
/// Implementations must be deterministic: describing the same class twice
/// with unchanged inputs yields equal symbols.
pub trait IntrospectionProvider: Send + Sync {
    /// The flattened symbol for `class_name` (leading `\` allowed, case
    /// insensitive).
    fn describe(&self, class_name: &str) -> Result<Arc<ClassSymbol>, DocError>;

    /// Look up one member of an already described class.
    fn describe_member<'c>(
        &self,
        class: &'c ClassSymbol,
        name: &str,
        kind: MemberKind,
    ) -> Result<MemberRef<'c>, DocError> {
        class
            .find_member(name, kind)
            .ok_or_else(|| DocError::UnknownMember {
                class: class.name.to_string(),
                member: name.to_string(),
                kind,
            })
    }

    /// Whether `class_name` is a language core class rather than code the
    /// provider knows the source of.
    fn is_internal(&self, class_name: &str) -> bool;
}

/// In-memory index of parsed PHP classes.
#[derive(Default)]
pub struct SymbolIndex {
    /// Lower-cased FQN → symbol with own members only.
    classes: RwLock<HashMap<String, Arc<ClassSymbol>>>,
    /// Lower-cased FQN → flattened symbol.  Cleared whenever a file is
    /// (re)indexed.
    flattened: RwLock<HashMap<String, Arc<ClassSymbol>>>,
    /// File → classes declared in it, for re-indexing.
    files: RwLock<HashMap<Ustr, Vec<Ustr>>>,
    /// Names PSR-4 lookup already failed for.
    missing: RwLock<HashSet<String>>,
    project_root: Option<PathBuf>,
    psr4_mappings: Vec<Psr4Mapping>,
}

fn index_key(class_name: &str) -> String {
    class_name
        .strip_prefix('\\')
        .unwrap_or(class_name)
        .to_ascii_lowercase()
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index that loads unknown classes lazily from `project_root`
    /// through PSR-4 `mappings`.
    pub fn with_psr4(project_root: impl Into<PathBuf>, mappings: Vec<Psr4Mapping>) -> Self {
        Self {
            project_root: Some(project_root.into()),
            psr4_mappings: mappings,
            ..Self::default()
        }
    }

    /// Parse `content` as the file `file` and index its classes, replacing
    /// whatever that file contributed before.  Returns the declared class
    /// names.
    pub fn add_source(&self, file: &str, content: &str) -> Vec<Ustr> {
        let file = ustr::ustr(file);
        let symbols = parser::parse_php(&file, content);
        let names: Vec<Ustr> = symbols.iter().map(|c| c.name).collect();

        {
            let mut classes = self.classes.write();
            let mut files = self.files.write();
            if let Some(previous) = files.insert(file, names.clone()) {
                for name in previous {
                    classes.remove(&index_key(&name));
                }
            }
            for symbol in symbols {
                let key = index_key(&symbol.name);
                if let Some(existing) = classes.get(&key)
                    && existing.file != file
                {
                    tracing::warn!(
                        class = %symbol.name,
                        first = %existing.file,
                        second = %file,
                        "class declared twice; keeping the later declaration"
                    );
                }
                classes.insert(key, Arc::new(symbol));
            }
        }

        self.flattened.write().clear();
        self.missing.write().clear();
        names
    }

    /// Read and index a file from disk.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Ustr>, DocError> {
        let content = std::fs::read_to_string(path).map_err(|source| DocError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.add_source(&path.to_string_lossy(), &content))
    }

    /// Every indexed class name, sorted.
    pub fn class_names(&self) -> Vec<Ustr> {
        let mut names: Vec<Ustr> = self.classes.read().values().map(|c| c.name).collect();
        names.sort();
        names
    }

    /// The symbol as declared, without trait or inherited members.
    pub fn own_symbol(&self, class_name: &str) -> Option<Arc<ClassSymbol>> {
        let key = index_key(class_name);
        if let Some(symbol) = self.classes.read().get(&key) {
            return Some(Arc::clone(symbol));
        }
        self.load_via_psr4(class_name, &key)?;
        self.classes.read().get(&key).cloned()
    }

    fn load_via_psr4(&self, class_name: &str, key: &str) -> Option<()> {
        let root = self.project_root.as_deref()?;
        if self.psr4_mappings.is_empty() || self.missing.read().contains(key) {
            return None;
        }
        let Some(path) = composer::resolve_class_path(&self.psr4_mappings, root, class_name) else {
            self.missing.write().insert(key.to_string());
            return None;
        };
        tracing::debug!(class = class_name, path = %path.display(), "loading class via PSR-4");
        match self.load_file(&path) {
            Ok(_) => Some(()),
            Err(err) => {
                tracing::warn!(error = %err, "PSR-4 candidate could not be read");
                self.missing.write().insert(key.to_string());
                None
            }
        }
    }

    fn flatten(&self, class_name: &str, walk: &mut Walk) -> Result<Arc<ClassSymbol>, DocError> {
        let key = index_key(class_name);
        if let Some(hit) = self.flattened.read().get(&key) {
            return Ok(Arc::clone(hit));
        }

        let own = self
            .own_symbol(class_name)
            .ok_or_else(|| DocError::unknown_symbol(class_name))?;

        if walk.stack.contains(&key) {
            tracing::warn!(class = %own.name, "inheritance cycle; ancestors past this point ignored");
            walk.cyclic = true;
            return Ok(own);
        }
        walk.stack.push(key.clone());
        let outer_cyclic = std::mem::replace(&mut walk.cyclic, false);

        let mut merged = (*own).clone();

        // 1. Traits.  Members copied in by a trait count as the class's own.
        self.merge_traits_into(&mut merged, &own.trait_names, None, &mut walk.stack, 0);

        // 2. The parent, already flattened with its own ancestors.
        if let Some(parent_name) = own.parent_name {
            match self.flatten(&parent_name, walk) {
                Ok(parent) => merge_inherited(&mut merged, &parent, true),
                Err(_) => tracing::debug!(class = %own.name, parent = %parent_name, "parent class not found"),
            }
        }

        // 3. Interfaces contribute constants and method signatures.
        for iface_name in &own.interface_names {
            match self.flatten(iface_name, walk) {
                Ok(iface) => merge_inherited(&mut merged, &iface, false),
                Err(_) => tracing::debug!(class = %own.name, interface = %iface_name, "interface not found"),
            }
        }

        walk.stack.pop();

        // A class on a cycle flattens differently depending on where the
        // walk entered the cycle, so only cycle-free results are cached.
        let merged = Arc::new(merged);
        if walk.cyclic {
            tracing::debug!(class = %merged.name, "not caching class on an inheritance cycle");
        } else {
            self.flattened.write().insert(key, Arc::clone(&merged));
        }
        walk.cyclic |= outer_cyclic;
        Ok(merged)
    }

    /// Copy trait members into `merged`, recursing into traits used by
    /// traits.  `via` is the directly used trait that nested traits are
    /// attributed to.
    fn merge_traits_into(
        &self,
        merged: &mut ClassSymbol,
        trait_names: &[Ustr],
        via: Option<Ustr>,
        stack: &mut Vec<String>,
        depth: u32,
    ) {
        if depth > MAX_TRAIT_DEPTH {
            return;
        }

        for trait_name in trait_names {
            let Some(trait_symbol) = self.own_symbol(trait_name) else {
                tracing::debug!(class = %merged.name, r#trait = %trait_name, "trait not found");
                continue;
            };
            let key = index_key(trait_name);
            if stack.contains(&key) {
                tracing::warn!(r#trait = %trait_name, "trait uses itself");
                continue;
            }
            let origin = MemberOrigin::Trait(via.unwrap_or(trait_symbol.name));
            let using_class = merged.name;
            let adopt = |info: &MemberInfo| MemberInfo {
                declaring_class: using_class,
                origin,
                ..info.clone()
            };

            for constant in &trait_symbol.constants {
                if merged.find_constant(&constant.info.name).is_none() {
                    let info = adopt(&constant.info);
                    merged.constants.push(ConstantSymbol {
                        info,
                        ..constant.clone()
                    });
                }
            }
            for property in &trait_symbol.properties {
                if merged.find_property(&property.info.name).is_none() {
                    let info = adopt(&property.info);
                    merged.properties.push(PropertySymbol {
                        info,
                        ..property.clone()
                    });
                }
            }
            for method in &trait_symbol.methods {
                if merged.find_method(&method.info.name).is_none() {
                    let info = adopt(&method.info);
                    merged.methods.push(MethodSymbol {
                        info,
                        ..method.clone()
                    });
                }
            }

            stack.push(key);
            self.merge_traits_into(
                merged,
                &trait_symbol.trait_names,
                Some(via.unwrap_or(trait_symbol.name)),
                stack,
                depth + 1,
            );
            stack.pop();
        }
    }
}

/// Add the non-private members of a flattened ancestor that `merged` does
/// not already have.  Interfaces contribute no properties.
fn merge_inherited(merged: &mut ClassSymbol, ancestor: &ClassSymbol, with_properties: bool) {
    let inherit = |info: &MemberInfo| MemberInfo {
        origin: MemberOrigin::Inherited,
        ..info.clone()
    };

    for constant in &ancestor.constants {
        if constant.info.modifiers.visibility == Visibility::Private
            || merged.find_constant(&constant.info.name).is_some()
        {
            continue;
        }
        merged.constants.push(ConstantSymbol {
            info: inherit(&constant.info),
            ..constant.clone()
        });
    }

    if with_properties {
        for property in &ancestor.properties {
            if property.info.modifiers.visibility == Visibility::Private
                || merged.find_property(&property.info.name).is_some()
            {
                continue;
            }
            merged.properties.push(PropertySymbol {
                info: inherit(&property.info),
                ..property.clone()
            });
        }
    }

    for method in &ancestor.methods {
        if method.info.modifiers.visibility == Visibility::Private
            || merged.find_method(&method.info.name).is_some()
        {
            continue;
        }
        merged.methods.push(MethodSymbol {
            info: inherit(&method.info),
            ..method.clone()
        });
    }
}

impl IntrospectionProvider for SymbolIndex {
    fn describe(&self, class_name: &str) -> Result<Arc<ClassSymbol>, DocError> {
        self.flatten(class_name, &mut Walk::default())
    }

    fn is_internal(&self, class_name: &str) -> bool {
        let key = index_key(class_name);
        CORE_CLASSES.contains(&key.as_str()) && !self.classes.read().contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(sources: &[(&str, &str)]) -> SymbolIndex {
        let index = SymbolIndex::new();
        for (file, content) in sources {
            index.add_source(file, content);
        }
        index
    }

    #[test]
    fn describe_is_case_insensitive_and_accepts_leading_backslash() {
        let index = index(&[("a.php", "<?php namespace App; class Book {}")]);
        assert_eq!(index.describe("\\app\\BOOK").unwrap().name.as_str(), "App\\Book");
        assert!(matches!(
            index.describe("App\\Missing"),
            Err(DocError::UnknownSymbol { .. })
        ));
    }

    #[test]
    fn trait_members_are_adopted_by_the_using_class() {
        let index = index(&[
            (
                "t.php",
                "<?php namespace App; trait Named { private string $name; public function rename() {} }",
            ),
            ("c.php", "<?php namespace App; class User { use Named; }"),
        ]);
        let user = index.describe("App\\User").unwrap();
        let name = user.find_property("name").unwrap();
        assert_eq!(name.info.declaring_class.as_str(), "App\\User");
        assert_eq!(name.info.source_file.as_str(), "t.php");
        assert_eq!(
            name.info.origin,
            MemberOrigin::Trait(ustr::ustr("App\\Named"))
        );
        assert!(user.find_method("RENAME").is_some());
    }

    #[test]
    fn parent_members_are_inherited_except_private() {
        let index = index(&[
            (
                "a.php",
                "<?php class Base { public $a; private $secret; protected function run() {} }",
            ),
            ("b.php", "<?php class Child extends Base { public function run() {} }"),
        ]);
        let child = index.describe("Child").unwrap();
        assert_eq!(
            child.find_property("a").unwrap().info.origin,
            MemberOrigin::Inherited
        );
        assert!(child.find_property("secret").is_none());
        assert_eq!(child.find_method("run").unwrap().info.origin, MemberOrigin::Own);
    }

    #[test]
    fn interface_constants_are_inherited() {
        let index = index(&[(
            "i.php",
            "<?php interface HasLimit { const LIMIT = 10; } class Pager implements HasLimit {}",
        )]);
        let pager = index.describe("Pager").unwrap();
        let limit = pager.find_constant("LIMIT").unwrap();
        assert_eq!(limit.info.origin, MemberOrigin::Inherited);
        assert_eq!(limit.value.as_deref(), Some("10"));
    }

    #[test]
    fn inheritance_cycle_terminates() {
        let index = index(&[(
            "c.php",
            "<?php class A extends B { public $a; } class B extends A { public $b; }",
        )]);
        let a = index.describe("A").unwrap();
        assert!(a.find_property("b").is_some());
    }

    #[test]
    fn cycle_members_do_not_depend_on_describe_order() {
        const LOOP: &str = "<?php class A extends B { public $a; } class B extends A { public $b; }";
        let members = |symbol: &ClassSymbol| -> Vec<(String, MemberOrigin)> {
            symbol
                .properties
                .iter()
                .map(|p| (p.info.name.clone(), p.info.origin))
                .collect()
        };

        let a_first = index(&[("c.php", LOOP)]);
        let a_then = members(&a_first.describe("A").unwrap());
        let b_after_a = members(&a_first.describe("B").unwrap());

        let b_first = index(&[("c.php", LOOP)]);
        let b_then = members(&b_first.describe("B").unwrap());
        let a_after_b = members(&b_first.describe("A").unwrap());

        assert_eq!(a_then, a_after_b);
        assert_eq!(b_after_a, b_then);
        assert_eq!(
            b_then,
            vec![
                ("b".to_string(), MemberOrigin::Own),
                ("a".to_string(), MemberOrigin::Inherited)
            ]
        );
    }

    #[test]
    fn reindexing_a_file_replaces_its_classes() {
        let index = index(&[("a.php", "<?php class Old {}")]);
        index.add_source("a.php", "<?php class New {}");
        assert!(index.describe("Old").is_err());
        assert!(index.describe("New").is_ok());
    }

    #[test]
    fn core_classes_are_internal_unless_declared() {
        let index = index(&[("a.php", "<?php class Countable {}")]);
        assert!(index.is_internal("\\DateTimeImmutable"));
        assert!(!index.is_internal("Countable"));
        assert!(!index.is_internal("App\\Book"));
    }

    #[test]
    fn describe_member_reports_unknown_member() {
        let index = index(&[("a.php", "<?php class Book { public function title() {} }")]);
        let book = index.describe("Book").unwrap();
        assert!(index.describe_member(&book, "title", MemberKind::Method).is_ok());
        assert!(matches!(
            index.describe_member(&book, "title", MemberKind::Property),
            Err(DocError::UnknownMember { .. })
        ));
    }

    #[test]
    fn loads_unknown_classes_through_psr4() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("composer.json"),
            r#"{ "autoload": { "psr-4": { "App\\": "src/" } } }"#,
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("src/Models")).unwrap();
        std::fs::write(
            dir.path().join("src/Models/Base.php"),
            "<?php namespace App\\Models; class Base { public int $id; }",
        )
        .unwrap();

        let index = SymbolIndex::with_psr4(dir.path(), composer::parse_composer_json(dir.path()));
        index.add_source(
            "book.php",
            "<?php namespace App\\Models; class Book extends Base {}",
        );
        let book = index.describe("App\\Models\\Book").unwrap();
        assert!(book.find_property("id").is_some());
    }
}
