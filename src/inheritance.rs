/// Documentation inheritance and member inclusion.
///
/// This module decides two things for the view assembler:
///
/// - **Inherit markers.**  When a docblock contains `{@inheritDoc}` or an
///   `@inheritDoc` tag, the nearest ancestor documenting the same member is
///   found (direct parent first, then each directly implemented interface
///   in declaration order) and its text replaces the marker.  The first
///   match wins; ancestor texts are never merged.  Ancestor docs that carry
///   their own marker are resolved recursively.
/// - **Inclusion.**  Which members of a flattened class appear in its view:
///   inherited members are hidden, private members are hidden unless they
///   are properties with an accessor, and accessors and the constructor are
///   surfaced separately rather than as methods.
use std::collections::HashSet;
use std::rc::Rc;

use ustr::Ustr;

use crate::docblock::{AnnotationDoc, CachedParser, TagKind, TextSpan, render_spans};
use crate::error::Degradation;
use crate::introspection::IntrospectionProvider;
use crate::types::*;
use crate::util::ucfirst;

/// Maximum number of ancestors followed while resolving one marker.
const MAX_DEPTH: u32 = 20;

/// Accessor prefixes, in the order they are reported.
const ACCESSOR_PREFIXES: &[&str] = &["get", "is", "has"];

/// What a docblock documents: the class itself or one of its members.
#[derive(Debug, Clone, Copy)]
pub enum DocTarget<'a> {
    Class,
    Member(&'a str, MemberKind),
}

/// A docblock with its inherit markers resolved.
#[derive(Debug, Clone, Default)]
pub struct ResolvedDoc {
    /// The member's own parsed docblock, if it has one.
    pub doc: Option<Rc<AnnotationDoc>>,
    pub summary: String,
    pub description: String,
    /// The ancestor documentation that was inherited, if any.
    pub inherited: Option<Rc<ResolvedDoc>>,
}

impl ResolvedDoc {
    /// This doc and then every doc it inherited from, nearest first.
    pub fn chain(&self) -> impl Iterator<Item = &ResolvedDoc> {
        std::iter::successors(Some(self), |doc| doc.inherited.as_deref())
    }

    /// Description of a `@param`, falling back along the inherit chain.
    pub fn param_description(&self, name: &str) -> Option<String> {
        self.chain()
            .filter_map(|d| d.doc.as_ref()?.param_tag(name).map(|t| t.text.clone()))
            .find(|text| !text.is_empty())
    }

    /// Description of the `@return` tag, falling back along the chain.
    pub fn return_description(&self) -> Option<String> {
        self.chain()
            .filter_map(|d| d.doc.as_ref()?.first_tag(&TagKind::Return).map(|t| t.text.clone()))
            .find(|text| !text.is_empty())
    }

    pub fn is_deprecated(&self) -> bool {
        self.doc.as_ref().is_some_and(|d| d.is_deprecated())
    }
}

/// Resolves inherit markers against ancestors fetched through an
/// [`IntrospectionProvider`].
pub struct InheritanceResolver<'a> {
    provider: &'a dyn IntrospectionProvider,
    docs: &'a CachedParser<'a>,
}

impl<'a> InheritanceResolver<'a> {
    pub fn new(provider: &'a dyn IntrospectionProvider, docs: &'a CachedParser<'a>) -> Self {
        Self { provider, docs }
    }

    /// Resolve the docblock `raw_comment` written for `target` in
    /// `class_name`.
    pub fn resolve(
        &self,
        class_name: Ustr,
        target: DocTarget<'_>,
        raw_comment: Option<&str>,
        issues: &mut Vec<Degradation>,
    ) -> ResolvedDoc {
        let mut visited = HashSet::new();
        visited.insert(class_name.to_ascii_lowercase());
        self.resolve_inner(class_name, target, raw_comment, &mut visited, 0, issues)
    }

    fn resolve_inner(
        &self,
        class_name: Ustr,
        target: DocTarget<'_>,
        raw_comment: Option<&str>,
        visited: &mut HashSet<String>,
        depth: u32,
        issues: &mut Vec<Degradation>,
    ) -> ResolvedDoc {
        let Some(doc) = self.docs.parse_opt(raw_comment) else {
            return ResolvedDoc::default();
        };

        if !doc.has_inherit_marker() {
            return ResolvedDoc {
                summary: render_spans(&doc.summary, None),
                description: render_spans(&doc.description, None),
                doc: Some(doc),
                inherited: None,
            };
        }

        let ancestor = if depth < MAX_DEPTH {
            self.find_ancestor_doc(class_name, target, visited, depth, issues)
        } else {
            None
        };

        let Some(ancestor) = ancestor else {
            let owner = owner_label(class_name, target);
            tracing::warn!(owner = %owner, "inherit marker has no ancestor to inherit from");
            issues.push(Degradation::UnresolvedInherit { owner });
            return ResolvedDoc {
                summary: render_spans(&doc.summary, None),
                description: render_spans(&doc.description, None),
                doc: Some(doc),
                inherited: None,
            };
        };

        let summary_is_marker_only = doc.summary.iter().all(|span| match span {
            TextSpan::InheritMarker(_) => true,
            TextSpan::Text(text) => text.trim().is_empty(),
        });

        let summary = if doc.summary.is_empty() {
            ancestor.summary.clone()
        } else {
            render_spans(&doc.summary, Some(&ancestor.summary))
        };
        let description = if doc.description.is_empty() && summary_is_marker_only {
            ancestor.description.clone()
        } else {
            render_spans(&doc.description, Some(&ancestor.description))
        };

        ResolvedDoc {
            doc: Some(doc),
            summary,
            description,
            inherited: Some(Rc::new(ancestor)),
        }
    }

    /// Search the direct parent, then each direct interface, for the first
    /// ancestor documenting `target`.  An ancestor that has the member but
    /// no docblock is searched through in turn.
    fn find_ancestor_doc(
        &self,
        class_name: Ustr,
        target: DocTarget<'_>,
        visited: &mut HashSet<String>,
        depth: u32,
        issues: &mut Vec<Degradation>,
    ) -> Option<ResolvedDoc> {
        let class = self.provider.describe(&class_name).ok()?;
        let ancestors = class
            .parent_name
            .iter()
            .chain(class.interface_names.iter())
            .copied();

        for ancestor_name in ancestors {
            if !visited.insert(ancestor_name.to_ascii_lowercase()) {
                continue;
            }
            let Ok(ancestor) = self.provider.describe(&ancestor_name) else {
                tracing::debug!(class = %class_name, ancestor = %ancestor_name, "ancestor not found");
                continue;
            };

            let (declared_in, raw) = match target {
                DocTarget::Class => (ancestor.name, ancestor.raw_comment.clone()),
                DocTarget::Member(name, kind) => match ancestor.find_member(name, kind) {
                    Some(member) => (member.info().declaring_class, member.info().raw_comment.clone()),
                    None => continue,
                },
            };

            match raw {
                Some(raw) => {
                    tracing::debug!(
                        owner = %owner_label(class_name, target),
                        from = %declared_in,
                        "inheriting documentation"
                    );
                    return Some(self.resolve_inner(
                        declared_in,
                        target,
                        Some(&raw),
                        visited,
                        depth + 1,
                        issues,
                    ));
                }
                None => {
                    if let Some(found) =
                        self.find_ancestor_doc(ancestor.name, target, visited, depth + 1, issues)
                    {
                        return Some(found);
                    }
                }
            }
        }

        None
    }
}

pub(crate) fn owner_label(class_name: Ustr, target: DocTarget<'_>) -> String {
    match target {
        DocTarget::Class => class_name.to_string(),
        DocTarget::Member(name, MemberKind::Property) => format!("{class_name}::${name}"),
        DocTarget::Member(name, MemberKind::Method) => format!("{class_name}::{name}()"),
        DocTarget::Member(name, MemberKind::Constant) => format!("{class_name}::{name}"),
    }
}

/// Accessor methods (`get`/`is`/`has` + capitalized name) the class itself
/// provides for `property`, as declared.
pub fn accessors_for(class: &ClassSymbol, property: &str) -> Vec<String> {
    let capitalized = ucfirst(property);
    ACCESSOR_PREFIXES
        .iter()
        .filter_map(|prefix| {
            let wanted = format!("{prefix}{capitalized}");
            class
                .methods
                .iter()
                .find(|m| m.info.origin != MemberOrigin::Inherited && m.info.name.eq_ignore_ascii_case(&wanted))
                .map(|m| m.info.name.clone())
        })
        .collect()
}

/// Whether `member` of the flattened `class` belongs in its view.
///
/// Members reached through the parent chain or an interface are hidden;
/// trait members count as the class's own.  Private properties stay only
/// when the class has an accessor for them.
pub fn is_included(class: &ClassSymbol, member: MemberRef<'_>) -> bool {
    let info = member.info();
    if info.origin == MemberOrigin::Inherited {
        return false;
    }
    if info.modifiers.visibility != Visibility::Private {
        return true;
    }
    match member {
        MemberRef::Property(property) => !accessors_for(class, &property.info.name).is_empty(),
        MemberRef::Constant(_) | MemberRef::Method(_) => false,
    }
}

/// Methods listed as regular methods: included, not a constructor and not
/// an accessor of an included property.
pub fn listed_methods(class: &ClassSymbol) -> Vec<&MethodSymbol> {
    let accessor_names: HashSet<String> = class
        .properties
        .iter()
        .filter(|p| is_included(class, MemberRef::Property(p)))
        .flat_map(|p| accessors_for(class, &p.info.name))
        .map(|name| name.to_ascii_lowercase())
        .collect();

    class
        .methods
        .iter()
        .filter(|m| is_included(class, MemberRef::Method(m)))
        .filter(|m| !m.is_constructor())
        .filter(|m| !accessor_names.contains(&m.info.name.to_ascii_lowercase()))
        .collect()
}
