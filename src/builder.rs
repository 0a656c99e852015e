//! View assembly.
//!
//! [`DocBuilder::build_class_view`] is the single entry point of the
//! documentation core.  For one class it fetches the flattened symbol,
//! resolves every included member's docblock (inherit markers
//! included), unifies its types, attaches links, and assembles the
//! immutable [`ClassView`].  Parent views are built through the same path
//! and memoized per builder, so a class shared by many children is only
//! assembled once.
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use ustr::Ustr;

use crate::docblock::{AnnotationDoc, AnnotationParser, CachedParser, TagKind, TagValue};
use crate::error::{Degradation, DocError};
use crate::inheritance::{self, DocTarget, InheritanceResolver, ResolvedDoc, owner_label};
use crate::introspection::IntrospectionProvider;
use crate::links::{LinkContext, LinkResolver};
use crate::types::*;
use crate::unify::{TypeUnifier, UnifiedType};
use crate::util::short_name;
use crate::view::*;

/// Builds class views against one provider.
///
/// A builder is meant for one documentation run and one thread: its
/// memoized views and parsed docblocks are private to it.
pub struct DocBuilder<'p> {
    provider: &'p dyn IntrospectionProvider,
    docs: CachedParser<'p>,
    /// Lower-cased class name → finished view.
    memo: RefCell<HashMap<String, Rc<ClassView>>>,
    /// The link context the memoized views were built with.
    memo_context: RefCell<Option<LinkContext>>,
    in_progress: RefCell<HashSet<String>>,
    /// Set when the view under construction ran into `in_progress`.
    cycle_hit: Cell<bool>,
    degradations: RefCell<Vec<Degradation>>,
}

impl<'p> DocBuilder<'p> {
    pub fn new(provider: &'p dyn IntrospectionProvider, parser: &'p dyn AnnotationParser) -> Self {
        Self {
            provider,
            docs: CachedParser::new(parser),
            memo: RefCell::new(HashMap::new()),
            memo_context: RefCell::new(None),
            in_progress: RefCell::new(HashSet::new()),
            cycle_hit: Cell::new(false),
            degradations: RefCell::new(Vec::new()),
        }
    }

    /// Build the view of `class_name`.
    ///
    /// Fails only when the class itself cannot be introspected.  Member
    /// problems degrade locally and are reported by
    /// [`degradations`](Self::degradations).
    pub fn build_class_view(&self, class_name: &str, context: &LinkContext) -> Result<ClassView, DocError> {
        {
            let mut memo_context = self.memo_context.borrow_mut();
            if memo_context.as_ref() != Some(context) {
                self.memo.borrow_mut().clear();
                *memo_context = Some(context.clone());
            }
        }
        self.build(class_name, context).map(|view| (*view).clone())
    }

    /// Every degradation recorded so far, in the order encountered.
    pub fn degradations(&self) -> Vec<Degradation> {
        self.degradations.borrow().clone()
    }

    /// Return and forget the recorded degradations.
    pub fn take_degradations(&self) -> Vec<Degradation> {
        std::mem::take(&mut *self.degradations.borrow_mut())
    }

    fn record(&self, issues: Vec<Degradation>) {
        let mut recorded = self.degradations.borrow_mut();
        for issue in issues {
            if !recorded.contains(&issue) {
                recorded.push(issue);
            }
        }
    }

    fn build(&self, class_name: &str, context: &LinkContext) -> Result<Rc<ClassView>, DocError> {
        let key = class_name.trim_start_matches('\\').to_ascii_lowercase();
        if let Some(view) = self.memo.borrow().get(&key) {
            tracing::trace!(class = class_name, "class view memo hit");
            return Ok(Rc::clone(view));
        }

        let class = self.provider.describe(class_name)?;
        tracing::debug!(class = %class.name, "building class view");

        self.in_progress.borrow_mut().insert(key.clone());
        let outer_cycle_hit = self.cycle_hit.replace(false);
        let parent_class = class
            .parent_name
            .and_then(|parent| self.build_parent(&class, parent, context));
        let mut assembly = Assembly {
            class: &class,
            resolver: InheritanceResolver::new(self.provider, &self.docs),
            links: LinkResolver::new(self.provider, context),
            class_templates: Vec::new(),
            issues: Vec::new(),
        };
        let view = assembly.class_view(parent_class);
        let issues = std::mem::take(&mut assembly.issues);
        self.in_progress.borrow_mut().remove(&key);
        self.record(issues);

        // Views on a cycle depend on which class the build started from.
        let view = Rc::new(view);
        let cyclic = self.cycle_hit.get();
        if !cyclic {
            self.memo.borrow_mut().insert(key, Rc::clone(&view));
        }
        self.cycle_hit.set(cyclic || outer_cycle_hit);
        Ok(view)
    }

    fn build_parent(
        &self,
        class: &ClassSymbol,
        parent: Ustr,
        context: &LinkContext,
    ) -> Option<Box<ClassView>> {
        let parent_key = parent.to_ascii_lowercase();
        if self.in_progress.borrow().contains(&parent_key) {
            tracing::warn!(class = %class.name, parent = %parent, "inheritance cycle; parent view omitted");
            self.record(vec![Degradation::InheritanceCycle {
                class: class.name.to_string(),
            }]);
            self.cycle_hit.set(true);
            return None;
        }
        match self.build(&parent, context) {
            Ok(view) => Some(Box::new((*view).clone())),
            Err(err) => {
                tracing::warn!(class = %class.name, error = %err, "parent class unavailable");
                None
            }
        }
    }
}

/// Convenience wrapper building one view with a fresh builder.
pub fn build_class_view(
    provider: &dyn IntrospectionProvider,
    parser: &dyn AnnotationParser,
    class_name: &str,
    context: &LinkContext,
) -> Result<ClassView, DocError> {
    DocBuilder::new(provider, parser).build_class_view(class_name, context)
}

/// State for assembling one class's view.
struct Assembly<'b> {
    class: &'b ClassSymbol,
    resolver: InheritanceResolver<'b>,
    links: LinkResolver<'b>,
    class_templates: Vec<String>,
    issues: Vec<Degradation>,
}

impl Assembly<'_> {
    fn class_view(&mut self, parent_class: Option<Box<ClassView>>) -> ClassView {
        let class = self.class;
        let resolved = self.resolver.resolve(
            class.name,
            DocTarget::Class,
            class.raw_comment.as_deref(),
            &mut self.issues,
        );
        if let Some(doc) = &resolved.doc {
            self.class_templates = doc.template_names().map(str::to_string).collect();
        }

        let name_types = |names: &[Ustr], links: &LinkResolver<'_>| -> Vec<TypeView> {
            names
                .iter()
                .map(|name| type_view(&TypeRef::object(name), links))
                .collect()
        };
        let interfaces = name_types(&class.interface_names, &self.links);
        let traits = name_types(&class.trait_names, &self.links);

        let backing_types = match &class.backing_type {
            Some(node) => {
                let unifier = self.unifier(&class.scope, class.name.to_string());
                let unified = unifier.unify(None, Some(node), &mut self.issues);
                self.type_views(&unified)
            }
            None => Vec::new(),
        };

        let constants = class
            .constants
            .iter()
            .filter(|c| inheritance::is_included(class, MemberRef::Constant(c)))
            .map(|c| self.constant_view(c))
            .collect();

        let constructor = class
            .constructor()
            .filter(|ctor| ctor.info.origin != MemberOrigin::Inherited);
        let constructor_doc = constructor.map(|ctor| self.member_doc(&ctor.info, MemberKind::Method));

        let properties = class
            .properties
            .iter()
            .filter(|p| inheritance::is_included(class, MemberRef::Property(p)))
            .map(|p| self.property_view(p, constructor_doc.as_ref()))
            .collect();

        let constructor_view = constructor
            .zip(constructor_doc.as_ref())
            .map(|(ctor, doc)| self.method_view(ctor, doc));

        let methods = inheritance::listed_methods(class)
            .into_iter()
            .map(|m| {
                let doc = self.member_doc(&m.info, MemberKind::Method);
                self.method_view(m, &doc)
            })
            .collect();

        ClassView {
            name: class.name.to_string(),
            short_name: class.short_name().to_string(),
            namespace: class.namespace().map(str::to_string),
            kind: class.kind,
            is_abstract: class.is_abstract,
            is_final: class.is_final,
            link: self.links.resolve_class(&class.name),
            summary: resolved.summary.clone(),
            description: resolved.description.clone(),
            deprecated: resolved.is_deprecated(),
            see: see_tags(resolved.doc.as_deref()),
            parent_class,
            interfaces,
            traits,
            backing_types,
            constants,
            properties,
            constructor: constructor_view,
            methods,
        }
    }

    fn member_doc(&mut self, info: &MemberInfo, kind: MemberKind) -> ResolvedDoc {
        self.resolver.resolve(
            info.declaring_class,
            DocTarget::Member(&info.name, kind),
            info.raw_comment.as_deref(),
            &mut self.issues,
        )
    }

    fn unifier<'s>(&self, scope: &'s NameScope, owner: String) -> TypeUnifier<'s> {
        TypeUnifier::new(scope, self.class.name, owner)
            .with_parent(self.class.parent_name)
            .with_templates(self.class_templates.iter().cloned())
    }

    fn type_views(&self, unified: &UnifiedType) -> Vec<TypeView> {
        unified
            .types
            .iter()
            .map(|t| type_view(t, &self.links))
            .collect()
    }

    fn constant_view(&mut self, constant: &ConstantSymbol) -> ConstantView {
        let resolved = self.member_doc(&constant.info, MemberKind::Constant);
        let owner = owner_label(self.class.name, DocTarget::Member(&constant.info.name, MemberKind::Constant));
        let unifier = self.unifier(&constant.info.scope, owner);
        let unified = unifier.unify_constant(constant, resolved.doc.as_deref(), &mut self.issues);

        let mut summary = resolved.summary.clone();
        if summary.is_empty() {
            summary = tag_text(resolved.doc.as_deref(), &TagKind::Var);
        }

        ConstantView {
            name: constant.info.name.clone(),
            visibility: constant.info.modifiers.visibility,
            is_final: constant.info.modifiers.is_final,
            is_case: constant.is_case,
            types: self.type_views(&unified),
            separator: unified.separator,
            value: constant.value.clone(),
            summary,
            description: resolved.description.clone(),
            deprecated: resolved.is_deprecated(),
            see: see_tags(resolved.doc.as_deref()),
        }
    }

    fn property_view(&mut self, property: &PropertySymbol, constructor_doc: Option<&ResolvedDoc>) -> PropertyView {
        let name = &property.info.name;
        let resolved = self.member_doc(&property.info, MemberKind::Property);
        let owner = owner_label(self.class.name, DocTarget::Member(name, MemberKind::Property));
        let unifier = self.unifier(&property.info.scope, owner);

        let own_doc = resolved.doc.as_deref();
        let ctor_doc = constructor_doc.and_then(|d| d.doc.as_deref());
        let var_tag = own_doc.and_then(|d| d.first_tag(&TagKind::Var));
        let unified = match (var_tag, property.is_promoted) {
            // A promoted property is typed by the constructor's `@param`.
            (None, true) => unifier.unify(
                ctor_doc.and_then(|d| d.param_tag(name)),
                property.declared_type.as_ref(),
                &mut self.issues,
            ),
            _ => unifier.unify_property(property, own_doc, &mut self.issues),
        };

        let mut summary = resolved.summary.clone();
        if summary.is_empty() {
            summary = tag_text(own_doc, &TagKind::Var);
        }
        if summary.is_empty() && property.is_promoted {
            summary = constructor_doc
                .and_then(|d| d.param_description(name))
                .unwrap_or_default();
        }

        PropertyView {
            name: name.clone(),
            visibility: property.info.modifiers.visibility,
            is_static: property.info.modifiers.is_static,
            is_readonly: property.info.modifiers.is_readonly,
            is_promoted: property.is_promoted,
            types: self.type_views(&unified),
            separator: unified.separator,
            default_value: property.default_value.clone(),
            summary,
            description: resolved.description.clone(),
            accessors: inheritance::accessors_for(self.class, name),
            from_trait: trait_origin(&property.info),
            deprecated: resolved.is_deprecated(),
            see: see_tags(own_doc),
        }
    }

    fn method_view(&mut self, method: &MethodSymbol, resolved: &ResolvedDoc) -> MethodView {
        let owner = owner_label(self.class.name, DocTarget::Member(&method.info.name, MemberKind::Method));
        let doc = resolved.doc.as_deref();
        let unifier = self
            .unifier(&method.info.scope, owner.clone())
            .with_templates(doc.into_iter().flat_map(|d| d.template_names()).map(str::to_string));

        let mut parameters = Vec::with_capacity(method.parameters.len());
        for param in &method.parameters {
            let unified = unifier.unify_parameter(param, doc, &mut self.issues);
            parameters.push(ParameterView {
                name: param.name.clone(),
                types: self.type_views(&unified),
                separator: unified.separator,
                description: resolved.param_description(&param.name).unwrap_or_default(),
                default_value: param.default_value.clone(),
                is_optional: param.is_optional(),
                is_variadic: param.is_variadic,
                is_reference: param.is_reference,
            });
        }

        let returns = unifier.unify_return(method, doc, &mut self.issues);

        // `@phpstan-throws` comes first and shadows a plain `@throws` of the
        // same exception.
        let mut throws = Vec::new();
        let mut thrown: Vec<Vec<String>> = Vec::new();
        for tag in doc.into_iter().flat_map(|d| d.tags_of(&TagKind::Throws)) {
            match &tag.value {
                TagValue::Typed(node) => {
                    let unified = unifier.unify_annotation(node, &mut self.issues);
                    let key: Vec<String> = unified
                        .types
                        .iter()
                        .map(|t| t.to_string().to_ascii_lowercase())
                        .collect();
                    if thrown.contains(&key) {
                        continue;
                    }
                    thrown.push(key);
                    throws.push(ThrowsView {
                        types: self.type_views(&unified),
                        description: tag.text.clone(),
                    });
                }
                TagValue::Malformed { raw, reason } => {
                    tracing::warn!(owner = %owner, raw = %raw, "malformed @throws type");
                    self.issues.push(Degradation::MalformedAnnotation {
                        owner: owner.clone(),
                        raw: raw.clone(),
                        reason: reason.clone(),
                    });
                }
                TagValue::Untyped => {}
            }
        }

        MethodView {
            name: method.info.name.clone(),
            visibility: method.info.modifiers.visibility,
            is_static: method.info.modifiers.is_static,
            is_abstract: method.info.modifiers.is_abstract,
            is_final: method.info.modifiers.is_final,
            parameters,
            return_types: self.type_views(&returns),
            return_separator: returns.separator,
            return_description: resolved.return_description().unwrap_or_default(),
            summary: resolved.summary.clone(),
            description: resolved.description.clone(),
            throws,
            from_trait: trait_origin(&method.info),
            deprecated: resolved.is_deprecated(),
            see: see_tags(doc),
        }
    }
}

/// Project a [`TypeRef`] and its nested types, attaching links.
fn type_view(type_ref: &TypeRef, links: &LinkResolver<'_>) -> TypeView {
    let name = match type_ref.kind() {
        TypeKind::Object => short_name(type_ref.name()).to_string(),
        _ => type_ref.name().to_string(),
    };
    TypeView {
        name,
        kind: type_ref.kind(),
        class_name: type_ref.class_name().map(|c| c.to_string()),
        nullable: type_ref.nullable(),
        is_collection: type_ref.is_collection(),
        key_types: type_ref.key_types().iter().map(|t| type_view(t, links)).collect(),
        value_types: type_ref.value_types().iter().map(|t| type_view(t, links)).collect(),
        description: type_ref.description().map(str::to_string),
        link: links.resolve(type_ref),
    }
}

fn trait_origin(info: &MemberInfo) -> Option<String> {
    match info.origin {
        MemberOrigin::Trait(name) => Some(name.to_string()),
        MemberOrigin::Own | MemberOrigin::Inherited => None,
    }
}

fn see_tags(doc: Option<&AnnotationDoc>) -> Vec<String> {
    doc.into_iter()
        .flat_map(|d| d.tags_of(&TagKind::See))
        .map(|t| t.text.clone())
        .filter(|text| !text.is_empty())
        .collect()
}

fn tag_text(doc: Option<&AnnotationDoc>, kind: &TagKind) -> String {
    doc.and_then(|d| d.first_tag(kind))
        .map(|t| t.text.clone())
        .unwrap_or_default()
}
