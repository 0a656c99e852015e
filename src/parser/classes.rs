/// Class, interface, trait, and enum extraction.
///
/// This module turns class-like declarations into [`ClassSymbol`]s:
/// names are fully qualified against the enclosing namespace and `use`
/// imports, members keep their raw docblock and native type, and
/// constructor-promoted parameters become properties.
use std::sync::Arc;

use mago_syntax::ast::*;
use ustr::Ustr;

use crate::types::*;

use super::use_statements::extract_use_map;
use super::{DocblockCtx, extract_modifiers, extract_parameters, native_type, qualify};

/// Members extracted from one class-like body.
#[derive(Default)]
struct ExtractedMembers {
    constants: Vec<ConstantSymbol>,
    properties: Vec<PropertySymbol>,
    methods: Vec<MethodSymbol>,
    traits: Vec<Ustr>,
}

/// Where extracted members are declared.
struct Owner<'s> {
    class: Ustr,
    file: Ustr,
    scope: &'s Arc<NameScope>,
}

impl Owner<'_> {
    fn info(&self, name: String, modifiers: Modifiers, raw_comment: Option<String>) -> MemberInfo {
        MemberInfo {
            name,
            declaring_class: self.class,
            source_file: self.file,
            modifiers,
            raw_comment,
            origin: MemberOrigin::Own,
            scope: Arc::clone(self.scope),
        }
    }

    fn resolve(&self, raw: &str) -> Ustr {
        ustr::ustr(&self.scope.resolve_class_name(raw))
    }
}

/// Recursively walk statements and extract class-like declarations.
/// Namespace blocks get their own scope with their own imports.
pub(crate) fn extract_classes_from_statements<'a>(
    statements: impl Iterator<Item = &'a Statement<'a>>,
    scope: &Arc<NameScope>,
    file: Ustr,
    classes: &mut Vec<ClassSymbol>,
    ctx: &DocblockCtx<'a>,
) {
    for statement in statements {
        match statement {
            Statement::Class(class) => {
                let owner = Owner {
                    class: qualify(scope, class.name.value),
                    file,
                    scope,
                };

                let parent_name = class
                    .extends
                    .as_ref()
                    .and_then(|ext| ext.types.first().map(|ident| owner.resolve(ident.value())));

                let interface_names: Vec<Ustr> = class
                    .implements
                    .as_ref()
                    .map(|imp| {
                        imp.types
                            .iter()
                            .map(|ident| owner.resolve(ident.value()))
                            .collect()
                    })
                    .unwrap_or_default();

                let is_attribute = class.attribute_lists.iter().any(|list| {
                    list.attributes
                        .iter()
                        .any(|attr| owner.resolve(attr.name.value()) == "Attribute")
                });

                let members = extract_class_like_members(class.members.iter(), &owner, ctx, false);

                classes.push(ClassSymbol {
                    name: owner.class,
                    kind: if is_attribute {
                        ClassLikeKind::Attribute
                    } else {
                        ClassLikeKind::Class
                    },
                    file,
                    parent_name,
                    interface_names,
                    trait_names: members.traits,
                    is_abstract: class.modifiers.contains_abstract(),
                    is_final: class.modifiers.contains_final(),
                    backing_type: None,
                    raw_comment: ctx.docblock_for(class),
                    constants: members.constants,
                    properties: members.properties,
                    methods: members.methods,
                    scope: Arc::clone(scope),
                });
            }
            Statement::Interface(iface) => {
                let owner = Owner {
                    class: qualify(scope, iface.name.value),
                    file,
                    scope,
                };

                // Interfaces use `extends` for parent interfaces.
                let interface_names: Vec<Ustr> = iface
                    .extends
                    .as_ref()
                    .map(|ext| {
                        ext.types
                            .iter()
                            .map(|ident| owner.resolve(ident.value()))
                            .collect()
                    })
                    .unwrap_or_default();

                let members = extract_class_like_members(iface.members.iter(), &owner, ctx, true);

                classes.push(ClassSymbol {
                    name: owner.class,
                    kind: ClassLikeKind::Interface,
                    file,
                    parent_name: None,
                    interface_names,
                    trait_names: members.traits,
                    is_abstract: false,
                    is_final: false,
                    backing_type: None,
                    raw_comment: ctx.docblock_for(iface),
                    constants: members.constants,
                    properties: members.properties,
                    methods: members.methods,
                    scope: Arc::clone(scope),
                });
            }
            Statement::Trait(trait_def) => {
                let owner = Owner {
                    class: qualify(scope, trait_def.name.value),
                    file,
                    scope,
                };

                let members =
                    extract_class_like_members(trait_def.members.iter(), &owner, ctx, false);

                classes.push(ClassSymbol {
                    name: owner.class,
                    kind: ClassLikeKind::Trait,
                    file,
                    parent_name: None,
                    interface_names: Vec::new(),
                    trait_names: members.traits,
                    is_abstract: false,
                    is_final: false,
                    backing_type: None,
                    raw_comment: ctx.docblock_for(trait_def),
                    constants: members.constants,
                    properties: members.properties,
                    methods: members.methods,
                    scope: Arc::clone(scope),
                });
            }
            Statement::Enum(enum_def) => {
                let owner = Owner {
                    class: qualify(scope, enum_def.name.value),
                    file,
                    scope,
                };

                let interface_names: Vec<Ustr> = enum_def
                    .implements
                    .as_ref()
                    .map(|imp| {
                        imp.types
                            .iter()
                            .map(|ident| owner.resolve(ident.value()))
                            .collect()
                    })
                    .unwrap_or_default();

                let backing_type = enum_def
                    .backing_type_hint
                    .as_ref()
                    .and_then(|backing| native_type(&backing.hint));

                let members =
                    extract_class_like_members(enum_def.members.iter(), &owner, ctx, false);

                // Enums are implicitly final and cannot be extended.
                classes.push(ClassSymbol {
                    name: owner.class,
                    kind: ClassLikeKind::Enum,
                    file,
                    parent_name: None,
                    interface_names,
                    trait_names: members.traits,
                    is_abstract: false,
                    is_final: true,
                    backing_type,
                    raw_comment: ctx.docblock_for(enum_def),
                    constants: members.constants,
                    properties: members.properties,
                    methods: members.methods,
                    scope: Arc::clone(scope),
                });
            }
            Statement::Namespace(namespace) => {
                let name = namespace
                    .name
                    .as_ref()
                    .map(|ident| ident.value().trim_matches('\\').to_string())
                    .filter(|name| !name.is_empty());
                let inner_scope = Arc::new(NameScope {
                    namespace: name,
                    uses: extract_use_map(namespace.statements().iter()),
                });
                extract_classes_from_statements(
                    namespace.statements().iter(),
                    &inner_scope,
                    file,
                    classes,
                    ctx,
                );
            }
            _ => {}
        }
    }
}

/// Extract constants, properties, methods and used trait names from
/// class-like members.
///
/// Shared by all class-like declarations since they use the same
/// `ClassLikeMember` representation.  Interface methods are implicitly
/// abstract.
fn extract_class_like_members<'a>(
    members: impl Iterator<Item = &'a ClassLikeMember<'a>>,
    owner: &Owner<'_>,
    ctx: &DocblockCtx<'a>,
    in_interface: bool,
) -> ExtractedMembers {
    let mut extracted = ExtractedMembers::default();

    for member in members {
        match member {
            ClassLikeMember::Method(method) => {
                let name = method.name.value.to_string();
                let mut modifiers = extract_modifiers(method.modifiers.iter());
                modifiers.is_abstract |= in_interface;
                let parameters = extract_parameters(&method.parameter_list, ctx);
                let return_type = method
                    .return_type_hint
                    .as_ref()
                    .and_then(|rth| native_type(&rth.hint));

                // A constructor parameter with a visibility modifier also
                // declares a property.
                if name.eq_ignore_ascii_case("__construct") {
                    for param in method.parameter_list.parameters.iter() {
                        if !param.is_promoted_property() {
                            continue;
                        }
                        let raw_name = param.variable.name.to_string();
                        let prop_name = raw_name.strip_prefix('$').unwrap_or(&raw_name).to_string();
                        let default_value = parameters
                            .iter()
                            .find(|p| p.name == prop_name)
                            .and_then(|p| p.default_value.clone());
                        let prop_modifiers = extract_modifiers(param.modifiers.iter());

                        extracted.properties.push(PropertySymbol {
                            info: owner.info(prop_name, prop_modifiers, ctx.docblock_for(param)),
                            declared_type: param.hint.as_ref().and_then(|h| native_type(h)),
                            default_value,
                            is_promoted: true,
                        });
                    }
                }

                extracted.methods.push(MethodSymbol {
                    info: owner.info(name, modifiers, ctx.docblock_for(method)),
                    parameters,
                    return_type,
                });
            }
            ClassLikeMember::Property(property) => {
                let modifiers = extract_modifiers(property.modifiers().iter());
                let declared_type = property.hint().and_then(|h| native_type(h));
                let raw_comment = ctx.docblock_for(member);

                let items: Vec<&PropertyItem<'_>> = match property {
                    Property::Plain(plain) => plain.items.iter().collect(),
                    Property::Hooked(hooked) => vec![&hooked.item],
                };
                for item in items {
                    let raw_name = item.variable().name.to_string();
                    // Property names are stored without the `$`, matching
                    // `$this->name` access syntax.
                    let name = raw_name.strip_prefix('$').unwrap_or(&raw_name).to_string();
                    let default_value = match item {
                        PropertyItem::Concrete(concrete) => ctx.initializer(concrete),
                        PropertyItem::Abstract(_) => None,
                    };
                    extracted.properties.push(PropertySymbol {
                        info: owner.info(name, modifiers, raw_comment.clone()),
                        declared_type: declared_type.clone(),
                        default_value,
                        is_promoted: false,
                    });
                }
            }
            ClassLikeMember::Constant(constant) => {
                let declared_type = constant.hint.as_ref().and_then(|h| native_type(h));
                let modifiers = extract_modifiers(constant.modifiers.iter());
                let raw_comment = ctx.docblock_for(member);
                for item in constant.items.iter() {
                    extracted.constants.push(ConstantSymbol {
                        info: owner.info(item.name.value.to_string(), modifiers, raw_comment.clone()),
                        declared_type: declared_type.clone(),
                        value: ctx.initializer(item),
                        is_case: false,
                    });
                }
            }
            ClassLikeMember::EnumCase(enum_case) => {
                let case_name = enum_case.item.name().value.to_string();
                extracted.constants.push(ConstantSymbol {
                    info: owner.info(case_name, Modifiers::default(), ctx.docblock_for(member)),
                    declared_type: None,
                    value: ctx.initializer(enum_case),
                    is_case: true,
                });
            }
            ClassLikeMember::TraitUse(trait_use) => {
                for trait_name_ident in trait_use.trait_names.iter() {
                    let resolved = owner.resolve(trait_name_ident.value());
                    if !extracted.traits.contains(&resolved) {
                        extracted.traits.push(resolved);
                    }
                }
            }
        }
    }

    extracted
}
