/// PHP parsing and symbol extraction.
///
/// This module contains the logic for parsing PHP source text using the
/// mago_syntax parser and turning the resulting AST into [`ClassSymbol`]s.
/// Each symbol carries only the members written in its own body; trait and
/// inherited members are added later by the introspection layer.
///
/// Sub-modules:
/// - [`classes`]: Class, interface, trait, and enum extraction
/// - [`use_statements`]: `use` statement and namespace extraction
mod classes;
mod use_statements;

use std::panic;
use std::sync::Arc;

use mago_span::{HasSpan, Span};
use mago_syntax::ast::*;
use ustr::Ustr;

use crate::docblock::{self, TypeNode};
use crate::types::{ClassSymbol, Modifiers, NameScope, ParameterSymbol, Visibility};

/// Context for looking up docblock comments and source text.
///
/// Bundles the program's trivia (comments/whitespace) and the raw source
/// text so that extraction functions can find the `/** ... */` comment
/// preceding any AST node and slice out default values.
pub(crate) struct DocblockCtx<'a> {
    pub trivias: &'a [Trivia<'a>],
    pub content: &'a str,
}

impl<'a> DocblockCtx<'a> {
    /// Find the docblock comment immediately preceding `node`.
    ///
    /// Walks backwards through the trivia before the node.  Whitespace and
    /// regular comments are skipped; any code in between means the node
    /// has no docblock.
    pub fn docblock_for(&self, node: &impl HasSpan) -> Option<String> {
        let node_start = node.span().start.offset;
        let candidate_idx = self
            .trivias
            .partition_point(|t| t.span.start.offset < node_start);
        if candidate_idx == 0 {
            return None;
        }

        let content_bytes = self.content.as_bytes();
        let mut covered_from = node_start;

        for t in self.trivias[..candidate_idx].iter().rev() {
            let t_end = t.span.end.offset;
            let gap = content_bytes
                .get(t_end as usize..covered_from as usize)
                .unwrap_or(&[]);
            if !gap.iter().all(u8::is_ascii_whitespace) {
                return None;
            }

            match t.kind {
                TriviaKind::DocBlockComment => return Some(t.value.to_string()),
                TriviaKind::WhiteSpace
                | TriviaKind::SingleLineComment
                | TriviaKind::MultiLineComment
                | TriviaKind::HashComment => {
                    covered_from = t.span.start.offset;
                }
            }
        }

        None
    }

    /// Source text covered by `span`.
    pub fn text(&self, span: Span) -> Option<&'a str> {
        self.content
            .get(span.start.offset as usize..span.end.offset as usize)
    }

    /// The initializer following `=` in a node such as `NAME = 42`.
    pub fn initializer(&self, node: &impl HasSpan) -> Option<String> {
        let text = self.text(node.span())?;
        let (_, value) = text.split_once('=')?;
        let value = value.trim().trim_end_matches(';').trim_end();
        (!value.is_empty()).then(|| value.to_string())
    }
}

/// Parse PHP source text and extract every class-like declaration.
///
/// `file` identifies the source (usually its path) and is recorded on
/// every symbol and member.  A parser panic on malformed input is caught
/// and logged; the file then contributes no classes.
pub fn parse_php(file: &str, content: &str) -> Vec<ClassSymbol> {
    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let arena = bumpalo::Bump::new();
        let file_id = mago_database::file::FileId::new(file);
        let program = mago_syntax::parser::parse_file_content(&arena, file_id, content);

        let doc_ctx = DocblockCtx {
            trivias: program.trivia.as_slice(),
            content,
        };

        let top_scope = Arc::new(NameScope {
            namespace: None,
            uses: use_statements::extract_use_map(program.statements.iter()),
        });

        let mut classes = Vec::new();
        classes::extract_classes_from_statements(
            program.statements.iter(),
            &top_scope,
            ustr::ustr(file),
            &mut classes,
            &doc_ctx,
        );
        classes
    }));

    match result {
        Ok(classes) => {
            tracing::debug!(file, count = classes.len(), "parsed PHP file");
            classes
        }
        Err(_) => {
            tracing::error!(file, "parser panicked; skipping file");
            Vec::new()
        }
    }
}

/// Extract a string representation of a type hint from the AST.
pub(crate) fn extract_hint_string(hint: &Hint) -> String {
    match hint {
        Hint::Identifier(ident) => ident.value().to_string(),
        Hint::Nullable(nullable) => {
            format!("?{}", extract_hint_string(nullable.hint))
        }
        Hint::Union(union) => {
            let left = extract_hint_string(union.left);
            let right = extract_hint_string(union.right);
            format!("{}|{}", left, right)
        }
        Hint::Intersection(intersection) => {
            let left = extract_hint_string(intersection.left);
            let right = extract_hint_string(intersection.right);
            format!("{}&{}", left, right)
        }
        Hint::Void(ident)
        | Hint::Never(ident)
        | Hint::Float(ident)
        | Hint::Bool(ident)
        | Hint::Integer(ident)
        | Hint::String(ident)
        | Hint::Object(ident)
        | Hint::Mixed(ident)
        | Hint::Iterable(ident) => ident.value.to_string(),
        Hint::Null(keyword)
        | Hint::True(keyword)
        | Hint::False(keyword)
        | Hint::Array(keyword)
        | Hint::Callable(keyword)
        | Hint::Static(keyword)
        | Hint::Self_(keyword)
        | Hint::Parent(keyword) => keyword.value.to_string(),
        Hint::Parenthesized(paren) => {
            format!("({})", extract_hint_string(paren.hint))
        }
    }
}

/// Convert a native type hint into the same [`TypeNode`] shape docblock
/// types use.  Native syntax is a subset of the pseudo-type grammar.
pub(crate) fn native_type(hint: &Hint) -> Option<TypeNode> {
    let text = extract_hint_string(hint);
    match docblock::parse_type(&text) {
        Ok(node) => Some(node),
        Err(err) => {
            tracing::warn!(hint = %text, error = %err, "cannot read native type hint");
            None
        }
    }
}

/// Collect visibility and the other member modifiers in one pass.
/// Visibility defaults to `Public` if no visibility modifier is present.
pub(crate) fn extract_modifiers<'a>(modifiers: impl Iterator<Item = &'a Modifier<'a>>) -> Modifiers {
    let mut result = Modifiers::default();
    let mut visibility_seen = false;
    for m in modifiers {
        if !visibility_seen {
            if m.is_private() {
                result.visibility = Visibility::Private;
                visibility_seen = true;
            } else if m.is_protected() {
                result.visibility = Visibility::Protected;
                visibility_seen = true;
            } else if m.is_public() {
                visibility_seen = true;
            }
        }
        result.is_static |= m.is_static();
        result.is_abstract |= m.is_abstract();
        result.is_final |= m.is_final();
        result.is_readonly |= m.is_readonly();
    }
    result
}

/// Extract parameter information from a method's parameter list.
pub(crate) fn extract_parameters(
    parameter_list: &FunctionLikeParameterList,
    ctx: &DocblockCtx<'_>,
) -> Vec<ParameterSymbol> {
    parameter_list
        .parameters
        .iter()
        .map(|param| {
            let raw_name = param.variable.name.to_string();
            let name = raw_name
                .strip_prefix('$')
                .unwrap_or(&raw_name)
                .to_string();

            let default_value = param.default_value.as_ref().and_then(|dv| {
                let text = ctx.text(dv.span())?;
                let text = text.trim_start().trim_start_matches('=').trim();
                (!text.is_empty()).then(|| text.to_string())
            });

            ParameterSymbol {
                name,
                declared_type: param.hint.as_ref().and_then(|h| native_type(h)),
                default_value,
                is_variadic: param.ellipsis.is_some(),
                is_reference: param.ampersand.is_some(),
            }
        })
        .collect()
}

/// Build the fully-qualified name of a declaration in `scope`.
pub(crate) fn qualify(scope: &NameScope, local_name: &str) -> Ustr {
    match &scope.namespace {
        Some(ns) => ustr::ustr(&format!("{ns}\\{local_name}")),
        None => ustr::ustr(local_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_prefixes_namespace() {
        let scope = NameScope {
            namespace: Some("App\\Models".to_string()),
            uses: Default::default(),
        };
        assert_eq!(qualify(&scope, "User").as_str(), "App\\Models\\User");
        assert_eq!(qualify(&NameScope::default(), "User").as_str(), "User");
    }

    #[test]
    fn parser_survives_garbage_input() {
        let classes = parse_php("broken.php", "<?php class {{{ <<<EOT");
        assert!(classes.iter().all(|c| !c.name.is_empty()));
    }

    #[test]
    fn property_defaults_are_source_text() {
        let classes = parse_php(
            "Book.php",
            "<?php class Book { public array $tags = [], $pages; private ?string $isbn = null; }",
        );
        let defaults: Vec<(&str, Option<&str>)> = classes[0]
            .properties
            .iter()
            .map(|p| (p.info.name.as_str(), p.default_value.as_deref()))
            .collect();
        assert_eq!(
            defaults,
            vec![("tags", Some("[]")), ("pages", None), ("isbn", Some("null"))]
        );
    }
}
