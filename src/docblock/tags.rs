//! PHPDoc tag extraction.
//!
//! This submodule turns a raw `/** ... */` comment into an
//! [`AnnotationDoc`]: the free text split into summary and description,
//! plus one [`Tag`] per `@tag` line.  Tag bodies are split into a parsed
//! type (via [`parse_type_prefix`]), an optional `$variable`, and the
//! remaining free text.  Continuation lines belong to the preceding tag.
//!
//! Inherit markers are recognised in both forms: the inline
//! `{@inheritDoc}` inside the text, and a standalone `@inheritDoc` tag.
//! Both become a [`TextSpan::InheritMarker`] so description composition
//! happens on spans rather than on rendered text.
use super::types::{TypeNode, parse_type_prefix};

/// The recognised tag vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKind {
    Param,
    Return,
    Var,
    Throws,
    Extends,
    Implements,
    See,
    Template,
    Deprecated,
    InheritDoc,
    Other(String),
}

/// The type carried by a tag, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Typed(TypeNode),
    /// The tag should carry a type but it could not be parsed.
    Malformed { raw: String, reason: String },
    Untyped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub kind: TagKind,
    /// `true` for the `@phpstan-` / `@psalm-` variants, which take
    /// precedence over the plain tag.
    pub prefixed: bool,
    pub value: TagValue,
    /// Variable name without `$` (`@param`, `@var`), or the template name.
    pub variable: Option<String>,
    pub text: String,
}

impl Tag {
    pub fn type_node(&self) -> Option<&TypeNode> {
        match &self.value {
            TagValue::Typed(node) => Some(node),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSpan {
    Text(String),
    /// Placeholder for the ancestor's documentation.  Holds the marker as
    /// written so it can be emitted verbatim when nothing is inherited.
    InheritMarker(String),
}

/// A parsed docblock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationDoc {
    pub summary: Vec<TextSpan>,
    pub description: Vec<TextSpan>,
    pub tags: Vec<Tag>,
}

impl AnnotationDoc {
    pub fn has_inherit_marker(&self) -> bool {
        self.summary
            .iter()
            .chain(&self.description)
            .any(|span| matches!(span, TextSpan::InheritMarker(_)))
    }

    /// All tags of a kind, prefixed variants first.
    pub fn tags_of<'a>(&'a self, kind: &TagKind) -> impl Iterator<Item = &'a Tag> {
        let prefixed = self.tags.iter().filter(move |t| &t.kind == kind && t.prefixed);
        let plain = self.tags.iter().filter(move |t| &t.kind == kind && !t.prefixed);
        prefixed.chain(plain)
    }

    pub fn first_tag(&self, kind: &TagKind) -> Option<&Tag> {
        self.tags_of(kind).next()
    }

    /// The `@param` tag for a parameter name (without `$`).
    pub fn param_tag(&self, name: &str) -> Option<&Tag> {
        self.tags_of(&TagKind::Param)
            .find(|t| t.variable.as_deref() == Some(name))
    }

    pub fn is_deprecated(&self) -> bool {
        self.tags.iter().any(|t| t.kind == TagKind::Deprecated)
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .filter(|t| t.kind == TagKind::Template)
            .filter_map(|t| t.variable.as_deref())
    }
}

/// Parse a raw docblock comment.
pub fn parse_docblock(raw: &str) -> AnnotationDoc {
    let lines = comment_lines(raw);

    let mut text_lines: Vec<&str> = Vec::new();
    let mut tag_chunks: Vec<String> = Vec::new();
    for line in lines {
        if line.starts_with('@') {
            tag_chunks.push(line.to_string());
        } else if let Some(current) = tag_chunks.last_mut() {
            current.push('\n');
            current.push_str(line);
        } else {
            text_lines.push(line);
        }
    }

    let text = text_lines.join("\n");
    let text = text.trim();
    let (summary, description) = split_summary(text);

    let mut doc = AnnotationDoc {
        summary: text_spans(summary),
        description: text_spans(description),
        tags: Vec::new(),
    };

    for chunk in tag_chunks {
        let tag = parse_tag(chunk.trim_end());
        if tag.kind == TagKind::InheritDoc {
            // The tag form inherits into the description.
            let marker = chunk.split_whitespace().next().unwrap_or("@inheritDoc");
            doc.description
                .push(TextSpan::InheritMarker(marker.to_string()));
        }
        doc.tags.push(tag);
    }

    doc
}

/// Strip the comment delimiters and leading asterisks, one line per entry.
fn comment_lines(raw: &str) -> Vec<&str> {
    let inner = raw.trim();
    let inner = inner.strip_prefix("/**").unwrap_or(inner);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);

    inner
        .lines()
        .map(|line| {
            let trimmed = line.trim();
            let trimmed = trimmed.strip_prefix('*').unwrap_or(trimmed);
            trimmed.strip_prefix(' ').unwrap_or(trimmed).trim_end()
        })
        .collect()
}

/// The summary ends at the first blank line, or at a line ending in a
/// full stop.
fn split_summary(text: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end();
        offset += line.len();
        if content.is_empty() {
            return (text[..offset].trim(), text[offset..].trim());
        }
        if content.ends_with('.') {
            return (text[..offset].trim(), text[offset..].trim());
        }
    }
    (text.trim(), "")
}

/// Split free text around inline `{@inheritDoc}` markers.
fn text_spans(text: &str) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut rest = text;
    while let Some(start) = find_inline_marker(rest) {
        let end = start + rest[start..].find('}').map_or(rest.len() - start, |i| i + 1);
        if start > 0 {
            spans.push(TextSpan::Text(rest[..start].to_string()));
        }
        spans.push(TextSpan::InheritMarker(rest[start..end].to_string()));
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        spans.push(TextSpan::Text(rest.to_string()));
    }
    spans
}

fn find_inline_marker(text: &str) -> Option<usize> {
    text.to_ascii_lowercase().find("{@inheritdoc")
}

/// Tags whose body starts with a type expression.
fn typed_kind(name: &str) -> Option<TagKind> {
    Some(match name {
        "param" => TagKind::Param,
        "return" | "returns" => TagKind::Return,
        "var" => TagKind::Var,
        "throws" | "throw" => TagKind::Throws,
        "extends" | "template-extends" => TagKind::Extends,
        "implements" | "template-implements" => TagKind::Implements,
        _ => return None,
    })
}

fn parse_tag(chunk: &str) -> Tag {
    let body = &chunk[1..];
    let name_len = body
        .find(|c: char| c.is_whitespace() || c == '{' || c == '(')
        .unwrap_or(body.len());
    let full_name = &body[..name_len];
    let rest = body[name_len..].trim_start();

    let lower = full_name.to_ascii_lowercase();
    let (prefixed, name) = match lower
        .strip_prefix("phpstan-")
        .or_else(|| lower.strip_prefix("psalm-"))
    {
        Some(stripped) => (true, stripped.to_string()),
        None => (false, lower.clone()),
    };

    if let Some(kind) = typed_kind(&name) {
        return parse_typed_tag(kind, prefixed, rest);
    }

    let untyped = |kind: TagKind| Tag {
        kind,
        prefixed,
        value: TagValue::Untyped,
        variable: None,
        text: rest.to_string(),
    };

    match name.as_str() {
        "see" => untyped(TagKind::See),
        "deprecated" => untyped(TagKind::Deprecated),
        "inheritdoc" => untyped(TagKind::InheritDoc),
        "template" | "template-covariant" | "template-contravariant" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let template = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
            Tag {
                kind: TagKind::Template,
                prefixed,
                value: TagValue::Untyped,
                variable: template,
                text: parts.next().unwrap_or("").trim().to_string(),
            }
        }
        _ => untyped(TagKind::Other(full_name.to_string())),
    }
}

fn parse_typed_tag(kind: TagKind, prefixed: bool, rest: &str) -> Tag {
    let mut tag = Tag {
        kind,
        prefixed,
        value: TagValue::Untyped,
        variable: None,
        text: String::new(),
    };

    let mut remainder = rest;

    // `@param $name` and `@param &...$name` carry no type.
    let starts_with_variable = rest
        .trim_start_matches(['&', '.'])
        .starts_with('$');
    if !rest.is_empty() && !starts_with_variable {
        match parse_type_prefix(rest) {
            Ok((node, consumed)) => {
                tag.value = TagValue::Typed(node);
                remainder = &rest[consumed..];
            }
            Err(err) => {
                let raw = rest.split_whitespace().next().unwrap_or(rest);
                tag.value = TagValue::Malformed {
                    raw: raw.to_string(),
                    reason: err.to_string(),
                };
                remainder = &rest[raw.len()..];
            }
        }
    }

    let remainder = remainder.trim_start();
    if matches!(tag.kind, TagKind::Param | TagKind::Var) {
        let candidate = remainder.trim_start_matches(['&', '.']);
        if let Some(after_dollar) = candidate.strip_prefix('$') {
            let name_len = after_dollar
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(after_dollar.len());
            tag.variable = Some(after_dollar[..name_len].to_string());
            tag.text = after_dollar[name_len..].trim().to_string();
            return tag;
        }
    }
    tag.text = remainder.trim().to_string();
    tag
}
