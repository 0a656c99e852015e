//! PHPDoc block parsing.
//!
//! This module is the annotation parser adapter: it turns a raw
//! `/** ... */` comment into an [`AnnotationDoc`] (summary, description and
//! tags) and parses the pseudo-type carried by `@param`, `@return`, `@var`,
//! `@throws`, `@extends` and `@implements` into a [`TypeNode`].
//!
//! # Submodules
//!
//! - [`tags`]: comment cleaning, summary/description split, tag extraction
//!   and inherit-marker recognition.
//! - [`types`]: the pseudo-type grammar (`TypeNode`, `parse_type`,
//!   `parse_type_prefix`).

mod tags;
pub(crate) mod types;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub use tags::{AnnotationDoc, Tag, TagKind, TagValue, TextSpan, parse_docblock};
pub use types::{Literal, ShapeField, TypeNode, TypeParseError, parse_type, parse_type_prefix};

/// Turns raw comment text into an [`AnnotationDoc`].
///
/// Implementations must be side-effect free: the same input always yields
/// the same document.  The builder caches results by comment text.
pub trait AnnotationParser: Send + Sync {
    fn parse(&self, raw_comment: &str) -> AnnotationDoc;
}

/// The built-in PHPDoc parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocblockParser;

impl AnnotationParser for DocblockParser {
    fn parse(&self, raw_comment: &str) -> AnnotationDoc {
        parse_docblock(raw_comment)
    }
}

/// Memoizes an [`AnnotationParser`] by raw comment text for one build.
pub struct CachedParser<'p> {
    parser: &'p dyn AnnotationParser,
    cache: RefCell<HashMap<String, Rc<AnnotationDoc>>>,
}

impl<'p> CachedParser<'p> {
    pub fn new(parser: &'p dyn AnnotationParser) -> Self {
        Self {
            parser,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn parse(&self, raw_comment: &str) -> Rc<AnnotationDoc> {
        if let Some(doc) = self.cache.borrow().get(raw_comment) {
            return Rc::clone(doc);
        }
        let doc = Rc::new(self.parser.parse(raw_comment));
        self.cache
            .borrow_mut()
            .insert(raw_comment.to_string(), Rc::clone(&doc));
        doc
    }

    /// Parse an optional comment; a missing comment has no doc.
    pub fn parse_opt(&self, raw_comment: Option<&str>) -> Option<Rc<AnnotationDoc>> {
        raw_comment.map(|raw| self.parse(raw))
    }
}

/// Render spans back to text, substituting each inherit marker with
/// `inherited` when present and keeping the literal marker otherwise.
pub fn render_spans(spans: &[TextSpan], inherited: Option<&str>) -> String {
    let mut out = String::new();
    for span in spans {
        match span {
            TextSpan::Text(text) => out.push_str(text),
            TextSpan::InheritMarker(marker) => match inherited {
                Some(text) => {
                    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                        out.push_str("\n\n");
                    }
                    out.push_str(text);
                }
                None => out.push_str(marker),
            },
        }
    }
    out.trim().to_string()
}
