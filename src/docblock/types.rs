//! Pseudo-type parsing for PHPDoc types.
//!
//! This submodule turns a type expression as written in a docblock (or a
//! native type hint rendered back to text) into a [`TypeNode`] tree.  It
//! understands the PHPStan / Psalm vocabulary the unifier consumes:
//! unions, intersections, `?T`, `T[]`, generics (`array<int, User>`),
//! array and object shapes, callable signatures, literal types and
//! conditional return types.
//!
//! [`parse_type_prefix`] parses the longest type at the start of a string
//! and reports where it stopped, which is how tag bodies such as
//! `array{id: int} $row The row` are split into type, variable and text.
use std::fmt;

use thiserror::Error;

/// A parsed pseudo-type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeNode {
    /// A keyword or class name as written (`int`, `positive-int`, `\Foo\Bar`, `$this`).
    Identifier(String),
    /// `?T`
    Nullable(Box<TypeNode>),
    Union(Vec<TypeNode>),
    Intersection(Vec<TypeNode>),
    /// `T[]`
    Array(Box<TypeNode>),
    /// `array<K, V>`, `list<T>`, `Collection<T>`, `class-string<T>`, `int<0, max>`.
    Generic { base: String, params: Vec<TypeNode> },
    /// `array{id: int, name?: string}`, `list{int, string}`, `object{…}`.
    Shape {
        base: String,
        fields: Vec<ShapeField>,
    },
    /// `callable(int, string): bool`, `Closure(): void`.
    Callable {
        base: String,
        params: Vec<TypeNode>,
        return_type: Option<Box<TypeNode>>,
    },
    Literal(Literal),
    /// `($param is T ? A : B)`; only the two outcomes matter for display.
    Conditional {
        then: Box<TypeNode>,
        otherwise: Box<TypeNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeField {
    pub key: Option<String>,
    pub optional: bool,
    pub value: TypeNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    String(String),
    Int(String),
    Float(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeParseError {
    #[error("unexpected end of type")]
    UnexpectedEnd,
    #[error("unexpected `{found}` at offset {offset}")]
    Unexpected { found: String, offset: usize },
    #[error("trailing input `{0}`")]
    Trailing(String),
}

/// Parse a complete type expression.  Anything left over is an error.
pub fn parse_type(input: &str) -> Result<TypeNode, TypeParseError> {
    let (node, consumed) = parse_type_prefix(input)?;
    let rest = input[consumed..].trim();
    if rest.is_empty() {
        Ok(node)
    } else {
        Err(TypeParseError::Trailing(rest.to_string()))
    }
}

/// Parse the longest type expression at the start of `input`.
///
/// Returns the node and the byte offset just past its last token.
pub fn parse_type_prefix(input: &str) -> Result<(TypeNode, usize), TypeParseError> {
    let mut parser = Parser {
        lexer: Lexer { src: input, pos: 0 },
        consumed: 0,
    };
    let node = parser.union()?;
    Ok((node, parser.consumed))
}

// ─── Lexer ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Variable(&'a str),
    Str(&'a str),
    Number(&'a str),
    Punct(char),
    Ellipsis,
    Other(char),
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) | Token::Variable(s) | Token::Str(s) | Token::Number(s) => {
                f.write_str(s)
            }
            Token::Punct(c) | Token::Other(c) => write!(f, "{c}"),
            Token::Ellipsis => f.write_str("..."),
        }
    }
}

#[derive(Clone, Copy)]
struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '\\' || (!c.is_ascii() && c.is_alphabetic())
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '\\' || (!c.is_ascii() && c.is_alphanumeric())
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Returns the token together with its start and end offsets.
    fn next_token(&mut self) -> Option<(Token<'a>, usize, usize)> {
        self.skip_whitespace();
        let start = self.pos;
        let rest = self.rest();
        let c = rest.chars().next()?;

        let token = if rest.starts_with("...") {
            self.pos += 3;
            Token::Ellipsis
        } else if is_ident_start(c) {
            self.pos += ident_len(rest);
            // Class constant references: `Foo::BAR`, `Foo::*`.
            let after = self.rest();
            if let Some(member) = after.strip_prefix("::") {
                let len = member
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '*'))
                    .unwrap_or(member.len());
                self.pos += 2 + len;
            }
            Token::Ident(&self.src[start..self.pos])
        } else if c == '$' {
            self.pos += 1 + ident_len(&rest[1..]);
            Token::Variable(&self.src[start..self.pos])
        } else if c.is_ascii_digit()
            || (c == '-' && rest[1..].starts_with(|d: char| d.is_ascii_digit()))
        {
            let len = 1 + rest[1..]
                .find(|d: char| !(d.is_ascii_alphanumeric() || d == '.' || d == '_'))
                .unwrap_or(rest.len() - 1);
            self.pos += len;
            Token::Number(&self.src[start..self.pos])
        } else if c == '\'' || c == '"' {
            let mut escaped = false;
            let mut end = rest.len();
            for (i, ch) in rest.char_indices().skip(1) {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == c {
                    end = i + 1;
                    break;
                }
            }
            self.pos += end;
            Token::Str(&self.src[start..self.pos])
        } else {
            self.pos += c.len_utf8();
            match c {
                '|' | '&' | '?' | '<' | '>' | ',' | '[' | ']' | '{' | '}' | '(' | ')' | ':'
                | '=' | '*' => Token::Punct(c),
                other => Token::Other(other),
            }
        };
        Some((token, start, self.pos))
    }
}

/// Length of an identifier, allowing inner hyphens (`non-empty-string`).
fn ident_len(s: &str) -> usize {
    let mut len = 0;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if is_ident_continue(c) {
            len = i + c.len_utf8();
        } else if c == '-'
            && len > 0
            && chars.peek().is_some_and(|&(_, next)| next.is_ascii_alphanumeric())
        {
            len = i + 1;
        } else {
            break;
        }
    }
    len
}

// ─── Parser ─────────────────────────────────────────────────────────────────

struct Parser<'a> {
    lexer: Lexer<'a>,
    /// Offset just past the last consumed token.
    consumed: usize,
}

const CALLABLE_BASES: &[&str] = &[
    "callable",
    "closure",
    "\\closure",
    "pure-callable",
    "pure-closure",
];

const SHAPE_BASES: &[&str] = &[
    "array",
    "list",
    "non-empty-array",
    "non-empty-list",
    "object",
];

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        let mut lexer = self.lexer;
        lexer.next_token().map(|(t, _, _)| t)
    }

    fn peek_second(&self) -> Option<Token<'a>> {
        let mut lexer = self.lexer;
        lexer.next_token()?;
        lexer.next_token().map(|(t, _, _)| t)
    }

    fn bump(&mut self) -> Result<Token<'a>, TypeParseError> {
        let (token, _, end) = self
            .lexer
            .next_token()
            .ok_or(TypeParseError::UnexpectedEnd)?;
        self.consumed = end;
        Ok(token)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(Token::Punct(c)) {
            // Cannot fail: peek just saw a token.
            let _ = self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), TypeParseError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> TypeParseError {
        let mut lexer = self.lexer;
        match lexer.next_token() {
            Some((token, start, _)) => TypeParseError::Unexpected {
                found: token.to_string(),
                offset: start,
            },
            None => TypeParseError::UnexpectedEnd,
        }
    }

    fn union(&mut self) -> Result<TypeNode, TypeParseError> {
        let first = self.intersection()?;
        if self.peek() != Some(Token::Punct('|')) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.eat('|') {
            members.push(self.intersection()?);
        }
        Ok(TypeNode::Union(members))
    }

    fn intersection(&mut self) -> Result<TypeNode, TypeParseError> {
        let first = self.postfix()?;
        let mut members = vec![first];
        // `&$param` and `&...$rest` inside callable signatures are by-ref
        // markers, not intersections.
        while self.peek() == Some(Token::Punct('&'))
            && !matches!(
                self.peek_second(),
                Some(Token::Variable(_) | Token::Ellipsis) | None
            )
        {
            self.bump()?;
            members.push(self.postfix()?);
        }
        if members.len() == 1 {
            Ok(members.remove(0))
        } else {
            Ok(TypeNode::Intersection(members))
        }
    }

    fn postfix(&mut self) -> Result<TypeNode, TypeParseError> {
        let mut node = self.atom()?;
        while self.peek() == Some(Token::Punct('['))
            && self.peek_second() == Some(Token::Punct(']'))
        {
            self.bump()?;
            self.bump()?;
            node = TypeNode::Array(Box::new(node));
        }
        Ok(node)
    }

    fn atom(&mut self) -> Result<TypeNode, TypeParseError> {
        match self.peek() {
            Some(Token::Punct('?')) => {
                self.bump()?;
                Ok(TypeNode::Nullable(Box::new(self.postfix()?)))
            }
            Some(Token::Punct('(')) => {
                self.bump()?;
                self.parenthesized()
            }
            Some(Token::Str(s)) => {
                self.bump()?;
                Ok(TypeNode::Literal(Literal::String(s.to_string())))
            }
            Some(Token::Number(n)) => {
                self.bump()?;
                if n.contains('.') {
                    Ok(TypeNode::Literal(Literal::Float(n.to_string())))
                } else {
                    Ok(TypeNode::Literal(Literal::Int(n.to_string())))
                }
            }
            Some(Token::Variable("$this")) => {
                self.bump()?;
                Ok(TypeNode::Identifier("$this".to_string()))
            }
            Some(Token::Punct('*')) => {
                // Wildcard generic argument: `Collection<*>`.
                self.bump()?;
                Ok(TypeNode::Identifier("mixed".to_string()))
            }
            Some(Token::Ident(name)) => {
                self.bump()?;
                self.after_identifier(name)
            }
            Some(_) => Err(self.unexpected()),
            None => Err(TypeParseError::UnexpectedEnd),
        }
    }

    fn after_identifier(&mut self, name: &'a str) -> Result<TypeNode, TypeParseError> {
        let lower = name.to_ascii_lowercase();
        match self.peek() {
            Some(Token::Punct('<')) => {
                self.bump()?;
                let params = self.generic_params()?;
                Ok(TypeNode::Generic {
                    base: name.to_string(),
                    params,
                })
            }
            Some(Token::Punct('{')) if SHAPE_BASES.contains(&lower.as_str()) => {
                self.bump()?;
                let fields = self.shape_fields()?;
                Ok(TypeNode::Shape {
                    base: name.to_string(),
                    fields,
                })
            }
            Some(Token::Punct('(')) if CALLABLE_BASES.contains(&lower.as_str()) => {
                self.bump()?;
                self.callable(name)
            }
            _ => Ok(TypeNode::Identifier(name.to_string())),
        }
    }

    fn parenthesized(&mut self) -> Result<TypeNode, TypeParseError> {
        // `($param is T ? A : B)`
        if let (Some(Token::Variable(_)), Some(Token::Ident(kw))) = (self.peek(), self.peek_second())
            && kw.eq_ignore_ascii_case("is")
        {
            self.bump()?;
            return self.conditional_tail();
        }
        let inner = self.union()?;
        if let Some(Token::Ident(kw)) = self.peek()
            && kw.eq_ignore_ascii_case("is")
        {
            return self.conditional_tail();
        }
        self.expect(')')?;
        Ok(inner)
    }

    /// Parses `is [not] T ? A : B)` after the subject of a conditional.
    fn conditional_tail(&mut self) -> Result<TypeNode, TypeParseError> {
        self.bump()?; // `is`
        if let Some(Token::Ident(kw)) = self.peek()
            && kw.eq_ignore_ascii_case("not")
        {
            self.bump()?;
        }
        self.union()?;
        self.expect('?')?;
        let then = self.union()?;
        self.expect(':')?;
        let otherwise = self.union()?;
        self.expect(')')?;
        Ok(TypeNode::Conditional {
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn generic_params(&mut self) -> Result<Vec<TypeNode>, TypeParseError> {
        let mut params = Vec::new();
        loop {
            if self.eat('>') {
                break;
            }
            if let Some(Token::Ident(kw)) = self.peek()
                && matches!(kw, "covariant" | "contravariant")
                && !matches!(self.peek_second(), Some(Token::Punct(',' | '>')))
            {
                self.bump()?;
            }
            params.push(self.union()?);
            if !self.eat(',') {
                self.expect('>')?;
                break;
            }
        }
        Ok(params)
    }

    fn shape_fields(&mut self) -> Result<Vec<ShapeField>, TypeParseError> {
        let mut fields = Vec::new();
        loop {
            if self.eat('}') {
                break;
            }
            if self.peek() == Some(Token::Ellipsis) {
                // Unsealed shape: `array{id: int, ...}`.
                self.bump()?;
                self.expect('}')?;
                break;
            }
            fields.push(self.shape_field()?);
            if !self.eat(',') {
                self.expect('}')?;
                break;
            }
        }
        Ok(fields)
    }

    fn shape_field(&mut self) -> Result<ShapeField, TypeParseError> {
        let keyed = match (self.peek(), self.peek_second()) {
            (
                Some(Token::Ident(_) | Token::Str(_) | Token::Number(_)),
                Some(Token::Punct(':' | '?')),
            ) => {
                let mut probe = self.lexer;
                probe.next_token();
                match probe.next_token() {
                    Some((Token::Punct(':'), _, _)) => true,
                    Some((Token::Punct('?'), _, _)) => {
                        matches!(probe.next_token(), Some((Token::Punct(':'), _, _)))
                    }
                    _ => false,
                }
            }
            _ => false,
        };
        if !keyed {
            return Ok(ShapeField {
                key: None,
                optional: false,
                value: self.union()?,
            });
        }
        let key = match self.bump()? {
            Token::Str(s) => s.trim_matches(['\'', '"']).to_string(),
            other => other.to_string(),
        };
        let optional = self.eat('?');
        self.expect(':')?;
        Ok(ShapeField {
            key: Some(key),
            optional,
            value: self.union()?,
        })
    }

    fn callable(&mut self, base: &str) -> Result<TypeNode, TypeParseError> {
        let mut params = Vec::new();
        loop {
            if self.eat(')') {
                break;
            }
            params.push(self.union()?);
            self.eat('&');
            if self.peek() == Some(Token::Ellipsis) {
                self.bump()?;
            }
            if let Some(Token::Variable(_)) = self.peek() {
                self.bump()?;
            }
            self.eat('=');
            if !self.eat(',') {
                self.expect(')')?;
                break;
            }
        }
        let return_type = if self.eat(':') {
            Some(Box::new(self.postfix()?))
        } else {
            None
        };
        Ok(TypeNode::Callable {
            base: base.to_string(),
            params,
            return_type,
        })
    }
}

// ─── Display ────────────────────────────────────────────────────────────────

fn join(f: &mut fmt::Formatter<'_>, nodes: &[TypeNode], sep: &str) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{node}")?;
    }
    Ok(())
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNode::Identifier(name) => f.write_str(name),
            TypeNode::Nullable(inner) => write!(f, "?{inner}"),
            TypeNode::Union(members) => join(f, members, "|"),
            TypeNode::Intersection(members) => join(f, members, "&"),
            TypeNode::Array(inner) => match inner.as_ref() {
                TypeNode::Union(_) | TypeNode::Intersection(_) => write!(f, "({inner})[]"),
                _ => write!(f, "{inner}[]"),
            },
            TypeNode::Generic { base, params } => {
                write!(f, "{base}<")?;
                join(f, params, ", ")?;
                f.write_str(">")
            }
            TypeNode::Shape { base, fields } => {
                write!(f, "{base}{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if let Some(key) = &field.key {
                        let marker = if field.optional { "?" } else { "" };
                        write!(f, "{key}{marker}: ")?;
                    }
                    write!(f, "{}", field.value)?;
                }
                f.write_str("}")
            }
            TypeNode::Callable {
                base,
                params,
                return_type,
            } => {
                write!(f, "{base}(")?;
                join(f, params, ", ")?;
                f.write_str(")")?;
                if let Some(ret) = return_type {
                    write!(f, ": {ret}")?;
                }
                Ok(())
            }
            TypeNode::Literal(Literal::String(s) | Literal::Int(s) | Literal::Float(s)) => {
                f.write_str(s)
            }
            TypeNode::Conditional { then, otherwise } => write!(f, "({then}|{otherwise})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> TypeNode {
        TypeNode::Identifier(name.to_string())
    }

    #[test]
    fn parses_simple_identifiers() {
        assert_eq!(parse_type("int").unwrap(), ident("int"));
        assert_eq!(parse_type("\\App\\User").unwrap(), ident("\\App\\User"));
        assert_eq!(
            parse_type("non-empty-string").unwrap(),
            ident("non-empty-string")
        );
    }

    #[test]
    fn parses_nullable_and_unions() {
        assert_eq!(
            parse_type("?Foo").unwrap(),
            TypeNode::Nullable(Box::new(ident("Foo")))
        );
        assert_eq!(
            parse_type("Foo | null").unwrap(),
            TypeNode::Union(vec![ident("Foo"), ident("null")])
        );
    }

    #[test]
    fn parses_intersection_inside_union() {
        assert_eq!(
            parse_type("(A&B)|null").unwrap(),
            TypeNode::Union(vec![
                TypeNode::Intersection(vec![ident("A"), ident("B")]),
                ident("null"),
            ])
        );
    }

    #[test]
    fn parses_array_suffix_and_generics() {
        assert_eq!(
            parse_type("string[]").unwrap(),
            TypeNode::Array(Box::new(ident("string")))
        );
        assert_eq!(
            parse_type("array<int, list<User>>").unwrap(),
            TypeNode::Generic {
                base: "array".to_string(),
                params: vec![
                    ident("int"),
                    TypeNode::Generic {
                        base: "list".to_string(),
                        params: vec![ident("User")],
                    },
                ],
            }
        );
    }

    #[test]
    fn parses_integer_range_with_negative_bound() {
        assert_eq!(
            parse_type("int<-1, max>").unwrap(),
            TypeNode::Generic {
                base: "int".to_string(),
                params: vec![
                    TypeNode::Literal(Literal::Int("-1".to_string())),
                    ident("max"),
                ],
            }
        );
    }

    #[test]
    fn parses_shapes_with_optional_keys() {
        let node = parse_type("array{id: int, 'name'?: string, ...}").unwrap();
        let TypeNode::Shape { base, fields } = node else {
            panic!("expected shape");
        };
        assert_eq!(base, "array");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].key.as_deref(), Some("id"));
        assert_eq!(fields[1].key.as_deref(), Some("name"));
        assert!(fields[1].optional);
    }

    #[test]
    fn parses_callable_signature() {
        let node = parse_type("callable(int, string &...$rest): bool").unwrap();
        assert_eq!(
            node,
            TypeNode::Callable {
                base: "callable".to_string(),
                params: vec![ident("int"), ident("string")],
                return_type: Some(Box::new(ident("bool"))),
            }
        );
    }

    #[test]
    fn parses_conditional_return() {
        let node = parse_type("($abstract is class-string<T> ? T : mixed)").unwrap();
        assert_eq!(
            node,
            TypeNode::Conditional {
                then: Box::new(ident("T")),
                otherwise: Box::new(ident("mixed")),
            }
        );
    }

    #[test]
    fn prefix_stops_before_variable_and_text() {
        let input = "array{id: int} $row The row";
        let (node, consumed) = parse_type_prefix(input).unwrap();
        assert!(matches!(node, TypeNode::Shape { .. }));
        assert_eq!(&input[consumed..], " $row The row");
    }

    #[test]
    fn prefix_stops_before_description_words() {
        let input = "Foo|Bar the thing.";
        let (_, consumed) = parse_type_prefix(input).unwrap();
        assert_eq!(&input[..consumed], "Foo|Bar");
    }

    #[test]
    fn this_is_an_identifier() {
        assert_eq!(parse_type("$this").unwrap(), ident("$this"));
    }

    #[test]
    fn rejects_unbalanced_generics() {
        assert!(parse_type("array<int").is_err());
        assert!(parse_type("").is_err());
        assert!(parse_type("|int").is_err());
    }

    #[test]
    fn display_round_trips_common_forms() {
        for src in ["?Foo", "int|string", "array<int, User>", "callable(int): void"] {
            assert_eq!(parse_type(src).unwrap().to_string(), src);
        }
    }
}
