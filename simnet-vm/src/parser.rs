//! Lexer and parser for program source.
//!
//! Produces a tree of [`SymbolicExpr`] with source positions. Literals are
//! decoded here; names are resolved later by the compiler.

use std::iter::Peekable;
use std::str::Chars;

use simnet_types::principal::{validate_program_name, Principal};
use simnet_types::value::Value;

/// Maximum nesting of lists and tuples in source.
pub const MAX_NESTING_DEPTH: usize = 64;

/// 1-based line and column of a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolicExprKind {
    /// A bare name: keyword, function, variable, type name.
    Atom(String),
    Literal(Value),
    /// `.name`, a program deployed in the same session.
    ContractRef(String),
    List(Vec<SymbolicExpr>),
    /// `{name: expr, ...}`
    Tuple(Vec<(String, SymbolicExpr)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicExpr {
    pub kind: SymbolicExprKind,
    pub span: Span,
}

impl SymbolicExpr {
    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            SymbolicExprKind::Atom(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SymbolicExpr]> {
        match &self.kind {
            SymbolicExprKind::List(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub span: Span,
    pub reason: String,
}

impl ParseError {
    fn new(span: Span, reason: impl Into<String>) -> Self {
        Self {
            span,
            reason: reason.into(),
        }
    }
}

/// Parse a whole program into its top-level expressions.
pub fn parse(source: &str) -> Result<Vec<SymbolicExpr>, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut exprs = Vec::new();
    while parser.pos < parser.tokens.len() {
        exprs.push(parser.expr(0)?);
    }
    Ok(exprs)
}

// ─── Lexer ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Ascii(String),
    Utf8(String),
    Atom(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    span: Span,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    column: u32,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '{' | '}' | ':' | ',' | '"' | ';')
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn skip_trivia(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == ';' {
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_trivia();
        let span = self.span();
        let Some(c) = self.bump() else {
            return Ok(None);
        };
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '"' => TokenKind::Ascii(self.string(span)?),
            'u' if self.chars.peek() == Some(&'"') => {
                self.bump();
                TokenKind::Utf8(self.string(span)?)
            }
            _ => {
                let mut text = String::from(c);
                while let Some(&next) = self.chars.peek() {
                    if is_delimiter(next) {
                        break;
                    }
                    text.push(next);
                    self.bump();
                }
                TokenKind::Atom(text)
            }
        };
        Ok(Some(Token { kind, span }))
    }

    /// Read a string body after the opening quote.
    fn string(&mut self, start: Span) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::new(start, "unterminated string literal")),
                Some('"') => return Ok(out),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(other) => {
                            return Err(ParseError::new(
                                self.span(),
                                format!("unknown escape sequence '\\{other}'"),
                            ))
                        }
                        None => return Err(ParseError::new(start, "unterminated string literal")),
                    };
                    out.push(escaped);
                }
                Some(c) => out.push(c),
            }
        }
    }
}

// ─── Parser ─────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn last_span(&self) -> Span {
        self.tokens.last().map(|t| t.span).unwrap_or_default()
    }

    fn expr(&mut self, depth: usize) -> Result<SymbolicExpr, ParseError> {
        let Some(token) = self.next() else {
            return Err(ParseError::new(self.last_span(), "unexpected end of input"));
        };
        let span = token.span;
        if depth > MAX_NESTING_DEPTH {
            return Err(ParseError::new(
                span,
                format!("nesting deeper than {MAX_NESTING_DEPTH} levels"),
            ));
        }
        let kind = match token.kind {
            TokenKind::LParen => {
                let mut items = Vec::new();
                loop {
                    match self.peek_kind() {
                        None => return Err(ParseError::new(span, "unclosed '('")),
                        Some(TokenKind::RParen) => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => items.push(self.expr(depth + 1)?),
                    }
                }
                SymbolicExprKind::List(items)
            }
            TokenKind::LBrace => SymbolicExprKind::Tuple(self.tuple_body(span, depth)?),
            TokenKind::RParen => return Err(ParseError::new(span, "unexpected ')'")),
            TokenKind::RBrace => return Err(ParseError::new(span, "unexpected '}'")),
            TokenKind::Colon => return Err(ParseError::new(span, "unexpected ':'")),
            TokenKind::Comma => return Err(ParseError::new(span, "unexpected ','")),
            TokenKind::Ascii(s) => {
                if !s.is_ascii() {
                    return Err(ParseError::new(
                        span,
                        "non-ASCII character in string-ascii literal; use u\"...\"",
                    ));
                }
                SymbolicExprKind::Literal(Value::StringAscii(s))
            }
            TokenKind::Utf8(s) => SymbolicExprKind::Literal(Value::StringUtf8(s)),
            TokenKind::Atom(text) => classify_atom(&text, span)?,
        };
        Ok(SymbolicExpr { kind, span })
    }

    fn tuple_body(
        &mut self,
        open: Span,
        depth: usize,
    ) -> Result<Vec<(String, SymbolicExpr)>, ParseError> {
        let mut fields = Vec::new();
        loop {
            let Some(token) = self.next() else {
                return Err(ParseError::new(open, "unclosed '{'"));
            };
            let name = match token.kind {
                TokenKind::RBrace => return Ok(fields),
                TokenKind::Atom(text) if is_identifier(&text) => text,
                _ => return Err(ParseError::new(token.span, "expected tuple field name")),
            };
            match self.next() {
                Some(Token {
                    kind: TokenKind::Colon,
                    ..
                }) => {}
                _ => {
                    return Err(ParseError::new(
                        token.span,
                        format!("expected ':' after tuple field '{name}'"),
                    ))
                }
            }
            let value = self.expr(depth + 1)?;
            fields.push((name, value));
            if self.peek_kind() == Some(&TokenKind::Comma) {
                self.pos += 1;
            }
        }
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || "-_!?+*/<>=".contains(c) => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || "-_!?+*/<>=".contains(c))
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn classify_atom(text: &str, span: Span) -> Result<SymbolicExprKind, ParseError> {
    if let Some(rest) = text.strip_prefix('\'') {
        let principal: Principal = rest
            .parse()
            .map_err(|e| ParseError::new(span, format!("invalid principal literal: {e}")))?;
        return Ok(SymbolicExprKind::Literal(Value::Principal(principal)));
    }
    if let Some(name) = text.strip_prefix('.') {
        validate_program_name(name)
            .map_err(|e| ParseError::new(span, format!("invalid program reference: {e}")))?;
        return Ok(SymbolicExprKind::ContractRef(name.to_string()));
    }
    if let Some(digits) = text.strip_prefix("0x") {
        let bytes = hex::decode(digits)
            .map_err(|e| ParseError::new(span, format!("invalid buffer literal: {e}")))?;
        return Ok(SymbolicExprKind::Literal(Value::Buffer(bytes)));
    }
    if let Some(digits) = text.strip_prefix('u') {
        if is_digits(digits) {
            let n: u128 = digits
                .parse()
                .map_err(|_| ParseError::new(span, format!("uint literal out of range: {text}")))?;
            return Ok(SymbolicExprKind::Literal(Value::UInt(n)));
        }
    }
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    if is_digits(unsigned) {
        let n: i128 = text
            .parse()
            .map_err(|_| ParseError::new(span, format!("int literal out of range: {text}")))?;
        return Ok(SymbolicExprKind::Literal(Value::Int(n)));
    }
    if !is_identifier(text) || text.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ParseError::new(span, format!("invalid token '{text}'")));
    }
    Ok(SymbolicExprKind::Atom(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use simnet_types::primitives::Address;

    fn parse_one(source: &str) -> SymbolicExpr {
        let mut exprs = parse(source).unwrap();
        assert_eq!(exprs.len(), 1);
        exprs.remove(0)
    }

    fn literal(source: &str) -> Value {
        match parse_one(source).kind {
            SymbolicExprKind::Literal(v) => v,
            other => panic!("expected literal, got {other:?}"),
        }
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal("u42"), Value::UInt(42));
        assert_eq!(literal("-7"), Value::Int(-7));
        assert_eq!(literal("12"), Value::Int(12));
        assert_eq!(literal("0xbeef"), Value::Buffer(vec![0xbe, 0xef]));
        assert_eq!(literal("0x"), Value::Buffer(vec![]));
        assert_eq!(literal("\"hi\\n\""), Value::StringAscii("hi\n".into()));
        assert_eq!(literal("u\"héllo\""), Value::StringUtf8("héllo".into()));
    }

    #[test]
    fn test_principal_literals() {
        let addr = Address::new([0xab; 20]);
        assert_eq!(
            literal(&format!("'{addr}")),
            Value::Principal(Principal::Standard(addr))
        );
        match literal(&format!("'{addr}.counter")) {
            Value::Principal(Principal::Contract(id)) => assert_eq!(id.name, "counter"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse("'0x12").is_err());
    }

    #[test]
    fn test_atoms_and_refs() {
        assert_eq!(parse_one("map-get?").as_atom(), Some("map-get?"));
        assert_eq!(parse_one("+").as_atom(), Some("+"));
        assert_eq!(parse_one("tx-sender").as_atom(), Some("tx-sender"));
        assert_eq!(
            parse_one(".counter").kind,
            SymbolicExprKind::ContractRef("counter".into())
        );
        // A bare `u` is a name, not a number.
        assert_eq!(parse_one("u").as_atom(), Some("u"));
    }

    #[test]
    fn test_list_with_spans() {
        let expr = parse_one("(define-public (increment)\n  (ok u1))");
        let items = expr.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_atom(), Some("define-public"));
        assert_eq!(items[2].span, Span { line: 2, column: 3 });
    }

    #[test]
    fn test_tuple_literal() {
        let expr = parse_one("{amount: u1, memo: none}");
        match expr.kind {
            SymbolicExprKind::Tuple(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].0, "amount");
                assert_eq!(fields[1].1.as_atom(), Some("none"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_comments_are_skipped() {
        let exprs = parse(";; a counter\n(begin u1) ; trailing\n").unwrap();
        assert_eq!(exprs.len(), 1);
    }

    #[test]
    fn test_errors_carry_position() {
        let err = parse("(begin\n  (ok u1)").unwrap_err();
        assert_eq!(err.span, Span { line: 1, column: 1 });
        assert!(err.reason.contains("unclosed"));

        let err = parse("(ok u1))").unwrap_err();
        assert_eq!(err.span, Span { line: 1, column: 8 });

        let err = parse("\"é\"").unwrap_err();
        assert!(err.reason.contains("non-ASCII"));

        assert!(parse("u340282366920938463463374607431768211456").is_err());
        assert!(parse("12abc").is_err());
        assert!(parse("0xzz").is_err());
        assert!(parse("\"open").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}{}", "(".repeat(MAX_NESTING_DEPTH + 2), ")".repeat(MAX_NESTING_DEPTH + 2));
        let err = parse(&deep).unwrap_err();
        assert!(err.reason.contains("nesting"));
    }
}
