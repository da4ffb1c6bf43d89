//! Fragment parser: recovers the shape of one callable literal.
//!
//! Only the outer structure is parsed (keywords, name, parameter list,
//! body braces, template base). Bodies, default values and base
//! expressions are kept as spans into the original text.

use std::collections::BTreeSet;

use crate::error::SyntaxError;
use crate::lexer::{lex, Spanned, Token};

/// Byte range into the parsed source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn slice<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

/// The syntactic shape of a callable literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `x => ...` or `(a, b) => { ... }`
    Arrow,
    /// `function name(...) { ... }`, optionally `async` and/or `*`
    Function,
    /// `class Name extends Base { ... }`
    Class,
    /// A member fragment that is only valid inside a template or literal
    /// body: `name(...) { ... }`, `get name() { ... }`, `*gen() { ... }`
    Method(MethodKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A bare name.
    Ident,
    /// `name = expr` (or a pattern with a default).
    Default,
    /// `...rest`
    Rest,
    /// `{ a, b }` / `[a, b]`
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub kind: ParamKind,
    pub span: Span,
}

/// Abstract description of one callable literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub shape: Shape,
    pub is_async: bool,
    pub is_generator: bool,
    /// Declared name, or the member key for method fragments.
    pub name: Option<String>,
    /// Parameters; for templates, those of the `constructor` member.
    pub params: Vec<Param>,
    /// The `{ ... }` body, or the expression body of an arrow.
    pub body: Span,
    /// Base expression of `class ... extends <base> { ... }`.
    pub superclass: Option<Span>,
    /// Every identifier-like word in the source.
    pub identifiers: BTreeSet<String>,
}

impl Fragment {
    /// Number of leading parameters that have neither a default nor a
    /// rest marker. The host runtime reports this as `length`.
    pub fn arity(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| matches!(p.kind, ParamKind::Ident | ParamKind::Pattern))
            .count()
    }

    /// Whether the host runtime gives callables of this shape an own
    /// `prototype` attribute.
    pub fn has_prototype(&self) -> bool {
        match self.shape {
            Shape::Arrow => false,
            Shape::Class => true,
            Shape::Function => self.is_generator || !self.is_async,
            Shape::Method(_) => self.is_generator,
        }
    }

    /// Whether this is a body-level member fragment rather than a
    /// free-standing expression.
    pub fn is_member(&self) -> bool {
        matches!(self.shape, Shape::Method(_))
    }
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, tokens: &'a [Spanned]) -> Self {
        Parser {
            src,
            tokens,
            pos: 0,
        }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        &self.tokens[(self.pos + ahead).min(self.tokens.len() - 1)].token
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn err(&self, msg: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.cur().start, msg)
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    fn expect_eof(&self) -> Result<(), SyntaxError> {
        if self.peek() == &Token::Eof {
            Ok(())
        } else {
            Err(self.err(format!("unexpected {:?} after callable", self.peek())))
        }
    }

    fn span_of(&self, first: usize, last: usize) -> Span {
        Span {
            start: self.tokens[first].start,
            end: self.tokens[last - 1].end,
        }
    }

    /// A free-standing callable expression.
    fn callable(&mut self) -> Result<Fragment, SyntaxError> {
        let is_async =
            self.is_word("async") && matches!(self.peek_at(1), Token::Word(_) | Token::LParen);
        if is_async {
            self.advance();
        }
        if self.is_word("function") {
            return self.function(is_async);
        }
        if !is_async && self.is_word("class") {
            return self.class();
        }
        self.arrow(is_async)
    }

    fn function(&mut self, is_async: bool) -> Result<Fragment, SyntaxError> {
        self.advance(); // function
        let is_generator = self.peek() == &Token::Star;
        if is_generator {
            self.advance();
        }
        let name = match self.peek().clone() {
            Token::Word(w) => {
                self.advance();
                Some(w)
            }
            _ => None,
        };
        let params = self.params()?;
        let body = self.block()?;
        Ok(Fragment {
            shape: Shape::Function,
            is_async,
            is_generator,
            name,
            params,
            body,
            superclass: None,
            identifiers: BTreeSet::new(),
        })
    }

    fn class(&mut self) -> Result<Fragment, SyntaxError> {
        self.advance(); // class
        let name = match self.peek().clone() {
            Token::Word(w) if w != "extends" => {
                self.advance();
                Some(w)
            }
            _ => None,
        };

        let superclass = if self.is_word("extends") {
            self.advance();
            let first = self.pos;
            let mut depth = 0usize;
            loop {
                match self.peek() {
                    Token::Eof => return Err(self.err("unterminated template base")),
                    Token::LBrace if depth == 0 => break,
                    Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                    Token::RParen | Token::RBracket | Token::RBrace => {
                        depth = depth.saturating_sub(1)
                    }
                    _ => {}
                }
                self.advance();
            }
            if first == self.pos {
                return Err(self.err("missing template base after 'extends'"));
            }
            Some(self.span_of(first, self.pos))
        } else {
            None
        };

        let open = self.pos;
        let body = self.block()?;
        let params = self.constructor_params(open, self.pos)?;
        Ok(Fragment {
            shape: Shape::Class,
            is_async: false,
            is_generator: false,
            name,
            params,
            body,
            superclass,
            identifiers: BTreeSet::new(),
        })
    }

    /// Parameters of the `constructor` member between the body braces at
    /// token indices `open..close`, if the template declares one.
    fn constructor_params(&self, open: usize, close: usize) -> Result<Vec<Param>, SyntaxError> {
        let mut depth = 0usize;
        for i in open..close {
            match &self.tokens[i].token {
                Token::LBrace | Token::LParen | Token::LBracket => depth += 1,
                Token::RBrace | Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::Word(w)
                    if depth == 1
                        && w == "constructor"
                        && self.tokens.get(i + 1).map(|t| &t.token) == Some(&Token::LParen) =>
                {
                    let mut sub = Parser {
                        src: self.src,
                        tokens: self.tokens,
                        pos: i + 1,
                    };
                    return sub.params();
                }
                _ => {}
            }
        }
        Ok(Vec::new())
    }

    fn arrow(&mut self, is_async: bool) -> Result<Fragment, SyntaxError> {
        let params = match self.peek().clone() {
            Token::Word(_) => {
                let t = self.cur();
                let span = Span {
                    start: t.start,
                    end: t.end,
                };
                self.advance();
                vec![Param {
                    kind: ParamKind::Ident,
                    span,
                }]
            }
            Token::LParen => self.params()?,
            other => return Err(self.err(format!("expected callable, got {:?}", other))),
        };
        if self.peek() != &Token::Arrow {
            return Err(self.err(format!("expected '=>', got {:?}", self.peek())));
        }
        self.advance();

        let body = if self.peek() == &Token::LBrace {
            self.block()?
        } else {
            if self.peek() == &Token::Eof {
                return Err(self.err("missing arrow body"));
            }
            let first = self.pos;
            let last = self.tokens.len() - 1; // Eof
            self.pos = last;
            self.span_of(first, last)
        };

        Ok(Fragment {
            shape: Shape::Arrow,
            is_async,
            is_generator: false,
            name: None,
            params,
            body,
            superclass: None,
            identifiers: BTreeSet::new(),
        })
    }

    /// A member fragment: `[static] [async] [*] [get|set] key (params) { body }`.
    fn member(&mut self) -> Result<Fragment, SyntaxError> {
        if self.is_word("static") && self.peek_at(1) != &Token::LParen {
            self.advance();
        }
        let is_async = self.is_word("async") && self.peek_at(1) != &Token::LParen;
        if is_async {
            self.advance();
        }
        let is_generator = self.peek() == &Token::Star;
        if is_generator {
            self.advance();
        }
        let mut kind = MethodKind::Method;
        if !is_async
            && !is_generator
            && (self.is_word("get") || self.is_word("set"))
            && self.peek_at(1) != &Token::LParen
        {
            kind = if self.is_word("get") {
                MethodKind::Getter
            } else {
                MethodKind::Setter
            };
            self.advance();
        }

        let name = self.member_key()?;
        let params = self.params()?;
        let body = self.block()?;
        Ok(Fragment {
            shape: Shape::Method(kind),
            is_async,
            is_generator,
            name: Some(name),
            params,
            body,
            superclass: None,
            identifiers: BTreeSet::new(),
        })
    }

    fn member_key(&mut self) -> Result<String, SyntaxError> {
        let t = self.cur().clone();
        match &t.token {
            Token::Word(w) => {
                self.advance();
                Ok(w.clone())
            }
            Token::Num(n) => {
                self.advance();
                Ok(n.clone())
            }
            Token::Str => {
                self.advance();
                let quoted = &self.src[t.start..t.end];
                Ok(quoted[1..quoted.len() - 1].to_owned())
            }
            Token::LBracket => {
                let first = self.pos;
                let mut depth = 0usize;
                loop {
                    match self.peek() {
                        Token::Eof => return Err(self.err("unterminated computed key")),
                        Token::LBracket | Token::LParen | Token::LBrace => depth += 1,
                        Token::RBracket | Token::RParen | Token::RBrace => {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                self.advance();
                                break;
                            }
                        }
                        _ => {}
                    }
                    self.advance();
                }
                Ok(self.span_of(first, self.pos).slice(self.src).to_owned())
            }
            other => Err(self.err(format!("expected member key, got {:?}", other))),
        }
    }

    fn params(&mut self) -> Result<Vec<Param>, SyntaxError> {
        if self.peek() != &Token::LParen {
            return Err(self.err(format!("expected '(', got {:?}", self.peek())));
        }
        self.advance();

        let mut params = Vec::new();
        loop {
            let first = self.pos;
            let mut depth = 0usize;
            loop {
                match self.peek() {
                    Token::Eof => return Err(self.err("unterminated parameter list")),
                    Token::RParen | Token::Comma if depth == 0 => break,
                    Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                    Token::RParen | Token::RBracket | Token::RBrace => {
                        if depth == 0 {
                            return Err(self.err("unbalanced parameter list"));
                        }
                        depth -= 1;
                    }
                    _ => {}
                }
                self.advance();
            }

            let at_close = self.peek() == &Token::RParen;
            if first == self.pos {
                if at_close {
                    // `()` or a trailing comma
                    self.advance();
                    return Ok(params);
                }
                return Err(self.err("empty parameter"));
            }
            params.push(self.classify_param(first, self.pos)?);
            self.advance(); // ',' or ')'
            if at_close {
                return Ok(params);
            }
        }
    }

    fn classify_param(&self, first: usize, last: usize) -> Result<Param, SyntaxError> {
        let toks = &self.tokens[first..last];
        let span = self.span_of(first, last);

        let mut depth = 0usize;
        let mut has_default = false;
        for t in toks {
            match t.token {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
                Token::Assign if depth == 0 => has_default = true,
                _ => {}
            }
        }

        let kind = match (&toks[0].token, toks.len()) {
            (Token::Word(_), 1) => ParamKind::Ident,
            (Token::Ellipsis, _) => ParamKind::Rest,
            _ if has_default => ParamKind::Default,
            (Token::LBrace | Token::LBracket, _) => ParamKind::Pattern,
            (other, _) => {
                return Err(SyntaxError::new(
                    toks[0].start,
                    format!("unexpected parameter starting with {:?}", other),
                ))
            }
        };
        Ok(Param { kind, span })
    }

    /// A brace-delimited block; returns the span including both braces.
    fn block(&mut self) -> Result<Span, SyntaxError> {
        if self.peek() != &Token::LBrace {
            return Err(self.err(format!("expected '{{', got {:?}", self.peek())));
        }
        let start = self.cur().start;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::Eof => return Err(self.err("unterminated block")),
                Token::LBrace => depth += 1,
                Token::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        let end = self.cur().end;
                        self.advance();
                        return Ok(Span { start, end });
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }
}

fn identifiers(tokens: &[Spanned]) -> BTreeSet<String> {
    tokens
        .iter()
        .filter_map(|t| match &t.token {
            Token::Word(w) if !w.starts_with('#') => Some(w.clone()),
            _ => None,
        })
        .collect()
}

/// Parse `src` as a free-standing callable expression.
pub fn parse_expression(src: &str) -> Result<Fragment, SyntaxError> {
    let tokens = lex(src)?;
    let mut p = Parser::new(src, &tokens);
    let mut fragment = p.callable()?;
    p.expect_eof()?;
    fragment.identifiers = identifiers(&tokens);
    Ok(fragment)
}

/// Parse `src` as a single member of a template body.
pub fn parse_member(src: &str) -> Result<Fragment, SyntaxError> {
    let tokens = lex(src)?;
    let mut p = Parser::new(src, &tokens);
    let mut fragment = p.member()?;
    p.expect_eof()?;
    fragment.identifiers = identifiers(&tokens);
    Ok(fragment)
}

/// Parse one callable literal: first as a free-standing expression, then
/// as a member fragment. When both fail the expression error is reported.
pub fn parse(src: &str) -> Result<Fragment, SyntaxError> {
    match parse_expression(src) {
        Ok(fragment) => Ok(fragment),
        Err(err) => parse_member(src).map_err(|_| err),
    }
}
