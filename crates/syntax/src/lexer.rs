use crate::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers, keywords and `#private` names; the parser tells them apart
    Word(String),
    /// String literal (content is not retained, only its span)
    Str,
    /// One chunk of a template literal, up to the end or the next `${`
    Template,
    /// Numeric literal, kept verbatim
    Num(String),
    /// Regular expression literal
    Regex,
    // Punctuation
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Dot,
    Ellipsis, // ...
    Star,     // *
    Assign,   // =
    Arrow,    // =>
    /// Any other operator, maximal munch
    Op(String),
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    /// Byte offsets into the source text.
    pub start: usize,
    pub end: usize,
}

/// Multi-character operators, longest first.
const OPERATORS: &[&str] = &[
    ">>>=", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==", "!=",
    "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=",
    "^=", "**", "<<", ">>",
];

const SINGLE_OPERATORS: &str = "+-*/%<>=!~?:;&|^@";

/// Keywords after which a `/` starts a regular expression, not a division.
const REGEX_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

fn regex_allowed(prev: Option<&Token>) -> bool {
    match prev {
        None => true,
        Some(Token::Word(w)) => REGEX_KEYWORDS.contains(&w.as_str()),
        Some(
            Token::Num(_)
            | Token::Str
            | Token::Template
            | Token::Regex
            | Token::RParen
            | Token::RBracket
            | Token::RBrace,
        ) => false,
        Some(_) => true,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '\u{200c}' || c == '\u{200d}'
}

/// Scan template text starting just after a backtick or a substitution's
/// closing brace. Returns the position after the chunk and whether the
/// chunk ended by opening a `${` substitution.
fn scan_template(
    chars: &[(usize, char)],
    mut pos: usize,
    start: usize,
) -> Result<(usize, bool), SyntaxError> {
    loop {
        match chars.get(pos).map(|c| c.1) {
            None => return Err(SyntaxError::new(start, "unterminated template literal")),
            Some('`') => return Ok((pos + 1, false)),
            Some('\\') => pos += 2,
            Some('$') if chars.get(pos + 1).map(|c| c.1) == Some('{') => {
                return Ok((pos + 2, true));
            }
            Some(_) => pos += 1,
        }
    }
}

pub fn lex(src: &str) -> Result<Vec<Spanned>, SyntaxError> {
    let mut tokens: Vec<Spanned> = Vec::new();
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let offset = |i: usize| chars.get(i).map(|c| c.0).unwrap_or(src.len());
    let at = |i: usize| chars.get(i).map(|c| c.1);
    let mut pos = 0usize;
    // Brace depth, and the depth each open `${` substitution returns to.
    let mut depth = 0usize;
    let mut substitutions: Vec<usize> = Vec::new();

    while pos < chars.len() {
        let c = chars[pos].1;
        let start = offset(pos);

        // Line comment
        if c == '/' && at(pos + 1) == Some('/') {
            while pos < chars.len() && chars[pos].1 != '\n' {
                pos += 1;
            }
            continue;
        }

        // Block comment
        if c == '/' && at(pos + 1) == Some('*') {
            pos += 2;
            loop {
                if pos >= chars.len() {
                    return Err(SyntaxError::new(start, "unterminated block comment"));
                }
                if chars[pos].1 == '*' && at(pos + 1) == Some('/') {
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        // Whitespace
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // String literal
        if c == '\'' || c == '"' {
            pos += 1;
            loop {
                match at(pos) {
                    None | Some('\n') => {
                        return Err(SyntaxError::new(start, "unterminated string literal"));
                    }
                    Some('\\') => pos += 2,
                    Some(q) if q == c => {
                        pos += 1;
                        break;
                    }
                    Some(_) => pos += 1,
                }
            }
            tokens.push(Spanned {
                token: Token::Str,
                start,
                end: offset(pos),
            });
            continue;
        }

        // Template literal
        if c == '`' {
            let (next, opened) = scan_template(&chars, pos + 1, start)?;
            pos = next;
            tokens.push(Spanned {
                token: Token::Template,
                start,
                end: offset(pos),
            });
            if opened {
                substitutions.push(depth);
                depth += 1;
            }
            continue;
        }

        // Number
        if c.is_ascii_digit() || (c == '.' && at(pos + 1).is_some_and(|d| d.is_ascii_digit())) {
            let radix_prefix = c == '0' && matches!(at(pos + 1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'));
            while let Some(d) = at(pos) {
                if !radix_prefix && (d == 'e' || d == 'E') && matches!(at(pos + 1), Some('+' | '-')) {
                    pos += 2;
                } else if d.is_ascii_alphanumeric() || d == '_' || d == '.' {
                    pos += 1;
                } else {
                    break;
                }
            }
            tokens.push(Spanned {
                token: Token::Num(src[start..offset(pos)].to_owned()),
                start,
                end: offset(pos),
            });
            continue;
        }

        // Regular expression
        if c == '/' && regex_allowed(tokens.last().map(|t| &t.token)) {
            pos += 1;
            let mut in_class = false;
            loop {
                match at(pos) {
                    None | Some('\n') => {
                        return Err(SyntaxError::new(start, "unterminated regular expression"));
                    }
                    Some('\\') => pos += 2,
                    Some('[') => {
                        in_class = true;
                        pos += 1;
                    }
                    Some(']') => {
                        in_class = false;
                        pos += 1;
                    }
                    Some('/') if !in_class => {
                        pos += 1;
                        break;
                    }
                    Some(_) => pos += 1,
                }
            }
            while at(pos).is_some_and(|f| f.is_ascii_alphabetic()) {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Regex,
                start,
                end: offset(pos),
            });
            continue;
        }

        // Identifier / keyword / private name
        if is_ident_start(c) || (c == '#' && at(pos + 1).is_some_and(is_ident_start)) {
            pos += 1;
            while at(pos).is_some_and(is_ident_part) {
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Word(src[start..offset(pos)].to_owned()),
                start,
                end: offset(pos),
            });
            continue;
        }

        // Punctuation
        let punct = match c {
            '{' => {
                depth += 1;
                Some(Token::LBrace)
            }
            '}' => {
                if depth > 0 && substitutions.last() == Some(&(depth - 1)) {
                    substitutions.pop();
                    depth -= 1;
                    let (next, opened) = scan_template(&chars, pos + 1, start)?;
                    pos = next;
                    tokens.push(Spanned {
                        token: Token::Template,
                        start,
                        end: offset(pos),
                    });
                    if opened {
                        substitutions.push(depth);
                        depth += 1;
                    }
                    continue;
                }
                depth = depth.saturating_sub(1);
                Some(Token::RBrace)
            }
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '.' if at(pos + 1) == Some('.') && at(pos + 2) == Some('.') => {
                pos += 2;
                Some(Token::Ellipsis)
            }
            '.' => Some(Token::Dot),
            _ => None,
        };
        if let Some(token) = punct {
            pos += 1;
            tokens.push(Spanned {
                token,
                start,
                end: offset(pos),
            });
            continue;
        }

        // Operators
        if let Some(op) = OPERATORS.iter().find(|op| src[start..].starts_with(**op)) {
            pos += op.len();
            let token = if *op == "=>" {
                Token::Arrow
            } else {
                Token::Op((*op).to_owned())
            };
            tokens.push(Spanned {
                token,
                start,
                end: offset(pos),
            });
            continue;
        }
        if SINGLE_OPERATORS.contains(c) {
            pos += 1;
            let token = match c {
                '*' => Token::Star,
                '=' => Token::Assign,
                other => Token::Op(other.to_string()),
            };
            tokens.push(Spanned {
                token,
                start,
                end: offset(pos),
            });
            continue;
        }

        return Err(SyntaxError::new(
            start,
            format!("unexpected character '{}'", c),
        ));
    }

    if !substitutions.is_empty() {
        return Err(SyntaxError::new(src.len(), "unterminated template literal"));
    }

    tokens.push(Spanned {
        token: Token::Eof,
        start: src.len(),
        end: src.len(),
    });
    Ok(tokens)
}
