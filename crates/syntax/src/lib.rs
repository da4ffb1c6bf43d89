//! exval-syntax: lexer and fragment parser for callable literals.
//!
//! Given the source text of one callable (as the host runtime prints it),
//! [`parse()`] recovers its shape, parameter list, body span and, for
//! templates, the span of the declared base. Nothing here evaluates code;
//! the parser only needs enough structure to re-emit the callable as a
//! free-standing expression.
//!
//! - [`lex()`] -- tokenize source into [`Spanned`] tokens
//! - [`parse()`] -- parse one callable literal into a [`Fragment`]
//! - [`SyntaxError`] -- offset + message

pub mod error;
pub mod lexer;
pub mod parser;

pub use error::SyntaxError;
pub use lexer::{lex, Spanned, Token};
pub use parser::{parse, parse_expression, parse_member, Fragment, MethodKind, Param, ParamKind, Shape, Span};
