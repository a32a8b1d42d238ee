// The reference parser for the tarn surface syntax. Produces the
// `lang_ast::surface` parse-tree shapes; nothing downstream depends on this
// crate, so any other producer of those shapes can replace it.

mod grammar;
mod token;

pub use grammar::parse;

use lang_ast::Span;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, span: Span) -> Self {
        ParseError {
            message: message.into(),
            span,
        }
    }
}
