//! Parser error types

use std::ops::Range;

use swc_core::common::Spanned;
use swc_core::ecma::parser::error::Error as SwcError;
use thiserror::Error;

use crate::SourceContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{message}")]
    Syntax { message: String, range: Range<usize> },

    #[error("unexpected end of file")]
    UnexpectedEof { range: Range<usize> },
}

impl ParseError {
    /// Byte range of the offending text in the source
    pub fn span(&self) -> Range<usize> {
        match self {
            ParseError::Syntax { range, .. } | ParseError::UnexpectedEof { range } => range.clone(),
        }
    }

    pub(crate) fn from_syntax(error: SwcError, context: &SourceContext) -> Self {
        let range = context.range(error.span());
        let message = error.kind().msg().into_owned();
        if range.start >= context.len() {
            return ParseError::UnexpectedEof { range };
        }
        ParseError::Syntax { message, range }
    }
}
