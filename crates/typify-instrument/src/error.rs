//! Instrumentation error types

use std::ops::Range;

use swc_core::common::Span;
use thiserror::Error;
use typify_codegen::CodegenError;
use typify_parser::ParseError;

/// A `typify:` comment that was recognized but could not be read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("malformed field in adt `{name}`: `{line}` (expected `name: type`)")]
    MalformedAdtField {
        name: String,
        line: String,
        span: Span,
    },
}

impl DirectiveError {
    /// Span of the offending comment
    pub fn span(&self) -> Span {
        match self {
            DirectiveError::MalformedAdtField { span, .. } => *span,
        }
    }
}

/// A malformed directive that was skipped, located in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDirective {
    pub error: DirectiveError,
    /// Byte range of the comment in the source
    pub range: Range<usize>,
}

/// Pattern text that does not compile
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("unclosed '(' at offset {offset}")]
    UnclosedList { offset: usize },

    #[error("unexpected ')' at offset {offset}")]
    UnexpectedClose { offset: usize },

    #[error("unexpected input after pattern at offset {offset}")]
    TrailingInput { offset: usize },

    #[error("empty list at offset {offset}")]
    EmptyList { offset: usize },

    #[error("list head at offset {offset} must be a symbol")]
    InvalidHead { offset: usize },

    #[error("unknown matcher `{name}`")]
    UnknownMatcher { name: String },

    #[error("matcher `{name}` expects {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: &'static str,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("directive error: {error}")]
    Directive {
        error: DirectiveError,
        range: Range<usize>,
    },

    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("codegen error: {0}")]
    Codegen(#[from] CodegenError),
}

impl InstrumentError {
    /// Byte range in the source the error points at, if any
    pub fn range(&self) -> Option<Range<usize>> {
        match self {
            InstrumentError::Parse(error) => Some(error.span()),
            InstrumentError::Directive { range, .. } => Some(range.clone()),
            InstrumentError::Pattern(_) | InstrumentError::Codegen(_) => None,
        }
    }
}
