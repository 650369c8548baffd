//! Source text, its position space, and its comments

use std::fmt;
use std::ops::Range;

use swc_core::common::comments::{Comment, Comments, SingleThreadedComments};
use swc_core::common::sync::Lrc;
use swc_core::common::{BytePos, FileName, SourceFile, SourceMap, Span};

/// One source file registered in its own [`SourceMap`], with the comments
/// the lexer collected from it
pub struct SourceContext {
    pub source_map: Lrc<SourceMap>,
    pub file: Lrc<SourceFile>,
    pub comments: SingleThreadedComments,
}

impl SourceContext {
    pub fn new(source: &str, file_name: &str) -> Self {
        let source_map: Lrc<SourceMap> = Default::default();
        let file = source_map.new_source_file(
            FileName::Real(file_name.into()).into(),
            source.to_string().into(),
        );
        Self {
            source_map,
            file,
            comments: SingleThreadedComments::default(),
        }
    }

    /// Length of the source in bytes
    pub fn len(&self) -> usize {
        (self.file.end_pos.0 - self.file.start_pos.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `pos` lies in this file, end included
    pub fn contains(&self, pos: BytePos) -> bool {
        !pos.is_dummy() && self.file.start_pos <= pos && pos <= self.file.end_pos
    }

    /// Byte offset of `pos` in the source text
    pub fn offset(&self, pos: BytePos) -> usize {
        (pos.0.saturating_sub(self.file.start_pos.0) as usize).min(self.len())
    }

    /// Byte range of `span` in the source text
    pub fn range(&self, span: Span) -> Range<usize> {
        let start = self.offset(span.lo);
        start..self.offset(span.hi).max(start)
    }

    /// Comments directly before the token at `pos`, in source order
    pub fn leading_comments(&self, pos: BytePos) -> Vec<Comment> {
        self.comments.get_leading(pos).unwrap_or_default()
    }

    /// Every comment of the file in source order
    pub fn comments(&self) -> Vec<Comment> {
        let (leading, trailing) = self.comments.borrow_all();
        let mut all: Vec<Comment> = leading
            .values()
            .chain(trailing.values())
            .flatten()
            .cloned()
            .collect();
        all.sort_by_key(|comment| comment.span.lo);
        all
    }
}

impl fmt::Debug for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceContext")
            .field("file", &self.file.name.to_string())
            .field("len", &self.len())
            .finish()
    }
}
