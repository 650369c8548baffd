//! Generated-to-original position mapping

use serde::{Deserialize, Serialize};
use swc_core::common::{BytePos, LineCol};
use typify_parser::SourceContext;

/// One generated position and the original byte offset it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Byte offset in the generated code
    pub generated: usize,
    /// Zero-based line in the generated code
    pub generated_line: usize,
    /// Zero-based column in the generated code, in UTF-16 code units
    pub generated_column: usize,
    /// Byte offset in the original source
    pub original: usize,
}

/// Mappings ordered by generated offset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionMap {
    mappings: Vec<Mapping>,
}

impl PositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the positions the emitter recorded while writing `code`.
    /// Positions outside `context`'s file (synthesized nodes) are skipped.
    pub(crate) fn from_emitted(
        code: &str,
        emitted: &[(BytePos, LineCol)],
        context: &SourceContext,
    ) -> Self {
        let lines = line_starts(code);
        let mut map = Self::new();
        for (pos, at) in emitted {
            if !context.contains(*pos) {
                continue;
            }
            let line = at.line as usize;
            let Some(&start) = lines.get(line) else {
                continue;
            };
            map.push(Mapping {
                generated: start + byte_column(&code[start..], at.col as usize),
                generated_line: line,
                generated_column: at.col as usize,
                original: context.offset(*pos),
            });
        }
        map
    }

    /// Append a mapping. Offsets must not go backwards; a second mapping at
    /// the same generated offset is dropped so the outermost node wins.
    pub(crate) fn push(&mut self, mapping: Mapping) {
        match self.mappings.last() {
            Some(last) if last.generated >= mapping.generated => {}
            _ => self.mappings.push(mapping),
        }
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Original offset of the closest mapping at or before `generated`
    pub fn original_offset(&self, generated: usize) -> Option<usize> {
        let index = self
            .mappings
            .partition_point(|mapping| mapping.generated <= generated);
        index
            .checked_sub(1)
            .map(|index| self.mappings[index].original)
    }
}

fn line_starts(code: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(code.match_indices('\n').map(|(i, _)| i + 1));
    starts
}

/// Byte length of the first `column` UTF-16 code units of `line`
fn byte_column(line: &str, column: usize) -> usize {
    let mut units = 0;
    for (offset, c) in line.char_indices() {
        if units >= column || c == '\n' {
            return offset;
        }
        units += c.len_utf16();
    }
    line.len()
}
