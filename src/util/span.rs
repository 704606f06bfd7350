//! Source location tracking

use serde::Serialize;
use std::fmt;

/// Source position (line, column, and byte offset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Byte offset from start of file
    pub offset: usize,
}

impl Position {
    /// Create a new position
    #[inline]
    pub fn new(
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            line,
            column,
            offset: 0,
        }
    }

    /// Create a new position with offset
    #[inline]
    pub fn with_offset(
        line: usize,
        column: usize,
        offset: usize,
    ) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }

    /// Create a dummy position
    #[inline]
    pub fn dummy() -> Self {
        Self {
            line: 0,
            column: 0,
            offset: 0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source span (start position to end position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    /// Start position (inclusive)
    pub start: Position,
    /// End position (exclusive)
    pub end: Position,
}

impl Span {
    /// Create a new span
    #[inline]
    pub fn new(
        start: Position,
        end: Position,
    ) -> Self {
        Self { start, end }
    }

    /// Create a dummy span
    #[inline]
    pub fn dummy() -> Self {
        Self {
            start: Position::dummy(),
            end: Position::dummy(),
        }
    }

    /// Check if this is a dummy span
    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.start.line == 0
    }

    /// Span covering both `self` and `other`
    #[inline]
    pub fn to(
        self,
        other: Span,
    ) -> Span {
        if self.is_dummy() {
            return other;
        }
        if other.is_dummy() {
            return self;
        }
        Span::new(self.start, other.end)
    }

    /// Get the source text length
    #[inline]
    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    /// Check if span is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start.offset == self.end.offset
    }
}

impl fmt::Display for Span {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "[{} - {}]", self.start, self.end)
    }
}

/// Source file information
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name
    pub name: String,
    /// File content
    pub content: String,
}

impl SourceFile {
    /// Create a new source file
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Get a line of source text (1-indexed)
    pub fn line(
        &self,
        line: usize,
    ) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.content.lines().nth(line - 1)
    }

    /// Get source text for a span
    pub fn source_text(
        &self,
        span: Span,
    ) -> Option<&str> {
        self.content.get(span.start.offset..span.end.offset)
    }
}

impl fmt::Display for SourceFile {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_to_merges() {
        let a = Span::new(Position::with_offset(1, 1, 0), Position::with_offset(1, 4, 3));
        let b = Span::new(Position::with_offset(2, 1, 10), Position::with_offset(2, 6, 15));
        let merged = a.to(b);
        assert_eq!(merged.start, a.start);
        assert_eq!(merged.end, b.end);
        assert_eq!(merged.len(), 15);

        // 哑 span 不影响合并
        assert_eq!(Span::dummy().to(b), b);
        assert_eq!(a.to(Span::dummy()), a);
    }

    #[test]
    fn test_source_file_lines() {
        let file = SourceFile::new("demo.stg", "@meta let j = 0;\nfn main() {}\n");
        assert_eq!(file.line(1), Some("@meta let j = 0;"));
        assert_eq!(file.line(2), Some("fn main() {}"));
        assert_eq!(file.line(0), None);
        assert_eq!(file.line(9), None);

        let span = Span::new(Position::with_offset(1, 11, 10), Position::with_offset(1, 12, 11));
        assert_eq!(file.source_text(span), Some("j"));
    }
}
