/// A source location: a byte range plus the 1-based line/column of its start.
///
/// Carrying line/column alongside the byte range lets diagnostics render a
/// human-readable position without re-scanning the source text.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Span {
    pub byte_start: usize,
    pub byte_end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub const fn new(byte_start: usize, byte_end: usize, line: u32, column: u32) -> Self {
        Span {
            byte_start,
            byte_end,
            line,
            column,
        }
    }

    /// A zero-width span with no useful position, for synthesized nodes.
    pub const DUMMY: Span = Span::new(0, 0, 0, 0);

    pub const fn len(&self) -> usize {
        self.byte_end - self.byte_start
    }

    pub const fn is_empty(&self) -> bool {
        self.byte_start == self.byte_end
    }

    pub const fn to_range(self) -> std::ops::Range<usize> {
        self.byte_start..self.byte_end
    }

    pub fn lookup(self, text: &str) -> &str {
        &text[self.to_range()]
    }

    /// The smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        let (start, start_line, start_col) = if self.byte_start <= other.byte_start {
            (self.byte_start, self.line, self.column)
        } else {
            (other.byte_start, other.line, other.column)
        };
        let end = self.byte_end.max(other.byte_end);
        Span::new(start, end, start_line, start_col)
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(value: Span) -> Self {
        value.to_range()
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
