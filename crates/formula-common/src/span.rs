use serde::{Deserialize, Serialize};

/// Byte-offset span into formula text. Start is inclusive, end is exclusive.
///
/// All positions in the engine are tracked as byte offsets into the original
/// formula string. Line/column information is computed on demand via
/// [`LineIndex`] when a diagnostic needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Create a new span from byte offsets.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span is empty (zero-length).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans into one that covers both.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The span as a `usize` range, for slicing source text and for ariadne.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// Pre-computed index of line start positions for on-demand line/column lookup.
///
/// Formulas are usually a single line, but hosts may store multi-line
/// formulas with comments, so diagnostics still go through this index.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Build a line index by scanning the source text for newline characters.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-based (line, column) pair.
    ///
    /// The line is found by binary search over the line starts. The column
    /// counts bytes from the start of that line, so a multi-byte character
    /// in a quoted identifier such as `'Prix unité'` advances it by more
    /// than one. A `\n` belongs to the line it ends.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        // Index of the first line start past `offset`; the line is the one before it.
        let next_line = self.line_starts.partition_point(|&start| start <= offset);
        let line_idx = next_line.saturating_sub(1);
        let col = offset - self.line_starts[line_idx];
        (line_idx as u32 + 1, col + 1)
    }

    /// Return the number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
