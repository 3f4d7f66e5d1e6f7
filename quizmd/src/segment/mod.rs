use std::ops::Range;

use crate::parser::ParseError;
use crate::record::QuizRecord;

/// One span of a parsed document. Segment order matches source order and is
/// never reshuffled; segments are immutable once produced.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Ordinary document text, preserved verbatim (no normalization).
    Text { content: String, span: Range<usize> },
    /// A well-formed quiz block.
    Quiz { record: QuizRecord, span: Range<usize> },
    /// A quiz block that failed to parse. Stands in as the visible error
    /// placeholder; the rest of the document parses normally around it.
    Broken { error: ParseError, span: Range<usize> },
}

impl Segment {
    pub fn span(&self) -> &Range<usize> {
        match self {
            Segment::Text { span, .. } => span,
            Segment::Quiz { span, .. } => span,
            Segment::Broken { span, .. } => span,
        }
    }
}
