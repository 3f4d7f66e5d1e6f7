pub mod bank;
pub mod expr;
pub mod parser;
pub mod record;
pub mod segment;
pub mod template;

use crate::parser::ParseError;
use crate::record::QuizRecord;
use crate::segment::Segment;

/// A parsed quiz document: the ordered segment list of one source file.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Plain text, quiz records and broken blocks, in source order.
    pub segments: Vec<Segment>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl ParsedDocument {
    /// Errors of blocks that failed to parse. Broken blocks never abort the
    /// surrounding document; the other segments are still usable.
    pub fn errors(&self) -> impl Iterator<Item = &ParseError> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Broken { error, .. } => Some(error),
            _ => None,
        })
    }

    /// All successfully parsed quiz records, in source order.
    pub fn records(&self) -> impl Iterator<Item = &QuizRecord> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Quiz { record, .. } => Some(record),
            _ => None,
        })
    }
}
