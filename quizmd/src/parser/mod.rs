pub mod error;
pub mod expression;
mod extract;
mod fields;

pub use error::{ParseError, ParseErrorKind};
pub use expression::{ExprError, parse_expression};

use crate::ParsedDocument;
use crate::segment::Segment;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the source into a complete document. Block-level failures are
    /// isolated into `Segment::Broken` placeholders rather than aborting the
    /// document, so this never fails as a whole.
    pub fn parse(&self) -> ParsedDocument {
        let mut segments = Vec::new();

        for raw in extract::split_segments(&self.source, self.file_id) {
            match raw {
                extract::RawSegment::Text { content, span } => {
                    segments.push(Segment::Text { content, span });
                }
                extract::RawSegment::Block { body, span } => {
                    match fields::parse_record(&body, span.clone(), self.file_id) {
                        Ok(record) => segments.push(Segment::Quiz { record, span }),
                        Err(error) => segments.push(Segment::Broken { error, span }),
                    }
                }
                extract::RawSegment::Unterminated { error, span } => {
                    segments.push(Segment::Broken { error, span });
                }
            }
        }

        ParsedDocument {
            segments,
            source_id: self.file_id,
        }
    }
}
