use std::ops::Range;

use crate::parser::error::{ParseError, ParseErrorKind};

/// Opens a quiz block when it is the entire (trimmed) content of a line.
pub const OPEN_MARKER: &str = ":::quiz";
/// Closes the nearest open quiz block. Blocks do not nest.
pub const CLOSE_MARKER: &str = ":::";

/// A document span found by the extractor, before field parsing.
#[derive(Debug)]
pub(crate) enum RawSegment {
    /// Plain text between blocks, verbatim.
    Text { content: String, span: Range<usize> },
    /// The body of a delimited quiz block, exclusive of the marker lines.
    Block { body: String, span: Range<usize> },
    /// An opener with no closing marker; consumes the rest of the input.
    Unterminated { error: ParseError, span: Range<usize> },
}

/// Split a document into ordered text and quiz-block segments in a single
/// left-to-right pass. Non-block text is preserved byte-for-byte.
pub(crate) fn split_segments(source: &str, file_id: usize) -> Vec<RawSegment> {
    let lines = line_spans(source);
    let mut segments = Vec::new();
    let mut text_start = 0usize;
    let mut i = 0;

    while i < lines.len() {
        let (line_start, line_end) = lines[i];
        if source[line_start..line_end].trim_end_matches(['\r', '\n']).trim() != OPEN_MARKER {
            i += 1;
            continue;
        }

        // Flush pending plain text before the opener.
        if line_start > text_start {
            segments.push(RawSegment::Text {
                content: source[text_start..line_start].to_string(),
                span: text_start..line_start,
            });
        }

        // Search forward for the nearest close marker.
        let mut close = None;
        for (j, &(s, e)) in lines.iter().enumerate().skip(i + 1) {
            if source[s..e].trim_end_matches(['\r', '\n']).trim() == CLOSE_MARKER {
                close = Some(j);
                break;
            }
        }

        match close {
            Some(j) => {
                let body_start = lines[i].1;
                let body_end = lines[j].0;
                let span = line_start..lines[j].1;
                segments.push(RawSegment::Block {
                    body: source[body_start..body_end].to_string(),
                    span,
                });
                text_start = lines[j].1;
                i = j + 1;
            }
            None => {
                // Unterminated: hard failure for this block, never silently
                // demoted to plain text.
                let line = source[..line_start].matches('\n').count() + 1;
                let span = line_start..source.len();
                segments.push(RawSegment::Unterminated {
                    error: ParseError::new(
                        ParseErrorKind::UnterminatedBlock { line },
                        line_start..line_end,
                        file_id,
                    )
                    .with_note(format!("expected a closing '{}' line", CLOSE_MARKER)),
                    span,
                });
                return segments;
            }
        }
    }

    if text_start < source.len() {
        segments.push(RawSegment::Text {
            content: source[text_start..].to_string(),
            span: text_start..source.len(),
        });
    }

    segments
}

/// Byte ranges of each line, inclusive of its terminator.
fn line_spans(source: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, _) in source.match_indices('\n') {
        spans.push((start, idx + 1));
        start = idx + 1;
    }
    if start < source.len() {
        spans.push((start, source.len()));
    }
    spans
}
