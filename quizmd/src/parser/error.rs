use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

/// What went wrong while parsing a quiz block.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// A `:::quiz` opener with no closing `:::` before end of input.
    /// Carries the opener's 1-based line number.
    UnterminatedBlock { line: usize },
    /// A mandatory field (`question` or `answer`) is absent.
    MissingField { key: &'static str },
    /// A `vars` entry that matches no declaration or constraint form.
    MalformedVariable { name: String, reason: String },
}

/// Parse errors with source location information.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Range<usize>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Range<usize>, file_id: usize) -> Self {
        ParseError {
            kind,
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::new(Severity::Error)
            .with_message(self.to_string())
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::UnterminatedBlock { line } => {
                write!(f, "quiz block opened on line {} is never closed", line)
            }
            ParseErrorKind::MissingField { key } => {
                write!(f, "quiz block is missing the mandatory '{}' field", key)
            }
            ParseErrorKind::MalformedVariable { name, reason } => {
                write!(f, "malformed variable '{}': {}", name, reason)
            }
        }
    }
}

impl std::error::Error for ParseError {}
