pub mod variable;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::variable::VariableDecl;
use crate::template::Template;

/// One authored quiz exercise, as parsed from a `:::quiz` block.
/// Created once by the field parser and immutable thereafter; every
/// presented instance borrows the same record.
#[derive(Debug, Clone)]
pub struct QuizRecord {
    pub question: Template,
    pub hint: Option<Template>,
    pub answer: AnswerSpec,
    /// Declaration order is binding order: an expression variable may only
    /// reference variables declared before it.
    pub variables: Vec<VariableDecl>,
    pub markscheme: Vec<MarkStep>,
    pub explanation: Option<Template>,
    /// Unrecognized top-level keys, preserved verbatim (forward-compatible).
    pub metadata: BTreeMap<String, String>,
}

impl QuizRecord {
    pub fn variable(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// The ground-truth answer and how submissions are compared against it.
#[derive(Debug, Clone)]
pub struct AnswerSpec {
    pub mode: AnswerMode,
    pub template: Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Exact trimmed text match, no math interpretation.
    Literal,
    /// Mathematical equivalence via the expression engine.
    Symbolic,
}

impl Default for AnswerMode {
    fn default() -> Self {
        AnswerMode::Symbolic
    }
}

/// One step of a marking scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkStep {
    pub description: String,
    pub marks: u32,
}
