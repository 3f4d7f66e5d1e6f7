//! Question banks: JSON-authored quiz collections and their markdown form.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::{ExprError, parse_expression};
use crate::record::variable::{Constraint, VarType, VariableDecl};
use crate::record::{AnswerMode, AnswerSpec, MarkStep, QuizRecord};
use crate::template::{Template, TemplatePart};

/// A whole authored bank: header metadata plus an ordered question list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizBank {
    #[serde(default)]
    pub metadata: BankMetadata,
    #[serde(default)]
    pub questions: Vec<BankQuestion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankQuestion {
    pub template: String,
    #[serde(default)]
    pub variables: BTreeMap<String, BankVariable>,
    #[serde(default)]
    pub answer: Option<BankAnswer>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub markscheme: Vec<MarkStep>,
}

/// A variable is either a bare replacement string or a full sampling spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BankVariable {
    Text(String),
    Spec(BankVariableSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankVariableSpec {
    #[serde(rename = "type")]
    pub var_type: VarType,
    #[serde(default)]
    pub range: Option<(f64, f64)>,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub expression: Option<String>,
    /// Constraint strings in the same comparison syntax the block format uses.
    #[serde(default)]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAnswer {
    #[serde(default)]
    pub mode: AnswerMode,
    pub template: String,
}

// ---------------------------------------------------------------------------
// Bank -> QuizRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum BankError {
    /// A constraint string that matches no comparison form.
    UnknownConstraint { name: String, text: String },
    /// An expression variable whose source does not parse.
    BadExpression { name: String, error: ExprError },
    /// A draw range with non-finite or misordered bounds.
    InvalidRange { name: String, min: f64, max: f64 },
    /// A question with no answer cannot be graded.
    MissingAnswer { question: usize },
}

impl fmt::Display for BankError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankError::UnknownConstraint { name, text } => {
                write!(f, "variable '{}' has unrecognized constraint '{}'", name, text)
            }
            BankError::BadExpression { name, error } => {
                write!(f, "variable '{}' has a bad expression: {}", name, error)
            }
            BankError::InvalidRange { name, min, max } => {
                write!(f, "variable '{}' has an invalid range [{}, {}]", name, min, max)
            }
            BankError::MissingAnswer { question } => {
                write!(f, "question {} has no answer and cannot be graded", question + 1)
            }
        }
    }
}

impl std::error::Error for BankError {}

impl BankQuestion {
    /// Convert into the parser-equivalent record form, so bank questions
    /// flow through the same generation and grading path as block questions.
    ///
    /// Sampled variables are ordered before derived (expr/latex) ones, so
    /// derived expressions may reference any sampled variable regardless of
    /// key order in the source JSON.
    pub fn to_record(&self, index: usize) -> Result<QuizRecord, BankError> {
        let answer = self
            .answer
            .as_ref()
            .ok_or(BankError::MissingAnswer { question: index })?;

        let mut sampled = Vec::new();
        let mut derived = Vec::new();
        for (name, var) in &self.variables {
            let decl = convert_variable(name, var)?;
            match decl.var_type {
                VarType::Expr | VarType::Latex => derived.push(decl),
                _ => sampled.push(decl),
            }
        }
        sampled.extend(derived);

        Ok(QuizRecord {
            question: Template::parse(&self.template),
            hint: self.hint.as_deref().map(Template::parse),
            answer: AnswerSpec {
                mode: answer.mode,
                template: Template::parse(&answer.template),
            },
            variables: sampled,
            markscheme: self.markscheme.clone(),
            explanation: self.explanation.as_deref().map(Template::parse),
            metadata: BTreeMap::new(),
        })
    }
}

fn convert_variable(name: &str, var: &BankVariable) -> Result<VariableDecl, BankError> {
    let spec = match var {
        // A bare string is a fixed single-choice variable.
        BankVariable::Text(text) => {
            let mut decl = VariableDecl::new(name, VarType::Choice);
            decl.choices = vec![text.clone()];
            return Ok(decl);
        }
        BankVariable::Spec(spec) => spec,
    };

    if let Some((min, max)) = spec.range
        && (!min.is_finite() || !max.is_finite() || min > max)
    {
        return Err(BankError::InvalidRange {
            name: name.to_string(),
            min,
            max,
        });
    }

    let mut decl = VariableDecl::new(name, spec.var_type);
    decl.range = spec.range;
    decl.choices = spec.choices.clone();
    decl.expression = spec.expression.clone();

    if decl.var_type == VarType::Expr
        && let Some(source) = &decl.expression
    {
        parse_expression(source).map_err(|error| BankError::BadExpression {
            name: name.to_string(),
            error,
        })?;
    }

    for text in &spec.constraints {
        let constraint =
            Constraint::parse(text).ok_or_else(|| BankError::UnknownConstraint {
                name: name.to_string(),
                text: text.clone(),
            })?;
        decl.constraints.push(constraint);
    }

    Ok(decl)
}

// ---------------------------------------------------------------------------
// Bank -> markdown document
// ---------------------------------------------------------------------------

impl QuizBank {
    /// Render the bank as a human-readable markdown document: a metadata
    /// header followed by one section per question, with the answer and
    /// markscheme folded into `<details>` blocks.
    pub fn to_markdown(&self) -> String {
        let mut md = Vec::new();

        md.push(format!(
            "# {}",
            self.metadata.title.as_deref().unwrap_or("Untitled Quiz")
        ));
        if let Some(description) = &self.metadata.description {
            md.push(format!("> {}", description));
        }
        if let Some(difficulty) = &self.metadata.difficulty {
            md.push(format!("**Difficulty:** {}", difficulty));
        }
        if !self.metadata.tags.is_empty() {
            md.push(format!("**Tags:** {}", self.metadata.tags.join(", ")));
        }
        md.push("\n---\n".to_string());

        for (idx, question) in self.questions.iter().enumerate() {
            md.push(format!("### Q{}:\n", idx + 1));
            md.push(preview_template(&question.template, &question.variables));

            if let Some(answer) = &question.answer {
                let rendered = preview_template(&answer.template, &question.variables);
                md.push(format!(
                    "<details><summary>Answer</summary>\n\n{}\n\n</details>",
                    rendered
                ));
            }

            if let Some(explanation) = &question.explanation {
                md.push("\n**Explanation:**\n".to_string());
                md.push(format!("$${}$$", explanation.trim()));
            }

            if !question.markscheme.is_empty() {
                md.push("<details><summary>Markscheme</summary>\n".to_string());
                for step in &question.markscheme {
                    let unit = if step.marks == 1 { "mark" } else { "marks" };
                    md.push(format!("- [{} {}] {}  ", step.marks, unit, step.description));
                }
                md.push("\n</details>".to_string());
            }

            md.push("\n---\n".to_string());
        }

        md.join("\n")
    }
}

/// Authoring preview: placeholders resolve to a display sketch of their
/// variable, and an unknown name shows as `[name]` instead of failing.
/// Instance rendering (with concrete values) is strict; this is not.
fn preview_template(template: &str, variables: &BTreeMap<String, BankVariable>) -> String {
    let mut out = String::new();
    for part in &Template::parse(template).parts {
        match part {
            TemplatePart::Literal(text) => out.push_str(text),
            TemplatePart::Placeholder(name) => match variables.get(name) {
                Some(var) => out.push_str(&preview_variable(var)),
                None => {
                    out.push('[');
                    out.push_str(name);
                    out.push(']');
                }
            },
        }
    }
    out
}

fn preview_variable(var: &BankVariable) -> String {
    let spec = match var {
        BankVariable::Text(text) => return text.clone(),
        BankVariable::Spec(spec) => spec,
    };
    match spec.var_type {
        VarType::Choice => format!("$${}$$", spec.choices.first().map_or("?", String::as_str)),
        VarType::Expr | VarType::Latex => {
            format!("$${}$$", spec.expression.as_deref().unwrap_or("?"))
        }
        VarType::Int | VarType::Float => match spec.range {
            Some((min, max)) => format!("$${} \\rightarrow {}$$", min, max),
            None => "$$? \\rightarrow ?$$".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bank() -> QuizBank {
        serde_json::from_str(
            r#"{
                "metadata": {
                    "title": "Linear equations",
                    "difficulty": "easy",
                    "tags": ["algebra", "linear"]
                },
                "questions": [{
                    "template": "Solve {{a}}x + {{b}} = 0 for {{who}}.",
                    "variables": {
                        "a": { "type": "int", "range": [1, 9], "constraints": ["!= 0"] },
                        "b": { "type": "int", "range": [-9, 9] },
                        "who": "Alice"
                    },
                    "answer": { "template": "-{{b}} / {{a}}" },
                    "markscheme": [
                        { "description": "Isolate the x term", "marks": 1 },
                        { "description": "Divide through", "marks": 2 }
                    ]
                }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn deserializes_and_converts() {
        let bank = sample_bank();
        let record = bank.questions[0].to_record(0).unwrap();

        assert_eq!(record.variables.len(), 3);
        let a = record.variable("a").unwrap();
        assert_eq!(a.var_type, VarType::Int);
        assert_eq!(a.range, Some((1.0, 9.0)));
        assert_eq!(a.constraints.len(), 1);
        assert_eq!(record.answer.mode, AnswerMode::Symbolic);
        assert_eq!(record.markscheme[1].marks, 2);
    }

    #[test]
    fn markdown_header_and_sections() {
        let md = sample_bank().to_markdown();
        assert!(md.starts_with("# Linear equations"));
        assert!(md.contains("**Difficulty:** easy"));
        assert!(md.contains("**Tags:** algebra, linear"));
        assert!(md.contains("### Q1:"));
        assert!(md.contains("<details><summary>Answer</summary>"));
        assert!(md.contains("- [1 mark] Isolate the x term"));
        assert!(md.contains("- [2 marks] Divide through"));
    }

    #[test]
    fn preview_substitutes_and_falls_back() {
        let bank = sample_bank();
        let md = bank.to_markdown();
        assert!(md.contains("$$1 \\rightarrow 9$$"));
        assert!(md.contains("Alice"));

        let q = &bank.questions[0];
        let preview = preview_template("{{a}} and {{missing}}", &q.variables);
        assert!(preview.ends_with("and [missing]"));
    }

    #[test]
    fn toml_banks_parse_too() {
        let bank: QuizBank = toml::from_str(
            r#"
                [metadata]
                title = "Powers"

                [[questions]]
                template = "What is {{n}} squared?"

                [questions.variables.n]
                type = "int"
                range = [2, 9]

                [questions.answer]
                template = "{{n}}^2"
            "#,
        )
        .unwrap();

        assert_eq!(bank.metadata.title.as_deref(), Some("Powers"));
        let record = bank.questions[0].to_record(0).unwrap();
        assert_eq!(record.variable("n").unwrap().range, Some((2.0, 9.0)));
    }

    #[test]
    fn inverted_or_non_finite_ranges_are_rejected() {
        for range in [(9.0, 1.0), (f64::NAN, 5.0), (1.0, f64::INFINITY)] {
            let var = BankVariable::Spec(BankVariableSpec {
                var_type: VarType::Int,
                range: Some(range),
                choices: Vec::new(),
                expression: None,
                constraints: Vec::new(),
            });
            let err = convert_variable("n", &var).unwrap_err();
            assert!(
                matches!(err, BankError::InvalidRange { .. }),
                "range {:?} accepted",
                range
            );
        }
    }

    #[test]
    fn bad_constraint_is_reported() {
        let var = BankVariable::Spec(BankVariableSpec {
            var_type: VarType::Int,
            range: Some((0.0, 5.0)),
            choices: Vec::new(),
            expression: None,
            constraints: vec!["~~ 3".to_string()],
        });
        let err = convert_variable("n", &var).unwrap_err();
        assert!(matches!(err, BankError::UnknownConstraint { .. }));
    }
}
