use std::fmt;

use serde::{Deserialize, Serialize};

/// A declared quiz variable: where its value comes from and which
/// constraints a candidate value must satisfy.
#[derive(Debug, Clone)]
pub struct VariableDecl {
    /// Unique within the record.
    pub name: String,
    pub var_type: VarType,
    /// Inclusive draw range for `Int`/`Float`. Defaults to `[1, 10]` at
    /// generation time when absent.
    pub range: Option<(f64, f64)>,
    /// Candidate literals for `Choice`.
    pub choices: Vec<String>,
    /// Source text of an `Expr` variable's expression, or the passthrough
    /// literal of a `Latex` variable.
    pub expression: Option<String>,
    pub constraints: Vec<Constraint>,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, var_type: VarType) -> Self {
        VariableDecl {
            name: name.into(),
            var_type,
            range: None,
            choices: Vec::new(),
            expression: None,
            constraints: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Int,
    Float,
    Choice,
    Expr,
    Latex,
}

impl VarType {
    /// Parse a type annotation keyword from the `vars` grammar.
    pub fn from_keyword(word: &str) -> Option<VarType> {
        match word {
            "int" => Some(VarType::Int),
            "float" => Some(VarType::Float),
            "choice" => Some(VarType::Choice),
            "expr" => Some(VarType::Expr),
            "latex" => Some(VarType::Latex),
            _ => None,
        }
    }
}

/// A single numeric constraint on a variable, e.g. `>0` or `divisibleBy 3`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub op: ConstraintOp,
    pub operand: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    DivisibleBy,
    NotDivisibleBy,
}

/// Comparison tolerance for float-valued candidates.
const EPSILON: f64 = 1e-9;

impl Constraint {
    /// Parse a constraint from its authored text form: a comparison operator
    /// followed by a numeric operand (`>= 2`, `!=5`), or the word forms
    /// `divisibleBy N` / `notDivisibleBy N`. Returns None if the text does
    /// not match any constraint form.
    pub fn parse(text: &str) -> Option<Constraint> {
        let text = text.trim();

        let (op, rest) = if let Some(rest) = text.strip_prefix("<=") {
            (ConstraintOp::Le, rest)
        } else if let Some(rest) = text.strip_prefix(">=") {
            (ConstraintOp::Ge, rest)
        } else if let Some(rest) = text.strip_prefix("==") {
            (ConstraintOp::Eq, rest)
        } else if let Some(rest) = text.strip_prefix("!=") {
            (ConstraintOp::Ne, rest)
        } else if let Some(rest) = text.strip_prefix('<') {
            (ConstraintOp::Lt, rest)
        } else if let Some(rest) = text.strip_prefix('>') {
            (ConstraintOp::Gt, rest)
        } else if let Some(rest) = text.strip_prefix('=') {
            (ConstraintOp::Eq, rest)
        } else if let Some(rest) = strip_keyword(text, "notDivisibleBy") {
            (ConstraintOp::NotDivisibleBy, rest)
        } else if let Some(rest) = strip_keyword(text, "divisibleBy") {
            (ConstraintOp::DivisibleBy, rest)
        } else {
            return None;
        };

        let operand: f64 = rest.trim().parse().ok()?;
        Some(Constraint { op, operand })
    }

    /// Test a numeric candidate against this constraint.
    pub fn holds(&self, value: f64) -> bool {
        match self.op {
            ConstraintOp::Lt => value < self.operand,
            ConstraintOp::Le => value <= self.operand,
            ConstraintOp::Gt => value > self.operand,
            ConstraintOp::Ge => value >= self.operand,
            ConstraintOp::Eq => (value - self.operand).abs() < EPSILON,
            ConstraintOp::Ne => (value - self.operand).abs() >= EPSILON,
            ConstraintOp::DivisibleBy => divides(value, self.operand),
            ConstraintOp::NotDivisibleBy => !divides(value, self.operand),
        }
    }
}

fn divides(value: f64, by: f64) -> bool {
    if by == 0.0 {
        return false;
    }
    let rem = (value % by).abs();
    rem < EPSILON || (by.abs() - rem) < EPSILON
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    // Require a boundary so `divisibleBy3` still parses but `divisibleByX`
    // falls through to the expression form.
    if rest.is_empty() || !rest.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        Some(rest)
    } else {
        None
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            ConstraintOp::Lt => write!(f, "< {}", self.operand),
            ConstraintOp::Le => write!(f, "<= {}", self.operand),
            ConstraintOp::Gt => write!(f, "> {}", self.operand),
            ConstraintOp::Ge => write!(f, ">= {}", self.operand),
            ConstraintOp::Eq => write!(f, "== {}", self.operand),
            ConstraintOp::Ne => write!(f, "!= {}", self.operand),
            ConstraintOp::DivisibleBy => write!(f, "divisibleBy {}", self.operand),
            ConstraintOp::NotDivisibleBy => write!(f, "notDivisibleBy {}", self.operand),
        }
    }
}
