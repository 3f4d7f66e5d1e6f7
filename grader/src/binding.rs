use std::collections::HashMap;
use std::fmt;

use quizmd::expr::format_number;

/// A concrete value bound to one variable of a quiz instance.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Int(i64),
    Float(f64),
    Choice(String),
    /// A derived value: the authored expression and the number it
    /// evaluated to under the earlier bindings.
    Expr { source: String, value: f64 },
    /// Opaque markup, passed through to templates untouched.
    Latex(String),
}

impl BoundValue {
    /// The numeric view, if this value has one. Latex and choice values
    /// that are not numbers have none and cannot appear in expressions.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            BoundValue::Int(n) => Some(*n as f64),
            BoundValue::Float(x) => Some(*x),
            BoundValue::Expr { value, .. } => Some(*value),
            BoundValue::Choice(text) => text.trim().parse().ok(),
            BoundValue::Latex(_) => None,
        }
    }

    /// How the value reads in question text.
    pub fn display_form(&self) -> String {
        match self {
            BoundValue::Int(n) => n.to_string(),
            BoundValue::Float(x) => format_number(*x),
            BoundValue::Choice(text) => text.clone(),
            BoundValue::Expr { value, .. } => format_number(*value),
            BoundValue::Latex(content) => content.clone(),
        }
    }

    /// How the value reads when substituted into an expression string.
    /// Negative numbers are parenthesized so `-{{b}}` stays well-formed.
    pub fn expression_form(&self) -> String {
        match self {
            BoundValue::Int(n) if *n < 0 => format!("({})", n),
            BoundValue::Int(n) => n.to_string(),
            BoundValue::Float(x) if *x < 0.0 => format!("({})", format_number(*x)),
            BoundValue::Float(x) => format_number(*x),
            BoundValue::Expr { value, .. } if *value < 0.0 => {
                format!("({})", format_number(*value))
            }
            BoundValue::Expr { value, .. } => format_number(*value),
            BoundValue::Choice(text) => text.clone(),
            BoundValue::Latex(content) => content.clone(),
        }
    }
}

impl fmt::Display for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_form())
    }
}

/// The full binding set of one instance, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: Vec<(String, BoundValue)>,
}

impl Bindings {
    pub fn new() -> Self {
        Bindings::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: BoundValue) {
        self.entries.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Numeric views of every binding that has one, for the engine.
    pub fn numeric_map(&self) -> HashMap<String, f64> {
        self.entries
            .iter()
            .filter_map(|(n, v)| v.numeric().map(|x| (n.clone(), x)))
            .collect()
    }
}
