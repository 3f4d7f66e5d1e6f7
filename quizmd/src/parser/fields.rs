use std::collections::BTreeMap;
use std::ops::Range;

use crate::parser::error::{ParseError, ParseErrorKind};
use crate::parser::expression;
use crate::record::variable::{Constraint, VarType, VariableDecl};
use crate::record::{AnswerMode, AnswerSpec, MarkStep, QuizRecord};
use crate::template::Template;

/// Parse one raw quiz-block body into a QuizRecord.
pub(crate) fn parse_record(
    body: &str,
    span: Range<usize>,
    file_id: usize,
) -> Result<QuizRecord, ParseError> {
    let fields = collect_fields(body);

    let mut question = None;
    let mut hint = None;
    let mut explanation = None;
    let mut answer_template = None;
    let mut mode = AnswerMode::default();
    let mut variables: Vec<VariableDecl> = Vec::new();
    let mut markscheme = Vec::new();
    let mut metadata = BTreeMap::new();

    for field in &fields {
        match field.key.as_str() {
            "question" => question = Some(Template::parse(&field.joined())),
            "hint" => hint = Some(Template::parse(&field.joined())),
            "explanation" => explanation = Some(Template::parse(&field.joined())),
            "answer" => answer_template = Some(Template::parse(&field.joined())),
            "mode" => {
                if field.joined().trim().eq_ignore_ascii_case("literal") {
                    mode = AnswerMode::Literal;
                }
            }
            "vars" => {
                for entry in field.values.iter().flat_map(|v| split_entries(v)) {
                    apply_var_entry(&entry, &mut variables)
                        .map_err(|(name, reason)| {
                            ParseError::new(
                                ParseErrorKind::MalformedVariable { name, reason },
                                span.clone(),
                                file_id,
                            )
                        })?;
                }
            }
            "markscheme" => {
                for value in &field.values {
                    markscheme.push(parse_mark_step(value));
                }
            }
            // Unknown keys are kept, not rejected (forward-compatible).
            _ => {
                metadata.insert(field.key.clone(), field.joined());
            }
        }
    }

    let missing = |key| ParseError::new(ParseErrorKind::MissingField { key }, span.clone(), file_id);
    let question = question.ok_or_else(|| missing("question"))?;
    let answer_template = answer_template.ok_or_else(|| missing("answer"))?;

    Ok(QuizRecord {
        question,
        hint,
        answer: AnswerSpec {
            mode,
            template: answer_template,
        },
        variables,
        markscheme,
        explanation,
        metadata,
    })
}

// ---------------------------------------------------------------------------
// Line grammar: top-level keys and continuation lines
// ---------------------------------------------------------------------------

struct Field {
    key: String,
    /// The initial value plus one entry per continuation line, all trimmed.
    values: Vec<String>,
}

impl Field {
    fn joined(&self) -> String {
        self.values.join("\n")
    }
}

fn collect_fields(body: &str) -> Vec<Field> {
    let mut fields: Vec<Field> = Vec::new();

    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let is_continuation = line.starts_with([' ', '\t']);
        if !is_continuation
            && let Some((key, rest)) = line.split_once(':')
            && is_identifier(key.trim())
        {
            fields.push(Field {
                key: key.trim().to_string(),
                values: if rest.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![rest.trim().to_string()]
                },
            });
        } else if let Some(field) = fields.last_mut() {
            field.values.push(line.trim().to_string());
        }
        // A stray line before the first key has nowhere to belong; skip it.
    }

    fields
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// The `vars` mini-grammar
// ---------------------------------------------------------------------------

/// Split one `vars` line into declaration entries on top-level commas.
/// Commas inside `[...]`, `{...}` or `(...)` belong to the entry.
fn split_entries(line: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut depth = 0u32;

    for c in line.chars() {
        match c {
            '[' | '{' | '(' => {
                depth += 1;
                current.push(c);
            }
            ']' | '}' | ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                if !current.trim().is_empty() {
                    entries.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        entries.push(current.trim().to_string());
    }

    entries
}

/// Parse one entry and fold it into the declaration list.
/// Errors carry (variable name, human-readable reason).
fn apply_var_entry(
    entry: &str,
    variables: &mut Vec<VariableDecl>,
) -> Result<(), (String, String)> {
    let (lhs, rhs) = match split_declaration(entry) {
        Some((lhs, rhs)) => (lhs, rhs),
        None => {
            // Lenient form: `a != 5` without the `=` also reads as a
            // constraint on an earlier declaration.
            let name: String = entry
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            let rest = entry[name.len()..].trim();
            match Constraint::parse(rest) {
                Some(c) if is_identifier(&name) => {
                    return add_constraint(&name, c, variables);
                }
                _ => {
                    return Err((
                        entry.to_string(),
                        "expected 'name [: type] = value'".to_string(),
                    ));
                }
            }
        }
    };

    let (name, annotation) = match lhs.split_once(':') {
        Some((name, ty)) => {
            let ty = VarType::from_keyword(ty.trim())
                .ok_or_else(|| (name.trim().to_string(), format!("unknown type '{}'", ty.trim())))?;
            (name.trim(), Some(ty))
        }
        None => (lhs.trim(), None),
    };
    if !is_identifier(name) {
        return Err((name.to_string(), "variable names must be identifiers".to_string()));
    }

    let rhs = rhs.trim();

    // A bare comparison is an extra constraint, not a value source.
    if let Some(constraint) = Constraint::parse(rhs) {
        return add_constraint(name, constraint, variables);
    }

    let decl = if rhs.starts_with('[') {
        parse_range_decl(name, annotation, rhs)?
    } else if rhs.starts_with('{') {
        parse_choice_decl(name, rhs)?
    } else if annotation == Some(VarType::Latex) {
        let mut decl = VariableDecl::new(name, VarType::Latex);
        decl.expression = Some(rhs.to_string());
        decl
    } else if annotation == Some(VarType::Choice) {
        // A single unbraced literal still forms a one-entry choice list.
        let mut decl = VariableDecl::new(name, VarType::Choice);
        decl.choices = vec![rhs.to_string()];
        decl
    } else {
        expression::parse_expression(rhs)
            .map_err(|e| (name.to_string(), e.to_string()))?;
        let mut decl = VariableDecl::new(name, VarType::Expr);
        decl.expression = Some(rhs.to_string());
        decl
    };

    if variables.iter().any(|v| v.name == name) {
        return Err((name.to_string(), "declared more than once".to_string()));
    }
    variables.push(decl);
    Ok(())
}

/// Find the `=` that separates name from value, skipping `<= >= != ==`.
fn split_declaration(entry: &str) -> Option<(&str, &str)> {
    let bytes = entry.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let prev = entry[..i].trim_end().bytes().last();
        if matches!(prev, Some(b'<') | Some(b'>') | Some(b'!') | Some(b'=')) {
            continue;
        }
        return Some((&entry[..i], &entry[i + 1..]));
    }
    None
}

fn parse_range_decl(
    name: &str,
    annotation: Option<VarType>,
    rhs: &str,
) -> Result<VariableDecl, (String, String)> {
    let err = |reason: &str| (name.to_string(), reason.to_string());

    let var_type = match annotation {
        None | Some(VarType::Float) => VarType::Float,
        Some(VarType::Int) => VarType::Int,
        Some(_) => return Err(err("a range needs an int or float variable")),
    };

    let inner = rhs
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| err("expected '[min, max]'"))?;
    let (min, max) = inner
        .split_once(',')
        .ok_or_else(|| err("expected '[min, max]'"))?;
    let min: f64 = min.trim().parse().map_err(|_| err("range bounds must be numbers"))?;
    let max: f64 = max.trim().parse().map_err(|_| err("range bounds must be numbers"))?;
    // f64 parsing accepts "nan" and "inf"; neither is a drawable bound.
    if !min.is_finite() || !max.is_finite() {
        return Err(err("range bounds must be finite"));
    }
    if min > max {
        return Err(err("range minimum exceeds maximum"));
    }

    let mut decl = VariableDecl::new(name, var_type);
    decl.range = Some((min, max));
    Ok(decl)
}

fn parse_choice_decl(name: &str, rhs: &str) -> Result<VariableDecl, (String, String)> {
    let inner = rhs
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .ok_or_else(|| (name.to_string(), "expected '{a, b, ...}'".to_string()))?;
    let choices: Vec<String> = inner
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if choices.is_empty() {
        return Err((name.to_string(), "choice list is empty".to_string()));
    }

    let mut decl = VariableDecl::new(name, VarType::Choice);
    decl.choices = choices;
    Ok(decl)
}

fn add_constraint(
    name: &str,
    constraint: Constraint,
    variables: &mut [VariableDecl],
) -> Result<(), (String, String)> {
    match variables.iter_mut().find(|v| v.name == name) {
        Some(decl) => {
            decl.constraints.push(constraint);
            Ok(())
        }
        None => Err((
            name.to_string(),
            "constraint on a variable that was never declared".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Markscheme entries
// ---------------------------------------------------------------------------

/// `[2] description`. An entry without the bracket prefix scores 0 marks.
fn parse_mark_step(value: &str) -> MarkStep {
    let value = value.trim();
    if let Some(rest) = value.strip_prefix('[')
        && let Some((marks, description)) = rest.split_once(']')
        && let Ok(marks) = marks.trim().parse::<u32>()
    {
        return MarkStep {
            description: description.trim().to_string(),
            marks,
        };
    }
    MarkStep {
        description: value.to_string(),
        marks: 0,
    }
}
