use std::fmt;

/// A text template with `{{name}}` placeholders.
/// Used for questions, hints, explanations and answer expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub parts: Vec<TemplatePart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Literal text content.
    Literal(String),
    /// A variable placeholder to be substituted at render time.
    Placeholder(String),
}

impl Template {
    /// Parse template text. An unclosed `{{` is kept as literal text, so
    /// parsing never fails; unresolvable placeholders are caught at render
    /// time instead.
    pub fn parse(text: &str) -> Template {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(open) = rest.find("{{") {
            match rest[open + 2..].find("}}") {
                Some(close) => {
                    literal.push_str(&rest[..open]);
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    let name = rest[open + 2..open + 2 + close].trim().to_string();
                    parts.push(TemplatePart::Placeholder(name));
                    rest = &rest[open + 2 + close + 2..];
                }
                None => {
                    literal.push_str(&rest[..open + 2]);
                    rest = &rest[open + 2..];
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() || parts.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }

        Template { parts }
    }

    /// Placeholder names in appearance order (may repeat).
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            TemplatePart::Placeholder(name) => Some(name.as_str()),
            TemplatePart::Literal(_) => None,
        })
    }
}

impl fmt::Display for Template {
    /// Round-trips back to the authored `{{name}}` form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                TemplatePart::Literal(s) => write!(f, "{}", s)?,
                TemplatePart::Placeholder(name) => write!(f, "{{{{{}}}}}", name)?,
            }
        }
        Ok(())
    }
}
