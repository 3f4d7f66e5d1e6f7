use quizmd::template::{Template, TemplatePart};

use crate::binding::{Bindings, BoundValue};
use crate::error::RenderError;

/// Render a template for presentation. Numeric and choice values read
/// plainly; derived and latex values are wrapped in `\( ... \)` for the
/// typesetting layer. Rendering is all-or-nothing: any placeholder without
/// a binding aborts with no partial output.
pub fn render_display(template: &Template, bindings: &Bindings) -> Result<String, RenderError> {
    let mut out = String::new();
    for part in &template.parts {
        match part {
            TemplatePart::Literal(text) => out.push_str(text),
            TemplatePart::Placeholder(name) => {
                let value = lookup(bindings, name)?;
                match value {
                    BoundValue::Expr { .. } | BoundValue::Latex(_) => {
                        out.push_str("\\(");
                        out.push_str(&value.display_form());
                        out.push_str("\\)");
                    }
                    other => out.push_str(&other.display_form()),
                }
            }
        }
    }
    // Authored spans may straddle placeholders, so rewrite the whole
    // assembled text rather than each literal part.
    Ok(mathify(&out))
}

/// Render a template as a raw expression string, the form fed to the
/// expression engine as the canonical answer. No delimiters; negative
/// substitutions arrive pre-parenthesized.
pub fn render_expression(template: &Template, bindings: &Bindings) -> Result<String, RenderError> {
    let mut out = String::new();
    for part in &template.parts {
        match part {
            TemplatePart::Literal(text) => out.push_str(text),
            TemplatePart::Placeholder(name) => {
                out.push_str(&lookup(bindings, name)?.expression_form());
            }
        }
    }
    Ok(out)
}

fn lookup<'a>(bindings: &'a Bindings, name: &str) -> Result<&'a BoundValue, RenderError> {
    bindings
        .get(name)
        .ok_or_else(|| RenderError::UnknownVariable(name.to_string()))
}

/// Rewrite `$...$` math spans to the neutral `\( ... \)` delimiters.
/// Spans do not cross line breaks; an unpaired `$` stays literal.
pub fn mathify(text: &str) -> String {
    let mut out = String::new();
    let mut rest = text;

    while let Some(open) = rest.find('$') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('$') {
            Some(close) if !after[..close].contains('\n') => {
                out.push_str("\\(");
                out.push_str(&after[..close]);
                out.push_str("\\)");
                rest = &after[close + 1..];
            }
            _ => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> Bindings {
        let mut b = Bindings::new();
        b.insert("a", BoundValue::Int(4));
        b.insert("b", BoundValue::Int(-3));
        b.insert("c", BoundValue::Choice("red".into()));
        b.insert(
            "d",
            BoundValue::Expr {
                source: "a + 1".into(),
                value: 5.0,
            },
        );
        b.insert("l", BoundValue::Latex("\\frac{1}{2}".into()));
        b
    }

    #[test]
    fn display_wraps_derived_and_latex_values() {
        let t = Template::parse("{{a}} {{c}} {{d}} {{l}}");
        assert_eq!(
            render_display(&t, &bindings()).unwrap(),
            "4 red \\(5\\) \\(\\frac{1}{2}\\)"
        );
    }

    #[test]
    fn expression_form_parenthesizes_negatives() {
        let t = Template::parse("-{{b}} / {{a}}");
        assert_eq!(render_expression(&t, &bindings()).unwrap(), "-(-3) / 4");
    }

    #[test]
    fn unknown_placeholder_aborts_without_partial_output() {
        let t = Template::parse("{{a}} and {{missing}}");
        assert_eq!(
            render_display(&t, &bindings()),
            Err(RenderError::UnknownVariable("missing".to_string()))
        );
    }

    #[test]
    fn literal_math_spans_are_rewritten() {
        assert_eq!(mathify("solve $x^2$ now"), "solve \\(x^2\\) now");
        assert_eq!(mathify("price is $5"), "price is $5");
        assert_eq!(mathify("a $x\ny$ b"), "a $x\ny$ b");
        let t = Template::parse("Compute $ {{a}}^2 $.");
        assert_eq!(
            render_display(&t, &bindings()).unwrap(),
            "Compute \\( 4^2 \\)."
        );
    }
}
