use rand::Rng;

use quizmd::parser::parse_expression;
use quizmd::record::AnswerMode;
use quizmd::record::variable::VariableDecl;

use crate::engine::ExpressionEngine;
use crate::error::EvalError;

/// Probe points per equivalence check when symbolic simplification cannot
/// settle the comparison.
pub const PROBE_POINTS: u32 = 5;

/// Absolute-or-relative agreement tolerance at each probe point.
pub const TOLERANCE: f64 = 1e-6;

/// Redraws allowed per probe point when the canonical side lands on a
/// singularity (division by zero, non-finite value).
const PROBE_RETRIES: u32 = 20;

/// Probe draw range for names with no declared range.
const DEFAULT_RANGE: (f64, f64) = (1.0, 10.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
    /// The submission could not be judged (unparseable, unevaluable).
    /// The instance stays open; the learner can resubmit.
    Error,
}

/// The verdict of one check call. Computed fresh per submission and never
/// cached: verdicts are cheap and instances are concurrent.
#[derive(Debug, Clone, PartialEq)]
pub struct EquivalenceResult {
    pub outcome: Outcome,
    pub detail: Option<String>,
}

impl EquivalenceResult {
    fn correct() -> Self {
        EquivalenceResult {
            outcome: Outcome::Correct,
            detail: None,
        }
    }

    fn incorrect(detail: impl Into<String>) -> Self {
        EquivalenceResult {
            outcome: Outcome::Incorrect,
            detail: Some(detail.into()),
        }
    }

    fn error(detail: impl Into<String>) -> Self {
        EquivalenceResult {
            outcome: Outcome::Error,
            detail: Some(detail.into()),
        }
    }
}

/// Judge a submission against the canonical answer of one instance.
///
/// Literal mode compares trimmed text. Symbolic mode simplifies
/// `(canonical) - (submission)`: zero means equal, any other polynomial
/// means unequal, and a non-polynomial difference falls back to numeric
/// probing over the declared variable ranges.
pub fn check_submission(
    canonical: &str,
    submission: &str,
    mode: AnswerMode,
    variables: &[VariableDecl],
    engine: &dyn ExpressionEngine,
    rng: &mut impl Rng,
) -> EquivalenceResult {
    match mode {
        AnswerMode::Literal => {
            if canonical.trim() == submission.trim() {
                EquivalenceResult::correct()
            } else {
                EquivalenceResult::incorrect("answers differ as text")
            }
        }
        AnswerMode::Symbolic => check_symbolic(canonical, submission, variables, engine, rng),
    }
}

fn check_symbolic(
    canonical: &str,
    submission: &str,
    variables: &[VariableDecl],
    engine: &dyn ExpressionEngine,
    rng: &mut impl Rng,
) -> EquivalenceResult {
    // Malformed input is a judging failure, never an "incorrect".
    let submitted_tree = match parse_expression(submission) {
        Ok(tree) => tree,
        Err(e) => return EquivalenceResult::error(format!("could not read the answer: {}", e)),
    };
    let canonical_tree = match parse_expression(canonical) {
        Ok(tree) => tree,
        Err(e) => {
            return EquivalenceResult::error(format!("canonical answer failed to parse: {}", e));
        }
    };

    let difference = format!("({}) - ({})", canonical, submission);
    match engine.simplify(&difference) {
        Ok(zero) if zero == "0" => return EquivalenceResult::correct(),
        Ok(residual) => {
            return EquivalenceResult::incorrect(format!("difference simplifies to {}", residual));
        }
        // Outside polynomial territory; settle it numerically below.
        Err(EvalError::NotPolynomial(_)) => {}
        Err(e) => return EquivalenceResult::error(format!("could not compare answers: {}", e)),
    }

    let mut names = canonical_tree.free_names();
    names.extend(submitted_tree.free_names());

    'probe: for _ in 0..PROBE_POINTS {
        for _ in 0..PROBE_RETRIES {
            let point: std::collections::HashMap<String, f64> = names
                .iter()
                .map(|name| {
                    let (min, max) = variables
                        .iter()
                        .find(|v| v.name == *name)
                        .and_then(|v| v.range)
                        // rand panics on empty or non-finite ranges.
                        .filter(|(min, max)| {
                            min.is_finite() && max.is_finite() && min <= max
                        })
                        .unwrap_or(DEFAULT_RANGE);
                    (name.clone(), rng.random_range(min..=max))
                })
                .collect();

            let expected = match engine.evaluate(canonical, &point) {
                Ok(v) if v.is_finite() => v,
                // Singularity of the canonical side: redraw the point.
                _ => continue,
            };
            let actual = match engine.evaluate(submission, &point) {
                Ok(v) => v,
                Err(e) => {
                    return EquivalenceResult::error(format!(
                        "could not evaluate the answer: {}",
                        e
                    ));
                }
            };

            if !actual.is_finite() || !agrees(expected, actual) {
                return EquivalenceResult::incorrect(format!(
                    "values differ at a probe point ({} vs {})",
                    expected, actual
                ));
            }
            continue 'probe;
        }
        return EquivalenceResult::error(
            "canonical answer has no evaluable probe points in range",
        );
    }

    EquivalenceResult::correct()
}

fn agrees(expected: f64, actual: f64) -> bool {
    let diff = (expected - actual).abs();
    diff < TOLERANCE || diff <= TOLERANCE * expected.abs().max(actual.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AlgebraEngine;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn check(canonical: &str, submission: &str, mode: AnswerMode) -> EquivalenceResult {
        let mut rng = StdRng::seed_from_u64(99);
        check_submission(canonical, submission, mode, &[], &AlgebraEngine, &mut rng)
    }

    #[test]
    fn symbolic_rewrites_are_correct() {
        assert_eq!(check("2*(x + 1)", "2*x + 2", AnswerMode::Symbolic).outcome, Outcome::Correct);
        assert_eq!(check("2*(x + 1)", "3*x", AnswerMode::Symbolic).outcome, Outcome::Incorrect);
        assert_eq!(check("(x+1)^2", "x^2 + 2x + 1", AnswerMode::Symbolic).outcome, Outcome::Correct);
    }

    #[test]
    fn probing_handles_non_polynomial_forms() {
        assert_eq!(
            check("sqrt(x) * sqrt(x)", "x", AnswerMode::Symbolic).outcome,
            Outcome::Correct
        );
        assert_eq!(
            check("sin(x)^2 + cos(x)^2", "1", AnswerMode::Symbolic).outcome,
            Outcome::Correct
        );
        assert_eq!(
            check("sqrt(x)", "x / 2", AnswerMode::Symbolic).outcome,
            Outcome::Incorrect
        );
        assert_eq!(check("1 / x", "x^(-1)", AnswerMode::Symbolic).outcome, Outcome::Correct);
    }

    #[test]
    fn malformed_submission_is_an_error_not_incorrect() {
        let result = check("x + 1", "2+*", AnswerMode::Symbolic);
        assert_eq!(result.outcome, Outcome::Error);
        assert!(result.detail.unwrap().contains("could not read"));

        assert_eq!(check("x + 1", "", AnswerMode::Symbolic).outcome, Outcome::Error);
        assert_eq!(check("x + 1", "x @ 1", AnswerMode::Symbolic).outcome, Outcome::Error);
    }

    #[test]
    fn probing_survives_an_undrawable_declared_range() {
        use quizmd::record::variable::{VarType, VariableDecl};

        let mut decl = VariableDecl::new("x", VarType::Float);
        decl.range = Some((f64::NAN, 5.0));

        let mut rng = StdRng::seed_from_u64(99);
        let result = check_submission(
            "sqrt(x) * sqrt(x)",
            "x",
            AnswerMode::Symbolic,
            &[decl],
            &AlgebraEngine,
            &mut rng,
        );
        assert_eq!(result.outcome, Outcome::Correct);
    }

    #[test]
    fn literal_mode_compares_trimmed_text() {
        assert_eq!(check("two", "  two ", AnswerMode::Literal).outcome, Outcome::Correct);
        assert_eq!(check("two", "2", AnswerMode::Literal).outcome, Outcome::Incorrect);
    }

    #[test]
    fn numeric_answers_tolerate_rounding() {
        assert_eq!(check("1 / 3", "0.333333333", AnswerMode::Symbolic).outcome, Outcome::Correct);
        assert_eq!(check("1 / 3", "0.3", AnswerMode::Symbolic).outcome, Outcome::Incorrect);
    }
}
