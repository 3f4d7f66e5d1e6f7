use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use quizmd::parser::parse_expression;
use quizmd::record::variable::{VarType, VariableDecl};

use crate::binding::{Bindings, BoundValue};
use crate::engine::ExpressionEngine;
use crate::error::{EvalError, GenerateError};

/// Rejection-sampling cap per variable.
pub const MAX_ATTEMPTS: u32 = 1000;

/// Draw range for numeric variables declared without one.
const DEFAULT_RANGE: (f64, f64) = (1.0, 10.0);

/// Bind every variable of a record in declaration order. Randomness comes
/// from the caller; there is no process-global generator state.
pub fn generate(
    variables: &[VariableDecl],
    engine: &dyn ExpressionEngine,
    rng: &mut impl Rng,
) -> Result<Bindings, GenerateError> {
    let mut bindings = Bindings::new();

    for decl in variables {
        let value = match decl.var_type {
            VarType::Int => sample(decl, rng, |rng| {
                let (min, max) = drawable_range(decl)?;
                let lo = min.ceil() as i64;
                let hi = max.floor() as i64;
                if lo > hi {
                    None
                } else {
                    Some(BoundValue::Int(rng.random_range(lo..=hi)))
                }
            })?,
            VarType::Float => sample(decl, rng, |rng| {
                let (min, max) = drawable_range(decl)?;
                Some(BoundValue::Float(rng.random_range(min..=max)))
            })?,
            VarType::Choice => sample(decl, rng, |rng| {
                if decl.choices.is_empty() {
                    None
                } else {
                    let idx = rng.random_range(0..decl.choices.len());
                    Some(BoundValue::Choice(decl.choices[idx].clone()))
                }
            })?,
            VarType::Expr => derive(decl, engine, &bindings)?,
            VarType::Latex => passthrough(decl)?,
        };
        bindings.insert(decl.name.clone(), value);
    }

    Ok(bindings)
}

/// `generate` with a self-contained seeded generator, for reproducible
/// instances and tests.
pub fn generate_seeded(
    variables: &[VariableDecl],
    engine: &dyn ExpressionEngine,
    seed: u64,
) -> Result<Bindings, GenerateError> {
    let mut rng = StdRng::seed_from_u64(seed);
    generate(variables, engine, &mut rng)
}

/// Draw candidates until one satisfies every constraint, up to the cap.
/// A draw function returning None means the declaration admits no values
/// at all (empty integer range, empty choice list).
fn sample<R: Rng>(
    decl: &VariableDecl,
    rng: &mut R,
    mut draw: impl FnMut(&mut R) -> Option<BoundValue>,
) -> Result<BoundValue, GenerateError> {
    for attempt in 1..=MAX_ATTEMPTS {
        let candidate = draw(rng).ok_or_else(|| GenerateError::ConstraintUnsatisfiable {
            name: decl.name.clone(),
            attempts: attempt - 1,
        })?;
        if satisfies(&candidate, decl) {
            return Ok(candidate);
        }
    }
    Err(GenerateError::ConstraintUnsatisfiable {
        name: decl.name.clone(),
        attempts: MAX_ATTEMPTS,
    })
}

/// A range is drawable only with finite, ordered bounds; `rand` panics on
/// empty or non-finite ranges, so those must never reach it.
fn drawable_range(decl: &VariableDecl) -> Option<(f64, f64)> {
    let (min, max) = decl.range.unwrap_or(DEFAULT_RANGE);
    if min.is_finite() && max.is_finite() && min <= max {
        Some((min, max))
    } else {
        None
    }
}

/// Constraints compare numerically; a candidate with no numeric view
/// cannot satisfy a numeric constraint.
fn satisfies(candidate: &BoundValue, decl: &VariableDecl) -> bool {
    if decl.constraints.is_empty() {
        return true;
    }
    match candidate.numeric() {
        Some(value) => decl.constraints.iter().all(|c| c.holds(value)),
        None => false,
    }
}

/// Derived variables evaluate exactly once; a constraint violation is an
/// immediate failure since re-drawing would produce the same value.
fn derive(
    decl: &VariableDecl,
    engine: &dyn ExpressionEngine,
    bindings: &Bindings,
) -> Result<BoundValue, GenerateError> {
    let source = decl.expression.as_deref().unwrap_or_default();

    let tree = parse_expression(source).map_err(|e| GenerateError::Eval {
        name: decl.name.clone(),
        source: EvalError::Syntax(e.to_string()),
    })?;
    // A name with no binding at all is a forward reference. A bound but
    // non-numeric name (latex, textual choice) is absent from the numeric
    // map and surfaces as an evaluation failure below.
    for referenced in tree.free_names() {
        if bindings.get(&referenced).is_none() {
            return Err(GenerateError::ForwardReference {
                name: decl.name.clone(),
                referenced,
            });
        }
    }

    let value = engine
        .evaluate(source, &bindings.numeric_map())
        .map_err(|source| GenerateError::Eval {
            name: decl.name.clone(),
            source,
        })?;

    let candidate = BoundValue::Expr {
        source: source.to_string(),
        value,
    };
    if !value.is_finite() || !satisfies(&candidate, decl) {
        return Err(GenerateError::ConstraintUnsatisfiable {
            name: decl.name.clone(),
            attempts: 1,
        });
    }
    Ok(candidate)
}

fn passthrough(decl: &VariableDecl) -> Result<BoundValue, GenerateError> {
    // Latex content is opaque; any constraint on it is unsatisfiable.
    if !decl.constraints.is_empty() {
        return Err(GenerateError::ConstraintUnsatisfiable {
            name: decl.name.clone(),
            attempts: 1,
        });
    }
    Ok(BoundValue::Latex(
        decl.expression.clone().unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AlgebraEngine;
    use quizmd::record::variable::Constraint;

    fn int_var(name: &str, min: f64, max: f64) -> VariableDecl {
        let mut decl = VariableDecl::new(name, VarType::Int);
        decl.range = Some((min, max));
        decl
    }

    #[test]
    fn expr_variables_see_earlier_bindings_only() {
        let mut derived = VariableDecl::new("d", VarType::Expr);
        derived.expression = Some("n + 1".to_string());

        let forward = generate_seeded(&[derived.clone(), int_var("n", 1.0, 5.0)], &AlgebraEngine, 7);
        assert!(matches!(
            forward,
            Err(GenerateError::ForwardReference { ref referenced, .. }) if referenced == "n"
        ));

        let bindings =
            generate_seeded(&[int_var("n", 1.0, 5.0), derived], &AlgebraEngine, 7).unwrap();
        let n = bindings.get("n").unwrap().numeric().unwrap();
        let d = bindings.get("d").unwrap().numeric().unwrap();
        assert_eq!(d, n + 1.0);
    }

    #[test]
    fn derived_constraint_violation_fails_immediately() {
        let mut derived = VariableDecl::new("d", VarType::Expr);
        derived.expression = Some("n * 0".to_string());
        derived.constraints.push(Constraint::parse("> 0").unwrap());

        let result = generate_seeded(&[int_var("n", 1.0, 5.0), derived], &AlgebraEngine, 3);
        assert!(matches!(
            result,
            Err(GenerateError::ConstraintUnsatisfiable { attempts: 1, .. })
        ));
    }

    #[test]
    fn undrawable_ranges_fail_instead_of_panicking() {
        for range in [(f64::NAN, 5.0), (1.0, f64::INFINITY), (9.0, 1.0)] {
            for ty in [VarType::Int, VarType::Float] {
                let mut decl = VariableDecl::new("n", ty);
                decl.range = Some(range);
                let result = generate_seeded(&[decl], &AlgebraEngine, 0);
                assert!(
                    matches!(result, Err(GenerateError::ConstraintUnsatisfiable { .. })),
                    "range {:?} for {:?} did not fail cleanly",
                    range,
                    ty
                );
            }
        }
    }

    #[test]
    fn non_numeric_reference_is_an_eval_error_not_forward() {
        let mut latex = VariableDecl::new("l", VarType::Latex);
        latex.expression = Some("\\pi".to_string());
        let mut derived = VariableDecl::new("d", VarType::Expr);
        derived.expression = Some("l + 1".to_string());

        let result = generate_seeded(&[latex, derived], &AlgebraEngine, 0);
        match result {
            Err(GenerateError::Eval { name, source }) => {
                assert_eq!(name, "d");
                assert_eq!(source, EvalError::UnknownName("l".to_string()));
            }
            other => panic!("expected Eval error, got {:?}", other),
        }
    }

    #[test]
    fn empty_integer_range_cannot_bind() {
        // No integer lies in [2.1, 2.9].
        let result = generate_seeded(&[int_var("n", 2.1, 2.9)], &AlgebraEngine, 0);
        assert!(matches!(
            result,
            Err(GenerateError::ConstraintUnsatisfiable { .. })
        ));
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let vars = [int_var("a", 1.0, 100.0), int_var("b", 1.0, 100.0)];
        let first = generate_seeded(&vars, &AlgebraEngine, 42).unwrap();
        let second = generate_seeded(&vars, &AlgebraEngine, 42).unwrap();
        assert_eq!(first, second);
    }
}
