use std::collections::{BTreeMap, HashMap};

use quizmd::expr::{BinaryOp, Expr, UnaryOp, format_number};
use quizmd::parser::parse_expression;

use crate::error::EvalError;

/// The seam between grading and symbolic math. The default engine below
/// covers arithmetic and polynomial identities; a CAS-backed engine can be
/// dropped in behind the same two calls.
pub trait ExpressionEngine {
    /// Numerically evaluate `expr` with the given variable values.
    fn evaluate(&self, expr: &str, bindings: &HashMap<String, f64>) -> Result<f64, EvalError>;

    /// Rewrite `expr` into a canonical text form. Two expressions are
    /// symbolically equal exactly when their difference simplifies to `0`.
    fn simplify(&self, expr: &str) -> Result<String, EvalError>;
}

/// Built-in engine: tree-walking evaluation plus expansion into polynomial
/// normal form. Anything it cannot normalize reports `NotPolynomial`, which
/// the checker treats as a cue to fall back to numeric probing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlgebraEngine;

impl ExpressionEngine for AlgebraEngine {
    fn evaluate(&self, expr: &str, bindings: &HashMap<String, f64>) -> Result<f64, EvalError> {
        let tree = parse_expression(expr).map_err(|e| EvalError::Syntax(e.to_string()))?;
        eval(&tree, bindings)
    }

    fn simplify(&self, expr: &str) -> Result<String, EvalError> {
        let tree = parse_expression(expr).map_err(|e| EvalError::Syntax(e.to_string()))?;
        Ok(expand(&tree)?.to_canonical())
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn eval(expr: &Expr, bindings: &HashMap<String, f64>) -> Result<f64, EvalError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Name(name) => bindings
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Ok(-eval(operand, bindings)?),
        Expr::Binary { op, left, right } => {
            let l = eval(left, bindings)?;
            let r = eval(right, bindings)?;
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Sub => Ok(l - r),
                BinaryOp::Mul => Ok(l * r),
                BinaryOp::Div => {
                    if r == 0.0 {
                        Err(EvalError::DivisionByZero)
                    } else {
                        Ok(l / r)
                    }
                }
                BinaryOp::Rem => {
                    if r == 0.0 {
                        Err(EvalError::DivisionByZero)
                    } else {
                        Ok(l % r)
                    }
                }
                BinaryOp::Pow => Ok(l.powf(r)),
            }
        }
        Expr::Call { function, args } => call(function, args, bindings),
    }
}

fn call(function: &str, args: &[Expr], bindings: &HashMap<String, f64>) -> Result<f64, EvalError> {
    let arity = |n: usize| {
        if args.len() == n {
            Ok(())
        } else {
            Err(EvalError::Syntax(format!(
                "{} takes {} argument{}, got {}",
                function,
                n,
                if n == 1 { "" } else { "s" },
                args.len()
            )))
        }
    };
    let arg = |i: usize| eval(&args[i], bindings);

    match function {
        "sqrt" => {
            arity(1)?;
            Ok(arg(0)?.sqrt())
        }
        "sin" => {
            arity(1)?;
            Ok(arg(0)?.sin())
        }
        "cos" => {
            arity(1)?;
            Ok(arg(0)?.cos())
        }
        "tan" => {
            arity(1)?;
            Ok(arg(0)?.tan())
        }
        "exp" => {
            arity(1)?;
            Ok(arg(0)?.exp())
        }
        "ln" => {
            arity(1)?;
            Ok(arg(0)?.ln())
        }
        // log(x) is base 10; log(x, b) uses an explicit base.
        "log" => match args.len() {
            1 => Ok(arg(0)?.log10()),
            2 => Ok(arg(0)?.log(arg(1)?)),
            n => Err(EvalError::Syntax(format!(
                "log takes 1 or 2 arguments, got {}",
                n
            ))),
        },
        "abs" => {
            arity(1)?;
            Ok(arg(0)?.abs())
        }
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Polynomial normal form
// ---------------------------------------------------------------------------

/// Variable names mapped to their exponents. The empty map is the
/// constant monomial.
type Monomial = BTreeMap<String, u32>;

/// Coefficient cutoff: terms that cancel to below this vanish.
const COEFF_EPSILON: f64 = 1e-9;

/// Largest exponent `^` is expanded through. Past this the expression is
/// treated as non-polynomial rather than exploding term counts.
const MAX_EXPANSION_POWER: u32 = 16;

#[derive(Debug, Clone, Default, PartialEq)]
struct Poly {
    terms: BTreeMap<Monomial, f64>,
}

impl Poly {
    fn constant(value: f64) -> Poly {
        let mut poly = Poly::default();
        poly.add_term(Monomial::new(), value);
        poly
    }

    fn variable(name: &str) -> Poly {
        let mut poly = Poly::default();
        poly.add_term(BTreeMap::from([(name.to_string(), 1)]), 1.0);
        poly
    }

    fn add_term(&mut self, monomial: Monomial, coeff: f64) {
        let entry = self.terms.entry(monomial).or_insert(0.0);
        *entry += coeff;
    }

    fn add(mut self, other: Poly) -> Poly {
        for (monomial, coeff) in other.terms {
            self.add_term(monomial, coeff);
        }
        self
    }

    fn scale(mut self, factor: f64) -> Poly {
        for coeff in self.terms.values_mut() {
            *coeff *= factor;
        }
        self
    }

    fn mul(&self, other: &Poly) -> Poly {
        let mut product = Poly::default();
        for (m1, c1) in &self.terms {
            for (m2, c2) in &other.terms {
                let mut monomial = m1.clone();
                for (name, exp) in m2 {
                    *monomial.entry(name.clone()).or_insert(0) += exp;
                }
                product.add_term(monomial, c1 * c2);
            }
        }
        product
    }

    fn pow(&self, exponent: u32) -> Poly {
        let mut result = Poly::constant(1.0);
        for _ in 0..exponent {
            result = result.mul(self);
        }
        result
    }

    /// The constant value, if this polynomial has no variable terms.
    fn as_constant(&self) -> Option<f64> {
        let mut value = 0.0;
        for (monomial, coeff) in &self.terms {
            if monomial.is_empty() {
                value = *coeff;
            } else if coeff.abs() >= COEFF_EPSILON {
                return None;
            }
        }
        Some(value)
    }

    /// Canonical text form: terms in monomial order, cancelled terms
    /// dropped, unit coefficients elided.
    fn to_canonical(&self) -> String {
        let mut out = String::new();

        for (monomial, &coeff) in &self.terms {
            if coeff.abs() < COEFF_EPSILON {
                continue;
            }

            if out.is_empty() {
                if coeff < 0.0 {
                    out.push('-');
                }
            } else if coeff < 0.0 {
                out.push_str(" - ");
            } else {
                out.push_str(" + ");
            }

            let magnitude = coeff.abs();
            let unit_coeff = (magnitude - 1.0).abs() < COEFF_EPSILON;
            if !unit_coeff || monomial.is_empty() {
                out.push_str(&format_number(magnitude));
            }

            for (i, (name, &exp)) in monomial.iter().enumerate() {
                if i > 0 || !unit_coeff {
                    out.push('*');
                }
                out.push_str(name);
                if exp > 1 {
                    out.push('^');
                    out.push_str(&exp.to_string());
                }
            }
        }

        if out.is_empty() {
            out.push('0');
        }
        out
    }
}

fn expand(expr: &Expr) -> Result<Poly, EvalError> {
    match expr {
        Expr::Number(n) => Ok(Poly::constant(*n)),
        Expr::Name(name) => Ok(Poly::variable(name)),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Ok(expand(operand)?.scale(-1.0)),
        Expr::Binary { op, left, right } => {
            let l = expand(left)?;
            match op {
                BinaryOp::Add => Ok(l.add(expand(right)?)),
                BinaryOp::Sub => Ok(l.add(expand(right)?.scale(-1.0))),
                BinaryOp::Mul => Ok(l.mul(&expand(right)?)),
                BinaryOp::Div => {
                    // Only division by a nonzero constant stays polynomial.
                    let divisor = expand(right)?;
                    match divisor.as_constant() {
                        Some(c) if c.abs() >= COEFF_EPSILON => Ok(l.scale(1.0 / c)),
                        Some(_) => Err(EvalError::DivisionByZero),
                        None => Err(EvalError::NotPolynomial(
                            "division by an expression with variables".to_string(),
                        )),
                    }
                }
                BinaryOp::Rem => Err(EvalError::NotPolynomial(
                    "'%' has no polynomial form".to_string(),
                )),
                BinaryOp::Pow => {
                    let exponent = expand(right)?.as_constant().ok_or_else(|| {
                        EvalError::NotPolynomial("exponent contains variables".to_string())
                    })?;
                    if exponent < 0.0 || exponent.fract() != 0.0 {
                        return Err(EvalError::NotPolynomial(
                            "exponent is negative or fractional".to_string(),
                        ));
                    }
                    if exponent > MAX_EXPANSION_POWER as f64 {
                        return Err(EvalError::NotPolynomial(format!(
                            "exponent {} is too large to expand",
                            format_number(exponent)
                        )));
                    }
                    Ok(l.pow(exponent as u32))
                }
            }
        }
        Expr::Call { function, .. } => Err(EvalError::NotPolynomial(format!(
            "function call '{}'",
            function
        ))),
    }
}
