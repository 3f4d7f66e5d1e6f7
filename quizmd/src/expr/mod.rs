use std::collections::BTreeSet;
use std::fmt;

/// Function names the expression grammar accepts in call position.
/// Anything else followed by `(` reads as implicit multiplication.
pub const FUNCTIONS: &[&str] = &["sqrt", "sin", "cos", "tan", "exp", "ln", "log", "abs"];

/// A parsed arithmetic/algebraic expression. The grammar has no
/// assignment, control flow or host code; expressions are plain data
/// evaluated by walking this tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Name(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation: -x
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl Expr {
    /// Free variable names, sorted and deduplicated.
    pub fn free_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Name(name) => {
                names.insert(name.clone());
            }
            Expr::Unary { operand, .. } => operand.collect_names(names),
            Expr::Binary { left, right, .. } => {
                left.collect_names(names);
                right.collect_names(names);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_names(names);
                }
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Number(_) | Expr::Name(_) | Expr::Call { .. } => 5,
            Expr::Binary { op: BinaryOp::Pow, .. } => 4,
            Expr::Unary { .. } => 3,
            Expr::Binary {
                op: BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem,
                ..
            } => 2,
            Expr::Binary { .. } => 1,
        }
    }
}

/// Format a value the way expressions print: whole values without a
/// trailing `.0`, everything else in the shortest round-trip form.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n == n.floor() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Expr {
    /// Canonical text form, parenthesized only where precedence requires.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", format_number(*n)),
            Expr::Name(name) => write!(f, "{}", name),
            Expr::Unary { op: UnaryOp::Neg, operand } => {
                write!(f, "-")?;
                write_child(f, operand, self.precedence(), false)
            }
            Expr::Binary { op, left, right } => {
                let symbol = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Rem => "%",
                    BinaryOp::Pow => "^",
                };
                // Pow is right-associative; the others group to the left.
                let (left_strict, right_strict) = match op {
                    BinaryOp::Pow => (true, false),
                    BinaryOp::Add | BinaryOp::Mul => (false, false),
                    BinaryOp::Sub | BinaryOp::Div | BinaryOp::Rem => (false, true),
                };
                write_child(f, left, self.precedence(), left_strict)?;
                write!(f, " {} ", symbol)?;
                write_child(f, right, self.precedence(), right_strict)
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_child(
    f: &mut fmt::Formatter<'_>,
    child: &Expr,
    parent_precedence: u8,
    strict: bool,
) -> fmt::Result {
    let needs_parens = if strict {
        child.precedence() <= parent_precedence
    } else {
        child.precedence() < parent_precedence
    };
    if needs_parens {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}
