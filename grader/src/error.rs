use std::fmt;

/// Failure to evaluate or simplify an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    Syntax(String),
    UnknownName(String),
    UnknownFunction(String),
    DivisionByZero,
    /// The expression cannot be put in polynomial normal form; the checker
    /// falls back to numeric probing when it sees this.
    NotPolynomial(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Syntax(msg) => write!(f, "syntax error: {}", msg),
            EvalError::UnknownName(name) => write!(f, "unknown name: {}", name),
            EvalError::UnknownFunction(name) => write!(f, "unknown function: {}", name),
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::NotPolynomial(msg) => {
                write!(f, "not reducible to polynomial form: {}", msg)
            }
        }
    }
}

impl std::error::Error for EvalError {}

/// Failure to generate a variable binding set for a quiz instance.
#[derive(Debug)]
pub enum GenerateError {
    /// Rejection sampling ran out of attempts for one variable.
    ConstraintUnsatisfiable { name: String, attempts: u32 },
    /// An expression variable references a name declared after it (or never).
    ForwardReference { name: String, referenced: String },
    /// An expression variable failed to evaluate against its bindings.
    Eval { name: String, source: EvalError },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::ConstraintUnsatisfiable { name, attempts } => write!(
                f,
                "no value for '{}' satisfied its constraints after {} attempts",
                name, attempts
            ),
            GenerateError::ForwardReference { name, referenced } => write!(
                f,
                "variable '{}' references '{}', which is not declared before it",
                name, referenced
            ),
            GenerateError::Eval { name, source } => {
                write!(f, "failed to evaluate variable '{}': {}", name, source)
            }
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerateError::Eval { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Failure to render a template against a binding set.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A `{{name}}` placeholder with no binding. Rendering is all-or-nothing;
    /// a partially substituted question is never shown.
    UnknownVariable(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UnknownVariable(name) => {
                write!(f, "template references unknown variable '{}'", name)
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// Failure to build a presentable quiz instance from a record.
#[derive(Debug)]
pub enum InstantiateError {
    Generate(GenerateError),
    Render(RenderError),
}

impl fmt::Display for InstantiateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstantiateError::Generate(e) => e.fmt(f),
            InstantiateError::Render(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for InstantiateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InstantiateError::Generate(e) => Some(e),
            InstantiateError::Render(e) => Some(e),
        }
    }
}

impl From<GenerateError> for InstantiateError {
    fn from(e: GenerateError) -> Self {
        InstantiateError::Generate(e)
    }
}

impl From<RenderError> for InstantiateError {
    fn from(e: RenderError) -> Self {
        InstantiateError::Render(e)
    }
}

/// Registry lookup failures.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    UnknownInstance(u64),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownInstance(id) => {
                write!(f, "no quiz instance with id {}", id)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
