pub mod binding;
pub mod checker;
pub mod engine;
pub mod error;
pub mod generator;
pub mod registry;
pub mod render;

pub use binding::{Bindings, BoundValue};
pub use checker::{EquivalenceResult, Outcome, check_submission};
pub use engine::{AlgebraEngine, ExpressionEngine};
pub use error::{EvalError, GenerateError, InstantiateError, RegistryError, RenderError};
pub use generator::{generate, generate_seeded};
pub use registry::{InstanceId, InstanceRegistry, QuizInstance};
pub use render::{render_display, render_expression};
