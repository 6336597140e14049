pub mod block_renderer;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod template_renderer;
pub mod value;

pub use context::TemplateContext;
pub use engine::{Engine, RegisteredTemplate, TemplateRepository};
pub use error::{DiagnosticError, EngineError, RenderError};
pub use functions::{BuiltinResolver, Function, FunctionError, Resolver, ValueKind};
pub use value::{Record, Value};
