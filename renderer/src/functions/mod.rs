pub mod collections;
pub mod datetime;
pub mod math;
pub mod text;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::context::TemplateContext;
use crate::error::{EngineError, RenderError};
use crate::value::{Value, parse_datetime};

/// A function body: validated argument values in, result out.
pub type Handler =
    dyn Fn(&TemplateContext<'_>, &[Value]) -> Result<Value, FunctionError> + Send + Sync;

/// Failures raised by a function body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FunctionError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is out of range")]
    OutOfRange,
    #[error("{0}")]
    InvalidArgument(String),
}

/// The kind a parameter's argument is coerced to before the body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Any,
    Boolean,
    Integer,
    Number,
    Text,
    DateTime,
    Sequence,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Any => "Any",
            ValueKind::Boolean => "Boolean",
            ValueKind::Integer => "Integer",
            ValueKind::Number => "Number",
            ValueKind::Text => "Text",
            ValueKind::DateTime => "DateTime",
            ValueKind::Sequence => "Sequence",
        }
    }

    /// Convert `value` to this kind, or `None` when it cannot be.
    pub fn coerce(self, value: Value) -> Option<Value> {
        match (self, value) {
            (ValueKind::Any, value) => Some(value),

            (ValueKind::Boolean, Value::Boolean(b)) => Some(Value::Boolean(b)),
            (ValueKind::Boolean, Value::Text(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(Value::Boolean(true)),
                "false" => Some(Value::Boolean(false)),
                _ => None,
            },

            (ValueKind::Integer, Value::Integer(n)) => Some(Value::Integer(n)),
            (ValueKind::Integer, Value::Float(n)) if n.fract() == 0.0 && n.is_finite() => {
                Some(Value::Integer(n as i64))
            }
            (ValueKind::Integer, Value::Text(s)) => s.trim().parse().ok().map(Value::Integer),

            (ValueKind::Number, value @ (Value::Integer(_) | Value::Float(_))) => Some(value),
            (ValueKind::Number, Value::Text(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Value::Integer)
                    .or_else(|_| s.parse::<f64>().map(Value::Float))
                    .ok()
            }

            (ValueKind::Text, Value::Text(s)) => Some(Value::Text(s)),
            (
                ValueKind::Text,
                value @ (Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::DateTime(_)),
            ) => Some(Value::Text(value.to_string())),

            (ValueKind::DateTime, Value::DateTime(dt)) => Some(Value::DateTime(dt)),
            (ValueKind::DateTime, Value::Text(s)) => parse_datetime(&s).map(Value::DateTime),

            (ValueKind::Sequence, Value::Sequence(items)) => Some(Value::Sequence(items)),

            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    pub name: String,
    pub description: String,
    pub kind: ValueKind,
    /// `None` for required parameters.
    pub default: Option<Value>,
}

impl ParameterDefinition {
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A named function callable from templates.
#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDefinition>,
    handler: Arc<Handler>,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl Function {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&TemplateContext<'_>, &[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Function {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn required(mut self, name: &str, description: &str, kind: ValueKind) -> Self {
        self.parameters.push(ParameterDefinition {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            default: None,
        });
        self
    }

    pub fn optional(
        mut self,
        name: &str,
        description: &str,
        kind: ValueKind,
        default: impl Into<Value>,
    ) -> Self {
        self.parameters.push(ParameterDefinition {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            default: Some(default.into()),
        });
        self
    }

    pub fn required_count(&self) -> usize {
        self.parameters.iter().filter(|p| p.is_required()).count()
    }

    /// `name(a, b, [c])`
    pub fn signature(&self) -> String {
        let parameters: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                if p.is_required() {
                    format!("{}: {}", p.name, p.kind.name())
                } else {
                    format!("[{}: {}]", p.name, p.kind.name())
                }
            })
            .collect();
        format!("{}({})", self.name, parameters.join(", "))
    }

    /// Validate and coerce `arguments`, then run the body.
    pub fn invoke(
        &self,
        context: &TemplateContext<'_>,
        arguments: Vec<Value>,
    ) -> Result<Value, RenderError> {
        let required = self.required_count();
        if arguments.len() < required || arguments.len() > self.parameters.len() {
            let expected = if required == self.parameters.len() {
                required.to_string()
            } else {
                format!("{} to {}", required, self.parameters.len())
            };
            return Err(RenderError::ArgumentCount {
                function: self.name.clone(),
                expected,
                got: arguments.len(),
            });
        }

        let mut values = Vec::with_capacity(self.parameters.len());
        let mut supplied = arguments.into_iter();
        for parameter in &self.parameters {
            let value = match supplied.next() {
                Some(value) => value,
                None => parameter.default.clone().unwrap_or_default(),
            };
            let got = value.type_name();
            let Some(coerced) = parameter.kind.coerce(value) else {
                return Err(RenderError::ArgumentType {
                    function: self.name.clone(),
                    parameter: parameter.name.clone(),
                    expected: parameter.kind.name().to_string(),
                    got: got.to_string(),
                });
            };
            values.push(coerced);
        }

        (self.handler)(context, &values).map_err(|source| RenderError::Function {
            function: self.name.clone(),
            source,
        })
    }
}

/// Registered functions, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct FunctionRepository {
    functions: HashMap<String, Function>,
}

impl FunctionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: Function) -> Result<(), EngineError> {
        let key = function.name.to_lowercase();
        if self.functions.contains_key(&key) {
            return Err(EngineError::DuplicateFunction(function.name));
        }
        self.functions.insert(key, function);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&Function, RenderError> {
        self.functions
            .get(&name.to_lowercase())
            .ok_or_else(|| RenderError::UnknownFunction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// All functions, sorted by name.
    pub fn all(&self) -> Vec<&Function> {
        let mut functions: Vec<&Function> = self.functions.values().collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        functions
    }
}

/// A source of functions to register with an engine.
pub trait Resolver {
    fn name(&self) -> &str;
    fn functions(&self) -> Vec<Function>;
}

/// The built-in function library.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinResolver;

impl Resolver for BuiltinResolver {
    fn name(&self) -> &str {
        "builtin"
    }

    fn functions(&self) -> Vec<Function> {
        let mut functions = math::functions();
        functions.extend(datetime::functions());
        functions.extend(text::functions());
        functions.extend(collections::functions());
        functions
    }
}

// Accessors for coerced arguments. Coercion already guarantees the kind, so
// a mismatch here means a parameter was declared with the wrong kind.

fn mismatch(index: usize, expected: &str) -> FunctionError {
    FunctionError::InvalidArgument(format!("argument {} is not {}", index + 1, expected))
}

pub(crate) fn number_arg(args: &[Value], index: usize) -> Result<f64, FunctionError> {
    args.get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| mismatch(index, "a number"))
}

pub(crate) fn integer_arg(args: &[Value], index: usize) -> Result<i64, FunctionError> {
    match args.get(index) {
        Some(Value::Integer(n)) => Ok(*n),
        _ => Err(mismatch(index, "an integer")),
    }
}

pub(crate) fn text_arg(args: &[Value], index: usize) -> Result<&str, FunctionError> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| mismatch(index, "text"))
}

pub(crate) fn datetime_arg(args: &[Value], index: usize) -> Result<NaiveDateTime, FunctionError> {
    match args.get(index) {
        Some(Value::DateTime(dt)) => Ok(*dt),
        _ => Err(mismatch(index, "a date and time")),
    }
}

pub(crate) fn sequence_arg(args: &[Value], index: usize) -> Result<&[Value], FunctionError> {
    match args.get(index) {
        Some(Value::Sequence(items)) => Ok(items),
        _ => Err(mismatch(index, "a sequence")),
    }
}

pub(crate) fn any_arg(args: &[Value], index: usize) -> Result<&Value, FunctionError> {
    args.get(index)
        .ok_or_else(|| FunctionError::InvalidArgument(format!("argument {} is missing", index + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> Function {
        Function::new("Echo", "Returns its first argument.", |_, args| {
            Ok(args[0].clone())
        })
        .required("Value", "The value.", ValueKind::Integer)
        .optional("Suffix", "Ignored.", ValueKind::Text, "")
    }

    #[test]
    fn argument_count_is_checked() {
        let model = Value::Null;
        let context = TemplateContext::new(&model, &[]);
        let err = echo().invoke(&context, Vec::new()).unwrap_err();
        assert!(matches!(err, RenderError::ArgumentCount { got: 0, .. }));
        let err = echo()
            .invoke(&context, vec![1.into(), "a".into(), "b".into()])
            .unwrap_err();
        assert!(matches!(err, RenderError::ArgumentCount { got: 3, .. }));
    }

    #[test]
    fn arguments_are_coerced() {
        let model = Value::Null;
        let context = TemplateContext::new(&model, &[]);
        assert_eq!(echo().invoke(&context, vec!["12".into()]), Ok(Value::Integer(12)));
        let err = echo().invoke(&context, vec!["twelve".into()]).unwrap_err();
        assert!(matches!(err, RenderError::ArgumentType { ref parameter, .. } if parameter == "Value"));
    }

    #[test]
    fn repository_is_case_insensitive() {
        let mut repository = FunctionRepository::new();
        repository.register(echo()).unwrap();
        assert!(repository.resolve("ECHO").is_ok());
        let err = repository
            .register(Function::new("echo", "", |_, _| Ok(Value::Null)))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateFunction(_)));
        assert!(matches!(
            repository.resolve("Missing"),
            Err(RenderError::UnknownFunction(_))
        ));
    }

    #[test]
    fn signature_marks_optional_parameters() {
        assert_eq!(echo().signature(), "Echo(Value: Integer, [Suffix: Text])");
    }

    #[test]
    fn builtin_names_are_unique() {
        let mut repository = FunctionRepository::new();
        for function in BuiltinResolver.functions() {
            repository.register(function).unwrap();
        }
        assert_eq!(repository.len(), 17);
    }
}
