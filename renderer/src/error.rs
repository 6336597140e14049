use std::ops::Range;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use thicket::ParseError;

use crate::functions::FunctionError;

/// Errors that abort a render.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("unresolved binding: '{path}' has no value for '{segment}'")]
    UnresolvedBinding { path: String, segment: String },
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("{function} expects {expected} argument(s), got {got}")]
    ArgumentCount {
        function: String,
        expected: String,
        got: usize,
    },
    #[error("{function}: parameter '{parameter}' expects {expected}, got {got}")]
    ArgumentType {
        function: String,
        parameter: String,
        expected: String,
        got: String,
    },
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("variable '{0}' is already declared in this scope")]
    DuplicateVariable(String),
    #[error("type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("partial nesting exceeds {0} levels")]
    RecursionLimit(usize),
    #[error("{function} failed: {source}")]
    Function {
        function: String,
        source: FunctionError,
    },
}

/// A render error enriched with source location information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error}")]
pub struct DiagnosticError {
    pub error: RenderError,
    pub span: Option<Range<usize>>,
    pub source_id: usize,
}

impl DiagnosticError {
    pub fn at(error: RenderError, span: Range<usize>, source_id: usize) -> Self {
        DiagnosticError {
            error,
            span: Some(span),
            source_id,
        }
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let diagnostic = Diagnostic::error().with_message(self.error.to_string());
        match &self.span {
            Some(span) => diagnostic.with_labels(vec![Label::primary(self.source_id, span.clone())]),
            None => diagnostic,
        }
    }
}

impl From<RenderError> for DiagnosticError {
    fn from(error: RenderError) -> Self {
        DiagnosticError {
            error,
            span: None,
            source_id: 0,
        }
    }
}

/// Errors raised while configuring an [`Engine`](crate::Engine).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("a function named '{0}' is already registered")]
    DuplicateFunction(String),
    #[error("a template named '{0}' is already registered")]
    DuplicateTemplate(String),
    #[error("template '{name}' failed to compile: {source}")]
    TemplateParse { name: String, source: ParseError },
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
