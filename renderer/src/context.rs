use std::collections::HashMap;
use std::time::Duration;

use thicket::TemplateFlag;

use crate::error::RenderError;
use crate::value::Value;

/// Per-render state: the model, a stack of variable scopes and the debug trace.
///
/// The root scope always exists; nested scopes are pushed for loop items and
/// partials and popped when they finish rendering.
#[derive(Debug)]
pub struct TemplateContext<'a> {
    model: &'a Value,
    scopes: Vec<HashMap<String, Value>>,
    flags: Vec<TemplateFlag>,
    trace: Vec<String>,
}

impl<'a> TemplateContext<'a> {
    pub fn new(model: &'a Value, flags: &[TemplateFlag]) -> Self {
        TemplateContext {
            model,
            scopes: vec![HashMap::new()],
            flags: flags.to_vec(),
            trace: Vec::new(),
        }
    }

    pub fn model(&self) -> &'a Value {
        self.model
    }

    pub fn is_flag_set(&self, flag: TemplateFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Find a variable, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Bind a new variable in the innermost scope.
    pub fn declare(&mut self, name: &str, value: Value) -> Result<(), RenderError> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(RenderError::UndefinedVariable(name.to_string()));
        };
        if scope.contains_key(name) {
            return Err(RenderError::DuplicateVariable(name.to_string()));
        }
        scope.insert(name.to_string(), value);
        Ok(())
    }

    /// Update the nearest scope that holds `name`.
    pub fn reassign(&mut self, name: &str, value: Value) -> Result<(), RenderError> {
        match self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
        {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RenderError::UndefinedVariable(name.to_string())),
        }
    }

    /// Record a trace entry; ignored unless debug mode is on.
    pub fn record(&mut self, entry: impl FnOnce() -> String) {
        if self.is_flag_set(TemplateFlag::DebugMode) {
            self.trace.push(entry());
        }
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub fn debug_info(&self, elapsed: Duration) -> String {
        let mut info = format!("Debug Info\nRender time: {:.3}ms", elapsed.as_secs_f64() * 1000.0);
        if !self.trace.is_empty() {
            info.push_str("\nTrace:");
            for entry in &self.trace {
                info.push_str("\n- ");
                info.push_str(entry);
            }
        }
        info
    }
}
