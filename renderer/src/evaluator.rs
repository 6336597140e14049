use std::borrow::Cow;
use std::cmp::Ordering;

use thicket::expression::{
    BinaryOperator, BindingPath, Expression, Literal, PathRoot, UnaryOperator,
};

use crate::context::TemplateContext;
use crate::error::RenderError;
use crate::functions::FunctionRepository;
use crate::value::Value;

/// Evaluate an expression to a value.
pub fn evaluate(
    expression: &Expression,
    context: &mut TemplateContext<'_>,
    functions: &FunctionRepository,
) -> Result<Value, RenderError> {
    match expression {
        Expression::Literal(literal) => Ok(literal_value(literal)),
        Expression::Path(path) => resolve_path(path, context),
        Expression::FunctionCall { name, arguments } => {
            call_function(name, arguments, context, functions)
        }
        Expression::UnaryOperation { operator, operand } => {
            let value = evaluate(operand, context, functions)?;
            match operator {
                UnaryOperator::LogicalNot => Ok(Value::Boolean(!value.is_truthy())),
            }
        }
        Expression::BinaryOperation {
            operator,
            left,
            right,
        } => {
            let left = evaluate(left, context, functions)?;
            // Short-circuit for logical operators
            match operator {
                BinaryOperator::LogicalAnd if !left.is_truthy() => {
                    return Ok(Value::Boolean(false));
                }
                BinaryOperator::LogicalOr if left.is_truthy() => return Ok(Value::Boolean(true)),
                _ => {}
            }
            let right = evaluate(right, context, functions)?;
            evaluate_binary(*operator, &left, &right)
        }
    }
}

/// Resolve `name`, evaluate the arguments in order and invoke the function.
/// Every call is traced, including calls nested in arguments and conditions.
pub fn call_function(
    name: &str,
    arguments: &[Expression],
    context: &mut TemplateContext<'_>,
    functions: &FunctionRepository,
) -> Result<Value, RenderError> {
    let function = functions.resolve(name)?;
    let values = arguments
        .iter()
        .map(|argument| evaluate(argument, context, functions))
        .collect::<Result<Vec<_>, _>>()?;
    let value = function.invoke(context, values)?;
    context.record(|| format!("{} returned '{}'", name, value));
    Ok(value)
}

/// Resolve a dotted path. Scope paths try variables first, then the model;
/// `$` paths only look at the model.
pub fn resolve_path(path: &BindingPath, context: &TemplateContext<'_>) -> Result<Value, RenderError> {
    let (start, rest) = match (path.root, path.segments.split_first()) {
        (PathRoot::Scope, Some((head, rest))) => match context.lookup(head) {
            Some(value) => (value, rest),
            None => (context.model(), path.segments.as_slice()),
        },
        _ => (context.model(), path.segments.as_slice()),
    };

    let mut current = Cow::Borrowed(start);
    for segment in rest {
        let next = match current {
            Cow::Borrowed(value) => value.member(segment),
            Cow::Owned(value) => value.member(segment).map(|v| Cow::Owned(v.into_owned())),
        };
        current = next.ok_or_else(|| RenderError::UnresolvedBinding {
            path: path.to_string(),
            segment: segment.clone(),
        })?;
    }
    Ok(current.into_owned())
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Integer(n) => Value::Integer(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::Text(s) => Value::Text(s.clone()),
    }
}

fn evaluate_binary(operator: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RenderError> {
    let result = match operator {
        BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => right.is_truthy(),
        BinaryOperator::Equality => values_equal(left, right),
        BinaryOperator::Inequality => !values_equal(left, right),
        BinaryOperator::GreaterThan => compare(left, right)? == Ordering::Greater,
        BinaryOperator::LessThan => compare(left, right)? == Ordering::Less,
        BinaryOperator::GreaterThanOrEqual => compare(left, right)? != Ordering::Less,
        BinaryOperator::LessThanOrEqual => compare(left, right)? != Ordering::Greater,
    };
    Ok(Value::Boolean(result))
}

/// Equality with integers and floats compared numerically.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, RenderError> {
    let ordering = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    ordering.ok_or_else(|| RenderError::TypeError {
        expected: "two comparable values".into(),
        got: format!("{} and {}", left.type_name(), right.type_name()),
    })
}
