use crate::functions::{Function, FunctionError, ValueKind, integer_arg, number_arg};
use crate::value::Value;

pub fn functions() -> Vec<Function> {
    vec![
        binary("Add", "Adds two numbers.", |a, b| Ok(a + b)),
        binary("Subtract", "Subtracts the second number from the first.", |a, b| {
            Ok(a - b)
        }),
        binary("Multiply", "Multiplies two numbers.", |a, b| Ok(a * b)),
        binary("Divide", "Divides two numbers.", |a, b| {
            if b == 0.0 {
                return Err(FunctionError::DivisionByZero);
            }
            Ok(a / b)
        }),
        Function::new("Round", "Rounds a number to a number of decimal places.", |_, args| {
            let number = number_arg(args, 0)?;
            let decimals = integer_arg(args, 1)?;
            let decimals = i32::try_from(decimals)
                .ok()
                .filter(|d| (0..=15).contains(d))
                .ok_or_else(|| {
                    FunctionError::InvalidArgument("decimals must be between 0 and 15".into())
                })?;
            let factor = 10f64.powi(decimals);
            Ok(Value::number((number * factor).round() / factor))
        })
        .required("Number", "The number to round.", ValueKind::Number)
        .optional("Decimals", "The number of decimal places.", ValueKind::Integer, 0),
    ]
}

fn binary(
    name: &str,
    description: &str,
    op: fn(f64, f64) -> Result<f64, FunctionError>,
) -> Function {
    Function::new(name, description, move |_, args| {
        let result = op(number_arg(args, 0)?, number_arg(args, 1)?)?;
        if !result.is_finite() {
            return Err(FunctionError::OutOfRange);
        }
        Ok(Value::number(result))
    })
    .required("NumberOne", "The first number.", ValueKind::Number)
    .required("NumberTwo", "The second number.", ValueKind::Number)
}
