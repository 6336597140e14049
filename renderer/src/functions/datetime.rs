use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDateTime, TimeDelta};

use crate::functions::{Function, FunctionError, ValueKind, datetime_arg, number_arg, text_arg};
use crate::value::Value;

const MILLIS_PER_MINUTE: f64 = 60_000.0;
const MILLIS_PER_HOUR: f64 = 3_600_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

pub fn functions() -> Vec<Function> {
    vec![
        adder("AddHours", "Adds whole and fractional hours to a date and time.", "Hours", MILLIS_PER_HOUR),
        adder("AddDays", "Adds whole and fractional days to a date and time.", "Days", MILLIS_PER_DAY),
        adder(
            "AddMinutes",
            "Adds whole and fractional minutes to a date and time.",
            "Minutes",
            MILLIS_PER_MINUTE,
        ),
        Function::new("FormatDate", "Formats a date and time with a strftime pattern.", |_, args| {
            let date = datetime_arg(args, 0)?;
            let format = text_arg(args, 1)?;
            format_date(date, format).map(Value::Text)
        })
        .required("Date", "The date and time to format.", ValueKind::DateTime)
        .required("Format", "The strftime format, e.g. %d/%m/%Y.", ValueKind::Text),
    ]
}

fn adder(name: &str, description: &str, unit: &str, millis_per_unit: f64) -> Function {
    Function::new(name, description, move |_, args| {
        let date = datetime_arg(args, 0)?;
        let amount = number_arg(args, 1)?;
        add_millis(date, amount * millis_per_unit).map(Value::DateTime)
    })
    .required("Date", "The date and time to adjust.", ValueKind::DateTime)
    .required(unit, "The amount to add; may be negative or fractional.", ValueKind::Number)
}

/// Calendar-exact addition, rounded to the nearest millisecond.
fn add_millis(date: NaiveDateTime, millis: f64) -> Result<NaiveDateTime, FunctionError> {
    let millis = millis.round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return Err(FunctionError::OutOfRange);
    }
    TimeDelta::try_milliseconds(millis as i64)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or(FunctionError::OutOfRange)
}

fn format_date(date: NaiveDateTime, format: &str) -> Result<String, FunctionError> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(FunctionError::InvalidArgument(format!(
            "invalid date format '{}'",
            format
        )));
    }
    let mut output = String::new();
    write!(output, "{}", date.format_with_items(items.into_iter()))
        .map_err(|_| FunctionError::InvalidArgument(format!("cannot format date with '{}'", format)))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TemplateContext;
    use crate::error::RenderError;
    use crate::value::parse_datetime;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, RenderError> {
        let model = Value::Null;
        let context = TemplateContext::new(&model, &[]);
        functions()
            .into_iter()
            .find(|f| f.name == name)
            .expect("no such function")
            .invoke(&context, args)
    }

    fn at(text: &str) -> Value {
        Value::DateTime(parse_datetime(text).expect("bad datetime"))
    }

    #[test]
    fn add_fractional_hours() {
        assert_eq!(
            call("AddHours", vec![at("2024-01-01T00:00:00"), 1.5.into()]),
            Ok(at("2024-01-01T01:30:00"))
        );
    }

    #[test]
    fn add_hours_carries_across_year_boundary() {
        assert_eq!(
            call("AddHours", vec![at("2023-12-31T23:00:00"), 2.into()]),
            Ok(at("2024-01-01T01:00:00"))
        );
        assert_eq!(
            call("AddHours", vec!["2024-03-01T00:00:00".into(), (-24).into()]),
            Ok(at("2024-02-29T00:00:00"))
        );
    }

    #[test]
    fn add_days_and_minutes() {
        assert_eq!(
            call("AddDays", vec![at("2024-02-28"), 2.into()]),
            Ok(at("2024-03-01T00:00:00"))
        );
        assert_eq!(
            call("AddMinutes", vec![at("2024-01-01T00:00:00"), 0.5.into()]),
            Ok(at("2024-01-01T00:00:30"))
        );
    }

    #[test]
    fn out_of_range_is_function_error() {
        assert!(matches!(
            call("AddDays", vec![at("2024-01-01"), 1e18.into()]),
            Err(RenderError::Function {
                source: FunctionError::OutOfRange,
                ..
            })
        ));
    }

    #[test]
    fn format_date() {
        assert_eq!(
            call("FormatDate", vec![at("2024-07-04T09:05:00"), "%d/%m/%Y %H:%M".into()]),
            Ok(Value::from("04/07/2024 09:05"))
        );
        assert!(call("FormatDate", vec![at("2024-07-04"), "%Q".into()]).is_err());
    }
}
