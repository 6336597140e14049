use crate::evaluator::values_equal;
use crate::functions::{Function, FunctionError, ValueKind, any_arg, sequence_arg, text_arg};
use crate::value::Value;

pub fn functions() -> Vec<Function> {
    vec![
        Function::new("Count", "Counts the items in a collection or characters in text.", |_, args| {
            let count = match any_arg(args, 0)? {
                Value::Null => 0,
                Value::Sequence(items) => items.len(),
                Value::Mapping(map) => map.len(),
                Value::Text(text) => text.chars().count(),
                other => {
                    return Err(FunctionError::InvalidArgument(format!(
                        "cannot count a {}",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Integer(count as i64))
        })
        .required("Collection", "The collection to count.", ValueKind::Any),
        Function::new("Join", "Joins the items of a sequence with a separator.", |_, args| {
            let items = sequence_arg(args, 0)?;
            let separator = text_arg(args, 1)?;
            let parts: Vec<String> = items.iter().map(Value::to_string).collect();
            Ok(Value::Text(parts.join(separator)))
        })
        .required("Items", "The sequence to join.", ValueKind::Sequence)
        .optional("Separator", "Placed between items.", ValueKind::Text, ", "),
        Function::new("Contains", "Checks whether a collection or text contains a value.", |_, args| {
            let needle = any_arg(args, 1)?;
            let found = match any_arg(args, 0)? {
                Value::Null => false,
                Value::Sequence(items) => items.iter().any(|item| values_equal(item, needle)),
                Value::Mapping(map) => needle.as_str().is_some_and(|key| map.contains_key(key)),
                Value::Text(text) => text.contains(needle.to_string().as_str()),
                other => {
                    return Err(FunctionError::InvalidArgument(format!(
                        "cannot search a {}",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Boolean(found))
        })
        .required("Collection", "The sequence, mapping or text to search.", ValueKind::Any)
        .required("Value", "The value to look for.", ValueKind::Any),
    ]
}
