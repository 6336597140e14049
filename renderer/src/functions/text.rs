use crate::functions::{Function, FunctionError, ValueKind, integer_arg, text_arg};
use crate::value::Value;

pub fn functions() -> Vec<Function> {
    vec![
        Function::new("ToUpper", "Converts text to upper case.", |_, args| {
            Ok(Value::Text(text_arg(args, 0)?.to_uppercase()))
        })
        .required("Text", "The text to convert.", ValueKind::Text),
        Function::new("ToLower", "Converts text to lower case.", |_, args| {
            Ok(Value::Text(text_arg(args, 0)?.to_lowercase()))
        })
        .required("Text", "The text to convert.", ValueKind::Text),
        Function::new("Replace", "Replaces every occurrence of a value.", |_, args| {
            let text = text_arg(args, 0)?;
            let find = text_arg(args, 1)?;
            let replacement = text_arg(args, 2)?;
            if find.is_empty() {
                return Ok(Value::from(text));
            }
            Ok(Value::Text(text.replace(find, replacement)))
        })
        .required("Text", "The original text.", ValueKind::Text)
        .required("Find", "The text to find.", ValueKind::Text)
        .required("Replacement", "The replacement text.", ValueKind::Text),
        Function::new("Truncate", "Shortens text to a maximum number of characters.", |_, args| {
            let text = text_arg(args, 0)?;
            let length = usize::try_from(integer_arg(args, 1)?).map_err(|_| {
                FunctionError::InvalidArgument("length must not be negative".into())
            })?;
            let suffix = text_arg(args, 2)?;
            if text.chars().count() <= length {
                return Ok(Value::from(text));
            }
            let mut truncated: String = text.chars().take(length).collect();
            truncated.push_str(suffix);
            Ok(Value::Text(truncated))
        })
        .required("Text", "The text to truncate.", ValueKind::Text)
        .required("Length", "The maximum number of characters.", ValueKind::Integer)
        .optional("Suffix", "Appended when the text is shortened.", ValueKind::Text, ""),
        Function::new("Concat", "Joins two values as text.", |_, args| {
            Ok(Value::Text(format!("{}{}", text_arg(args, 0)?, text_arg(args, 1)?)))
        })
        .required("First", "The first value.", ValueKind::Text)
        .required("Second", "The second value.", ValueKind::Text),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TemplateContext;
    use crate::error::RenderError;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, RenderError> {
        let model = Value::Null;
        let context = TemplateContext::new(&model, &[]);
        functions()
            .into_iter()
            .find(|f| f.name == name)
            .expect("no such function")
            .invoke(&context, args)
    }

    #[test]
    fn case_conversion() {
        assert_eq!(call("ToUpper", vec!["straße".into()]), Ok(Value::from("STRASSE")));
        assert_eq!(call("ToLower", vec!["ABC".into()]), Ok(Value::from("abc")));
    }

    #[test]
    fn replace_all_occurrences() {
        assert_eq!(
            call("Replace", vec!["a-b-c".into(), "-".into(), "+".into()]),
            Ok(Value::from("a+b+c"))
        );
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(
            call("Truncate", vec!["héllo world".into(), 5.into(), "…".into()]),
            Ok(Value::from("héllo…"))
        );
        assert_eq!(call("Truncate", vec!["short".into(), 10.into()]), Ok(Value::from("short")));
        assert!(call("Truncate", vec!["x".into(), (-1).into()]).is_err());
    }

    #[test]
    fn concat_coerces_scalars() {
        assert_eq!(call("Concat", vec!["n=".into(), 3.into()]), Ok(Value::from("n=3")));
    }
}
