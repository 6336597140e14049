use std::fs;

use renderer::{
    BuiltinResolver, DiagnosticError, Engine, EngineError, Function, Record, RenderError, Value,
    ValueKind,
};
use thicket::ParseErrorKind;

fn engine() -> Engine {
    Engine::with_resolvers(&[&BuiltinResolver]).expect("builtins registered twice")
}

fn run_with(engine: &Engine, source: &str, model: &Value) -> Result<String, DiagnosticError> {
    let template = engine.compile(source).expect("parse failed");
    engine.render(&template, model)
}

fn run(source: &str, model: &Value) -> String {
    run_with(&engine(), source, model).expect("render failed")
}

fn run_err(source: &str, model: &Value) -> DiagnosticError {
    run_with(&engine(), source, model).expect_err("expected a render error")
}

fn json(text: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(text)
        .expect("bad json")
        .into()
}

#[test]
fn literal_text_passes_through() {
    assert_eq!(run("Hello, world", &Value::Null), "Hello, world");
}

#[test]
fn model_bindings() {
    let model = json(r#"{ "Name": "Ada", "Order": { "Lines": [ { "Price": 9.5 } ] } }"#);
    assert_eq!(run("Hi {{Name}}!", &model), "Hi Ada!");
    assert_eq!(run("{{Order.Lines.0.Price}}", &model), "9.5");
    assert_eq!(run("{{Order.Lines.Count}}", &model), "1");
}

#[test]
fn comments_and_directives_render_nothing() {
    assert_eq!(run("a{{! hidden }}b", &Value::Null), "ab");
}

#[test]
fn each_renders_item_per_element() {
    let source = "{{each x in items}}A{{empty}}B{{/each}}";
    assert_eq!(run(source, &json(r#"{ "items": [1, 2, 3] }"#)), "AAA");
    assert_eq!(run(source, &json(r#"{ "items": [] }"#)), "B");
    assert_eq!(run(source, &json(r#"{ "items": null }"#)), "B");
}

#[test]
fn each_binds_item_and_index() {
    let model = json(r#"{ "names": ["a", "b"] }"#);
    assert_eq!(
        run("{{each n, i in names}}{{i}}={{n}};{{/each}}", &model),
        "0=a;1=b;"
    );
}

#[test]
fn each_over_mapping_yields_key_value_records() {
    let model = json(r#"{ "prices": { "apple": 1, "pear": 2 } }"#);
    assert_eq!(
        run("{{each p in prices}}{{p.Key}}:{{p.Value}} {{/each}}", &model),
        "apple:1 pear:2 "
    );
}

#[test]
fn loop_variables_do_not_leak() {
    let err = run_err("{{each x in xs}}{{/each}}{{x}}", &json(r#"{ "xs": [1] }"#));
    assert!(matches!(err.error, RenderError::UnresolvedBinding { .. }));
}

#[test]
fn conditionals() {
    assert_eq!(run("{{if false}}A{{else}}B{{/if}}", &Value::Null), "B");
    assert_eq!(
        run("{{if true}}A{{elseif true}}B{{else}}C{{/if}}", &Value::Null),
        "A"
    );
    assert_eq!(run("{{if false}}A{{elseif 1 < 2}}B{{/if}}", &Value::Null), "B");
    assert_eq!(run("{{if false}}A{{/if}}", &Value::Null), "");
}

#[test]
fn nested_conditionals() {
    let model = json(r#"{ "a": true, "b": false }"#);
    assert_eq!(
        run("{{if a}}[{{if b}}x{{else}}y{{/if}}]{{else}}z{{/if}}", &model),
        "[y]"
    );
}

#[test]
fn condition_operators() {
    let model = json(r#"{ "count": 3, "name": "Ada" }"#);
    assert_eq!(
        run("{{if count > 2 && name == 'Ada'}}yes{{/if}}", &model),
        "yes"
    );
    assert_eq!(run("{{if (!(count >= 3)) || false}}yes{{else}}no{{/if}}", &model), "no");
}

#[test]
fn divide_results() {
    assert_eq!(run("{{Divide(10, 2)}}", &Value::Null), "5");
    let third: f64 = run("{{Divide(1, 3)}}", &Value::Null)
        .parse()
        .expect("not a number");
    assert!((third - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn add_fractional_hours() {
    let model = json(r#"{ "start": "2024-01-01T00:00:00" }"#);
    assert_eq!(run("{{AddHours(start, 1.5)}}", &model), "2024-01-01T01:30:00");
}

#[test]
fn function_names_are_case_insensitive() {
    assert_eq!(run("{{toupper('abc')}}", &Value::Null), "ABC");
}

#[test]
fn nested_calls_and_formatting() {
    let model = json(r#"{ "when": "2024-07-04T09:00:00" }"#);
    assert_eq!(
        run("{{FormatDate(AddDays(when, 1), '%Y/%m/%d')}}", &model),
        "2024/07/05"
    );
    assert_eq!(
        run("{{Join(names, ' & ')}}", &json(r#"{ "names": ["a", "b"] }"#)),
        "a & b"
    );
}

#[test]
fn variables_declare_and_reassign() {
    assert_eq!(
        run("{{var n = 1}}{{reassign n = Add(n, 1)}}{{n}}", &Value::Null),
        "2"
    );
    assert_eq!(
        run(
            "{{var total = 0}}{{each x in xs}}{{reassign total = Add(total, x)}}{{/each}}{{total}}",
            &json(r#"{ "xs": [1, 2, 3] }"#)
        ),
        "6"
    );
}

#[test]
fn variable_errors() {
    let err = run_err("{{var n = 1}}{{var n = 2}}", &Value::Null);
    assert_eq!(err.error, RenderError::DuplicateVariable("n".into()));
    assert_eq!(err.span, Some(13..26));

    let err = run_err("{{reassign m = 1}}", &Value::Null);
    assert_eq!(err.error, RenderError::UndefinedVariable("m".into()));
}

#[test]
fn render_error_kinds() {
    let model = json(r#"{ "n": true }"#);
    assert!(matches!(
        run_err("{{Missing}}", &model).error,
        RenderError::UnresolvedBinding { .. }
    ));
    assert!(matches!(
        run_err("{{Nope(1)}}", &model).error,
        RenderError::UnknownFunction(_)
    ));
    assert!(matches!(
        run_err("{{Add(1)}}", &model).error,
        RenderError::ArgumentCount { .. }
    ));
    assert!(matches!(
        run_err("{{Add('x', 1)}}", &model).error,
        RenderError::ArgumentType { .. }
    ));
    assert!(matches!(
        run_err("{{each x in n}}{{/each}}", &model).error,
        RenderError::TypeError { .. }
    ));
    assert!(matches!(
        run_err("{{Divide(1, 0)}}", &model).error,
        RenderError::Function { .. }
    ));
    assert!(matches!(
        run_err("{{> missing}}", &model).error,
        RenderError::UnknownTemplate(_)
    ));
}

#[test]
fn errors_inside_sections_point_at_the_failing_block() {
    let source = "ok {{if true}}{{Missing}}{{/if}}";
    let err = run_err(source, &Value::Null);
    assert_eq!(err.span, Some(14..25));
    assert_eq!(err.source_id, 0);
}

#[test]
fn unterminated_block_reports_input_length() {
    let source = "{{if true}}A";
    let err = engine().compile(source).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnterminatedBlock);
    assert_eq!(err.offset(), source.len());
}

#[test]
fn one_template_two_models() {
    let engine = engine();
    let template = engine
        .compile("{{@debug}}{{var x = n}}{{x}}")
        .expect("parse failed");
    let first = engine.render(&template, &json(r#"{ "n": 1 }"#)).unwrap();
    let second = engine.render(&template, &json(r#"{ "n": 2 }"#)).unwrap();

    let (body, info) = first.split_once("\n\n").expect("no debug section");
    assert_eq!(body, "1");
    assert!(info.ends_with("Trace:\n- declared x = '1'"));

    let (body, info) = second.split_once("\n\n").expect("no debug section");
    assert_eq!(body, "2");
    assert!(info.ends_with("Trace:\n- declared x = '2'"));
    assert_eq!(info.matches("\n- ").count(), 1);
}

#[test]
fn failed_render_leaves_template_usable() {
    let engine = engine();
    let template = engine.compile("{{Name}}").expect("parse failed");
    assert!(engine.render(&template, &Value::Null).is_err());
    assert_eq!(
        engine.render(&template, &json(r#"{ "Name": "ok" }"#)).unwrap(),
        "ok"
    );
}

#[test]
fn duplicate_function_names_differ_only_by_case() {
    let mut engine = Engine::new();
    let first = Function::new("Greet", "", |_, _| Ok(Value::from("hi")));
    let second = Function::new("GREET", "", |_, _| Ok(Value::from("HI")));
    engine.register_function(first).unwrap();
    assert!(matches!(
        engine.register_function(second),
        Err(EngineError::DuplicateFunction(_))
    ));
}

#[test]
fn custom_functions_see_the_model() {
    let mut engine = engine();
    engine
        .register_function(
            Function::new("Greeting", "Greets the model's user.", |context, args| {
                let user = context
                    .model()
                    .member("User")
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                Ok(Value::Text(format!("{}, {}", args[0], user)))
            })
            .required("Salutation", "", ValueKind::Text),
        )
        .unwrap();
    let model = json(r#"{ "User": "Ada" }"#);
    assert_eq!(
        run_with(&engine, "{{Greeting('Hi')}}", &model).unwrap(),
        "Hi, Ada"
    );
}

#[test]
fn record_models() {
    let model: Value = Record::new("Invoice")
        .with_field("Number", 42)
        .with_field("Paid", false)
        .into();
    assert_eq!(
        run("#{{Number}} {{if Paid}}paid{{else}}due{{/if}}", &model),
        "#42 due"
    );
}

#[test]
fn partials_share_model_and_scope_chain() {
    let mut engine = engine();
    engine
        .register_template("greeting", "Hello {{Name}}{{var local = 1}}")
        .unwrap();
    let model = json(r#"{ "Name": "Ada" }"#);
    assert_eq!(
        run_with(&engine, "[{{> greeting}}][{{> Greeting}}]", &model).unwrap(),
        "[Hello Ada][Hello Ada]"
    );
}

#[test]
fn partial_errors_carry_the_partial_source_id() {
    let mut engine = engine();
    engine.register_template("bad", "x{{Missing}}").unwrap();
    let err = run_with(&engine, "{{> bad}}", &Value::Null).unwrap_err();
    assert_eq!(err.source_id, 1);
    assert_eq!(err.span, Some(1..12));
}

#[test]
fn recursive_partials_hit_the_depth_limit() {
    let mut engine = engine();
    engine.register_template("loop", "{{> loop}}").unwrap();
    let err = run_with(&engine, "{{> loop}}", &Value::Null).unwrap_err();
    assert!(matches!(err.error, RenderError::RecursionLimit(_)));
}

#[test]
fn register_directory_names_by_relative_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("shared")).unwrap();
    fs::write(dir.path().join("shared/header.thicket"), "<h1>{{Title}}</h1>").unwrap();
    fs::write(dir.path().join("footer.thicket"), "bye").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let mut engine = engine();
    assert_eq!(engine.register_directory(dir.path()).unwrap(), 2);
    let model = json(r#"{ "Title": "T" }"#);
    assert_eq!(
        run_with(&engine, "{{> shared/header}}{{> footer}}", &model).unwrap(),
        "<h1>T</h1>bye"
    );
}

#[test]
fn register_directory_reports_template_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.thicket"), "{{each x}}").unwrap();
    let err = engine().register_directory(dir.path()).unwrap_err();
    assert!(matches!(err, EngineError::TemplateParse { ref name, .. } if name == "broken"));
}

#[test]
fn debug_mode_appends_trace() {
    let output = run("{{@debug}}{{var x = 1}}done", &Value::Null);
    let (body, info) = output.split_once("\n\n").expect("no debug section");
    assert_eq!(body, "done");
    assert!(info.contains("Render time"));
    assert!(info.contains("declared x = '1'"));
}

#[test]
fn debug_trace_includes_nested_calls() {
    let output = run("{{@debug}}{{if Add(1, 1) == 2}}{{ToUpper('a')}}{{/if}}", &Value::Null);
    let (body, info) = output.split_once("\n\n").expect("no debug section");
    assert_eq!(body, "A");
    assert!(info.ends_with("Trace:\n- Add returned '2'\n- ToUpper returned 'A'"));
}

#[test]
fn toml_models() {
    let table: toml::Table = toml::from_str("name = 'Ada'\nscores = [1, 2]").unwrap();
    let model = Value::from(toml::Value::Table(table));
    assert_eq!(
        run("{{name}}: {{Join(scores)}}", &model),
        "Ada: 1, 2"
    );
}

#[test]
fn engine_and_templates_are_thread_safe() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Engine>();
    assert_send_sync::<thicket::Template>();

    let engine = engine();
    let template = engine.compile("{{n}}").expect("parse failed");
    std::thread::scope(|scope| {
        for n in 0..4 {
            let (engine, template) = (&engine, &template);
            scope.spawn(move || {
                let model = json(&format!(r#"{{ "n": {} }}"#, n));
                assert_eq!(engine.render(template, &model).unwrap(), n.to_string());
            });
        }
    });
}
