use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use renderer::{BuiltinResolver, Engine, Value};

pub const TEST_SUFFIX: &str = ".test.thicket";

/// TOML front matter of a `.test.thicket` file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// The model the template is rendered against.
    #[serde(default)]
    pub model: Option<toml::Table>,

    /// Partial templates registered before rendering, by name.
    #[serde(default)]
    pub partials: BTreeMap<String, String>,

    /// Expected rendered output (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected render error; the error's message must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the test expects compilation to fail.
    #[serde(default)]
    pub expect_parse_error: bool,
}

/// Split a test file into its front matter and the template below it.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- front matter delimiter")?;
    let after_open = after_open
        .strip_prefix("\r\n")
        .or_else(|| after_open.strip_prefix('\n'))
        .unwrap_or(after_open);

    let close = after_open
        .find("\n---")
        .ok_or("missing closing --- front matter delimiter")?;
    let front_matter = after_open[..close].trim_end_matches('\r');
    let rest = &after_open[close + "\n---".len()..];
    let template = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(front_matter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, template))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => self
                .path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.trim_end_matches(TEST_SUFFIX).to_string())
                .unwrap_or_else(|| "?".into()),
        }
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };
    let (config, template_source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("front matter error: {}", e)),
    };
    let description = config.description.clone();

    let outcome = match check(&config, template_source) {
        Ok(()) => TestOutcome::Pass,
        Err(reason) => TestOutcome::Fail(reason),
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

/// Compile and render one test case, comparing against its expectations.
fn check(config: &TestConfig, template_source: &str) -> Result<(), String> {
    let mut engine = Engine::with_resolvers(&[&BuiltinResolver])
        .map_err(|e| format!("engine setup failed: {}", e))?;
    for (name, source) in &config.partials {
        engine
            .register_template(name, source)
            .map_err(|e| format!("partial '{}': {}", name, e))?;
    }

    let compiled = engine.compile(template_source);
    if config.expect_parse_error {
        return match compiled {
            Err(_) => Ok(()),
            Ok(_) => Err("expected parse error, but compilation succeeded".into()),
        };
    }
    let template = compiled.map_err(|e| format!("unexpected parse error: {}", e))?;

    let model = config
        .model
        .clone()
        .map(|table| Value::from(toml::Value::Table(table)))
        .unwrap_or_default();
    let rendered = engine.render(&template, &model);

    match (&config.expect_error, &config.expect_output, rendered) {
        (Some(expected), _, Err(error)) => {
            let message = error.to_string();
            if message.contains(expected.as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, message
                ))
            }
        }
        (Some(expected), _, Ok(_)) => Err(format!(
            "expected error containing \"{}\", but rendering succeeded",
            expected
        )),
        (None, _, Err(error)) => Err(format!("unexpected render error: {}", error)),
        (None, Some(expected), Ok(actual)) => {
            let (expected, actual) = (expected.trim(), actual.trim());
            if expected == actual {
                Ok(())
            } else {
                Err(format!(
                    "output mismatch\n  expected: {}\n  actual:   {}",
                    expected, actual
                ))
            }
        }
        (None, None, Ok(_)) => Ok(()),
    }
}

/// Discover test files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(TEST_SUFFIX))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

struct Palette {
    no_color: bool,
}

impl Palette {
    fn paint(&self, text: &str, code: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        }
    }

    fn pass(&self) -> String {
        self.paint("PASS", "32")
    }

    fn fail(&self) -> String {
        self.paint("FAIL", "31")
    }

    fn bold(&self, text: &str) -> String {
        self.paint(text, "1")
    }
}

/// Pick the categories to run; unknown requests are warned about.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }

    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files);
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run all test files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let palette = Palette { no_color };

    let groups: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        discover_categorized(path)
    };
    if groups.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return 1;
    }

    let selected = if path.is_file() {
        select_categories(&groups, &[])
    } else {
        select_categories(&groups, categories)
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &selected {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", palette.bold(category_label(category)));
        }
        for file in *files {
            let result = run_single_test(file);
            match result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", palette.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", palette.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!(
            "test result: {}. {} passed, 0 failed",
            palette.paint("ok", "32"),
            passed
        );
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            palette.paint("FAILED", "31"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_matter_and_template_are_split() {
        let content = "---\ndescription = \"greets\"\nexpect_output = \"Hi Ada\"\n[model]\nName = \"Ada\"\n---\nHi {{Name}}\n";
        let (config, template) = parse_test_file(content).unwrap();
        assert_eq!(config.description.as_deref(), Some("greets"));
        assert_eq!(template, "Hi {{Name}}\n");
        assert!(check(&config, template).is_ok());
    }

    #[test]
    fn missing_delimiters_are_reported() {
        assert!(parse_test_file("no front matter").is_err());
        assert!(parse_test_file("---\ndescription = 'x'\n").is_err());
    }

    #[test]
    fn expectations_are_checked() {
        let config = TestConfig {
            expect_error: Some("unknown function".into()),
            ..TestConfig::default()
        };
        assert!(check(&config, "{{Nope()}}").is_ok());
        assert!(check(&config, "fine").is_err());

        let config = TestConfig {
            expect_parse_error: true,
            ..TestConfig::default()
        };
        assert!(check(&config, "{{if a}}").is_ok());
    }

    #[test]
    fn partials_are_registered() {
        let config = TestConfig {
            partials: BTreeMap::from([("footer".to_string(), "bye".to_string())]),
            expect_output: Some("hi bye".into()),
            ..TestConfig::default()
        };
        assert!(check(&config, "hi {{> footer}}").is_ok());
    }

    #[test]
    fn categories_come_from_subfolders() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("loops")).unwrap();
        std::fs::write(dir.path().join("loops/a.test.thicket"), "").unwrap();
        std::fs::write(dir.path().join("b.test.thicket"), "").unwrap();
        std::fs::write(dir.path().join("c.thicket"), "").unwrap();
        let categories = discover_categorized(dir.path());
        let keys: Vec<&str> = categories.keys().map(String::as_str).collect();
        assert_eq!(keys, ["", "loops"]);
    }
}
