use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thicket::parser::Parser;
use thicket::{ParseError, Template};

use crate::error::{DiagnosticError, EngineError};
use crate::functions::{Function, FunctionRepository, Resolver};
use crate::template_renderer::render_template;
use crate::value::Value;

pub const TEMPLATE_EXTENSION: &str = "thicket";

/// A named template available to `{{> name}}` partial tags.
#[derive(Debug, Clone)]
pub struct RegisteredTemplate {
    pub name: String,
    pub source: String,
    pub template: Template,
}

/// Registered templates in registration order, looked up case-insensitively.
///
/// The template at position `i` is compiled with source ID `i + 1`; ID 0 is
/// left for the template passed to [`Engine::compile`].
#[derive(Debug, Clone, Default)]
pub struct TemplateRepository {
    templates: Vec<RegisteredTemplate>,
    index: HashMap<String, usize>,
}

impl TemplateRepository {
    pub fn get(&self, name: &str) -> Option<&RegisteredTemplate> {
        self.index
            .get(&name.to_lowercase())
            .and_then(|&i| self.templates.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    fn add(&mut self, name: &str, source: &str) -> Result<(), EngineError> {
        let key = name.to_lowercase();
        if self.index.contains_key(&key) {
            return Err(EngineError::DuplicateTemplate(name.to_string()));
        }
        let source_id = self.templates.len() + 1;
        let template = Parser::new(source.to_string(), source_id)
            .parse()
            .map_err(|error| EngineError::TemplateParse {
                name: name.to_string(),
                source: error,
            })?;
        self.index.insert(key, self.templates.len());
        self.templates.push(RegisteredTemplate {
            name: name.to_string(),
            source: source.to_string(),
            template,
        });
        Ok(())
    }
}

/// Functions and partial templates shared by every render.
///
/// Configure with `&mut self` methods, then render from any number of
/// threads through `&self`.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    functions: FunctionRepository,
    templates: TemplateRepository,
}

impl Engine {
    /// An engine with no functions or templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with every function from `resolvers` registered.
    pub fn with_resolvers(resolvers: &[&dyn Resolver]) -> Result<Self, EngineError> {
        let mut engine = Engine::new();
        for resolver in resolvers {
            engine.register_resolver(*resolver)?;
        }
        Ok(engine)
    }

    pub fn register_resolver(&mut self, resolver: &dyn Resolver) -> Result<(), EngineError> {
        let functions = resolver.functions();
        tracing::debug!(
            resolver = resolver.name(),
            count = functions.len(),
            "registering functions"
        );
        for function in functions {
            self.register_function(function)?;
        }
        Ok(())
    }

    pub fn register_function(&mut self, function: Function) -> Result<(), EngineError> {
        self.functions.register(function)
    }

    pub fn functions(&self) -> &FunctionRepository {
        &self.functions
    }

    pub fn templates(&self) -> &TemplateRepository {
        &self.templates
    }

    /// Compile template source with source ID 0.
    pub fn compile(&self, source: &str) -> Result<Template, ParseError> {
        Parser::new(source.to_string(), 0).parse()
    }

    /// Compile `source` and make it available as the partial `name`.
    pub fn register_template(&mut self, name: &str, source: &str) -> Result<(), EngineError> {
        self.templates.add(name, source)?;
        tracing::debug!(name, "registered template");
        Ok(())
    }

    /// Register every `*.thicket` file under `dir`, named by its path
    /// relative to `dir` without the extension, e.g. `shared/header`.
    /// Returns the number of templates registered.
    pub fn register_directory(&mut self, dir: impl AsRef<Path>) -> Result<usize, EngineError> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        collect_template_files(dir, &mut files)?;
        files.sort();

        for path in &files {
            let source = fs::read_to_string(path).map_err(|source| EngineError::Io {
                path: path.clone(),
                source,
            })?;
            let name = template_name(dir, path);
            self.register_template(&name, &source)?;
        }
        Ok(files.len())
    }

    /// Render a compiled template against a model.
    pub fn render(&self, template: &Template, model: &Value) -> Result<String, DiagnosticError> {
        render_template(template, model, &self.functions, &self.templates)
    }
}

fn collect_template_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), EngineError> {
    let io_error = |source: std::io::Error| EngineError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_template_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == TEMPLATE_EXTENSION) {
            files.push(path);
        }
    }
    Ok(())
}

fn template_name(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_names_are_relative_without_extension() {
        let dir = Path::new("/templates");
        assert_eq!(
            template_name(dir, Path::new("/templates/shared/header.thicket")),
            "shared/header"
        );
        assert_eq!(template_name(dir, Path::new("/templates/footer.thicket")), "footer");
    }

    #[test]
    fn registered_templates_get_distinct_source_ids() {
        let mut engine = Engine::new();
        engine.register_template("a", "A").unwrap();
        engine.register_template("b", "B").unwrap();
        let ids: Vec<usize> = engine
            .templates()
            .iter()
            .map(|t| t.template.source_id)
            .collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn duplicate_template_names_are_rejected() {
        let mut engine = Engine::new();
        engine.register_template("Header", "x").unwrap();
        assert!(matches!(
            engine.register_template("header", "y"),
            Err(EngineError::DuplicateTemplate(_))
        ));
    }

    #[test]
    fn template_parse_errors_name_the_template() {
        let mut engine = Engine::new();
        let err = engine.register_template("broken", "{{if a}}").unwrap_err();
        let EngineError::TemplateParse { name, source } = err else {
            panic!("expected a parse error");
        };
        assert_eq!(name, "broken");
        assert_eq!(source.file_id, 1);
    }
}
