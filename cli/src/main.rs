mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use renderer::{BuiltinResolver, Engine, EngineError, Value};
use thicket::Template;

const SUBCOMMANDS: &[&str] = &["render", "check", "ast", "functions", "test", "help"];

#[derive(Parser)]
#[command(name = "thicket", version, about = "Text template compiler and renderer")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log compile and render progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template to stdout
    Render(RenderArgs),

    /// Compile a template and report errors without rendering
    Check(TemplateArgs),

    /// Dump the compiled block tree
    Ast(TemplateArgs),

    /// List the built-in functions
    Functions,

    /// Run .test.thicket test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct TemplateArgs {
    /// Template source file
    template: PathBuf,

    /// Directory of partial templates (*.thicket), registered by relative path
    #[arg(short, long)]
    partials: Option<PathBuf>,
}

#[derive(clap::Args)]
struct RenderArgs {
    #[command(flatten)]
    template: TemplateArgs,

    /// Model file (.json or .toml)
    #[arg(short, long)]
    model: Option<PathBuf>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.thicket file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `thicket page.thicket` is shorthand for `thicket render page.thicket`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|i| i + 1)
    {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "render".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose, cli.no_color);

    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    match cli.command {
        Command::Render(render_args) => do_render(render_args, color_choice),
        Command::Check(template_args) => {
            let workspace = Workspace::load(&template_args, color_choice);
            eprintln!(
                "ok: {} compiled ({} blocks)",
                template_args.template.display(),
                workspace.template.blocks.len()
            );
        }
        Command::Ast(template_args) => {
            let workspace = Workspace::load(&template_args, color_choice);
            println!("{:#?}", workspace.template);
        }
        Command::Functions => do_functions(),
        Command::Test(test_args) => {
            if test_args.list_categories {
                test_runner::list_categories(&test_args.path);
                return;
            }
            let exit_code =
                test_runner::run_tests(&test_args.path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: bool, no_color: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", message);
    process::exit(1);
}

/// A compiled main template with its engine and the diagnostic file database.
///
/// File IDs line up with template source IDs: the main template is 0 and
/// registered partials follow in registration order.
struct Workspace {
    engine: Engine,
    template: Template,
    files: SimpleFiles<String, String>,
    color_choice: ColorChoice,
}

impl Workspace {
    fn load(args: &TemplateArgs, color_choice: ColorChoice) -> Self {
        let source = std::fs::read_to_string(&args.template).unwrap_or_else(|e| {
            fail(format!("cannot read '{}': {}", args.template.display(), e))
        });

        let mut engine = Engine::with_resolvers(&[&BuiltinResolver]).unwrap_or_else(|e| fail(e));
        let mut files = SimpleFiles::new();
        files.add(args.template.display().to_string(), source.clone());

        if let Some(dir) = &args.partials {
            match engine.register_directory(dir) {
                Ok(count) => tracing::debug!(count, dir = %dir.display(), "registered partials"),
                Err(EngineError::TemplateParse { name, source: error }) => {
                    fail(format!("partial '{}': {}", name, error))
                }
                Err(e) => fail(e),
            }
            for registered in engine.templates().iter() {
                files.add(registered.name.clone(), registered.source.clone());
            }
        }

        let template = match engine.compile(&source) {
            Ok(template) => template,
            Err(error) => {
                emit(&files, color_choice, &error.to_diagnostic());
                process::exit(1);
            }
        };

        Workspace {
            engine,
            template,
            files,
            color_choice,
        }
    }
}

fn do_render(args: RenderArgs, color_choice: ColorChoice) {
    let workspace = Workspace::load(&args.template, color_choice);
    let model = match &args.model {
        Some(path) => load_model(path).unwrap_or_else(|e| fail(e)),
        None => Value::Null,
    };

    match workspace.engine.render(&workspace.template, &model) {
        Ok(output) => print!("{}", output),
        Err(error) => {
            if error.span.is_some() {
                emit(&workspace.files, workspace.color_choice, &error.to_diagnostic());
            } else {
                eprintln!("render error: {}", error);
            }
            process::exit(1);
        }
    }
}

fn do_functions() {
    let engine = Engine::with_resolvers(&[&BuiltinResolver]).unwrap_or_else(|e| fail(e));
    for function in engine.functions().all() {
        println!("{}", function.signature());
        println!("    {}", function.description);
        for parameter in &function.parameters {
            println!("    - {}: {}", parameter.name, parameter.description);
        }
    }
}

/// Load a model from a JSON or TOML file, chosen by extension.
fn load_model(path: &Path) -> Result<Value, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read model '{}': {}", path.display(), e))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str::<serde_json::Value>(&text)
            .map(Value::from)
            .map_err(|e| format!("invalid JSON model '{}': {}", path.display(), e)),
        Some("toml") => toml::from_str::<toml::Table>(&text)
            .map(|table| Value::from(toml::Value::Table(table)))
            .map_err(|e| format!("invalid TOML model '{}': {}", path.display(), e)),
        _ => Err(format!(
            "unsupported model format '{}' (expected .json or .toml)",
            path.display()
        )),
    }
}

fn emit(files: &SimpleFiles<String, String>, color_choice: ColorChoice, diagnostic: &Diagnostic<usize>) {
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, files, diagnostic);
}
