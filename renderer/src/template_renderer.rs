use std::time::Instant;

use thicket::{Template, TemplateFlag};

use crate::block_renderer::BlockRenderer;
use crate::context::TemplateContext;
use crate::engine::TemplateRepository;
use crate::error::DiagnosticError;
use crate::functions::FunctionRepository;
use crate::value::Value;

/// Render a compiled template against a model.
///
/// Each call gets its own context, so the template and model are only read.
/// With the debug flag set, the elapsed time and trace are appended after a
/// blank line.
pub fn render_template(
    template: &Template,
    model: &Value,
    functions: &FunctionRepository,
    templates: &TemplateRepository,
) -> Result<String, DiagnosticError> {
    let started = Instant::now();
    let mut context = TemplateContext::new(model, &template.flags);
    let mut output = String::new();

    BlockRenderer::new(functions, templates).render_blocks(
        &template.blocks,
        &mut context,
        &mut output,
        template.source_id,
        0,
    )?;

    if template.is_flag_set(TemplateFlag::DebugMode) {
        let elapsed = started.elapsed();
        output.push_str("\n\n");
        output.push_str(&context.debug_info(elapsed));
    }

    tracing::debug!(
        source_id = template.source_id,
        bytes = output.len(),
        "rendered template"
    );
    Ok(output)
}
