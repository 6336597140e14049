use thicket::block::{Block, BlockKind, ConditionalBranch, Section};
use thicket::expression::Expression;

use crate::context::TemplateContext;
use crate::engine::TemplateRepository;
use crate::error::{DiagnosticError, RenderError};
use crate::evaluator::{call_function, evaluate};
use crate::functions::FunctionRepository;
use crate::value::{Record, Value};

/// Maximum nesting depth of partial templates.
pub const MAX_DEPTH: usize = 64;

/// Renders block trees against a context, appending to an output buffer.
pub struct BlockRenderer<'e> {
    functions: &'e FunctionRepository,
    templates: &'e TemplateRepository,
}

impl<'e> BlockRenderer<'e> {
    pub fn new(functions: &'e FunctionRepository, templates: &'e TemplateRepository) -> Self {
        BlockRenderer {
            functions,
            templates,
        }
    }

    pub fn render_blocks(
        &self,
        blocks: &[Block],
        context: &mut TemplateContext<'_>,
        output: &mut String,
        source_id: usize,
        depth: usize,
    ) -> Result<(), DiagnosticError> {
        for block in blocks {
            tracing::trace!(kind = block.kind.name(), offset = block.span.start, "rendering block");
            self.render_block(block, context, output, source_id, depth)?;
        }
        Ok(())
    }

    fn render_block(
        &self,
        block: &Block,
        context: &mut TemplateContext<'_>,
        output: &mut String,
        source_id: usize,
        depth: usize,
    ) -> Result<(), DiagnosticError> {
        let located = |error: RenderError| DiagnosticError::at(error, block.span.clone(), source_id);

        match &block.kind {
            BlockKind::Literal => output.push_str(&block.signature),
            BlockKind::Comment { .. } | BlockKind::Directive { .. } => {}

            BlockKind::ModelBinding { expression } => {
                let value = self.evaluate(expression, context).map_err(located)?;
                output.push_str(&value.to_string());
            }

            BlockKind::FunctionCall { name, arguments } => {
                let value = call_function(name, arguments, context, self.functions)
                    .map_err(located)?;
                output.push_str(&value.to_string());
            }

            BlockKind::VariableDeclaration { name, value } => {
                let value = self.evaluate(value, context).map_err(located)?;
                context.record(|| format!("declared {} = '{}'", name, value));
                context.declare(name, value).map_err(located)?;
            }

            BlockKind::VariableReassignment { name, value } => {
                let value = self.evaluate(value, context).map_err(located)?;
                context.record(|| format!("reassigned {} = '{}'", name, value));
                context.reassign(name, value).map_err(located)?;
            }

            BlockKind::Conditional { branches, default } => {
                let section = self
                    .select_branch(branches, default.as_ref(), context)
                    .map_err(located)?;
                if let Some(section) = section {
                    self.render_blocks(&section.children, context, output, source_id, depth)?;
                }
            }

            BlockKind::Iteration {
                variable,
                index,
                collection,
                body,
                empty,
            } => {
                let collection = self.evaluate(collection, context).map_err(located)?;
                let items = iteration_items(collection).map_err(located)?;

                if items.is_empty() {
                    if let Some(empty) = empty {
                        self.render_blocks(&empty.children, context, output, source_id, depth)?;
                    }
                    return Ok(());
                }

                for (position, item) in items.into_iter().enumerate() {
                    context.push_scope();
                    let result = self.render_item(
                        body,
                        (variable.as_str(), item),
                        index.as_deref().map(|name| (name, position)),
                        context,
                        output,
                        (source_id, depth),
                    );
                    context.pop_scope();
                    result.map_err(|error| match error {
                        ItemError::Bind(error) => located(error),
                        ItemError::Render(error) => error,
                    })?;
                }
            }

            BlockKind::Partial { name } => {
                let registered = self
                    .templates
                    .get(name)
                    .ok_or_else(|| located(RenderError::UnknownTemplate(name.clone())))?;
                if depth >= MAX_DEPTH {
                    return Err(located(RenderError::RecursionLimit(MAX_DEPTH)));
                }
                context.record(|| format!("rendered partial '{}'", registered.name));

                let template = &registered.template;
                context.push_scope();
                let result = self.render_blocks(
                    &template.blocks,
                    context,
                    output,
                    template.source_id,
                    depth + 1,
                );
                context.pop_scope();
                result?;
            }
        }

        Ok(())
    }

    fn evaluate(
        &self,
        expression: &Expression,
        context: &mut TemplateContext<'_>,
    ) -> Result<Value, RenderError> {
        evaluate(expression, context, self.functions)
    }

    fn select_branch<'b>(
        &self,
        branches: &'b [ConditionalBranch],
        default: Option<&'b Section>,
        context: &mut TemplateContext<'_>,
    ) -> Result<Option<&'b Section>, RenderError> {
        for branch in branches {
            if self.evaluate(&branch.condition, context)?.is_truthy() {
                return Ok(Some(&branch.section));
            }
        }
        Ok(default)
    }

    fn render_item(
        &self,
        body: &Section,
        (variable, item): (&str, Value),
        index: Option<(&str, usize)>,
        context: &mut TemplateContext<'_>,
        output: &mut String,
        (source_id, depth): (usize, usize),
    ) -> Result<(), ItemError> {
        context.declare(variable, item).map_err(ItemError::Bind)?;
        if let Some((name, position)) = index {
            context
                .declare(name, Value::Integer(position as i64))
                .map_err(ItemError::Bind)?;
        }
        self.render_blocks(&body.children, context, output, source_id, depth)
            .map_err(ItemError::Render)
    }
}

enum ItemError {
    /// Binding the loop variables failed; located at the iteration block.
    Bind(RenderError),
    /// A child block failed and is already located.
    Render(DiagnosticError),
}

/// The items an iteration walks: sequence items, or `{Key, Value}` records
/// for a mapping. Null iterates nothing.
fn iteration_items(collection: Value) -> Result<Vec<Value>, RenderError> {
    match collection {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => Ok(items),
        Value::Mapping(map) => Ok(map
            .into_iter()
            .map(|(key, value)| {
                Value::Record(
                    Record::new("KeyValuePair")
                        .with_field("Key", key)
                        .with_field("Value", value),
                )
            })
            .collect()),
        other => Err(RenderError::TypeError {
            expected: "Sequence or Mapping".into(),
            got: other.type_name().into(),
        }),
    }
}
