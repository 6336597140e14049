pub mod section;

use std::ops::Range;

use crate::TemplateFlag;
use crate::expression::Expression;

pub use section::{ConditionalBranch, Section};

/// One parsed unit of a template: a literal run or a single tag's span.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Raw source text covered by this block, including any nested body.
    pub signature: String,
    /// Absolute byte span in the original source.
    pub span: Range<usize>,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// Plain text; the text is the signature.
    Literal,
    /// `{{! text }}`
    Comment { text: String },
    /// `{{@ name}}`
    Directive { flag: TemplateFlag },
    /// `{{> name}}`
    Partial { name: String },
    /// `{{path}}` or any other bare value expression.
    ModelBinding { expression: Expression },
    /// `{{name(arg, ...)}}`
    FunctionCall {
        name: String,
        arguments: Vec<Expression>,
    },
    /// `{{var name = value}}`
    VariableDeclaration { name: String, value: Expression },
    /// `{{reassign name = value}}`
    VariableReassignment { name: String, value: Expression },
    /// `{{if}} ... {{elseif}} ... {{else}} ... {{/if}}`
    Conditional {
        branches: Vec<ConditionalBranch>,
        default: Option<Section>,
    },
    /// `{{each item in items}} ... {{empty}} ... {{/each}}`
    Iteration {
        variable: String,
        index: Option<String>,
        collection: Expression,
        body: Section,
        empty: Option<Section>,
    },
}

impl Block {
    pub fn start_position(&self) -> usize {
        self.span.start
    }

    pub fn end_position(&self) -> usize {
        self.span.end
    }

    /// Nested sections owned by this block, in source order.
    pub fn sections(&self) -> Vec<&Section> {
        match &self.kind {
            BlockKind::Conditional { branches, default } => branches
                .iter()
                .map(|branch| &branch.section)
                .chain(default)
                .collect(),
            BlockKind::Iteration { body, empty, .. } => {
                std::iter::once(body).chain(empty).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Literal => "literal",
            BlockKind::Comment { .. } => "comment",
            BlockKind::Directive { .. } => "directive",
            BlockKind::Partial { .. } => "partial",
            BlockKind::ModelBinding { .. } => "model binding",
            BlockKind::FunctionCall { .. } => "function call",
            BlockKind::VariableDeclaration { .. } => "variable declaration",
            BlockKind::VariableReassignment { .. } => "variable reassignment",
            BlockKind::Conditional { .. } => "conditional",
            BlockKind::Iteration { .. } => "iteration",
        }
    }
}
