pub mod block;
pub mod expression;
pub mod parser;

use crate::block::{Block, BlockKind};

pub use parser::{ParseError, ParseErrorKind};

/// A switch turned on by a `{{@ name}}` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateFlag {
    /// Append elapsed time and the render trace to the output.
    DebugMode,
}

impl TemplateFlag {
    pub const ALL: [TemplateFlag; 1] = [TemplateFlag::DebugMode];

    pub fn from_directive(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.directive_name().eq_ignore_ascii_case(name))
    }

    pub fn directive_name(self) -> &'static str {
        match self {
            TemplateFlag::DebugMode => "debug",
        }
    }
}

/// A compiled template.
///
/// Templates are immutable once compiled and may be rendered any number of
/// times, from any number of threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Top-level blocks in source order.
    pub blocks: Vec<Block>,
    /// Flags set by directives anywhere in the block tree.
    pub flags: Vec<TemplateFlag>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Template {
    pub fn new(blocks: Vec<Block>, source_id: usize) -> Self {
        let mut flags = Vec::new();
        collect_flags(&blocks, &mut flags);
        Template {
            blocks,
            flags,
            source_id,
        }
    }

    pub fn is_flag_set(&self, flag: TemplateFlag) -> bool {
        self.flags.contains(&flag)
    }
}

fn collect_flags(blocks: &[Block], flags: &mut Vec<TemplateFlag>) {
    for block in blocks {
        if let BlockKind::Directive { flag } = &block.kind {
            if !flags.contains(flag) {
                flags.push(*flag);
            }
        }
        for section in block.sections() {
            collect_flags(&section.children, flags);
        }
    }
}

/// Compile template source text with source ID 0.
pub fn compile(source: &str) -> Result<Template, ParseError> {
    parser::Parser::new(source.to_string(), 0).parse()
}
