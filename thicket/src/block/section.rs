use std::ops::Range;

use crate::block::Block;
use crate::expression::Expression;

/// The body of a nestable block up to its close tag or next partition tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Raw extracted body text.
    pub body: String,
    /// Blocks parsed from `body`, positioned in the original source.
    pub children: Vec<Block>,
    /// Absolute byte span of `body`.
    pub span: Range<usize>,
}

/// An `if`/`elseif` condition and the section it guards.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBranch {
    pub condition: Expression,
    pub section: Section,
}
