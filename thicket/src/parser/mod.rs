mod blockifier;
mod conditional;
pub mod cursor;
pub mod error;
pub mod expression;
mod iteration;
mod nested;
mod tags;

pub use error::{ParseError, ParseErrorKind};

use crate::Template;
use cursor::Cursor;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the template source into a compiled Template.
    pub fn parse(&self) -> Result<Template, ParseError> {
        let blocks = blockifier::blockify(Cursor::new(&self.source, self.file_id))?;
        tracing::debug!(
            file_id = self.file_id,
            blocks = blocks.len(),
            "parsed template"
        );
        Ok(Template::new(blocks, self.file_id))
    }
}
