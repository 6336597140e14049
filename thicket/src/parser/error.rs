use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A tag or nestable block never reached its closing form.
    UnterminatedBlock,
    /// No tag parser accepts the signature.
    UnknownTag,
    /// A recognised tag whose contents are malformed.
    InvalidSignature,
}

impl ParseErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ParseErrorKind::UnterminatedBlock => "unterminated-block",
            ParseErrorKind::UnknownTag => "unknown-tag",
            ParseErrorKind::InvalidSignature => "invalid-signature",
        }
    }
}

/// Parse errors with source location information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{} (at offset {})", .message, .span.start)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Absolute byte span in the original source.
    pub span: Range<usize>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn unterminated_block(message: impl Into<String>, offset: usize, file_id: usize) -> Self {
        Self::new(
            ParseErrorKind::UnterminatedBlock,
            message,
            offset..offset,
            file_id,
        )
    }

    pub fn unknown_tag(message: impl Into<String>, span: Range<usize>, file_id: usize) -> Self {
        Self::new(ParseErrorKind::UnknownTag, message, span, file_id)
    }

    pub fn invalid_signature(
        message: impl Into<String>,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        Self::new(ParseErrorKind::InvalidSignature, message, span, file_id)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Absolute offset of the error in the original source.
    pub fn offset(&self) -> usize {
        self.span.start
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::error()
            .with_message(&self.message)
            .with_code(self.kind.code())
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}
