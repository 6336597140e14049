use std::ops::Range;

use crate::parser::error::ParseError;

pub const TAG_OPEN: &str = "{{";
pub const TAG_CLOSE: &str = "}}";

/// A forward-only view over a window of the template source.
///
/// Offsets are absolute into the full source, so blocks parsed from an
/// extracted body still report positions in the original text.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    source: &'a str,
    offset: usize,
    end: usize,
    file_id: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str, file_id: usize) -> Self {
        Cursor {
            source,
            offset: 0,
            end: source.len(),
            file_id,
        }
    }

    /// A cursor over `range` of the same source.
    pub fn window(&self, range: Range<usize>) -> Cursor<'a> {
        Cursor {
            source: self.source,
            offset: range.start,
            end: range.end,
            file_id: self.file_id,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn file_id(&self) -> usize {
        self.file_id
    }

    pub fn remaining(&self) -> &'a str {
        &self.source[self.offset..self.end]
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.end
    }

    pub fn slice(&self, range: Range<usize>) -> &'a str {
        &self.source[range]
    }

    pub fn advance(&mut self, len: usize) {
        self.advance_to(self.offset + len);
    }

    pub fn advance_to(&mut self, offset: usize) {
        debug_assert!(offset >= self.offset, "cursor moved backwards");
        self.offset = offset.min(self.end);
    }

    /// Read the `{{ ... }}` signature at the cursor without consuming it.
    pub fn peek_signature(&self) -> Result<&'a str, ParseError> {
        let rest = self.remaining();
        debug_assert!(rest.starts_with(TAG_OPEN));
        match find_tag_close(rest) {
            Some(close) => Ok(&rest[..close + TAG_CLOSE.len()]),
            None => Err(ParseError::unterminated_block(
                format!("tag is never closed, expected '{}'", TAG_CLOSE),
                self.end,
                self.file_id,
            )
            .with_note(format!("tag opened at offset {}", self.offset))),
        }
    }

    /// Error spanning `len` bytes from the cursor.
    pub fn invalid_signature(&self, message: impl Into<String>, len: usize) -> ParseError {
        ParseError::invalid_signature(message, self.offset..self.offset + len, self.file_id)
    }
}

/// The trimmed text between a signature's `{{` and `}}`.
pub fn signature_body(signature: &str) -> &str {
    signature
        .strip_prefix(TAG_OPEN)
        .and_then(|s| s.strip_suffix(TAG_CLOSE))
        .unwrap_or(signature)
        .trim()
}

/// Byte index of the `}}` that closes the tag opening `text`.
/// Quoted string literals are skipped, except inside comments.
pub fn find_tag_close(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let track_quotes = !text
        .get(TAG_OPEN.len()..)
        .is_some_and(|inner| inner.trim_start().starts_with('!'));
    let mut quote: Option<u8> = None;
    let mut i = TAG_OPEN.len();

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if track_quotes && (b == b'"' || b == b'\'') => quote = Some(b),
            None if b == b'}' && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            None => {}
        }
        i += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_stops_at_first_close() {
        let cursor = Cursor::new("{{name}} tail}}", 0);
        assert_eq!(cursor.peek_signature().unwrap(), "{{name}}");
    }

    #[test]
    fn signature_skips_quoted_close() {
        let cursor = Cursor::new("{{Replace(x, \"}}\", \"\")}}!", 0);
        assert_eq!(
            cursor.peek_signature().unwrap(),
            "{{Replace(x, \"}}\", \"\")}}"
        );
    }

    #[test]
    fn comment_apostrophes_are_not_quotes() {
        let cursor = Cursor::new("{{! don't }}x", 0);
        assert_eq!(cursor.peek_signature().unwrap(), "{{! don't }}");
    }

    #[test]
    fn unclosed_signature_reports_window_end() {
        let source = "ab{{name";
        let mut cursor = Cursor::new(source, 0);
        cursor.advance(2);
        let err = cursor.peek_signature().unwrap_err();
        assert_eq!(err.offset(), source.len());
    }

    #[test]
    fn window_keeps_absolute_offsets() {
        let source = "0123456789";
        let cursor = Cursor::new(source, 3);
        let window = cursor.window(4..7);
        assert_eq!(window.offset(), 4);
        assert_eq!(window.remaining(), "456");
        assert_eq!(window.file_id(), 3);
    }

    #[test]
    fn body_is_trimmed() {
        assert_eq!(signature_body("{{  each x in y }}"), "each x in y");
    }
}
