use crate::block::{Block, BlockKind};
use crate::parser::cursor::{Cursor, TAG_OPEN, signature_body};
use crate::parser::error::ParseError;
use crate::parser::{conditional, iteration, tags};

/// Tag parsers in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagParser {
    Comment,
    Directive,
    Partial,
    VariableDeclaration,
    VariableReassignment,
    Iteration,
    Conditional,
    ModelBinding,
}

impl TagParser {
    const PRIORITY: [TagParser; 8] = [
        TagParser::Comment,
        TagParser::Directive,
        TagParser::Partial,
        TagParser::VariableDeclaration,
        TagParser::VariableReassignment,
        TagParser::Iteration,
        TagParser::Conditional,
        TagParser::ModelBinding,
    ];

    fn prefix(self) -> Option<&'static str> {
        match self {
            TagParser::Comment => Some("!"),
            TagParser::Directive => Some("@"),
            TagParser::Partial => Some(">"),
            TagParser::VariableDeclaration => Some("var "),
            TagParser::VariableReassignment => Some("reassign "),
            TagParser::Iteration => Some("each "),
            TagParser::Conditional => Some("if "),
            TagParser::ModelBinding => None,
        }
    }

    fn matches(self, body: &str) -> bool {
        match self.prefix() {
            Some(prefix) => body.starts_with(prefix),
            None => is_binding_shaped(body),
        }
    }

    fn select(body: &str) -> Option<TagParser> {
        Self::PRIORITY.into_iter().find(|parser| parser.matches(body))
    }

    fn parse(self, cursor: &mut Cursor<'_>, signature: &str) -> Result<Block, ParseError> {
        match self {
            TagParser::Comment => tags::parse_comment(cursor, signature),
            TagParser::Directive => tags::parse_directive(cursor, signature),
            TagParser::Partial => tags::parse_partial(cursor, signature),
            TagParser::VariableDeclaration => tags::parse_declaration(cursor, signature),
            TagParser::VariableReassignment => tags::parse_reassignment(cursor, signature),
            TagParser::Iteration => iteration::parse_iteration(cursor, signature),
            TagParser::Conditional => conditional::parse_conditional(cursor, signature),
            TagParser::ModelBinding => tags::parse_binding(cursor, signature),
        }
    }
}

/// Whether a tag body can start a value expression.
fn is_binding_shaped(body: &str) -> bool {
    body.chars().next().is_some_and(|c| {
        c.is_alphanumeric() || matches!(c, '_' | '$' | '"' | '\'' | '(' | '-')
    })
}

/// Partition and close tags that only make sense inside a nestable block.
fn is_stray_partition(body: &str) -> bool {
    body.starts_with('/')
        || body == "else"
        || body == "elseif"
        || body.starts_with("elseif ")
        || body == "empty"
}

/// Split the cursor's window into blocks.
pub fn blockify(mut cursor: Cursor<'_>) -> Result<Vec<Block>, ParseError> {
    let mut blocks = Vec::new();

    while !cursor.is_exhausted() {
        let start = cursor.offset();
        let literal_len = cursor.remaining().find(TAG_OPEN).unwrap_or(cursor.end() - start);
        if literal_len > 0 {
            cursor.advance(literal_len);
            let span = start..cursor.offset();
            blocks.push(Block {
                signature: cursor.slice(span.clone()).to_string(),
                span,
                kind: BlockKind::Literal,
            });
            continue;
        }

        blocks.push(parse_tag(&mut cursor)?);
    }

    Ok(blocks)
}

fn parse_tag(cursor: &mut Cursor<'_>) -> Result<Block, ParseError> {
    let signature = cursor.peek_signature()?;
    let body = signature_body(signature);
    let span = cursor.offset()..cursor.offset() + signature.len();

    if body.is_empty() || is_stray_partition(body) {
        return Err(ParseError::unknown_tag(
            format!("unexpected tag '{}'", signature),
            span,
            cursor.file_id(),
        )
        .with_note("close and partition tags must follow an opening 'if' or 'each' tag"));
    }

    let Some(parser) = TagParser::select(body) else {
        return Err(ParseError::unknown_tag(
            format!("unknown tag '{}'", signature),
            span,
            cursor.file_id(),
        ));
    };

    tracing::trace!(offset = span.start, ?parser, "parsing tag");
    parser.parse(cursor, signature)
}
