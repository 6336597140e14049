use crate::block::{Block, BlockKind, ConditionalBranch};
use crate::parser::cursor::{Cursor, signature_body};
use crate::parser::error::ParseError;
use crate::parser::expression::parse_expression;
use crate::parser::nested::{NestedTag, Terminator, extract_section};

const CONDITIONAL: NestedTag = NestedTag {
    name: "if",
    partitions: &["elseif", "else"],
};

/// `{{if cond}} ... {{elseif cond}} ... {{else}} ... {{/if}}`
pub fn parse_conditional(cursor: &mut Cursor<'_>, signature: &str) -> Result<Block, ParseError> {
    let start = cursor.offset();
    let file_id = cursor.file_id();
    let header = signature_body(signature)
        .strip_prefix("if ")
        .unwrap_or_default();
    let mut condition = Some(parse_expression(
        header.trim(),
        start..start + signature.len(),
        file_id,
    )?);
    cursor.advance(signature.len());

    let mut branches = Vec::new();
    let mut default = None;

    loop {
        let extracted = extract_section(cursor, &CONDITIONAL)?;
        match condition.take() {
            Some(condition) => branches.push(ConditionalBranch {
                condition,
                section: extracted.section,
            }),
            None => default = Some(extracted.section),
        }

        if extracted.terminator == Terminator::Close {
            break;
        }

        let partition = cursor.peek_signature()?;
        let partition_span = cursor.offset()..cursor.offset() + partition.len();
        let body = signature_body(partition);

        if default.is_some() {
            return Err(cursor.invalid_signature(
                format!("'{}' cannot follow an 'else' section", partition),
                partition.len(),
            ));
        }

        if let Some(expression) = body.strip_prefix("elseif ") {
            condition = Some(parse_expression(
                expression.trim(),
                partition_span,
                file_id,
            )?);
        } else if body != "else" {
            return Err(cursor.invalid_signature(
                format!("malformed partition tag '{}'", partition),
                partition.len(),
            ));
        }
        cursor.advance(partition.len());
    }

    let span = start..cursor.offset();
    Ok(Block {
        signature: cursor.slice(span.clone()).to_string(),
        span,
        kind: BlockKind::Conditional { branches, default },
    })
}
