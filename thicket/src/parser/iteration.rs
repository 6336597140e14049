use crate::block::{Block, BlockKind};
use crate::parser::cursor::{Cursor, signature_body};
use crate::parser::error::ParseError;
use crate::parser::expression::{is_identifier, parse_expression};
use crate::parser::nested::{NestedTag, Terminator, extract_section};

const ITERATION: NestedTag = NestedTag {
    name: "each",
    partitions: &["empty"],
};

/// `{{each item[, index] in collection}} ... {{empty}} ... {{/each}}`
pub fn parse_iteration(cursor: &mut Cursor<'_>, signature: &str) -> Result<Block, ParseError> {
    let start = cursor.offset();
    let header = signature_body(signature)
        .strip_prefix("each ")
        .unwrap_or_default();

    let Some((names, collection)) = header.split_once(" in ") else {
        return Err(cursor.invalid_signature(
            "expected 'each item in collection'",
            signature.len(),
        ));
    };

    let (variable, index) = match names.split_once(',') {
        Some((variable, index)) => (variable.trim(), Some(index.trim())),
        None => (names.trim(), None),
    };
    for name in std::iter::once(variable).chain(index) {
        if !is_identifier(name) {
            return Err(cursor.invalid_signature(
                format!("invalid loop variable name '{}'", name),
                signature.len(),
            ));
        }
    }
    if index == Some(variable) {
        return Err(cursor.invalid_signature(
            "loop variable and index must have different names",
            signature.len(),
        ));
    }

    let collection = parse_expression(
        collection.trim(),
        start..start + signature.len(),
        cursor.file_id(),
    )?;
    cursor.advance(signature.len());

    let extracted = extract_section(cursor, &ITERATION)?;
    let body = extracted.section;
    let mut empty = None;

    if extracted.terminator == Terminator::Partition {
        let partition = cursor.peek_signature()?;
        if signature_body(partition) != "empty" {
            return Err(cursor.invalid_signature(
                format!("malformed partition tag '{}'", partition),
                partition.len(),
            ));
        }
        cursor.advance(partition.len());

        let extracted = extract_section(cursor, &ITERATION)?;
        if extracted.terminator == Terminator::Partition {
            return Err(cursor.invalid_signature(
                "an 'each' block may have only one 'empty' section",
                "{{empty}}".len(),
            ));
        }
        empty = Some(extracted.section);
    }

    let span = start..cursor.offset();
    Ok(Block {
        signature: cursor.slice(span.clone()).to_string(),
        span,
        kind: BlockKind::Iteration {
            variable: variable.to_string(),
            index: index.map(str::to_string),
            collection,
            body,
            empty,
        },
    })
}
