use crate::TemplateFlag;
use crate::block::{Block, BlockKind};
use crate::expression::Expression;
use crate::parser::cursor::{Cursor, signature_body};
use crate::parser::error::ParseError;
use crate::parser::expression::{is_identifier, parse_expression};

/// Consume a single-tag signature and wrap it as a block.
fn consume_simple(cursor: &mut Cursor<'_>, signature: &str, kind: BlockKind) -> Block {
    let span = cursor.offset()..cursor.offset() + signature.len();
    cursor.advance(signature.len());
    Block {
        signature: signature.to_string(),
        span,
        kind,
    }
}

/// `{{! text }}`
pub fn parse_comment(cursor: &mut Cursor<'_>, signature: &str) -> Result<Block, ParseError> {
    let text = signature_body(signature)
        .trim_start_matches('!')
        .trim()
        .to_string();
    Ok(consume_simple(cursor, signature, BlockKind::Comment { text }))
}

/// `{{@ name}}`
pub fn parse_directive(cursor: &mut Cursor<'_>, signature: &str) -> Result<Block, ParseError> {
    let name = signature_body(signature).trim_start_matches('@').trim();
    let Some(flag) = TemplateFlag::from_directive(name) else {
        let known: Vec<&str> = TemplateFlag::ALL
            .iter()
            .map(|flag| flag.directive_name())
            .collect();
        return Err(cursor
            .invalid_signature(format!("unknown directive '{}'", name), signature.len())
            .with_note(format!("known directives: {}", known.join(", "))));
    };
    Ok(consume_simple(cursor, signature, BlockKind::Directive { flag }))
}

/// `{{> name}}`
pub fn parse_partial(cursor: &mut Cursor<'_>, signature: &str) -> Result<Block, ParseError> {
    let name = signature_body(signature).trim_start_matches('>').trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(cursor.invalid_signature(
            format!("invalid partial template name '{}'", name),
            signature.len(),
        ));
    }
    let kind = BlockKind::Partial {
        name: name.to_string(),
    };
    Ok(consume_simple(cursor, signature, kind))
}

/// `{{var name = value}}`
pub fn parse_declaration(cursor: &mut Cursor<'_>, signature: &str) -> Result<Block, ParseError> {
    let (name, value) = parse_assignment(cursor, signature, "var ")?;
    Ok(consume_simple(
        cursor,
        signature,
        BlockKind::VariableDeclaration { name, value },
    ))
}

/// `{{reassign name = value}}`
pub fn parse_reassignment(cursor: &mut Cursor<'_>, signature: &str) -> Result<Block, ParseError> {
    let (name, value) = parse_assignment(cursor, signature, "reassign ")?;
    Ok(consume_simple(
        cursor,
        signature,
        BlockKind::VariableReassignment { name, value },
    ))
}

fn parse_assignment(
    cursor: &Cursor<'_>,
    signature: &str,
    keyword: &str,
) -> Result<(String, Expression), ParseError> {
    let span = cursor.offset()..cursor.offset() + signature.len();
    let rest = signature_body(signature)
        .strip_prefix(keyword)
        .unwrap_or_default();
    let Some((name, value)) = rest.split_once('=') else {
        return Err(cursor.invalid_signature(
            format!("expected '{}name = value'", keyword),
            signature.len(),
        ));
    };

    let name = name.trim();
    if !is_identifier(name) {
        return Err(cursor.invalid_signature(
            format!("invalid variable name '{}'", name),
            signature.len(),
        ));
    }

    let value = parse_expression(value.trim(), span, cursor.file_id())?;
    Ok((name.to_string(), value))
}

/// `{{expression}}`; a bare call becomes a function call block.
pub fn parse_binding(cursor: &mut Cursor<'_>, signature: &str) -> Result<Block, ParseError> {
    let span = cursor.offset()..cursor.offset() + signature.len();
    let expression = parse_expression(signature_body(signature), span, cursor.file_id())?;
    let kind = match expression {
        Expression::FunctionCall { name, arguments } => BlockKind::FunctionCall { name, arguments },
        expression => BlockKind::ModelBinding { expression },
    };
    Ok(consume_simple(cursor, signature, kind))
}
