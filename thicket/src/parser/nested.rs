use crate::block::Section;
use crate::parser::blockifier::blockify;
use crate::parser::cursor::{Cursor, TAG_CLOSE, TAG_OPEN, find_tag_close, signature_body};
use crate::parser::error::ParseError;

/// The tag forms that delimit a nestable block.
pub struct NestedTag {
    pub name: &'static str,
    /// Partition tag names, e.g. `else` and `elseif`.
    pub partitions: &'static [&'static str],
}

/// What a single tag means to the block being extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagRole {
    Open,
    Close,
    Partition,
    Other,
}

impl NestedTag {
    fn close_form(&self) -> String {
        format!("{}/{}{}", TAG_OPEN, self.name, TAG_CLOSE)
    }

    /// Classify a whole `{{ ... }}` signature by its trimmed body, the same
    /// way the blockifier reads it.
    fn role(&self, signature: &str) -> TagRole {
        let body = signature_body(signature);
        if body
            .strip_prefix(self.name)
            .is_some_and(|rest| rest.starts_with(' '))
        {
            TagRole::Open
        } else if body
            .strip_prefix('/')
            .is_some_and(|rest| rest.trim_start() == self.name)
        {
            TagRole::Close
        } else if self.partitions.iter().any(|name| {
            body.strip_prefix(name)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        }) {
            TagRole::Partition
        } else {
            TagRole::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// The block's close tag was consumed.
    Close,
    /// The cursor stops at the start of a same-level partition tag.
    Partition,
}

#[derive(Debug)]
pub struct Extracted {
    pub section: Section,
    pub terminator: Terminator,
}

/// Extract the section starting at the cursor, up to the matching close tag
/// or the next partition tag at the same nesting level.
///
/// Nested opens of the same tag are counted so that inner close and
/// partition tags are skipped. Children are parsed from the section body.
pub fn extract_section(cursor: &mut Cursor<'_>, tag: &NestedTag) -> Result<Extracted, ParseError> {
    let start = cursor.offset();
    let text = cursor.remaining();

    let mut open_count = 1usize;
    let mut close_count = 0usize;
    let mut position = 0;

    // Whole tags are stepped over, so quoted text inside a tag is never
    // mistaken for a boundary.
    while let Some(found) = text[position..].find(TAG_OPEN) {
        let at = position + found;
        let Some(close) = find_tag_close(&text[at..]) else {
            break;
        };
        let tag_end = at + close + TAG_CLOSE.len();

        match tag.role(&text[at..tag_end]) {
            TagRole::Open => open_count += 1,
            TagRole::Close => {
                close_count += 1;
                if open_count == close_count {
                    let section = build_section(cursor, start, start + at)?;
                    cursor.advance_to(start + tag_end);
                    return Ok(Extracted {
                        section,
                        terminator: Terminator::Close,
                    });
                }
            }
            TagRole::Partition if open_count == close_count + 1 => {
                let section = build_section(cursor, start, start + at)?;
                cursor.advance_to(start + at);
                return Ok(Extracted {
                    section,
                    terminator: Terminator::Partition,
                });
            }
            TagRole::Partition | TagRole::Other => {}
        }

        position = tag_end;
    }

    Err(ParseError::unterminated_block(
        format!(
            "'{}' block is never closed, expected '{}'",
            tag.name,
            tag.close_form()
        ),
        cursor.end(),
        cursor.file_id(),
    )
    .with_note(format!("block body starts at offset {}", start)))
}

fn build_section(cursor: &Cursor<'_>, start: usize, end: usize) -> Result<Section, ParseError> {
    let children = blockify(cursor.window(start..end))?;
    Ok(Section {
        body: cursor.slice(start..end).to_string(),
        children,
        span: start..end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IF: NestedTag = NestedTag {
        name: "if",
        partitions: &["elseif", "else"],
    };

    #[test]
    fn stops_at_matching_close() {
        let source = "{{if a}}x{{if b}}y{{/if}}z{{/if}}tail";
        let mut cursor = Cursor::new(source, 0);
        cursor.advance("{{if a}}".len());
        let extracted = extract_section(&mut cursor, &IF).unwrap();
        assert_eq!(extracted.terminator, Terminator::Close);
        assert_eq!(extracted.section.body, "x{{if b}}y{{/if}}z");
        assert_eq!(cursor.remaining(), "tail");
    }

    #[test]
    fn stops_before_partition() {
        let source = "{{if a}}x{{elseif b}}y{{/if}}";
        let mut cursor = Cursor::new(source, 0);
        cursor.advance("{{if a}}".len());
        let extracted = extract_section(&mut cursor, &IF).unwrap();
        assert_eq!(extracted.terminator, Terminator::Partition);
        assert_eq!(extracted.section.body, "x");
        assert!(cursor.remaining().starts_with("{{elseif b}}"));
    }

    #[test]
    fn partition_names_need_a_boundary() {
        let source = "{{if a}}{{elsewhere}}{{/if}}";
        let mut cursor = Cursor::new(source, 0);
        cursor.advance("{{if a}}".len());
        let extracted = extract_section(&mut cursor, &IF).unwrap();
        assert_eq!(extracted.terminator, Terminator::Close);
        assert_eq!(extracted.section.body, "{{elsewhere}}");
    }

    #[test]
    fn spaced_tags_nest_and_partition() {
        let source = "{{if a}}{{ if b }}x{{ / if }}y{{ else }}z{{ /if}}tail";
        let mut cursor = Cursor::new(source, 0);
        cursor.advance("{{if a}}".len());
        let extracted = extract_section(&mut cursor, &IF).unwrap();
        assert_eq!(extracted.terminator, Terminator::Partition);
        assert_eq!(extracted.section.body, "{{ if b }}x{{ / if }}y");
        assert!(cursor.remaining().starts_with("{{ else }}"));

        cursor.advance("{{ else }}".len());
        let extracted = extract_section(&mut cursor, &IF).unwrap();
        assert_eq!(extracted.terminator, Terminator::Close);
        assert_eq!(extracted.section.body, "z");
        assert_eq!(cursor.remaining(), "tail");
    }

    #[test]
    fn quoted_tags_inside_a_section_are_not_boundaries() {
        let source = r#"{{if a}}{{Replace(s, "{{/if}}", "{{else}}")}}{{/if}}!"#;
        let mut cursor = Cursor::new(source, 0);
        cursor.advance("{{if a}}".len());
        let extracted = extract_section(&mut cursor, &IF).unwrap();
        assert_eq!(extracted.terminator, Terminator::Close);
        assert_eq!(
            extracted.section.body,
            r#"{{Replace(s, "{{/if}}", "{{else}}")}}"#
        );
        assert_eq!(cursor.remaining(), "!");
    }

    #[test]
    fn unterminated_reports_window_end() {
        let source = "{{if a}}x{{if b}}y{{/if}}";
        let mut cursor = Cursor::new(source, 0);
        cursor.advance("{{if a}}".len());
        let err = extract_section(&mut cursor, &IF).unwrap_err();
        assert_eq!(err.offset(), source.len());
    }

    #[test]
    fn children_keep_absolute_spans() {
        let source = "{{if a}}ab{{c}}{{/if}}";
        let mut cursor = Cursor::new(source, 0);
        cursor.advance("{{if a}}".len());
        let extracted = extract_section(&mut cursor, &IF).unwrap();
        let spans: Vec<_> = extracted
            .section
            .children
            .iter()
            .map(|block| block.span.clone())
            .collect();
        assert_eq!(spans, [8..10, 10..15]);
    }
}
