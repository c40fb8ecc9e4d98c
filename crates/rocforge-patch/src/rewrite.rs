//! Line-oriented rewrite of a conversion-mapping table.
//!
//! The transform is pure: it takes file content as a string and either
//! returns rewritten content or reports why no rewrite is possible. Lines
//! are matched on trimmed content; everything else is preserved
//! byte-for-byte, including indentation, CRLF terminators, and the presence
//! or absence of a final newline.

/// Result of attempting to insert the new entry after the anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// The entry line is already present; the content needs no rewrite.
    AlreadyPresent,
    /// The entry was inserted after the first anchor match.
    Inserted { content: String },
    /// No line matches the anchor; the content must not be modified.
    AnchorMissing,
}

/// Patch state of a mapping file, as observed without writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingState {
    Patched,
    Unpatched,
    AnchorMissing,
}

impl MappingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patched => "patched",
            Self::Unpatched => "unpatched",
            Self::AnchorMissing => "anchor-missing",
        }
    }
}

/// Insert `entry` as a new line immediately after the first line whose
/// trimmed content equals `anchor`.
///
/// Only the first anchor match is used. The inserted line reuses the anchor
/// line's leading whitespace and line terminator, so the table's formatting
/// survives the edit unchanged.
pub fn insert_after_anchor(content: &str, anchor: &str, entry: &str) -> RewriteOutcome {
    let anchor = anchor.trim();
    let entry = entry.trim();

    if contains_line(content, entry) {
        return RewriteOutcome::AlreadyPresent;
    }

    let mut end = 0usize;
    for segment in content.split_inclusive('\n') {
        end += segment.len();
        let (body, terminator) = split_line_terminator(segment);
        if body.trim() != anchor {
            continue;
        }

        let indent = leading_whitespace(body);
        let mut rewritten =
            String::with_capacity(content.len() + indent.len() + entry.len() + 2);
        rewritten.push_str(&content[..end]);
        if terminator.is_empty() {
            // Anchor is the final line and the file has no trailing newline.
            rewritten.push('\n');
            rewritten.push_str(indent);
            rewritten.push_str(entry);
        } else {
            rewritten.push_str(indent);
            rewritten.push_str(entry);
            rewritten.push_str(terminator);
        }
        rewritten.push_str(&content[end..]);
        return RewriteOutcome::Inserted { content: rewritten };
    }

    RewriteOutcome::AnchorMissing
}

/// Classify content as patched, unpatched, or missing its anchor.
pub fn mapping_state(content: &str, anchor: &str, entry: &str) -> MappingState {
    if contains_line(content, entry.trim()) {
        MappingState::Patched
    } else if contains_line(content, anchor.trim()) {
        MappingState::Unpatched
    } else {
        MappingState::AnchorMissing
    }
}

fn contains_line(content: &str, needle: &str) -> bool {
    content.lines().any(|line| line.trim() == needle)
}

fn split_line_terminator(segment: &str) -> (&str, &str) {
    if let Some(body) = segment.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = segment.strip_suffix('\n') {
        (body, "\n")
    } else {
        (segment, "")
    }
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANCHOR: &str = "ANCHOR_LINE";
    const ENTRY: &str = "NEW_LINE";

    fn inserted(outcome: RewriteOutcome) -> String {
        match outcome {
            RewriteOutcome::Inserted { content } => content,
            other => panic!("expected insertion, got {other:?}"),
        }
    }

    #[test]
    fn inserts_directly_after_anchor() {
        let content = "A\nANCHOR_LINE\nB\n";
        let rewritten = inserted(insert_after_anchor(content, ANCHOR, ENTRY));
        assert_eq!(rewritten, "A\nANCHOR_LINE\nNEW_LINE\nB\n");
    }

    #[test]
    fn second_application_is_a_no_op() {
        let content = "A\nANCHOR_LINE\nB\n";
        let rewritten = inserted(insert_after_anchor(content, ANCHOR, ENTRY));
        assert_eq!(
            insert_after_anchor(&rewritten, ANCHOR, ENTRY),
            RewriteOutcome::AlreadyPresent
        );
    }

    #[test]
    fn entry_anywhere_in_content_suppresses_insertion() {
        let content = "NEW_LINE\nA\nANCHOR_LINE\nB\n";
        assert_eq!(
            insert_after_anchor(content, ANCHOR, ENTRY),
            RewriteOutcome::AlreadyPresent
        );
    }

    #[test]
    fn only_first_anchor_match_is_patched() {
        let content = "ANCHOR_LINE\nmiddle\nANCHOR_LINE\n";
        let rewritten = inserted(insert_after_anchor(content, ANCHOR, ENTRY));
        assert_eq!(rewritten, "ANCHOR_LINE\nNEW_LINE\nmiddle\nANCHOR_LINE\n");
    }

    #[test]
    fn missing_anchor_leaves_content_alone() {
        let content = "A\nB\n";
        assert_eq!(
            insert_after_anchor(content, ANCHOR, ENTRY),
            RewriteOutcome::AnchorMissing
        );
    }

    #[test]
    fn inserted_line_reuses_anchor_indentation() {
        let content = "table = [\n        ANCHOR_LINE\n]\n";
        let rewritten = inserted(insert_after_anchor(content, ANCHOR, ENTRY));
        assert_eq!(rewritten, "table = [\n        ANCHOR_LINE\n        NEW_LINE\n]\n");
    }

    #[test]
    fn crlf_terminators_are_preserved() {
        let content = "A\r\nANCHOR_LINE\r\nB\r\n";
        let rewritten = inserted(insert_after_anchor(content, ANCHOR, ENTRY));
        assert_eq!(rewritten, "A\r\nANCHOR_LINE\r\nNEW_LINE\r\nB\r\n");
    }

    #[test]
    fn anchor_at_eof_without_newline_gains_one() {
        let content = "A\nANCHOR_LINE";
        let rewritten = inserted(insert_after_anchor(content, ANCHOR, ENTRY));
        assert_eq!(rewritten, "A\nANCHOR_LINE\nNEW_LINE");
    }

    #[test]
    fn state_classification_covers_all_three_cases() {
        assert_eq!(
            mapping_state("A\nANCHOR_LINE\nNEW_LINE\n", ANCHOR, ENTRY),
            MappingState::Patched
        );
        assert_eq!(
            mapping_state("A\nANCHOR_LINE\n", ANCHOR, ENTRY),
            MappingState::Unpatched
        );
        assert_eq!(mapping_state("A\nB\n", ANCHOR, ENTRY), MappingState::AnchorMissing);
    }

    #[test]
    fn empty_content_reports_anchor_missing() {
        assert_eq!(insert_after_anchor("", ANCHOR, ENTRY), RewriteOutcome::AnchorMissing);
        assert_eq!(mapping_state("", ANCHOR, ENTRY), MappingState::AnchorMissing);
    }
}
