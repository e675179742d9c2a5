//! Frontmatter error diagnostics
//!
//! Malformed YAML inside an entity's frontmatter block is reported against
//! the whole file, so the label lands on the right line of the `.md` file
//! rather than on a line of the extracted block.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// YAML syntax error inside a frontmatter block
#[derive(Debug, Error, Diagnostic)]
#[error("invalid frontmatter in {filename}: {message}")]
#[diagnostic(code(roadmap::frontmatter::syntax))]
pub struct FrontmatterSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    filename: String,

    /// The underlying parser message
    message: String,
}

impl FrontmatterSyntaxError {
    /// Build a diagnostic from a serde_yml error raised while parsing the
    /// block that starts `line_offset` lines into `source`
    pub fn from_serde_error(
        err: &serde_yml::Error,
        source: &str,
        filename: &str,
        line_offset: usize,
    ) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        Self::at_location(
            err.to_string(),
            source,
            filename,
            line + line_offset,
            column,
        )
    }

    /// Error at an explicit line/column of `source`
    pub fn at_location(
        message: impl Into<String>,
        source: &str,
        filename: &str,
        line: usize,
        column: usize,
    ) -> Self {
        let message = message.into();
        let offset = line_col_to_offset(source, line, column);

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help: generate_help(&message),
            filename: filename.to_string(),
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Convert line/column to byte offset
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    let mut current_line = 1;

    for (i, ch) in source.char_indices() {
        if current_line == line {
            let line_start = i;
            let mut col = 1;
            for (j, c) in source[line_start..].char_indices() {
                if col == column {
                    return line_start + j;
                }
                if c == '\n' {
                    break;
                }
                col += 1;
            }
            return line_start + column.saturating_sub(1);
        }
        if ch == '\n' {
            current_line += 1;
        }
        offset = i;
    }

    offset
}

/// Suggest a fix for common frontmatter mistakes
fn generate_help(message: &str) -> Option<String> {
    let msg_lower = message.to_lowercase();

    if msg_lower.contains("tab") {
        return Some(
            "YAML requires spaces for indentation, not tabs. Replace tabs with spaces.".to_string(),
        );
    }

    if msg_lower.contains("duplicate") {
        return Some("Each frontmatter key can only appear once.".to_string());
    }

    if msg_lower.contains("mapping values are not allowed") {
        return Some(
            "Titles containing ':' must be quoted, e.g. title: \"Fix: crash on start\"".to_string(),
        );
    }

    if msg_lower.contains("not a mapping") {
        return Some("Frontmatter must be a set of `key: value` lines.".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_to_offset() {
        let source = "line1\nline2\nline3";
        assert_eq!(line_col_to_offset(source, 1, 1), 0);
        assert_eq!(line_col_to_offset(source, 2, 1), 6);
        assert_eq!(line_col_to_offset(source, 3, 1), 12);
    }

    #[test]
    fn test_help_generation() {
        assert!(generate_help("found tab character").is_some());
        assert!(generate_help("duplicate entry with key \"id\"").is_some());
        assert!(generate_help("mapping values are not allowed in this context").is_some());
        assert!(generate_help("some random error").is_none());
    }

    #[test]
    fn test_offset_shifted_past_opening_delimiter() {
        let source = "---\ntitle: a: b\n---\n";
        let err = FrontmatterSyntaxError::at_location("bad", source, "issue-1.md", 2, 1);
        assert_eq!(err.span.offset(), 4);
        assert_eq!(err.message(), "bad");
    }
}
