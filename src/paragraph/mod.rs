// src/paragraph/mod.rs

//! Paragraph-structured control file grammar.
//!
//! All of quarry's metadata (port CONTROL files, binary manifests, the
//! status database, BUILD_INFO) shares one line-oriented format: a file is a
//! sequence of paragraphs separated by blank lines, and a paragraph is a
//! sequence of `Name: value` fields. A continuation line starts with a
//! single space and extends the previous field's value; a continuation line
//! consisting of ` .` encodes an embedded blank line.
//!
//! Field names are case-sensitive and unique within a paragraph. Their order
//! is preserved so that serialization round-trips.

use std::path::Path;

use crate::error::{Error, Result};

/// One paragraph: an ordered field -> value map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    fields: Vec<(String, String)>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field. Returns false if the name is already present.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.get(&name).is_some() {
            return false;
        }
        self.fields.push((name, value.into()));
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// A parse failure with the 1-based line it occurred on.
///
/// The parser does not know which file it is reading; callers attach the
/// path with [`ParseError::in_file`] before surfacing the error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }

    pub fn in_file(self, path: &Path) -> Error {
        Error::Parse {
            path: path.to_path_buf(),
            line: self.line,
            reason: self.reason,
        }
    }
}

/// Parse a whole control stream into its paragraphs.
///
/// Accepts LF or CRLF line endings. Returns an empty list for an empty or
/// all-blank input.
pub fn parse_paragraphs(text: &str) -> std::result::Result<Vec<Paragraph>, ParseError> {
    let mut paragraphs = Vec::new();
    let mut current = Paragraph::new();
    // Name of the field currently accepting continuation lines.
    let mut open_field: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            open_field = None;
            continue;
        }

        if let Some(rest) = line.strip_prefix(' ') {
            let name = match &open_field {
                Some(name) => name,
                None => {
                    return Err(ParseError::new(
                        lineno,
                        "continuation line without a preceding field",
                    ))
                }
            };
            let appended = if rest == "." { "" } else { rest };
            let entry = current
                .fields
                .iter_mut()
                .find(|(n, _)| n == name)
                .expect("open field is always present");
            entry.1.push('\n');
            entry.1.push_str(appended);
            continue;
        }

        let colon = line.find(':').ok_or_else(|| {
            ParseError::new(lineno, format!("expected 'Name: value', found '{}'", line))
        })?;
        let name = &line[..colon];
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ParseError::new(
                lineno,
                format!("malformed field name '{}'", name),
            ));
        }
        // Exactly one separating space is part of the syntax; anything
        // beyond it belongs to the value, which keeps round-trips exact.
        let value = line[colon + 1..].strip_prefix(' ').unwrap_or(&line[colon + 1..]);

        if !current.push(name, value) {
            return Err(ParseError::new(
                lineno,
                format!("duplicate field '{}'", name),
            ));
        }
        open_field = Some(name.to_string());
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs)
}

/// Parse a file expected to contain exactly one paragraph.
pub fn parse_single_paragraph(text: &str) -> std::result::Result<Paragraph, ParseError> {
    let mut paragraphs = parse_paragraphs(text)?;
    match paragraphs.len() {
        1 => Ok(paragraphs.remove(0)),
        n => Err(ParseError::new(
            1,
            format!("expected exactly one paragraph, found {}", n),
        )),
    }
}

/// Serialize one paragraph. Emits LF endings and a trailing newline after
/// the last field, but no paragraph separator.
pub fn serialize_paragraph(paragraph: &Paragraph) -> String {
    let mut out = String::new();
    for (name, value) in paragraph.iter() {
        out.push_str(name);
        out.push(':');
        let mut lines = value.split('\n');
        if let Some(first) = lines.next() {
            if !first.is_empty() {
                out.push(' ');
                out.push_str(first);
            }
        }
        out.push('\n');
        for cont in lines {
            out.push(' ');
            out.push_str(if cont.is_empty() { "." } else { cont });
            out.push('\n');
        }
    }
    out
}

/// Serialize a sequence of paragraphs separated by blank lines.
pub fn serialize_paragraphs<'a>(paragraphs: impl IntoIterator<Item = &'a Paragraph>) -> String {
    let rendered: Vec<String> = paragraphs.into_iter().map(serialize_paragraph).collect();
    rendered.join("\n")
}

/// Field access helper over a parsed paragraph.
///
/// `required_field` failures carry the field name; callers convert them to a
/// file-level parse error with the path and paragraph context they hold.
pub struct FieldReader<'a> {
    paragraph: &'a Paragraph,
    context: &'a str,
}

impl<'a> FieldReader<'a> {
    pub fn new(paragraph: &'a Paragraph, context: &'a str) -> Self {
        Self { paragraph, context }
    }

    pub fn required_field(&self, name: &str) -> Result<String> {
        match self.paragraph.get(name) {
            Some(v) => Ok(v.to_string()),
            None => Err(Error::Manifest(format!(
                "{}: required field '{}' is missing",
                self.context, name
            ))),
        }
    }

    /// Returns the empty string when the field is absent.
    pub fn optional_field(&self, name: &str) -> String {
        self.paragraph.get(name).unwrap_or("").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_field() {
        let pghs = parse_paragraphs("Source: zlib\n").unwrap();
        assert_eq!(pghs.len(), 1);
        assert_eq!(pghs[0].get("Source"), Some("zlib"));
    }

    #[test]
    fn test_parse_multiple_paragraphs() {
        let text = "Source: zlib\nVersion: 1.2.11\n\n\nFeature: bzip2\nDescription: bzip2 support\n";
        let pghs = parse_paragraphs(text).unwrap();
        assert_eq!(pghs.len(), 2);
        assert_eq!(pghs[0].get("Version"), Some("1.2.11"));
        assert_eq!(pghs[1].get("Feature"), Some("bzip2"));
    }

    #[test]
    fn test_parse_continuation_lines() {
        let text = "Description: first line\n second line\n .\n fourth line\n";
        let pghs = parse_paragraphs(text).unwrap();
        assert_eq!(
            pghs[0].get("Description"),
            Some("first line\nsecond line\n\nfourth line")
        );
    }

    #[test]
    fn test_parse_crlf() {
        let pghs = parse_paragraphs("Source: zlib\r\nVersion: 1\r\n\r\nFeature: a\r\n").unwrap();
        assert_eq!(pghs.len(), 2);
        assert_eq!(pghs[0].get("Source"), Some("zlib"));
    }

    #[test]
    fn test_parse_rejects_duplicate_field() {
        let err = parse_paragraphs("A: 1\nA: 2\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.reason.contains("duplicate"));
    }

    #[test]
    fn test_parse_rejects_orphan_continuation() {
        let err = parse_paragraphs(" dangling\n").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_parse_rejects_missing_colon() {
        let err = parse_paragraphs("Source zlib\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.reason.contains("Name: value"));
    }

    #[test]
    fn test_continuation_does_not_cross_paragraphs() {
        let err = parse_paragraphs("A: 1\n\n cont\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_roundtrip() {
        let mut p = Paragraph::new();
        p.push("Package", "zlib");
        p.push("Description", "A compression library\nwith a second line\n\nand a gap");
        p.push("Empty", "");

        let text = serialize_paragraph(&p);
        let reparsed = parse_paragraphs(&text).unwrap();
        assert_eq!(reparsed, vec![p]);
    }

    #[test]
    fn test_roundtrip_many() {
        let mut a = Paragraph::new();
        a.push("Package", "a");
        let mut b = Paragraph::new();
        b.push("Package", "b");
        b.push("Status", "install ok installed");

        let text = serialize_paragraphs([&a, &b]);
        let reparsed = parse_paragraphs(&text).unwrap();
        assert_eq!(reparsed, vec![a, b]);
    }

    #[test]
    fn test_field_reader() {
        let mut p = Paragraph::new();
        p.push("Package", "zlib");
        let reader = FieldReader::new(&p, "test");
        assert_eq!(reader.required_field("Package").unwrap(), "zlib");
        assert_eq!(reader.optional_field("Missing"), "");
        assert!(reader.required_field("Missing").is_err());
    }
}
