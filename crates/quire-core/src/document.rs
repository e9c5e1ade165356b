//! Source documents: front matter metadata plus a template body.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Author-defined key/value metadata decoded from front matter.
pub type Metadata = Map<String, Value>;

/// Reserved key holding a document's raw, uncompiled body.
pub const RAW_BODY_KEY: &str = "src";

/// Reserved key holding a document's rendered body.
pub const BODY_KEY: &str = "body";

/// Delimiter conventions for front matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrontMatterFormat {
    /// YAML front matter delimited by `---`.
    #[default]
    Yaml,
    /// TOML front matter delimited by `+++`.
    Toml,
}

impl FrontMatterFormat {
    /// Every supported convention.
    pub const ALL: [Self; 2] = [Self::Yaml, Self::Toml];

    /// Get the delimiter line for this format.
    pub fn delimiter(&self) -> &'static str {
        match self {
            Self::Yaml => "---",
            Self::Toml => "+++",
        }
    }

    fn from_delimiter(line: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.delimiter() == line)
    }
}

/// A parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Decoded front matter. Empty when the file has none.
    pub metadata: Metadata,

    /// Template source following the front matter.
    pub body: String,

    /// Path the document was read from.
    pub source_path: PathBuf,
}

impl Document {
    /// Parse raw file contents, accepting any supported front matter format.
    pub fn parse(raw: &[u8], path: impl Into<PathBuf>) -> Result<Self> {
        Self::parse_with(raw, path, &FrontMatterFormat::ALL)
    }

    /// Parse raw file contents, recognising only the given front matter formats.
    ///
    /// Input starting with an unrecognised delimiter is treated as body text.
    pub fn parse_with(
        raw: &[u8],
        path: impl Into<PathBuf>,
        formats: &[FrontMatterFormat],
    ) -> Result<Self> {
        let source_path = path.into();
        let content = std::str::from_utf8(raw)
            .map_err(|e| CoreError::malformed(&source_path, format!("invalid UTF-8: {e}")))?;

        let Some((format, front_matter, body)) =
            split_front_matter(content).filter(|(format, _, _)| formats.contains(format))
        else {
            return Ok(Self {
                metadata: Metadata::new(),
                body: content.to_string(),
                source_path,
            });
        };

        let metadata = decode_metadata(format, front_matter, &source_path)?;

        Ok(Self {
            metadata,
            body: body.to_string(),
            source_path,
        })
    }

    /// Read and parse a document from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|e| CoreError::io(path, e))?;
        Self::parse(&raw, path)
    }

    /// Serialize the document back into front matter plus body.
    pub fn to_source(&self, format: FrontMatterFormat) -> Result<String> {
        let delimiter = format.delimiter();
        let mut out = format!("{delimiter}\n");

        if !self.metadata.is_empty() {
            let encoded = match format {
                FrontMatterFormat::Yaml => serde_yaml::to_string(&self.metadata)
                    .map_err(|e| CoreError::malformed(&self.source_path, e))?,
                FrontMatterFormat::Toml => toml::to_string(&self.metadata)
                    .map_err(|e| CoreError::malformed(&self.source_path, e))?,
            };
            out.push_str(&encoded);
            if !encoded.ends_with('\n') {
                out.push('\n');
            }
        }

        out.push_str(delimiter);
        out.push('\n');
        out.push_str(&self.body);
        Ok(out)
    }

    /// Look up a metadata value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// File name without extension, used to name outputs, partials and layouts.
    #[must_use]
    pub fn stem(&self) -> String {
        file_stem(&self.source_path)
    }
}

/// File name of `path` without its extension.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Split content into front matter and body.
///
/// The opening and closing delimiters must each sit on a line of their own.
/// Exactly one line ending after the closing delimiter is consumed, the rest
/// is returned verbatim as body. An unterminated block yields `None`.
pub fn split_front_matter(content: &str) -> Option<(FrontMatterFormat, &str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let (first, after_open) = split_line(content);
    let format = FrontMatterFormat::from_delimiter(first.trim_end())?;

    let mut rest = after_open;
    let mut offset = 0;
    while !rest.is_empty() {
        let (line, next) = split_line(rest);
        if line.trim_end() == format.delimiter() {
            return Some((format, &after_open[..offset], next));
        }
        offset += rest.len() - next.len();
        rest = next;
    }

    None
}

fn split_line(s: &str) -> (&str, &str) {
    match s.find('\n') {
        Some(i) => (&s[..i], &s[i + 1..]),
        None => (s, ""),
    }
}

fn decode_metadata(format: FrontMatterFormat, text: &str, path: &Path) -> Result<Metadata> {
    if text.trim().is_empty() {
        return Ok(Metadata::new());
    }

    let value: Value = match format {
        FrontMatterFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|e| CoreError::malformed(path, e))?
        }
        FrontMatterFormat::Toml => toml::from_str(text).map_err(|e| CoreError::malformed(path, e))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Metadata::new()),
        other => Err(CoreError::malformed(
            path,
            format!("front matter must be a mapping, found {}", value_kind(&other)),
        )),
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(content: &str) -> Result<Document> {
        Document::parse(content.as_bytes(), "src/pages/test.hbs")
    }

    #[test]
    fn test_split_yaml_front_matter() {
        let content = "---\ntitle: \"Hello World\"\n---\n<p>body</p>";

        let (format, fm, body) = split_front_matter(content).expect("split");
        assert_eq!(format, FrontMatterFormat::Yaml);
        assert_eq!(fm, "title: \"Hello World\"\n");
        assert_eq!(body, "<p>body</p>");
    }

    #[test]
    fn test_split_toml_front_matter() {
        let content = "+++\ntitle = \"Hello World\"\n+++\n\nBody";

        let (format, fm, body) = split_front_matter(content).expect("split");
        assert_eq!(format, FrontMatterFormat::Toml);
        assert!(fm.contains("title ="));
        assert_eq!(body, "\nBody");
    }

    #[test]
    fn test_split_ignores_inline_delimiter() {
        let content = "---\ntitle: a --- b\n---\nBody";
        let (_, fm, body) = split_front_matter(content).expect("split");
        assert_eq!(fm, "title: a --- b\n");
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_split_unterminated() {
        assert!(split_front_matter("---\ntitle: x\n").is_none());
        assert!(split_front_matter("Just some content.").is_none());
    }

    #[test]
    fn test_parse_without_front_matter() {
        let doc = parse("<h1>{{title}}</h1>").expect("parse");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "<h1>{{title}}</h1>");
        assert_eq!(doc.stem(), "test");
    }

    #[test]
    fn test_parse_structured_values() {
        let content = r#"---
title: "Test Post"
weight: 3
tags:
  - rust
  - web
author:
  name: Ada
  links: [home, blog]
---
<h2>{{title}}</h2>"#;

        let doc = parse(content).expect("parse");
        assert_eq!(doc.get("title"), Some(&json!("Test Post")));
        assert_eq!(doc.get("weight"), Some(&json!(3)));
        assert_eq!(doc.get("tags"), Some(&json!(["rust", "web"])));
        assert_eq!(doc.get("author"), Some(&json!({"name": "Ada", "links": ["home", "blog"]})));
        assert_eq!(doc.body, "<h2>{{title}}</h2>");
    }

    #[test]
    fn test_parse_toml_front_matter() {
        let content = "+++\ntitle = \"Test\"\ntags = [\"a\", \"b\"]\n+++\nContent";
        let doc = parse(content).expect("parse");
        assert_eq!(doc.get("title"), Some(&json!("Test")));
        assert_eq!(doc.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(doc.body, "Content");
    }

    #[test]
    fn test_parse_with_restricted_formats() {
        let content = "+++\ntitle = \"Test\"\n+++\nContent";
        let doc = Document::parse_with(content.as_bytes(), "a.hbs", &[FrontMatterFormat::Yaml])
            .expect("parse");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, content);
    }

    #[test]
    fn test_parse_crlf_and_bom() {
        let content = "\u{feff}---\r\ntitle: Windows\r\n---\r\nBody\r\n";
        let doc = parse(content).expect("parse");
        assert_eq!(doc.get("title"), Some(&json!("Windows")));
        assert_eq!(doc.body, "Body\r\n");
    }

    #[test]
    fn test_empty_front_matter() {
        let doc = parse("---\n---\nBody").expect("parse");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.body, "Body");
    }

    #[test]
    fn test_malformed_yaml() {
        let err = parse("---\ntitle: [unclosed\n---\nBody").unwrap_err();
        assert!(matches!(err, CoreError::MalformedMetadata { .. }));
        assert!(err.to_string().contains("src/pages/test.hbs"));
    }

    #[test]
    fn test_non_mapping_front_matter() {
        let err = parse("---\n- a\n- b\n---\nBody").unwrap_err();
        assert!(err.to_string().contains("must be a mapping"));
    }

    #[test]
    fn test_invalid_utf8() {
        let err = Document::parse(&[0x2d, 0xff, 0xfe], "bad.hbs").unwrap_err();
        assert!(matches!(err, CoreError::MalformedMetadata { .. }));
    }

    #[test]
    fn test_round_trip_yaml() {
        let doc = parse(
            "---\ntitle: A\ncount: 2\nratio: 0.5\ndraft: false\nnested:\n  list: [1, '2']\n---\n<h2>{{title}}</h2>\n",
        )
        .expect("parse");

        let source = doc.to_source(FrontMatterFormat::Yaml).expect("serialize");
        let reparsed = Document::parse(source.as_bytes(), &doc.source_path).expect("reparse");
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_round_trip_toml() {
        let doc = parse("+++\ntitle = \"B\"\ntags = [\"x\"]\nweight = 4\n+++\nBody").expect("parse");

        let source = doc.to_source(FrontMatterFormat::Toml).expect("serialize");
        let reparsed = Document::parse(source.as_bytes(), &doc.source_path).expect("reparse");
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_round_trip_empty_metadata() {
        let doc = Document {
            metadata: Metadata::new(),
            body: "---\nnot front matter".to_string(),
            source_path: PathBuf::from("x.hbs"),
        };

        let source = doc.to_source(FrontMatterFormat::Yaml).expect("serialize");
        let reparsed = Document::parse(source.as_bytes(), "x.hbs").expect("reparse");
        assert_eq!(reparsed, doc);
    }
}
