//! Frontmatter parsing for entity files
//!
//! Every issue, milestone and project file starts with a YAML block:
//! ```markdown
//! ---
//! title: Fix login redirect
//! status: open
//! ---
//!
//! Free-form notes...
//! ```
//! The sync engine only looks at the block. Values are converted to JSON so
//! that unknown fields can be stored verbatim in the cache's metadata blob.

use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::yaml::FrontmatterSyntaxError;

/// Parsed frontmatter, keyed by field name
pub type Frontmatter = serde_json::Map<String, Value>;

/// An entity file split into its frontmatter and body
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// `None` when the file has no delimited block
    pub frontmatter: Option<Frontmatter>,
    pub body: String,
}

#[derive(Debug, Error, Diagnostic)]
pub enum FrontmatterError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] Box<FrontmatterSyntaxError>),

    #[error("failed to serialize frontmatter for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
}

/// Split raw file contents into the YAML block and the body
///
/// Returns `None` unless the file opens with a `---` line and a matching
/// closing `---` line exists.
pub fn split_frontmatter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw
        .strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))?;

    let mut pos = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "---" {
            let yaml = &rest[..pos];
            let body = &rest[pos + line.len()..];
            return Some((yaml, body));
        }
        pos += line.len();
    }

    // A closing delimiter on the final line with no trailing newline
    if rest[pos..].trim_end_matches('\r') == "---" {
        return Some((&rest[..pos], ""));
    }

    None
}

/// Parse file contents into a document
///
/// `filename` is only used to label diagnostics.
pub fn parse_str(raw: &str, filename: &str) -> Result<Document, FrontmatterError> {
    let Some((yaml, body)) = split_frontmatter(raw) else {
        return Ok(Document {
            frontmatter: None,
            body: raw.to_string(),
        });
    };

    let frontmatter = if yaml.trim().is_empty() {
        Frontmatter::new()
    } else {
        let value: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| {
            Box::new(FrontmatterSyntaxError::from_serde_error(&e, raw, filename, 1))
        })?;

        match value {
            serde_yml::Value::Null => Frontmatter::new(),
            serde_yml::Value::Mapping(map) => mapping_to_json(map),
            _ => {
                return Err(Box::new(FrontmatterSyntaxError::at_location(
                    "frontmatter is not a mapping",
                    raw,
                    filename,
                    2,
                    1,
                ))
                .into())
            }
        }
    };

    Ok(Document {
        frontmatter: Some(frontmatter),
        body: body.to_string(),
    })
}

/// Read and parse an entity file
pub fn read_document(path: &Path) -> Result<Document, FrontmatterError> {
    let raw = fs::read_to_string(path).map_err(|source| FrontmatterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    parse_str(&raw, &filename)
}

/// Extract only the frontmatter of an entity file
pub fn parse_file(path: &Path) -> Result<Option<Frontmatter>, FrontmatterError> {
    Ok(read_document(path)?.frontmatter)
}

/// Write frontmatter and body back to `path`
pub fn save(path: &Path, frontmatter: &Frontmatter, body: &str) -> Result<(), FrontmatterError> {
    let yaml = serde_yml::to_string(frontmatter).map_err(|source| FrontmatterError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let contents = format!("---\n{}---\n{}", yaml, body);
    fs::write(path, contents).map_err(|source| FrontmatterError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn mapping_to_json(map: serde_yml::Mapping) -> Frontmatter {
    map.into_iter()
        .filter_map(|(k, v)| yaml_key(k).map(|key| (key, yaml_to_json(v))))
        .collect()
}

/// Scalar keys are stringified so `2024: ...` survives as the key `"2024"`
fn yaml_key(key: serde_yml::Value) -> Option<String> {
    match key {
        serde_yml::Value::String(s) => Some(s),
        serde_yml::Value::Number(n) => Some(n.to_string()),
        serde_yml::Value::Bool(b) => Some(b.to_string()),
        serde_yml::Value::Tagged(tagged) => yaml_key(tagged.value),
        _ => None,
    }
}

fn yaml_to_json(yaml: serde_yml::Value) -> Value {
    match yaml {
        serde_yml::Value::Null => Value::Null,
        serde_yml::Value::Bool(b) => Value::Bool(b),
        serde_yml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yml::Value::String(s) => Value::String(s),
        serde_yml::Value::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        serde_yml::Value::Mapping(map) => Value::Object(mapping_to_json(map)),
        serde_yml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}
