//! Remote ids declared in issue frontmatter

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::Span;

use super::{LinkError, GITHUB_BACKEND};
use crate::core::frontmatter::{self, Frontmatter};
use crate::core::project::markdown_files;
use crate::core::sync::derive_issue_id;

/// `entity id -> backend -> remote id`
pub type DeclaredLinks = BTreeMap<String, BTreeMap<String, String>>;

/// Remote ids declared by one file's frontmatter
///
/// Reads the `remote_ids` mapping and the older `github_issue` scalar.
/// An entry in `remote_ids` wins over `github_issue`.
pub fn declared_refs(fields: &Frontmatter) -> BTreeMap<String, String> {
    let mut refs = BTreeMap::new();

    if let Some(id) = fields.get("github_issue").and_then(remote_id_text) {
        refs.insert(GITHUB_BACKEND.to_string(), id);
    }

    if let Some(Value::Object(map)) = fields.get("remote_ids") {
        for (backend, value) in map {
            let backend = backend.trim();
            if backend.is_empty() {
                continue;
            }
            if let Some(id) = remote_id_text(value) {
                refs.insert(backend.to_string(), id);
            }
        }
    }

    refs
}

fn remote_id_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Collect declared remote ids from every issue file under `issues_dir`
///
/// Unreadable files are logged and skipped. Files with no declared ids do
/// not appear in the result.
pub fn scan_declared_links(issues_dir: &Path, span: &Span) -> Result<DeclaredLinks, LinkError> {
    if !issues_dir.is_dir() {
        return Err(LinkError::IssuesDirMissing {
            path: issues_dir.to_path_buf(),
        });
    }

    let mut declared = DeclaredLinks::new();
    for path in markdown_files(issues_dir) {
        let fields = match frontmatter::parse_file(&path) {
            Ok(Some(fields)) => fields,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(parent: span, path = %path.display(), "skipping unreadable issue: {}", e);
                continue;
            }
        };

        let refs = declared_refs(&fields);
        if refs.is_empty() {
            continue;
        }

        let id = derive_issue_id(&fields, &path);
        if declared.contains_key(&id) {
            tracing::warn!(parent: span, id = %id, path = %path.display(), "issue id declared by more than one file");
        }
        declared.entry(id).or_default().extend(refs);
    }

    Ok(declared)
}
