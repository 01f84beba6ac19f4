//! Common helpers shared by the extractor, projector and index writer.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::PublishError;

/// Escape text for an HTML text node.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for a double-quoted HTML attribute value.
pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// Last path component of `reference`, with any `?query` or `#fragment` dropped.
pub fn base_filename(reference: &str) -> &str {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Extension of a file name including the dot, if it has one.
pub fn extension_of(name: &str) -> Option<&str> {
    let base = base_filename(name);
    match base.rfind('.') {
        Some(0) | None => None,
        Some(i) => Some(&base[i..]),
    }
}

/// Sibling path used as the single-slot backup: `index.html` -> `index.html.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

/// Write through a temp file in the same directory, then rename over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PublishError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PublishError::io(format!("failed to create {}", parent.display()), e))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let temp_path = path.with_file_name(tmp_name);

    {
        let mut file = fs::File::create(&temp_path).map_err(|e| {
            PublishError::io(format!("failed to create {}", temp_path.display()), e)
        })?;
        file.write_all(contents)
            .and_then(|_| file.flush())
            .map_err(|e| PublishError::io(format!("failed to write {}", temp_path.display()), e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        PublishError::io(
            format!("failed to rename {} to {}", temp_path.display(), path.display()),
            e,
        )
    })
}
