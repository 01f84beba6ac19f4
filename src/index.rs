//! Keeping the home page's post list in step with published posts.

use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::error::{PublishError, UpsertError};
use crate::patterns::POSTS_PLACEHOLDER;
use crate::post::PostMetadata;
use crate::utils::{backup_path, escape_attr, escape_text, write_atomic};

static POST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<li class="post-item">.*?</li>"#).unwrap());
static LIST_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(<ul class="posts-list">)\s*"#).unwrap());

const ENTRY_INDENT: &str = "\n          ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// An entry for this post existed and was rewritten.
    Updated,
    /// An entry for this post existed and already matched.
    Unchanged,
    Inserted,
}

/// The `<li>` for one post. Built only from `meta`, so equal metadata gives
/// byte-identical entries.
pub fn render_entry(meta: &PostMetadata) -> String {
    format!(
        r#"<li class="post-item">
            <a href="posts/{filename}" class="post-item__link">
              <article>
                <h3 class="post-item__title">{title}</h3>
                <p class="post-item__excerpt">{subtitle}</p>
                <p class="post-item__meta">
                  <time datetime="{iso}">{display}</time> · {minutes} min read
                </p>
              </article>
            </a>
          </li>"#,
        filename = escape_attr(&meta.filename),
        title = escape_text(&meta.title),
        subtitle = escape_text(&meta.subtitle),
        iso = meta.iso_date,
        display = meta.display_date,
        minutes = meta.reading_time_minutes,
    )
}

/// Replace this post's entry if one exists, otherwise insert a new one at
/// the top of the list (or before the placeholder comment).
pub fn upsert(text: &str, meta: &PostMetadata) -> Result<(String, UpsertOutcome), UpsertError> {
    let entry = render_entry(meta);
    let reference = format!(r#"href="posts/{}""#, escape_attr(&meta.filename));

    if let Some(existing) = POST_ITEM_RE
        .find_iter(text)
        .find(|m| m.as_str().contains(&reference))
    {
        let updated = splice_entry(text, existing.range(), &entry)?;
        let outcome = if updated == text {
            UpsertOutcome::Unchanged
        } else {
            UpsertOutcome::Updated
        };
        return Ok((updated, outcome));
    }

    if LIST_OPEN_RE.is_match(text) {
        let replacement = format!("${{1}}{ENTRY_INDENT}{}{ENTRY_INDENT}", escape_dollars(&entry));
        let updated = LIST_OPEN_RE.replacen(text, 1, replacement.as_str()).into_owned();
        return Ok((updated, UpsertOutcome::Inserted));
    }

    if text.contains(POSTS_PLACEHOLDER) {
        let anchored = format!("{entry}{ENTRY_INDENT}{POSTS_PLACEHOLDER}");
        let updated = text.replacen(POSTS_PLACEHOLDER, &anchored, 1);
        return Ok((updated, UpsertOutcome::Inserted));
    }

    Err(UpsertError::NoInsertionPoint)
}

/// Swap `span` for `entry`. The new entry must read back as exactly one
/// post-item span starting where the old one did.
fn splice_entry(text: &str, span: Range<usize>, entry: &str) -> Result<String, UpsertError> {
    let mut updated = String::with_capacity(text.len() + entry.len());
    updated.push_str(&text[..span.start]);
    updated.push_str(entry);
    updated.push_str(&text[span.end..]);

    match POST_ITEM_RE.find_at(&updated, span.start) {
        Some(m) if m.start() == span.start && m.as_str() == entry => Ok(updated),
        _ => Err(UpsertError::UpdateFailed),
    }
}

/// Entry text goes through the `$1` expansion above; keep its `$` literal.
fn escape_dollars(s: &str) -> String {
    s.replace('$', "$$")
}

/// Copy the current index to its `.bak` sibling, then replace it.
pub fn write_with_backup(path: &Path, previous: &str, updated: &str) -> Result<(), PublishError> {
    let backup = backup_path(path);
    fs::write(&backup, previous)
        .map_err(|e| PublishError::io(format!("failed to write backup {}", backup.display()), e))?;
    write_atomic(path, updated.as_bytes())
}

/// Read, upsert and write the index. Anchor problems come back as the
/// failure reason; only I/O is an error.
pub fn update_index(path: &Path, meta: &PostMetadata) -> Result<Result<UpsertOutcome, UpsertError>, PublishError> {
    let previous = fs::read_to_string(path)
        .map_err(|e| PublishError::io(format!("failed to read {}", path.display()), e))?;

    match upsert(&previous, meta) {
        Ok((_, UpsertOutcome::Unchanged)) => {
            info!("Index entry for {} already up to date", meta.filename);
            Ok(Ok(UpsertOutcome::Unchanged))
        }
        Ok((updated, outcome)) => {
            write_with_backup(path, &previous, &updated)?;
            info!("Index {:?}: {} (backup: {})", outcome, meta.filename, backup_path(path).display());
            Ok(Ok(outcome))
        }
        Err(reason) => {
            warn!("{}", reason);
            Ok(Err(reason))
        }
    }
}
