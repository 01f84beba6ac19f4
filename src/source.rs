//! Getting the exported document: either a shared-document URL fetched as
//! an HTML export, or a local "Web Page (.html, zipped)" archive.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tracing::info;
use url::Url;

use crate::error::{FetchError, PublishError};
use crate::fetch::Fetcher;
use crate::images::ImageArchive;

static DOC_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").unwrap());

const MIN_DOCUMENT_BYTES: usize = 100;
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocSource {
    Remote(String),
    Archive(PathBuf),
}

/// Loaded markup plus, for archives, the bundled images.
#[derive(Debug)]
pub struct LoadedDocument {
    pub markup: String,
    pub images: Option<ImageArchive>,
}

impl DocSource {
    pub fn detect(input: &str) -> Self {
        let path = Path::new(input);
        let zipped = input.ends_with(".zip")
            || (path.exists() && path.extension().is_some_and(|e| e == "zip"));
        if zipped {
            DocSource::Archive(path.to_path_buf())
        } else {
            DocSource::Remote(input.to_string())
        }
    }

    pub fn load(&self, fetcher: &dyn Fetcher) -> Result<LoadedDocument, PublishError> {
        match self {
            DocSource::Remote(url) => {
                let id = extract_doc_id(url)?;
                info!("Document ID: {}", id);
                let markup = load_remote(&id, fetcher)?;
                Ok(LoadedDocument { markup, images: None })
            }
            DocSource::Archive(path) => {
                let (markup, images) = load_archive(path)?;
                Ok(LoadedDocument {
                    markup,
                    images: Some(images),
                })
            }
        }
    }
}

/// `/d/<id>` in the path, or an `id` query parameter.
pub fn extract_doc_id(url: &str) -> Result<String, PublishError> {
    if url.trim().is_empty() {
        return Err(PublishError::InvalidSource("no URL provided".into()));
    }
    if let Some(caps) = DOC_ID_RE.captures(url) {
        return Ok(caps[1].to_string());
    }
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "id")
                .map(|(_, v)| v.into_owned())
        })
        .ok_or_else(|| {
            PublishError::InvalidSource(format!("could not extract document ID from URL: {}", url))
        })
}

pub fn export_url(doc_id: &str) -> String {
    format!("https://docs.google.com/document/d/{}/export?format=html", doc_id)
}

pub fn load_remote(doc_id: &str, fetcher: &dyn Fetcher) -> Result<String, PublishError> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Downloading document export");
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = fetcher.get(&export_url(doc_id));
    pb.finish_and_clear();

    let fetched = result.map_err(|e| match e {
        FetchError::Status(404) => PublishError::Download("Document not found. Check the URL.".into()),
        FetchError::Status(403) => PublishError::Download(
            "Access denied. Make sure the doc is set to 'Anyone with the link can view'.".into(),
        ),
        FetchError::Http(err) if err.is_timeout() => {
            PublishError::Download("Download timed out. Check your internet connection.".into())
        }
        other => PublishError::Download(other.to_string()),
    })?;

    let markup = String::from_utf8_lossy(&fetched.bytes).into_owned();
    if markup.len() < MIN_DOCUMENT_BYTES {
        return Err(PublishError::Download(
            "Downloaded content is too small. The document might be empty.".into(),
        ));
    }
    info!("Downloaded ({} bytes)", markup.len());
    Ok(markup)
}

pub fn load_archive(path: &Path) -> Result<(String, ImageArchive), PublishError> {
    if !path.exists() {
        return Err(PublishError::Archive(format!(
            "zip file not found: {}",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)
        .map_err(|e| PublishError::io(format!("reading {}", path.display()), e))?;
    read_archive(&bytes)
}

/// First `.html` entry is the document; image entries are collected by name.
pub fn read_archive(bytes: &[u8]) -> Result<(String, ImageArchive), PublishError> {
    let not_zip = |_: zip::result::ZipError| PublishError::Archive("file is not a valid zip file".into());
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(not_zip)?;

    let mut markup = None;
    let mut images = ImageArchive::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(not_zip)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let lower = name.to_lowercase();

        if markup.is_none() && name.ends_with(".html") {
            let mut content = String::new();
            entry
                .read_to_string(&mut content)
                .map_err(|e| PublishError::Archive(format!("failed reading {}: {}", name, e)))?;
            info!("Found HTML: {}", name);
            markup = Some(content);
        } else if IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| PublishError::Archive(format!("failed reading {}: {}", name, e)))?;
            images.insert(name, data);
        }
    }

    let markup = markup.ok_or_else(|| {
        PublishError::Archive(
            "no HTML file found in zip; export as 'Web Page (.html, zipped)'".into(),
        )
    })?;
    info!("Found {} images", images.len());
    Ok((markup, images))
}
