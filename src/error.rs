use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions. All of them are raised before any artifact is written.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not find a <body> in the exported document")]
    DocumentStructure,

    #[error("environment problems: {}", .0.join("; "))]
    Environment(Vec<String>),

    #[error("template problems: {}", .0.join("; "))]
    Template(Vec<String>),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("could not extract a title; the document needs a Heading 1, 2 or 3 at the top")]
    MissingTitle,

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("post already exists: {} (pass --force to overwrite)", .0.display())]
    PostExists(PathBuf),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PublishError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PublishError::Io {
            context: context.into(),
            source,
        }
    }
}

/// A single image that could not be stored. Never aborts a run.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image not found in archive: {0}")]
    NotInArchive(String),

    #[error("no image source available for {0}")]
    NoSource(String),

    #[error("failed to download image {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to write image {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),
}

/// Reasons the index document could not be updated. Reported, never fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpsertError {
    #[error("Could not find insertion point in index")]
    NoInsertionPoint,

    #[error("Found existing entry but could not update it")]
    UpdateFailed,
}
