//! Image resolution: turn an `<img src>` reference into a stored file.
//!
//! Images come either from the archive that accompanied the export (matched
//! by base filename) or from a remote fetch. Either way the stored name is
//! `img_<ordinal>_<hash><ext>`, where the hash covers only the source
//! reference, so re-running on the same markup lands on the same files.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::ImageError;
use crate::fetch::Fetcher;
use crate::utils::{base_filename, extension_of};

pub const DEFAULT_EXTENSION: &str = ".png";

/// Archive entry name -> raw bytes.
pub type ImageArchive = BTreeMap<String, Vec<u8>>;

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("image/png", ".png"),
    ("image/jpeg", ".jpg"),
    ("image/gif", ".gif"),
    ("image/webp", ".webp"),
    ("image/svg+xml", ".svg"),
];

/// Where one image's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    RemoteUrl(&'a str),
    ArchiveEntry { key: &'a str, bytes: &'a [u8] },
}

/// How images are obtained for a whole document.
#[derive(Clone, Copy)]
pub enum ImageOrigin<'a> {
    Archive(&'a ImageArchive),
    Remote(&'a dyn Fetcher),
}

impl<'a> ImageOrigin<'a> {
    /// Find the source for `source_key`. Archive mode matches on base filename.
    pub fn locate<'s>(&self, source_key: &'s str) -> Result<ImageSource<'s>, ImageError>
    where
        'a: 's,
    {
        match *self {
            ImageOrigin::Archive(archive) => {
                let wanted = base_filename(source_key);
                archive
                    .iter()
                    .find(|(key, _)| base_filename(key) == wanted)
                    .map(|(key, bytes)| ImageSource::ArchiveEntry {
                        key: key.as_str(),
                        bytes: bytes.as_slice(),
                    })
                    .ok_or_else(|| ImageError::NotInArchive(wanted.to_string()))
            }
            ImageOrigin::Remote(_) => Ok(ImageSource::RemoteUrl(source_key)),
        }
    }

    fn load<'s>(&self, source: ImageSource<'s>) -> Result<(Cow<'s, [u8]>, String), ImageError> {
        match source {
            ImageSource::ArchiveEntry { key, bytes } => {
                let ext = extension_of(key).unwrap_or(DEFAULT_EXTENSION);
                Ok((Cow::Borrowed(bytes), ext.to_string()))
            }
            ImageSource::RemoteUrl(url) => {
                let ImageOrigin::Remote(fetcher) = *self else {
                    return Err(ImageError::NoSource(url.to_string()));
                };
                let fetched = fetcher.get(url).map_err(|source| ImageError::Fetch {
                    url: url.to_string(),
                    source,
                })?;
                let ext = extension_for_content_type(fetched.content_type.as_deref());
                Ok((Cow::Owned(fetched.bytes), ext.to_string()))
            }
        }
    }
}

/// Per-post asset location: files go to `dir`, markup references `href_prefix`.
#[derive(Debug, Clone)]
pub struct AssetNamespace {
    pub dir: PathBuf,
    pub href_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub filename: String,
    pub href: String,
}

/// Store the image behind `source_key` and return where the post should point.
///
/// Stateless: callers are responsible for not resolving the same key twice.
pub fn resolve(
    source_key: &str,
    ordinal: usize,
    namespace: &AssetNamespace,
    origin: &ImageOrigin,
) -> Result<ResolvedImage, ImageError> {
    let source = origin.locate(source_key)?;
    let (bytes, ext) = origin.load(source)?;

    let filename = image_filename(source_key, ordinal, &ext);
    let path = namespace.dir.join(&filename);
    fs::create_dir_all(&namespace.dir)
        .and_then(|_| fs::write(&path, &bytes))
        .map_err(|source| ImageError::Write {
            path: path.clone(),
            source,
        })?;

    match source {
        ImageSource::ArchiveEntry { .. } => info!("Saved from archive: {}", filename),
        ImageSource::RemoteUrl(_) => info!("Downloaded: {}", filename),
    }

    Ok(ResolvedImage {
        href: format!("{}/{}", namespace.href_prefix, filename),
        filename,
    })
}

/// `img_<ordinal:02>_<first 8 hex of sha256(source_key)><ext>`
pub fn image_filename(source_key: &str, ordinal: usize, ext: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(source_key.as_bytes()));
    format!("img_{:02}_{}{}", ordinal, &digest[..8], ext)
}

/// Map a `Content-Type` header to a file extension; unknown types get `.png`.
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let Some(ct) = content_type else {
        return DEFAULT_EXTENSION;
    };
    let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(t, _)| *t == mime)
        .map(|(_, ext)| *ext)
        .unwrap_or(DEFAULT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubFetcher;

    fn namespace(dir: &std::path::Path) -> AssetNamespace {
        AssetNamespace {
            dir: dir.join("images/posts/hello"),
            href_prefix: "../images/posts/hello".into(),
        }
    }

    #[test]
    fn filename_is_deterministic() {
        let a = image_filename("https://lh3.googleusercontent.com/abc", 3, ".jpg");
        let b = image_filename("https://lh3.googleusercontent.com/abc", 3, ".jpg");
        assert_eq!(a, b);
        assert!(a.starts_with("img_03_"));
        assert!(a.ends_with(".jpg"));
        assert_eq!(a.len(), "img_03_".len() + 8 + ".jpg".len());
        assert_ne!(a, image_filename("https://lh3.googleusercontent.com/abd", 3, ".jpg"));
    }

    #[test]
    fn content_type_table() {
        assert_eq!(extension_for_content_type(Some("image/jpeg")), ".jpg");
        assert_eq!(extension_for_content_type(Some("image/svg+xml; charset=utf-8")), ".svg");
        assert_eq!(extension_for_content_type(Some("application/octet-stream")), ".png");
        assert_eq!(extension_for_content_type(None), ".png");
    }

    #[test]
    fn archive_match_ignores_query_and_inherits_extension() {
        let dir = tempfile::tempdir().unwrap();
        let ns = namespace(dir.path());
        let mut archive = ImageArchive::new();
        archive.insert("word/media/pic1.png".into(), vec![1, 2, 3]);
        archive.insert("word/media/pic2.jpeg".into(), vec![4]);

        let origin = ImageOrigin::Archive(&archive);
        let resolved = resolve("images/pic1.png?x=1", 1, &ns, &origin).unwrap();

        assert!(resolved.filename.ends_with(".png"));
        assert_eq!(resolved.href, format!("../images/posts/hello/{}", resolved.filename));
        assert_eq!(fs::read(ns.dir.join(&resolved.filename)).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn archive_miss_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ImageArchive::new();
        let err = resolve("images/missing.png", 1, &namespace(dir.path()), &ImageOrigin::Archive(&archive))
            .unwrap_err();
        assert!(matches!(err, ImageError::NotInArchive(name) if name == "missing.png"));
    }

    #[test]
    fn archive_entry_without_extension_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = ImageArchive::new();
        archive.insert("media/blob".into(), vec![9]);
        let resolved =
            resolve("blob", 2, &namespace(dir.path()), &ImageOrigin::Archive(&archive)).unwrap();
        assert!(resolved.filename.ends_with(DEFAULT_EXTENSION));
    }

    #[test]
    fn remote_uses_declared_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://lh3.googleusercontent.com/img";
        let fetcher = StubFetcher::default().with(url, b"GIF89a", Some("image/gif"));
        let resolved =
            resolve(url, 1, &namespace(dir.path()), &ImageOrigin::Remote(&fetcher)).unwrap();
        assert!(resolved.filename.ends_with(".gif"));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[test]
    fn remote_failure_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default();
        let ns = namespace(dir.path());
        let err = resolve("https://example.com/gone.png", 1, &ns, &ImageOrigin::Remote(&fetcher))
            .unwrap_err();
        assert!(matches!(err, ImageError::Fetch { .. }));
        assert!(!ns.dir.exists());
    }
}
