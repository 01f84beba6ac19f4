//! One publish run: verify, load, extract twice, project, write, upsert.

use std::fs;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::BlogConfig;
use crate::error::PublishError;
use crate::fetch::Fetcher;
use crate::images::{AssetNamespace, ImageOrigin};
use crate::index::{self, UpsertOutcome};
use crate::parser::{self, DocumentModel};
use crate::post::{default_subtitle, slugify, PostMetadata};
use crate::projector::{self, Projection};
use crate::source::{DocSource, LoadedDocument};
use crate::utils::write_atomic;
use crate::verify;

/// Asset namespace used for the first extraction, before the slug is known.
const PLACEHOLDER_SLUG: &str = "temp";

#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub source: DocSource,
    pub subtitle: Option<String>,
    pub date: Option<NaiveDate>,
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishSummary {
    pub metadata: PostMetadata,
    pub post_path: PathBuf,
    pub asset_dir: PathBuf,
    pub image_count: usize,
    pub dry_run: bool,
    /// Images that could not be stored.
    pub image_warnings: Vec<String>,
    /// Template markers that were not found.
    pub projection_warnings: Vec<String>,
    /// `None` on a dry run.
    pub index_outcome: Option<String>,
    pub index_failure: Option<String>,
}

impl PublishSummary {
    pub fn git_commands(&self, config: &BlogConfig) -> Vec<String> {
        vec![
            "git add .".to_string(),
            format!("git commit -m \"Add new post: {}\"", self.metadata.title),
            format!("git push {} {}", config.git_remote, config.git_branch),
        ]
    }
}

fn namespace(config: &BlogConfig, slug: &str) -> AssetNamespace {
    AssetNamespace {
        dir: config.asset_dir(slug),
        href_prefix: config.asset_href_prefix(slug),
    }
}

fn extract_into(
    doc: &LoadedDocument,
    ns: &AssetNamespace,
    fetcher: &dyn Fetcher,
) -> Result<DocumentModel, PublishError> {
    let origin = match &doc.images {
        Some(archive) => ImageOrigin::Archive(archive),
        None => ImageOrigin::Remote(fetcher),
    };
    parser::extract(&doc.markup, ns, origin)
}

pub fn publish(
    config: &BlogConfig,
    request: &PublishRequest,
    fetcher: &dyn Fetcher,
) -> Result<PublishSummary, PublishError> {
    // ── 1. Preconditions ──
    let env = verify::verify_environment(config);
    if !env.passed {
        return Err(PublishError::Environment(env.issues));
    }
    let template_path = config.template_path();
    let template_report = verify::verify_template(&template_path);
    if !template_report.check.passed {
        return Err(PublishError::Template(template_report.check.issues));
    }
    for w in &template_report.check.warnings {
        warn!("{}", w);
    }
    info!("Environment OK");

    // ── 2. Source ──
    let doc = request.source.load(fetcher)?;

    // ── 3. First pass for the title ──
    // Its images are discarded before any check can abort the run.
    let placeholder = namespace(config, PLACEHOLDER_SLUG);
    let draft = extract_into(&doc, &placeholder, fetcher);
    if placeholder.dir.exists() {
        if let Err(e) = fs::remove_dir_all(&placeholder.dir) {
            warn!("could not remove {}: {}", placeholder.dir.display(), e);
        }
    }
    let draft = draft?;
    let title = draft.title.clone().ok_or(PublishError::MissingTitle)?;

    // ── 4. Slug and collision check ──
    let slug = slugify(&title);
    let post_path = config.post_path(&format!("{}.html", slug));
    if post_path.exists() && !request.force {
        return Err(PublishError::PostExists(post_path));
    }
    info!(
        "Filename: {}.html, reading time ~{} min, {} images",
        slug, draft.reading_time_minutes, draft.image_count
    );

    // ── 5. Final pass on the real namespace ──
    let final_ns = namespace(config, &slug);
    let model = extract_into(&doc, &final_ns, fetcher)?;

    // ── 6. Metadata ──
    let subtitle = request
        .subtitle
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_subtitle(&model.plain_text, &title));
    let date = request.date.unwrap_or_else(|| Local::now().date_naive());
    let metadata = PostMetadata::new(
        &title,
        &subtitle,
        model.content_html(),
        date,
        model.reading_time_minutes,
    );

    let mut summary = PublishSummary {
        post_path: post_path.clone(),
        asset_dir: final_ns.dir.clone(),
        image_count: model.image_count,
        dry_run: request.dry_run,
        image_warnings: model.warnings.clone(),
        projection_warnings: Vec::new(),
        index_outcome: None,
        index_failure: None,
        metadata,
    };

    // ── 7. Dry run stops before any post or index write ──
    if request.dry_run {
        info!("Dry run: would create {}", post_path.display());
        return Ok(summary);
    }

    // ── 8. Project, write, upsert ──
    let template = fs::read_to_string(&template_path)
        .map_err(|e| PublishError::io(format!("failed to read {}", template_path.display()), e))?;
    let (html, warnings) = projector::project(
        &template,
        &Projection {
            meta: &summary.metadata,
            author: &config.author_name,
        },
    );
    summary.projection_warnings = warnings;

    write_atomic(&post_path, html.as_bytes())?;
    info!("Created: {}", post_path.display());

    match index::update_index(&config.index_path(), &summary.metadata)? {
        Ok(outcome) => {
            summary.index_outcome = Some(
                match outcome {
                    UpsertOutcome::Inserted => "added new entry",
                    UpsertOutcome::Updated => "updated existing entry",
                    UpsertOutcome::Unchanged => "entry already up to date",
                }
                .to_string(),
            );
        }
        Err(reason) => summary.index_failure = Some(reason.to_string()),
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubFetcher;
    use crate::source::export_url;

    const DOC_URL: &str = "https://docs.google.com/document/d/doc123/edit";

    fn blog_root() -> (tempfile::TempDir, BlogConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = BlogConfig::with_root(dir.path());
        fs::create_dir_all(config.posts_path()).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::copy("tests/fixtures/post-template.html", config.template_path()).unwrap();
        fs::copy("tests/fixtures/index.html", config.index_path()).unwrap();
        (dir, config)
    }

    fn hello_world_doc() -> StubFetcher {
        let markup = format!(
            "<html><head><style>{}</style></head><body><h1>Hello World</h1><p>Body text.</p></body></html>",
            " ".repeat(100)
        );
        StubFetcher::default().with(&export_url("doc123"), markup.as_bytes(), Some("text/html"))
    }

    fn request() -> PublishRequest {
        PublishRequest {
            source: DocSource::Remote(DOC_URL.into()),
            subtitle: Some("First post".into()),
            date: NaiveDate::from_ymd_opt(2024, 1, 1),
            force: false,
            dry_run: false,
        }
    }

    #[test]
    fn publishes_hello_world() {
        let (_dir, config) = blog_root();
        let summary = publish(&config, &request(), &hello_world_doc()).unwrap();

        assert!(summary.projection_warnings.is_empty(), "{:?}", summary.projection_warnings);
        assert!(summary.index_failure.is_none());
        assert_eq!(summary.metadata.filename, "hello-world.html");

        let html = fs::read_to_string(config.post_path("hello-world.html")).unwrap();
        assert!(html.contains("<title>Hello World - Author</title>"));
        assert!(html.contains("<h1 class=\"post-header__title\">Hello World</h1>"));
        assert!(html.contains("<p>Body text.</p>"));
        assert!(html.contains("<time datetime=\"2024-01-01\">January 01, 2024</time> · 1 min read"));

        let index = fs::read_to_string(config.index_path()).unwrap();
        assert!(index.contains(r#"href="posts/hello-world.html""#));
        assert!(config.root.join("index.html.bak").exists());
        assert!(!config.asset_dir("temp").exists());
        assert!(!config.asset_dir("hello-world").exists());
    }

    #[test]
    fn existing_post_needs_force() {
        let (_dir, config) = blog_root();
        publish(&config, &request(), &hello_world_doc()).unwrap();

        let err = publish(&config, &request(), &hello_world_doc()).unwrap_err();
        assert!(matches!(err, PublishError::PostExists(_)));

        let forced = PublishRequest { force: true, ..request() };
        let summary = publish(&config, &forced, &hello_world_doc()).unwrap();
        assert_eq!(summary.index_outcome.as_deref(), Some("entry already up to date"));
        let index = fs::read_to_string(config.index_path()).unwrap();
        assert_eq!(index.matches("hello-world.html").count(), 1);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (_dir, config) = blog_root();
        let before = fs::read_to_string(config.index_path()).unwrap();
        let dry = PublishRequest { dry_run: true, ..request() };
        let summary = publish(&config, &dry, &hello_world_doc()).unwrap();

        assert!(summary.dry_run);
        assert!(!summary.post_path.exists());
        assert_eq!(fs::read_to_string(config.index_path()).unwrap(), before);
    }

    #[test]
    fn missing_title_aborts() {
        let (_dir, config) = blog_root();
        let markup = format!("<html><body><p>{}</p></body></html>", "no heading ".repeat(20));
        let fetcher = StubFetcher::default().with(&export_url("doc123"), markup.as_bytes(), None);
        let err = publish(&config, &request(), &fetcher).unwrap_err();
        assert!(matches!(err, PublishError::MissingTitle));
    }

    const IMAGE_URL: &str = "https://lh3.googleusercontent.com/abc";

    /// Serves an export whose body holds `body` plus one hosted image.
    fn doc_with_image(body: &str) -> StubFetcher {
        let markup = format!(
            "<html><head><style>{}</style></head><body>{}<p><img src=\"{}\"></p></body></html>",
            " ".repeat(100),
            body,
            IMAGE_URL
        );
        StubFetcher::default()
            .with(&export_url("doc123"), markup.as_bytes(), Some("text/html"))
            .with(IMAGE_URL, b"\x89PNG fake", Some("image/png"))
    }

    #[test]
    fn missing_title_leaves_no_placeholder_images() {
        let (_dir, config) = blog_root();
        let err = publish(&config, &request(), &doc_with_image("<p>no heading here</p>")).unwrap_err();
        assert!(matches!(err, PublishError::MissingTitle));
        assert!(!config.asset_dir("temp").exists());
    }

    #[test]
    fn post_exists_leaves_no_placeholder_images() {
        let (_dir, config) = blog_root();
        let fetcher = doc_with_image("<h1>Pictures</h1><p>See below.</p>");
        publish(&config, &request(), &fetcher).unwrap();
        assert!(config.asset_dir("pictures").exists());

        let err = publish(&config, &request(), &fetcher).unwrap_err();
        assert!(matches!(err, PublishError::PostExists(_)));
        assert!(!config.asset_dir("temp").exists());
    }

    #[test]
    fn non_ascii_title_publishes() {
        let (_dir, config) = blog_root();
        let markup = format!(
            "<html><head><style>{}</style></head><body><h1>我的第一篇文章</h1><p>正文内容。</p></body></html>",
            " ".repeat(100)
        );
        let fetcher = StubFetcher::default().with(&export_url("doc123"), markup.as_bytes(), None);
        let summary = publish(&config, &request(), &fetcher).unwrap();

        assert_eq!(summary.metadata.title, "我的第一篇文章");
        assert!(!summary.metadata.slug.is_empty());
        assert!(summary.metadata.slug.is_ascii());
        assert!(summary.post_path.exists());
    }

    #[test]
    fn broken_template_aborts_before_download() {
        let (_dir, config) = blog_root();
        fs::write(config.template_path(), "<html><title>x</title></html>").unwrap();
        let fetcher = hello_world_doc();
        let err = publish(&config, &request(), &fetcher).unwrap_err();
        assert!(matches!(err, PublishError::Template(issues) if issues.len() == 6));
        assert_eq!(fetcher.call_count(), 0);
    }

    #[test]
    fn broken_environment_aborts() {
        let (dir, config) = blog_root();
        fs::remove_dir(dir.path().join(".git")).unwrap();
        let err = publish(&config, &request(), &hello_world_doc()).unwrap_err();
        assert!(matches!(err, PublishError::Environment(issues) if issues.len() == 1));
    }

    #[test]
    fn default_subtitle_from_body() {
        let (_dir, config) = blog_root();
        let req = PublishRequest { subtitle: None, ..request() };
        let summary = publish(&config, &req, &hello_world_doc()).unwrap();
        assert_eq!(summary.metadata.subtitle, "Body text.");
    }
}
