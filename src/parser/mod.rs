pub mod blocks;
pub mod inline;

use std::collections::HashSet;
use std::fs;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::error::PublishError;
use crate::images::{self, AssetNamespace, ImageOrigin};
use blocks::{element_text, Block};

static BODY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<body[\s>/]").unwrap());
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

/// Tags that can supply the title. Narrower than [`BLOCK_TAGS`]: a document
/// whose only heading is an `h4` keeps it in the body and has no title.
const TITLE_TAGS: &[&str] = &["h1", "h2", "h3"];
const BLOCK_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "ul", "ol", "img"];

/// Images hosted here are picked up by the residual pass wherever they sit.
const INTERNAL_IMAGE_HOST: &str = "googleusercontent";
const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone)]
pub struct DocumentModel {
    pub title: Option<String>,
    pub blocks: Vec<Block>,
    pub plain_text: String,
    pub image_count: usize,
    pub reading_time_minutes: u32,
    /// Images that could not be stored, one human-readable line each.
    pub warnings: Vec<String>,
}

impl DocumentModel {
    pub fn content_html(&self) -> String {
        blocks::render_content(&self.blocks)
    }
}

/// Source keys already handled in this document, and how many were attempted.
#[derive(Debug, Default)]
struct ImageLedger {
    seen: HashSet<String>,
    attempted: usize,
    stored: usize,
}

/// Exported markup → title + ordered blocks, storing images under `namespace`.
pub fn extract(
    raw: &str,
    namespace: &AssetNamespace,
    origin: ImageOrigin,
) -> Result<DocumentModel, PublishError> {
    if !BODY_TAG_RE.is_match(raw) {
        return Err(PublishError::DocumentStructure);
    }
    let doc = Html::parse_document(raw);
    let body = doc.select(&BODY).next().ok_or(PublishError::DocumentStructure)?;

    // ── Title: first h1-h3, excluded from everything below ──
    let title_el = body
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| TITLE_TAGS.contains(&el.value().name()));
    let title = title_el.map(element_text).filter(|t| !t.is_empty());
    if let Some(t) = &title {
        info!("Title: {}", t);
    }

    let in_scope = |el: &ElementRef| match title_el {
        Some(t) => !within(el, t),
        None => true,
    };

    let mut ledger = ImageLedger::default();
    let mut warnings = Vec::new();
    let mut blocks = Vec::new();
    let mut text_parts: Vec<String> = Vec::new();

    // ── Block-level pass, document order ──
    for el in body.descendants().filter_map(ElementRef::wrap) {
        let tag = el.value().name();
        if !BLOCK_TAGS.contains(&tag) || !in_scope(&el) {
            continue;
        }

        if tag == "img" {
            if let Some(block) = visit_image(el, &mut ledger, namespace, &origin, &mut warnings) {
                blocks.push(block);
            }
            continue;
        }

        let text = element_text(el);
        if text.is_empty() {
            continue;
        }

        let block = match tag {
            "ul" | "ol" => blocks::list(el),
            "p" => blocks::paragraph(el, &text),
            _ => blocks::heading(tag, &text),
        };
        if let Some(block) = block {
            blocks.push(block);
        }
        text_parts.push(text);
    }

    // ── Residual pass: hosted images the block pass did not reach ──
    for el in body.descendants().filter_map(ElementRef::wrap) {
        if el.value().name() != "img" || !in_scope(&el) {
            continue;
        }
        let src = el.value().attr("src").unwrap_or("");
        if src.contains(INTERNAL_IMAGE_HOST) && !ledger.seen.contains(src) {
            if let Some(block) = visit_image(el, &mut ledger, namespace, &origin, &mut warnings) {
                blocks.push(block);
            }
        }
    }

    if ledger.stored == 0 && namespace.dir.exists() {
        // Only succeeds when empty, which is the only case we want.
        let _ = fs::remove_dir(&namespace.dir);
    }

    let plain_text = text_parts.join(" ");
    let reading_time_minutes = reading_time(&plain_text);
    debug!(
        blocks = blocks.len(),
        images = ledger.stored,
        attempted = ledger.attempted,
        "extracted document"
    );

    Ok(DocumentModel {
        title,
        blocks,
        plain_text,
        image_count: ledger.stored,
        reading_time_minutes,
        warnings,
    })
}

fn within(el: &ElementRef, outer: ElementRef) -> bool {
    el.id() == outer.id() || el.ancestors().any(|a| a.id() == outer.id())
}

fn visit_image(
    el: ElementRef,
    ledger: &mut ImageLedger,
    namespace: &AssetNamespace,
    origin: &ImageOrigin,
    warnings: &mut Vec<String>,
) -> Option<Block> {
    let src = el.value().attr("src").unwrap_or("");
    if src.is_empty() || !ledger.seen.insert(src.to_string()) {
        return None;
    }
    ledger.attempted += 1;
    let ordinal = ledger.attempted;

    match images::resolve(src, ordinal, namespace, origin) {
        Ok(resolved) => {
            ledger.stored += 1;
            let alt_text = el
                .value()
                .attr("alt")
                .map(|a| a.to_string())
                .unwrap_or_else(|| format!("Image {}", ordinal));
            Some(Block::ImageRef {
                source_key: src.to_string(),
                alt_text,
                resolved_path: resolved.href,
            })
        }
        Err(e) => {
            warn!("{}", e);
            warnings.push(e.to_string());
            None
        }
    }
}

/// Minutes at 200 words per minute, never less than one.
pub fn reading_time(text: &str) -> u32 {
    reading_time_for_words(text.split_whitespace().count())
}

pub fn reading_time_for_words(words: usize) -> u32 {
    words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubFetcher;
    use crate::images::ImageArchive;
    use blocks::{HeadingLevel, ListKind};

    fn namespace(dir: &std::path::Path) -> AssetNamespace {
        AssetNamespace {
            dir: dir.join("images/posts/post"),
            href_prefix: "../images/posts/post".into(),
        }
    }

    fn extract_archive(html: &str, archive: &ImageArchive) -> (DocumentModel, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let model = extract(html, &namespace(dir.path()), ImageOrigin::Archive(archive)).unwrap();
        (model, dir)
    }

    #[test]
    fn reading_time_boundaries() {
        assert_eq!(reading_time_for_words(0), 1);
        assert_eq!(reading_time_for_words(199), 1);
        assert_eq!(reading_time_for_words(200), 1);
        assert_eq!(reading_time_for_words(201), 2);
        assert_eq!(reading_time(&"word ".repeat(401)), 3);
    }

    #[test]
    fn missing_body_is_structural_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ImageArchive::new();
        let err = extract("<p>no body here</p>", &namespace(dir.path()), ImageOrigin::Archive(&archive))
            .unwrap_err();
        assert!(matches!(err, PublishError::DocumentStructure));
    }

    #[test]
    fn title_is_removed_and_order_kept() {
        let html = "<html><body>\
            <p>Intro</p>\
            <h1>Hello World</h1>\
            <h2>Section</h2>\
            <p>Body text.</p>\
            <ul><li>a</li><li>b</li></ul>\
            <h4>Small</h4>\
            </body></html>";
        let (model, _dir) = extract_archive(html, &ImageArchive::new());

        assert_eq!(model.title.as_deref(), Some("Hello World"));
        let kinds: Vec<String> = model
            .blocks
            .iter()
            .map(|b| match b {
                Block::Heading { text, .. } => format!("h:{text}"),
                Block::Paragraph { plain_text, .. } => format!("p:{plain_text}"),
                Block::List { items, .. } => format!("l:{}", items.join(",")),
                Block::ImageRef { .. } => "img".into(),
            })
            .collect();
        assert_eq!(kinds, vec!["p:Intro", "h:Section", "p:Body text.", "l:a,b", "h:Small"]);
        assert_eq!(model.plain_text, "Intro Section Body text. ab Small");
        assert_eq!(model.image_count, 0);
    }

    // Known edge case: h4 never supplies the title, so it stays in the body.
    #[test]
    fn deep_heading_is_not_taken_as_title() {
        let html = "<body><h4>Only Heading</h4><p>text</p></body>";
        let (model, _dir) = extract_archive(html, &ImageArchive::new());
        assert_eq!(model.title, None);
        assert_eq!(
            model.blocks[0],
            Block::Heading { level: HeadingLevel::Minor, text: "Only Heading".into() }
        );
    }

    #[test]
    fn blockquote_paragraph() {
        let html = r#"<body><h1>T</h1><p style="margin-left:36pt">Quoted <b>words</b></p><p>Plain</p></body>"#;
        let (model, _dir) = extract_archive(html, &ImageArchive::new());
        assert!(matches!(&model.blocks[0], Block::Paragraph { is_blockquote: true, plain_text, .. } if plain_text == "Quoted words"));
        assert!(matches!(&model.blocks[1], Block::Paragraph { is_blockquote: false, .. }));
    }

    #[test]
    fn empty_elements_are_skipped() {
        let html = "<body><h1>T</h1><p>   </p><h2></h2><ol><li> </li></ol><p>x</p></body>";
        let (model, _dir) = extract_archive(html, &ImageArchive::new());
        assert_eq!(model.blocks.len(), 1);
    }

    #[test]
    fn duplicate_image_resolved_once() {
        let html = r#"<body><h1>T</h1>
            <p><span><img src="images/image1.png" alt="first"></span></p>
            <p>between</p>
            <p><img src="images/image1.png"></p>
            </body>"#;
        let mut archive = ImageArchive::new();
        archive.insert("doc/images/image1.png".into(), vec![7; 4]);
        let (model, dir) = extract_archive(html, &archive);

        let images: Vec<_> = model
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::ImageRef { .. }))
            .collect();
        assert_eq!(images.len(), 1);
        assert_eq!(model.image_count, 1);
        assert!(matches!(images[0], Block::ImageRef { alt_text, .. } if alt_text == "first"));
        let stored = fs::read_dir(namespace(dir.path()).dir).unwrap().count();
        assert_eq!(stored, 1);
    }

    #[test]
    fn image_failure_is_a_warning() {
        let html = r#"<body><h1>T</h1><p><img src="images/nope.png"></p><p>after</p></body>"#;
        let (model, dir) = extract_archive(html, &ImageArchive::new());
        assert_eq!(model.image_count, 0);
        assert_eq!(model.warnings.len(), 1);
        assert!(model.warnings[0].contains("nope.png"));
        assert_eq!(model.blocks.len(), 1);
        assert!(!namespace(dir.path()).dir.exists());
    }

    #[test]
    fn remote_images_use_fetcher_and_default_alt() {
        let url = "https://lh5.googleusercontent.com/abc";
        let html = format!(r#"<body><h2>Title</h2><p><img src="{url}"></p><p><img src="{url}"></p></body>"#);
        let fetcher = StubFetcher::default().with(url, b"\x89PNG", Some("image/png"));
        let dir = tempfile::tempdir().unwrap();
        let model = extract(&html, &namespace(dir.path()), ImageOrigin::Remote(&fetcher)).unwrap();

        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(model.image_count, 1);
        match &model.blocks[0] {
            Block::ImageRef { alt_text, resolved_path, source_key } => {
                assert_eq!(alt_text, "Image 1");
                assert_eq!(source_key, url);
                assert!(resolved_path.starts_with("../images/posts/post/img_01_"));
                assert!(resolved_path.ends_with(".png"));
            }
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn rebuilding_yields_identical_filenames() {
        let html = r#"<body><h1>T</h1><p><img src="images/a.jpg"></p></body>"#;
        let mut archive = ImageArchive::new();
        archive.insert("images/a.jpg".into(), vec![1]);
        let (first, _d1) = extract_archive(html, &archive);
        let (second, _d2) = extract_archive(html, &archive);
        assert_eq!(first.blocks, second.blocks);
    }

    #[test]
    fn title_images_are_dropped() {
        let html = r#"<body><h1><img src="images/logo.png">Logo Title</h1><p>x</p></body>"#;
        let mut archive = ImageArchive::new();
        archive.insert("images/logo.png".into(), vec![1]);
        let (model, _dir) = extract_archive(html, &archive);
        assert_eq!(model.title.as_deref(), Some("Logo Title"));
        assert_eq!(model.image_count, 0);
    }

    #[test]
    fn export_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/export.html").unwrap();
        let mut archive = ImageArchive::new();
        archive.insert("images/image1.png".into(), vec![0; 8]);
        let (model, _dir) = extract_archive(&html, &archive);

        assert_eq!(model.title.as_deref(), Some("Notes on Slow Software"));
        assert_eq!(model.image_count, 1);
        assert!(model.warnings.is_empty());
        assert!(model.blocks.iter().any(|b| matches!(b, Block::List { kind: ListKind::Ordered, items } if items.len() == 3)));
        assert!(model.blocks.iter().any(|b| matches!(b, Block::Paragraph { is_blockquote: true, .. })));

        let html_out = model.content_html();
        assert!(html_out.contains(r#"<a href="https://example.com/essay">an essay</a>"#));
        assert!(html_out.contains("<strong>fast</strong>"));
        assert!(!html_out.contains("Notes on Slow Software"));
    }
}
