//! Structural markers the template and index documents must carry.
//!
//! The projector and the index writer both rely on these markers; the
//! verifier checks for them up front so a publish never starts against a
//! template it cannot fill.

use std::sync::LazyLock;

use regex::Regex;

pub struct PatternSpec {
    pub name: &'static str,
    pub matcher: Regex,
    pub required: bool,
}

impl PatternSpec {
    fn new(name: &'static str, pattern: &str, required: bool) -> Self {
        Self {
            name,
            matcher: Regex::new(&format!("(?s){pattern}")).unwrap(),
            required,
        }
    }

    pub fn is_found(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

pub const ROOT_MARKER: &str = "<html";
pub const POSTS_LIST_MARKER: &str = r#"class="posts-list""#;
pub const POSTS_PLACEHOLDER: &str = "<!-- Posts will be added here -->";

pub const TITLE_TAG: &str = r"<title>.*?</title>";
pub const META_DESCRIPTION: &str = r#"<meta name="description"\s+content="[^"]*">"#;
pub const POST_TITLE: &str = r#"<h1 class="post-header__title">.*?</h1>"#;
pub const POST_SUBTITLE: &str = r#"<p class="post-header__subtitle">.*?</p>"#;
pub const POST_META: &str = r#"(?s)<p class="post-header__meta">.*?</p>"#;
pub const POST_BODY: &str = r#"(?s)<div class="post-body">.*?</div>\s*\n\s*<div class="author-card">"#;
pub const AUTHOR_CARD: &str = r#"<div class="author-card">"#;

/// Checked by `verify_template`, in reporting order.
pub static TEMPLATE_PATTERNS: LazyLock<Vec<PatternSpec>> = LazyLock::new(|| {
    vec![
        PatternSpec::new("title_tag", TITLE_TAG, true),
        PatternSpec::new("meta_description", META_DESCRIPTION, true),
        PatternSpec::new("post_title", POST_TITLE, true),
        PatternSpec::new("post_subtitle", POST_SUBTITLE, true),
        PatternSpec::new("post_meta", POST_META, true),
        PatternSpec::new("post_body", POST_BODY, true),
        PatternSpec::new("author_card", AUTHOR_CARD, true),
    ]
});

/// Checked by `verify_index`. The placeholder is only a fallback insertion point.
pub static INDEX_PATTERNS: LazyLock<Vec<PatternSpec>> = LazyLock::new(|| {
    vec![
        PatternSpec::new("posts_list", &regex::escape(POSTS_LIST_MARKER), true),
        PatternSpec::new("posts_placeholder", &regex::escape(POSTS_PLACEHOLDER), false),
    ]
});
