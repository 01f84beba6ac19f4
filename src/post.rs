use chrono::NaiveDate;
use serde::Serialize;

const SLUG_MAX_LEN: usize = 50;
/// Used when nothing in the title survives transliteration.
const FALLBACK_SLUG: &str = "untitled";
const SUBTITLE_MAX_LEN: usize = 150;

/// Everything the template and the index entry need to know about a post.
#[derive(Debug, Clone, Serialize)]
pub struct PostMetadata {
    pub title: String,
    pub subtitle: String,
    pub slug: String,
    pub filename: String,
    #[serde(skip)]
    pub content_html: String,
    pub iso_date: String,
    pub display_date: String,
    pub reading_time_minutes: u32,
}

impl PostMetadata {
    pub fn new(
        title: &str,
        subtitle: &str,
        content_html: String,
        date: NaiveDate,
        reading_time_minutes: u32,
    ) -> Self {
        let slug = slugify(title);
        PostMetadata {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            filename: format!("{}.html", slug),
            slug,
            content_html,
            iso_date: date.format("%Y-%m-%d").to_string(),
            display_date: date.format("%B %d, %Y").to_string(),
            reading_time_minutes,
        }
    }
}

/// URL-safe lowercase slug, at most 50 characters. Non-ASCII text is
/// transliterated first, so the result is never empty.
pub fn slugify(title: &str) -> String {
    let ascii = deunicode::deunicode(title);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    // ASCII only from here, so byte truncation is safe.
    slug.truncate(SLUG_MAX_LEN);
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Fallback description: the opening of the text, cut at a word boundary.
pub fn default_subtitle(plain_text: &str, title: &str) -> String {
    if plain_text.is_empty() {
        return format!("A post about {}", title);
    }
    if plain_text.chars().count() <= SUBTITLE_MAX_LEN {
        return plain_text.to_string();
    }

    let head: String = plain_text.chars().take(SUBTITLE_MAX_LEN).collect();
    let cut = match head.rfind(' ') {
        Some(i) => &head[..i],
        None => head.as_str(),
    };
    format!("{}...", cut)
}
