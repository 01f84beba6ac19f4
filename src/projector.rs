//! Fill the post template: six ordered, single-occurrence substitutions.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use tracing::warn;

use crate::patterns;
use crate::post::PostMetadata;
use crate::utils::{escape_attr, escape_text};

/// Values a step renders from.
pub struct Projection<'a> {
    pub meta: &'a PostMetadata,
    pub author: &'a str,
}

struct Step {
    name: &'static str,
    matcher: &'static LazyLock<Regex>,
    render: fn(&Projection) -> String,
}

static TITLE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(patterns::TITLE_TAG).unwrap());
static META_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(patterns::META_DESCRIPTION).unwrap());
static POST_TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(patterns::POST_TITLE).unwrap());
static POST_SUBTITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(patterns::POST_SUBTITLE).unwrap());
static POST_META: LazyLock<Regex> = LazyLock::new(|| Regex::new(patterns::POST_META).unwrap());
static POST_BODY: LazyLock<Regex> = LazyLock::new(|| Regex::new(patterns::POST_BODY).unwrap());

// Order matters: the body region is the widest match and goes last.
static STEPS: &[Step] = &[
    Step {
        name: "title_tag",
        matcher: &TITLE_TAG,
        render: |p| format!("<title>{} - {}</title>", escape_text(&p.meta.title), escape_text(p.author)),
    },
    Step {
        name: "meta_description",
        matcher: &META_DESCRIPTION,
        render: |p| {
            format!(
                "<meta name=\"description\"\n    content=\"{}\">",
                escape_attr(&p.meta.subtitle)
            )
        },
    },
    Step {
        name: "post_title",
        matcher: &POST_TITLE,
        render: |p| format!("<h1 class=\"post-header__title\">{}</h1>", escape_text(&p.meta.title)),
    },
    Step {
        name: "post_subtitle",
        matcher: &POST_SUBTITLE,
        render: |p| {
            format!(
                "<p class=\"post-header__subtitle\">{}</p>",
                escape_text(&p.meta.subtitle)
            )
        },
    },
    Step {
        name: "post_meta",
        matcher: &POST_META,
        render: |p| {
            format!(
                "<p class=\"post-header__meta\">\n            \
                 <time datetime=\"{}\">{}</time> · {} min read\n          </p>",
                p.meta.iso_date, p.meta.display_date, p.meta.reading_time_minutes
            )
        },
    },
    Step {
        name: "post_body",
        matcher: &POST_BODY,
        render: |p| {
            format!(
                "<div class=\"post-body\">\n          {}\n        </div>\n\n        <div class=\"author-card\">",
                p.meta.content_html
            )
        },
    },
];

/// Replace the first match of `matcher` with `replacement`, taken literally.
fn substitute(text: String, matcher: &Regex, replacement: &str) -> (String, bool) {
    if !matcher.is_match(&text) {
        return (text, false);
    }
    let replaced = matcher.replacen(&text, 1, NoExpand(replacement)).into_owned();
    (replaced, true)
}

/// Run every step in order. A step whose marker is missing adds one warning
/// and leaves the text as it was; later steps still run.
pub fn project(template: &str, projection: &Projection) -> (String, Vec<String>) {
    STEPS.iter().fold(
        (template.to_string(), Vec::new()),
        |(text, mut warnings), step| {
            let (text, matched) = substitute(text, step.matcher, &(step.render)(projection));
            if !matched {
                warn!("Pattern not found: {}", step.name);
                warnings.push(format!("Pattern not found: {}", step.name));
            }
            (text, warnings)
        },
    )
}
