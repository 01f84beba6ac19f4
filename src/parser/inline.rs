//! Inline formatting for ordinary paragraphs: links, bold and italic spans.

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use crate::utils::{escape_attr, escape_text};

const REDIRECT_MARKER: &str = "google.com/url";
static REDIRECT_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]q=([^&]+)").unwrap());

/// Render the immediate children of `el`. Text passes through, `<a>` keeps
/// its (unwrapped) href, styled `<span>`s become `<strong>`/`<em>`, anything
/// else contributes its text.
pub fn render(el: ElementRef) -> String {
    let mut parts = String::new();

    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            parts.push_str(&escape_text(text));
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let text: String = child_el.text().collect();

        match child_el.value().name() {
            "a" => {
                let href = unwrap_redirect(child_el.value().attr("href").unwrap_or("#"));
                parts.push_str(&format!(
                    r#"<a href="{}">{}</a>"#,
                    escape_attr(&href),
                    escape_text(&text)
                ));
            }
            "span" => {
                let style = child_el.value().attr("style").unwrap_or("");
                parts.push_str(&emphasize(&escape_text(&text), style));
            }
            _ => parts.push_str(&escape_text(&text)),
        }
    }

    parts
}

/// Wrap `text` according to the bold/italic keywords in an inline style.
fn emphasize(text: &str, style: &str) -> String {
    let bold = style.contains("font-weight:700")
        || style.contains("font-weight: 700")
        || style.to_lowercase().contains("bold");
    let italic = style.contains("font-style:italic") || style.contains("font-style: italic");

    match (bold, italic) {
        (true, true) => format!("<em><strong>{}</strong></em>", text),
        (true, false) => format!("<strong>{}</strong>", text),
        (false, true) => format!("<em>{}</em>", text),
        (false, false) => text.to_string(),
    }
}

/// Export links go through `https://www.google.com/url?q=<target>&...`;
/// return the decoded target, or the href unchanged when there is none.
pub fn unwrap_redirect(href: &str) -> String {
    if !href.contains(REDIRECT_MARKER) {
        return href.to_string();
    }
    // Matched on the raw text so relative hrefs work; `+` stays literal.
    REDIRECT_TARGET_RE
        .captures(href)
        .and_then(|c| urlencoding::decode(&c[1]).ok().map(|v| v.into_owned()))
        .unwrap_or_else(|| href.to_string())
}
