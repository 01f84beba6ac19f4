use scraper::ElementRef;

use super::inline;
use crate::utils::{escape_attr, escape_text};

/// Separator between rendered blocks inside the post body.
const BLOCK_JOIN: &str = "\n          ";
const ITEM_INDENT: &str = "\n            ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    Major,
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading {
        level: HeadingLevel,
        text: String,
    },
    Paragraph {
        inline_markup: String,
        plain_text: String,
        is_blockquote: bool,
    },
    List {
        kind: ListKind,
        items: Vec<String>,
    },
    ImageRef {
        source_key: String,
        alt_text: String,
        resolved_path: String,
    },
}

/// Trimmed concatenation of every text node under `el`.
pub fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

// ── One constructor per source tag category ──

/// `h1`/`h2` collapse to major, `h3`/`h4` to minor.
pub fn heading(tag: &str, text: &str) -> Option<Block> {
    let level = match tag {
        "h1" | "h2" => HeadingLevel::Major,
        "h3" | "h4" => HeadingLevel::Minor,
        _ => return None,
    };
    Some(Block::Heading {
        level,
        text: text.to_string(),
    })
}

/// Blockquotes keep their raw text; other paragraphs keep inline formatting
/// and are dropped when that formatting renders to nothing.
pub fn paragraph(el: ElementRef, text: &str) -> Option<Block> {
    if is_blockquote(el) {
        return Some(Block::Paragraph {
            inline_markup: escape_text(text),
            plain_text: text.to_string(),
            is_blockquote: true,
        });
    }

    let inline_markup = inline::render(el);
    if inline_markup.trim().is_empty() {
        return None;
    }
    Some(Block::Paragraph {
        inline_markup,
        plain_text: text.to_string(),
        is_blockquote: false,
    })
}

/// Only direct `<li>` children count; empty items are dropped and a list
/// with no items left produces no block.
pub fn list(el: ElementRef) -> Option<Block> {
    let kind = match el.value().name() {
        "ol" => ListKind::Ordered,
        "ul" => ListKind::Unordered,
        _ => return None,
    };
    let items: Vec<String> = el
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "li")
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(Block::List { kind, items })
    }
}

/// Indented quotes in the export carry a left margin (in `pt`) on the
/// paragraph or its parent, or a 40-unit left padding.
///
/// The padding check looks for the substring "40" anywhere in the style, so
/// e.g. `padding-left:140pt` also counts.
pub fn is_blockquote(el: ElementRef) -> bool {
    let style = el.value().attr("style").unwrap_or("");
    let parent_style = el
        .parent()
        .and_then(ElementRef::wrap)
        .and_then(|p| p.value().attr("style"))
        .unwrap_or("");

    (style.contains("margin-left:") && style.contains("pt"))
        || (style.replace(' ', "").contains("padding-left:") && style.contains("40"))
        || parent_style.contains("margin-left:")
}

// ── Rendering ──

impl Block {
    pub fn to_html(&self) -> String {
        match self {
            Block::Heading { level, text } => {
                let tag = match level {
                    HeadingLevel::Major => "h2",
                    HeadingLevel::Minor => "h3",
                };
                format!("<{tag}>{}</{tag}>", escape_text(text))
            }
            Block::Paragraph {
                inline_markup,
                is_blockquote: true,
                ..
            } => format!("<blockquote>{}</blockquote>", inline_markup),
            Block::Paragraph { inline_markup, .. } => format!("<p>{}</p>", inline_markup),
            Block::List { kind, items } => {
                let tag = match kind {
                    ListKind::Ordered => "ol",
                    ListKind::Unordered => "ul",
                };
                let lis: Vec<String> = items
                    .iter()
                    .map(|i| format!("<li>{}</li>", escape_text(i)))
                    .collect();
                format!("<{tag}>{ITEM_INDENT}{}{BLOCK_JOIN}</{tag}>", lis.join(ITEM_INDENT))
            }
            Block::ImageRef {
                alt_text,
                resolved_path,
                ..
            } => format!(
                r#"<figure><img src="{}" alt="{}" loading="lazy"></figure>"#,
                escape_attr(resolved_path),
                escape_attr(alt_text)
            ),
        }
    }
}

/// Body markup for the post template.
pub fn render_content(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(Block::to_html)
        .collect::<Vec<_>>()
        .join(BLOCK_JOIN)
}
