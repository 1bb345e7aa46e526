//! Internal module for projecting HTML bodies onto text and links.

use regex::Regex;
use scraper::{Html, Node, Selector};
use std::sync::LazyLock;
use tracing::{debug, warn};

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Za-z!/][^>]*>").expect("valid regex"));

static ANCHOR: LazyLock<Option<Selector>> = LazyLock::new(|| match Selector::parse("a[href]") {
    Ok(selector) => Some(selector),
    Err(e) => {
        warn!(error = %e, "Failed to build anchor selector");
        None
    }
});

/// Returns `true` if the text contains at least one tag.
pub(crate) fn looks_like_markup(text: &str) -> bool {
    TAG.is_match(text)
}

/// Elements whose boundaries separate words.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "body", "br", "dd", "div", "dl", "dt", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol",
    "p", "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead", "title", "tr", "ul",
];

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

fn is_hidden(name: &str) -> bool {
    matches!(name, "script" | "style" | "noscript")
}

/// Returns the visible text of an HTML document, whitespace-compacted.
///
/// Text inside inline elements is joined as-is, so `<b>48</b>29` reads `4829`;
/// block boundaries and `<br>` become a space.
///
/// Returns `None` when `html` has no markup or nothing visible, so callers can
/// fall back to the input verbatim.
pub(crate) fn visible_text(html: &str) -> Option<String> {
    if !looks_like_markup(html) {
        return None;
    }

    let document = Html::parse_document(html);
    if !document.errors.is_empty() {
        debug!(
            error_count = document.errors.len(),
            "Markup parsed with recoverable errors"
        );
    }

    let mut text = String::new();
    let mut pending_break = false;
    let mut last_block = None;
    for node in document.tree.root().descendants() {
        match node.value() {
            Node::Element(element) if is_block(element.name()) => pending_break = true,
            Node::Text(piece) => {
                let hidden = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|element| is_hidden(element.name()))
                });
                if hidden {
                    continue;
                }
                let block = node
                    .ancestors()
                    .find(|ancestor| {
                        ancestor
                            .value()
                            .as_element()
                            .is_some_and(|element| is_block(element.name()))
                    })
                    .map(|ancestor| ancestor.id());

                if pending_break || last_block.is_some_and(|previous| previous != block) {
                    text.push(' ');
                }
                pending_break = false;
                last_block = Some(block);
                text.push_str(piece);
            }
            _ => {}
        }
    }

    let compacted = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!compacted.is_empty()).then_some(compacted)
}

/// Returns the `href` of every anchor in document order.
pub(crate) fn anchor_hrefs(html: &str) -> Vec<String> {
    if !looks_like_markup(html) {
        return Vec::new();
    }
    let Some(selector) = ANCHOR.as_ref() else {
        return Vec::new();
    };

    Html::parse_document(html)
        .select(selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}
