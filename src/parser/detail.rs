use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Node;
use scraper::{Html, Selector};

use crate::listing::DetailPage;

static HOUSING_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.housing").unwrap());
static TIME_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time.date.timeago").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Pull the size text, posting timestamp and readable text out of a
/// listing's detail page. Missing elements leave the field empty.
pub fn parse_detail(html: &str) -> DetailPage {
    let document = Html::parse_document(html);

    let size_text = document
        .select(&HOUSING_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let timestamp = document
        .select(&TIME_SEL)
        .next()
        .and_then(|el| el.value().attr("datetime"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    DetailPage {
        size_text,
        timestamp,
        text: page_text(&document),
    }
}

/// Every text node outside script/style, whitespace collapsed.
fn page_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|el| el.name().to_string()))
            .is_some_and(|name| matches!(name.as_str(), "script" | "style" | "noscript"));
        if !hidden {
            parts.push(text);
        }
    }
    WHITESPACE_RE
        .replace_all(&parts.join(" "), " ")
        .trim()
        .to_string()
}
