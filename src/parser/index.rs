use std::sync::LazyLock;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::listing::ListingFragment;

static RESULT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.cl-static-search-result").unwrap());
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static PRICE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.price").unwrap());
static LOCATION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.location").unwrap());

/// All result entries of a search page, in page order. Relative links are
/// resolved against `base`; absolute ones are kept verbatim since they are
/// the dedup key.
pub fn parse_index(html: &str, base: Option<&Url>) -> Vec<ListingFragment> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT_SEL)
        .map(|entry| parse_entry(entry, base))
        .collect()
}

fn parse_entry(entry: ElementRef<'_>, base: Option<&Url>) -> ListingFragment {
    let title = entry.value().attr("title").map(|t| t.trim().to_string());
    let link = entry
        .select(&LINK_SEL)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve_link(href.trim(), base));

    ListingFragment {
        title,
        link,
        price: first_text(entry, &PRICE_SEL),
        location: first_text(entry, &LOCATION_SEL),
    }
}

fn first_text(entry: ElementRef<'_>, selector: &Selector) -> Option<String> {
    entry
        .select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

fn resolve_link(href: &str, base: Option<&Url>) -> String {
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}
