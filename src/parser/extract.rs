use crate::error::ExtractError;
use crate::listing::{CandidateRecord, DetailPage, ListingFragment, ListingSummary};

use super::fields::{parse_listed_date, parse_price, parse_size};

/// Validate the index-level fields. Title and link must be present and
/// non-blank; price and location need their container, but may be empty.
pub fn extract_summary(fragment: &ListingFragment) -> Result<ListingSummary, ExtractError> {
    let title = non_blank(fragment.title.as_deref()).ok_or(ExtractError::MissingField("title"))?;
    let link = non_blank(fragment.link.as_deref()).ok_or(ExtractError::MissingField("link"))?;
    let price = fragment
        .price
        .as_deref()
        .ok_or(ExtractError::MissingField("price"))?;
    let location = fragment
        .location
        .as_deref()
        .ok_or(ExtractError::MissingField("location"))?;

    Ok(ListingSummary {
        title: title.to_string(),
        link: link.to_string(),
        price: parse_price(price),
        location: location.trim().to_string(),
    })
}

/// Merge the detail-page fields into a record. Amenities start empty and
/// are filled in by the classifier.
pub fn complete(summary: ListingSummary, detail: &DetailPage) -> CandidateRecord {
    let (bedroom_code, area_code) = parse_size(detail.size_text.as_deref().unwrap_or(""));

    CandidateRecord {
        title: summary.title,
        link: summary.link,
        price: summary.price,
        location: summary.location,
        bedroom_code,
        area_code,
        listed_date: parse_listed_date(detail.timestamp.as_deref()),
        amenities: Vec::new(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
