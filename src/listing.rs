use chrono::NaiveDate;

/// Sentinel for a size slot the detail page did not provide.
pub const NOT_AVAILABLE: &str = "N/A";

/// One `<li>` of the search results page. A field is `None` when its
/// container element is missing from the markup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFragment {
    pub title: Option<String>,
    pub link: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
}

/// Parsed detail page at a listing's link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPage {
    /// Raw text of the housing size element, e.g. `"2br - 850ft2"`.
    pub size_text: Option<String>,
    /// `datetime` attribute of the posting timestamp.
    pub timestamp: Option<String>,
    /// Whole-page text with whitespace collapsed.
    pub text: String,
}

/// Index-level fields of a listing, validated. Carries the dedup key.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSummary {
    pub title: String,
    pub link: String,
    pub price: u64,
    pub location: String,
}

/// A fully extracted listing, ready for classification and upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub title: String,
    pub link: String,
    pub price: u64,
    pub location: String,
    pub bedroom_code: String,
    pub area_code: String,
    pub listed_date: NaiveDate,
    /// Subset of [`crate::amenities::AMENITIES`], in vocabulary order.
    pub amenities: Vec<&'static str>,
}
