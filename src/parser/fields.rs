use chrono::NaiveDate;

use crate::listing::NOT_AVAILABLE;

/// Posting date used when the detail page carries no usable timestamp.
pub fn fallback_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()
}

/// `"$1,250"` → 1250. Anything not starting with `$`, or not a whole number
/// once `$` and `,` are stripped, is priced at 0.
pub fn parse_price(raw: &str) -> u64 {
    let raw = raw.trim();
    let Some(rest) = raw.strip_prefix('$') else {
        return 0;
    };
    rest.replace(',', "").trim().parse::<u64>().unwrap_or(0)
}

/// Split the housing size text into `(bedroom_code, area_code)`.
/// `"2br / 850ft2"` → `("2br", "850ft2")`; missing slots stay `"N/A"`.
pub fn parse_size(raw: &str) -> (String, String) {
    let mut bedroom = NOT_AVAILABLE.to_string();
    let mut area = NOT_AVAILABLE.to_string();

    let cleaned = raw.replace('/', "");
    for token in cleaned.split_whitespace() {
        if token.ends_with("br") {
            bedroom = token.to_string();
        } else if token.ends_with("ft2") {
            area = token.to_string();
        }
    }

    (bedroom, area)
}

/// Date part of a timestamp, e.g. `"2024-03-05T10:00:00-0800"` or
/// `"2024-03-05 10:00"`.
pub fn parse_listed_date(timestamp: Option<&str>) -> NaiveDate {
    timestamp
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .and_then(|t| t.split(['T', ' ']).next())
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .unwrap_or_else(fallback_date)
}
