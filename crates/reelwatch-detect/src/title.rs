use std::sync::LazyLock;

use regex::Regex;

/// A 4-digit ASCII year at the tail, not preceded by another digit.
static RE_YEAR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^0-9])[0-9]{4}\s*$").unwrap());

/// Strip a trailing release year from a scraped title.
///
/// `"Interstellar 2014"` becomes `"Interstellar"`. A trailing run of more than
/// four digits is left alone, and a title that is nothing but a year is kept.
pub fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = RE_YEAR_SUFFIX.replace(trimmed, "$1");
    let cleaned = stripped.trim();
    if cleaned.is_empty() {
        trimmed.to_string()
    } else {
        cleaned.to_string()
    }
}
