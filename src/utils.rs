use serde_json::Value;

/// Normalizes a DOI string by removing URL prefixes and `doi:` markers.
///
/// DOIs are case-insensitive identifiers; the result is always lowercase with
/// no whitespace. Returns `None` when no `10.`-prefixed identifier is found.
pub fn normalize_doi(doi_str: &str) -> Option<String> {
    if doi_str.is_empty() {
        return None;
    }
    let doi = doi_str
        .trim()
        .trim_end_matches("[doi]")
        .replace(|c: char| c.is_whitespace(), "")
        .to_lowercase();

    // A DOI proper always starts at the first "10."
    doi.find("10.").map(|pos| doi[pos..].to_string())
}

/// Normalizes a title for identity matching: lowercase, alphanumeric only.
pub fn normalize_title(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Extracts a 4-digit publication year from the shapes sources actually emit:
/// an integer field, a date-like object exposing a `year` key, or a free-text
/// date string with a leading 4-digit prefix. Anything else is absent.
pub fn year_from_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(plausible_year),
        Value::Object(map) => map.get("year").and_then(year_from_value),
        Value::String(s) => {
            let prefix: String = s.trim().chars().take(4).collect();
            if prefix.len() == 4 && prefix.chars().all(|c| c.is_ascii_digit()) {
                prefix.parse::<i64>().ok().and_then(plausible_year)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// A year is kept when it is a 4-digit integer. Implausible-but-4-digit
/// values (far future) are not filtered here; the scorer's `old_paper`
/// weight is the only stage that reacts to year values.
fn plausible_year(year: i64) -> Option<i32> {
    if (1000..=9999).contains(&year) {
        Some(year as i32)
    } else {
        None
    }
}

/// Largest index `<= at` that is a char boundary of `s`.
pub fn floor_char_boundary(s: &str, at: usize) -> usize {
    let mut i = at.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest index `>= at` that is a char boundary of `s`.
pub fn ceil_char_boundary(s: &str, at: usize) -> usize {
    let mut i = at.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
