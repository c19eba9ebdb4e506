//! Display formatting and lenient parsing of rest and duration values.

use once_cell::sync::Lazy;
use regex::Regex;

/// Formats seconds for display.
///
/// Whole minutes render as minutes (`"2m"`). Mixed values under two minutes stay in
/// seconds, so 90 is `"90s"` and never `"1m 30s"`; from two minutes on they split
/// (`"2m 30s"`). [`parse_seconds`] still accepts the `"1m 30s"` form.
pub fn format_seconds(secs: u32) -> String {
    let (m, s) = (secs / 60, secs % 60);
    if secs > 0 && s == 0 {
        format!("{}m", m)
    } else if secs < 120 {
        format!("{}s", secs)
    } else {
        format!("{}m {}s", m, s)
    }
}

/// Joins distinct values in order of first appearance, e.g. `"12/10/8"`.
pub(crate) fn join_distinct<T: PartialEq + Copy>(values: &[T], render: impl Fn(T) -> String) -> Option<String> {
    let mut distinct: Vec<T> = Vec::new();
    for v in values {
        if !distinct.contains(v) {
            distinct.push(*v);
        }
    }
    if distinct.is_empty() {
        None
    } else {
        Some(distinct.into_iter().map(render).collect::<Vec<_>>().join("/"))
    }
}

static CLOCK_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+):(\d{1,2})\s*$").expect("valid regex"));
static UNIT_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(hours?|hrs?|h|minutes?|mins?|m|seconds?|secs?|s)?\b")
        .expect("valid regex")
});
static RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(?:-|–|to)\s*\d+").expect("valid regex"));
static LEADING_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Parses `"90"`, `"90s"`, `"2 min"`, `"1m 30s"` or `"1:30"` into seconds.
///
/// A bare number is seconds. Returns `None` when no number is present.
pub fn parse_seconds(text: &str) -> Option<u32> {
    if let Some(c) = CLOCK_FORMAT.captures(text) {
        let m: u32 = c[1].parse().ok()?;
        let s: u32 = c[2].parse().ok()?;
        return Some(m.saturating_mul(60).saturating_add(s));
    }
    // Ranges such as "30-45s" count as their lower bound.
    let text = RANGE.replace_all(text, "$1");
    let mut total: f64 = 0.0;
    let mut found = false;
    for c in UNIT_PART.captures_iter(&text) {
        let n: f64 = match c[1].parse() {
            Ok(n) => n,
            Err(_) => continue,
        };
        let unit = c.get(2).map(|u| u.as_str().to_lowercase()).unwrap_or_default();
        let factor = match unit.chars().next() {
            Some('h') => 3600.0,
            Some('m') => 60.0,
            _ => 1.0,
        };
        total += n * factor;
        found = true;
    }
    found.then(|| total.round().min(u32::MAX as f64) as u32)
}

/// First integer in a loose count such as `"3"`, `"8-12"` or `"10 each side"`.
pub fn parse_count(text: &str) -> Option<u32> {
    LEADING_INT.find(text).and_then(|m| m.as_str().parse().ok())
}
