use std::sync::OnceLock;

use regex::Regex;

/// Bullet characters recognised at the start of a line.
pub const BULLET_MARKERS: &[char] = &['-', '*', '•', '–', '—'];

fn numbered_marker_regex() -> &'static Regex {
    static NUMBERED_MARKER_RE: OnceLock<Regex> = OnceLock::new();
    NUMBERED_MARKER_RE
        .get_or_init(|| Regex::new(r"^[0-9]{1,3}[.)]\s+").expect("valid numbered marker regex"))
}

/// Returns the item text of a bullet or numbered list line, without its marker.
pub fn strip_list_marker(line: &str) -> Option<&str> {
    let line = line.trim_start();
    let rest = if let Some(found) = numbered_marker_regex().find(line) {
        &line[found.end()..]
    } else {
        let mut chars = line.chars();
        let marker = chars.next()?;
        if !BULLET_MARKERS.contains(&marker) {
            return None;
        }
        let rest = chars.as_str();
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        rest
    };
    let item = rest.trim();
    (!item.is_empty()).then_some(item)
}

/// Collects list items from free text, de-duplicated and capped at `limit`.
pub fn extract_action_items(text: &str, limit: usize) -> Vec<String> {
    dedupe_capped(
        text.lines()
            .filter_map(strip_list_marker)
            .map(str::to_string),
        limit,
    )
}

/// Keeps the first occurrence of each non-empty item, up to `limit` items.
pub fn dedupe_capped(items: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for item in items {
        if kept.len() >= limit {
            break;
        }
        if item.is_empty() || kept.contains(&item) {
            continue;
        }
        kept.push(item);
    }
    kept
}
