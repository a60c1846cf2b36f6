#![no_main]

use canary_extract::{extract_action_items, parse_structured_summary, DEFAULT_MAX_ACTION_ITEMS};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    if let Ok(parsed) = parse_structured_summary(&text) {
        let reparsed = parse_structured_summary(&text).expect("parse is deterministic");
        assert_eq!(parsed, reparsed);
    }

    let items = extract_action_items(&text, DEFAULT_MAX_ACTION_ITEMS);
    assert!(items.len() <= DEFAULT_MAX_ACTION_ITEMS);
    assert!(items.iter().all(|item| !item.trim().is_empty()));
});
