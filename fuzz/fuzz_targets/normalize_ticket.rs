#![no_main]

use canary_ticket::{normalize_ticket, PLACEHOLDER_TICKET_ID};
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    match normalize_ticket(&raw) {
        Ok(ticket) => {
            assert!(!ticket.id().is_empty());
            assert!(!ticket.title().is_empty());
            if raw.get("id").is_none() {
                assert_eq!(ticket.id(), PLACEHOLDER_TICKET_ID);
            }
            let renormalized =
                serde_json::to_value(&ticket).expect("canonical ticket serializes");
            assert!(renormalized.is_object());
        }
        Err(error) => assert!(!raw.is_object(), "object rejected: {error}"),
    }
});
