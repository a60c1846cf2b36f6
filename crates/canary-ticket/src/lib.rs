//! Record normalization for upstream helpdesk ticket payloads.
//!
//! The ticket API returns semantically identical data in several shapes
//! (relations as maps or arrays, singular or plural field names, a flagged
//! "default" entry among candidates). This crate reduces a raw JSON record to
//! one canonical [`Ticket`] so nothing downstream branches on shape.

pub mod relation;
pub mod selection;
pub mod ticket;
pub mod timestamp;

pub use relation::{coerce_relation, relation_key, Relation, RelationShape};
pub use selection::{
    display_name, is_flagged_default, select_display_name, select_entity, DisplayNameRule,
    SelectionRule, DISPLAY_NAME_POLICY, ENTITY_SELECTION_POLICY,
};
pub use ticket::{
    normalize_ticket, normalize_ticket_batch, GroupParent, MalformedRecord, Ticket, TicketGroup,
    PLACEHOLDER_TICKET_ID, PLACEHOLDER_TICKET_TITLE, TICKET_FIELD_SYNONYMS,
};
pub use timestamp::parse_timestamp_utc;
