use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::relation::{coerce_relation, relation_key, scalar_text, Relation};
use crate::selection::select_display_name;
use crate::timestamp::parse_timestamp_utc;

pub const PLACEHOLDER_TICKET_ID: &str = "unknown";
pub const PLACEHOLDER_TICKET_TITLE: &str = "(untitled)";

/// Raw field names per canonical ticket field, highest priority first.
pub const TICKET_FIELD_SYNONYMS: &[(&str, &[&str])] = &[
    ("id", &["id"]),
    ("title", &["title", "subject"]),
    ("body", &["content", "description", "body"]),
    ("rich_body", &["htmlcontent", "html_content", "rich_content"]),
    ("created_at", &["created_at", "created"]),
    ("customers", &["customers", "customer"]),
    ("contacts", &["contacts", "contact"]),
    ("groups", &["lists"]),
];

const GROUP_RELATION: &str = "list";
const PARENT_FIELD: &str = "boards";
const PARENT_RELATION: &str = "board";
const CUSTOMER_RELATION: &str = "customer";
const CONTACT_RELATION: &str = "contact";
const GROUP_TITLE_FIELDS: &[&str] = &["title", "name", "fulltitle"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("malformed record: expected a JSON object, found {found}")]
/// Raw payload was not a JSON object, so there is nothing to normalize.
pub struct MalformedRecord {
    pub found: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Parent collection (e.g. board) that contains a ticket group.
pub struct GroupParent {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Group (e.g. list) a ticket belongs to, with its parent collections.
pub struct TicketGroup {
    pub id: String,
    pub title: String,
    pub parents: Option<BTreeMap<String, GroupParent>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Canonical ticket produced by [`normalize_ticket`].
pub struct Ticket {
    id: String,
    title: String,
    body: Option<String>,
    rich_body: Option<String>,
    created_at: Option<DateTime<Utc>>,
    customer_name: Option<String>,
    contact_name: Option<String>,
    group_memberships: Option<BTreeMap<String, TicketGroup>>,
}

impl Ticket {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn rich_body(&self) -> Option<&str> {
        self.rich_body.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    pub fn contact_name(&self) -> Option<&str> {
        self.contact_name.as_deref()
    }

    pub fn group_memberships(&self) -> Option<&BTreeMap<String, TicketGroup>> {
        self.group_memberships.as_ref()
    }

    /// Best text for prompting: plain body, else the rich body.
    pub fn content(&self) -> Option<&str> {
        self.body().or(self.rich_body())
    }

    /// True when any group membership lists `parent_id` as a parent collection.
    pub fn belongs_to_parent(&self, parent_id: &str) -> bool {
        self.group_memberships
            .as_ref()
            .map(|groups| {
                groups.values().any(|group| {
                    group
                        .parents
                        .as_ref()
                        .is_some_and(|parents| parents.contains_key(parent_id))
                })
            })
            .unwrap_or(false)
    }

    /// http(s) image URLs referenced inline by the rich body, then the body.
    pub fn image_refs(&self) -> Vec<String> {
        let mut refs = Vec::new();
        for text in [self.rich_body(), self.body()].into_iter().flatten() {
            for url in extract_inline_image_urls(text) {
                if !refs.contains(&url) {
                    refs.push(url);
                }
            }
        }
        refs
    }
}

/// Normalizes one raw ticket payload into a canonical [`Ticket`].
///
/// Missing fields never fail normalization; only a non-object payload does.
pub fn normalize_ticket(raw: &Value) -> Result<Ticket, MalformedRecord> {
    let Value::Object(record) = raw else {
        return Err(MalformedRecord {
            found: json_type_name(raw),
        });
    };

    let customers = coerce_relation(raw_field(record, "customers"), CUSTOMER_RELATION);
    let contacts = coerce_relation(raw_field(record, "contacts"), CONTACT_RELATION);
    let groups = coerce_relation(raw_field(record, "groups"), GROUP_RELATION);

    Ok(Ticket {
        id: scalar_text(raw_field(record, "id"))
            .unwrap_or_else(|| PLACEHOLDER_TICKET_ID.to_string()),
        title: scalar_text(raw_field(record, "title"))
            .unwrap_or_else(|| PLACEHOLDER_TICKET_TITLE.to_string()),
        body: text_field(record, "body"),
        rich_body: text_field(record, "rich_body"),
        created_at: raw_field(record, "created_at")
            .and_then(Value::as_str)
            .and_then(parse_timestamp_utc),
        customer_name: select_display_name(customers.as_ref()),
        contact_name: select_display_name(contacts.as_ref()),
        group_memberships: groups.as_ref().and_then(normalize_groups),
    })
}

/// Normalizes a payload holding one ticket object or an array of them.
pub fn normalize_ticket_batch(raw: &Value) -> Vec<Result<Ticket, MalformedRecord>> {
    match raw {
        Value::Array(items) => items.iter().map(normalize_ticket).collect(),
        other => vec![normalize_ticket(other)],
    }
}

fn raw_field<'a>(record: &'a Map<String, Value>, canonical: &str) -> Option<&'a Value> {
    let (_, candidates) = TICKET_FIELD_SYNONYMS
        .iter()
        .find(|(name, _)| *name == canonical)?;
    candidates
        .iter()
        .filter_map(|candidate| record.get(*candidate))
        .find(|value| !value.is_null())
}

fn text_field(record: &Map<String, Value>, canonical: &str) -> Option<String> {
    raw_field(record, canonical)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

fn normalize_groups(groups: &Relation) -> Option<BTreeMap<String, TicketGroup>> {
    let normalized = groups
        .iter()
        .filter_map(|(key, entry)| {
            let entity = entry.as_object()?;
            let id = relation_key(entity, GROUP_RELATION).unwrap_or_else(|| key.clone());
            let parents = coerce_relation(entity.get(PARENT_FIELD), PARENT_RELATION)
                .as_ref()
                .and_then(normalize_parents);
            Some((
                id.clone(),
                TicketGroup {
                    id,
                    title: entity_title(entity),
                    parents,
                },
            ))
        })
        .collect::<BTreeMap<_, _>>();
    (!normalized.is_empty()).then_some(normalized)
}

fn normalize_parents(parents: &Relation) -> Option<BTreeMap<String, GroupParent>> {
    let normalized = parents
        .iter()
        .filter_map(|(key, entry)| {
            let entity = entry.as_object()?;
            let id = relation_key(entity, PARENT_RELATION).unwrap_or_else(|| key.clone());
            Some((
                id.clone(),
                GroupParent {
                    id,
                    title: entity_title(entity),
                },
            ))
        })
        .collect::<BTreeMap<_, _>>();
    (!normalized.is_empty()).then_some(normalized)
}

fn entity_title(entity: &Map<String, Value>) -> String {
    GROUP_TITLE_FIELDS
        .iter()
        .find_map(|field| scalar_text(entity.get(*field)))
        .unwrap_or_default()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn inline_image_regex() -> &'static Regex {
    static INLINE_IMAGE_RE: OnceLock<Regex> = OnceLock::new();
    INLINE_IMAGE_RE.get_or_init(|| {
        Regex::new(
            r#"(?i)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']|!\[[^\]]*\]\((\S+?)(?:\s+"[^"]*")?\)"#,
        )
        .expect("valid inline image regex")
    })
}

fn extract_inline_image_urls(text: &str) -> Vec<String> {
    inline_image_regex()
        .captures_iter(text)
        .filter_map(|captures| captures.get(1).or_else(|| captures.get(2)))
        .map(|url| url.as_str().trim().to_string())
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{
        normalize_ticket, normalize_ticket_batch, MalformedRecord, PLACEHOLDER_TICKET_ID,
        PLACEHOLDER_TICKET_TITLE,
    };

    #[test]
    fn unit_normalize_ticket_rejects_non_object_payloads() {
        assert_eq!(
            normalize_ticket(&json!([1, 2])),
            Err(MalformedRecord { found: "array" })
        );
        assert_eq!(
            normalize_ticket(&json!("ticket")),
            Err(MalformedRecord { found: "string" })
        );
    }

    #[test]
    fn unit_normalize_ticket_fills_placeholders_for_empty_object() {
        let ticket = normalize_ticket(&json!({})).expect("ticket");
        assert_eq!(ticket.id(), PLACEHOLDER_TICKET_ID);
        assert_eq!(ticket.title(), PLACEHOLDER_TICKET_TITLE);
        assert_eq!(ticket.body(), None);
        assert_eq!(ticket.created_at(), None);
        assert_eq!(ticket.customer_name(), None);
        assert_eq!(ticket.group_memberships(), None);
    }

    #[test]
    fn functional_normalize_ticket_coerces_numeric_id_and_reads_synonyms() {
        let ticket = normalize_ticket(&json!({
            "id": 3012,
            "subject": "VPN down",
            "description": "Cannot connect since 9am",
            "htmlcontent": "<p>Cannot connect</p>",
            "created_at": "2025-08-21 14:00:00"
        }))
        .expect("ticket");

        assert_eq!(ticket.id(), "3012");
        assert_eq!(ticket.title(), "VPN down");
        assert_eq!(ticket.body(), Some("Cannot connect since 9am"));
        assert_eq!(ticket.rich_body(), Some("<p>Cannot connect</p>"));
        assert_eq!(
            ticket.created_at(),
            Utc.with_ymd_and_hms(2025, 8, 21, 14, 0, 0).single()
        );
    }

    #[test]
    fn functional_normalize_ticket_derives_customer_and_contact_names() {
        let ticket = normalize_ticket(&json!({
            "id": "1",
            "title": "t",
            "customers": {
                "5": {"id": "5", "title": "Other Corp"},
                "7": {"id": "7", "fulltitle": "Acme Corp (HQ)", "default": "1"}
            },
            "contacts": [
                {"contact_id": "11", "first_name": "Ana", "last_name": "Souza"}
            ]
        }))
        .expect("ticket");

        assert_eq!(ticket.customer_name(), Some("Acme Corp (HQ)"));
        assert_eq!(ticket.contact_name(), Some("Ana Souza"));
    }

    #[test]
    fn functional_normalize_ticket_accepts_scalar_customer_text() {
        let ticket = normalize_ticket(&json!({"id": "1", "customer": "Acme"})).expect("ticket");
        assert_eq!(ticket.customer_name(), Some("Acme"));
    }

    #[test]
    fn integration_group_memberships_normalize_nested_parent_collections() {
        let ticket = normalize_ticket(&json!({
            "id": "42",
            "title": "Printer jam",
            "lists": [
                {"id": "3", "title": "Inbox", "boards": {"9": {"id": "9", "title": "Services"}}},
                {"list_id": "4", "title": "Escalated", "boards": [{"slug": "ops", "title": "Ops"}]},
                {"id": "5", "title": "Orphan", "boards": []}
            ]
        }))
        .expect("ticket");

        let groups = ticket.group_memberships().expect("groups");
        assert_eq!(groups.len(), 3);
        assert_eq!(groups["3"].title, "Inbox");
        assert_eq!(
            groups["3"].parents.as_ref().expect("parents")["9"].title,
            "Services"
        );
        assert!(groups["4"]
            .parents
            .as_ref()
            .expect("parents")
            .contains_key("ops"));
        assert_eq!(groups["5"].parents, None);
        assert!(ticket.belongs_to_parent("9"));
        assert!(ticket.belongs_to_parent("ops"));
        assert!(!ticket.belongs_to_parent("10"));
    }

    #[test]
    fn integration_image_refs_collects_html_and_markdown_images_in_order() {
        let ticket = normalize_ticket(&json!({
            "id": "1",
            "htmlcontent": "<p>see</p><img alt=\"x\" src=\"https://cdn.example.com/a.png\"><IMG SRC='https://cdn.example.com/b.jpg'><img src=\"data:image/png;base64,AAAA\">",
            "content": "dup ![shot](https://cdn.example.com/a.png) and ![c](https://cdn.example.com/c.gif \"caption\")"
        }))
        .expect("ticket");

        assert_eq!(
            ticket.image_refs(),
            vec![
                "https://cdn.example.com/a.png".to_string(),
                "https://cdn.example.com/b.jpg".to_string(),
                "https://cdn.example.com/c.gif".to_string(),
            ]
        );
    }

    #[test]
    fn regression_blank_and_null_fields_become_absent() {
        let ticket = normalize_ticket(&json!({
            "id": "  ",
            "title": null,
            "content": "   ",
            "created_at": "not a date",
            "customers": [],
            "contacts": {},
            "lists": null
        }))
        .expect("ticket");

        assert_eq!(ticket.id(), PLACEHOLDER_TICKET_ID);
        assert_eq!(ticket.title(), PLACEHOLDER_TICKET_TITLE);
        assert_eq!(ticket.body(), None);
        assert_eq!(ticket.created_at(), None);
        assert_eq!(ticket.customer_name(), None);
        assert_eq!(ticket.contact_name(), None);
        assert_eq!(ticket.group_memberships(), None);
    }

    #[test]
    fn regression_normalize_ticket_batch_accepts_object_or_array() {
        let single = normalize_ticket_batch(&json!({"id": "1"}));
        assert_eq!(single.len(), 1);
        assert!(single[0].is_ok());

        let batch = normalize_ticket_batch(&json!([{"id": "1"}, 7, {"id": "2"}]));
        assert_eq!(batch.len(), 3);
        assert!(batch[0].is_ok());
        assert_eq!(batch[1], Err(MalformedRecord { found: "number" }));
        assert_eq!(
            batch[2].as_ref().map(|ticket| ticket.id().to_string()),
            Ok("2".to_string())
        );
    }
}
