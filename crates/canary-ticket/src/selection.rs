//! Picking one entity (and its display name) out of a many-valued relation.
//!
//! Both steps are policy tables evaluated top to bottom. The order of the
//! rows is part of the contract with downstream consumers, so keep them as
//! data and extend them by adding rows.

use serde_json::{Map, Value};

use crate::relation::Relation;

/// One row of the entity-selection policy.
pub struct SelectionRule {
    pub label: &'static str,
    pub matches: fn(&Map<String, Value>) -> bool,
}

/// One row of the display-name policy.
pub struct DisplayNameRule {
    pub label: &'static str,
    pub applies: fn(&Map<String, Value>) -> bool,
    pub extract: fn(&Map<String, Value>) -> Option<String>,
}

pub const ENTITY_SELECTION_POLICY: &[SelectionRule] = &[
    SelectionRule {
        label: "flagged_default",
        matches: is_flagged_default,
    },
    SelectionRule {
        label: "first_in_order",
        matches: |_| true,
    },
];

const FULL_TITLE_FIELDS: &[&str] = &["fulltitle", "full_title", "display_name", "displayname"];
const TITLE_FIELDS: &[&str] = &["title"];
const FULL_NAME_FIELDS: &[&str] = &["fullname", "full_name", "name"];
const FIRST_NAME_FIELDS: &[&str] = &["first_name", "firstname"];
const LAST_NAME_FIELDS: &[&str] = &["last_name", "lastname"];

/// Every field any display-name rule reads.
pub(crate) const DISPLAY_NAME_FIELD_GROUPS: &[&[&str]] = &[
    FULL_TITLE_FIELDS,
    TITLE_FIELDS,
    FULL_NAME_FIELDS,
    FIRST_NAME_FIELDS,
    LAST_NAME_FIELDS,
];

pub const DISPLAY_NAME_POLICY: &[DisplayNameRule] = &[
    DisplayNameRule {
        label: "full_title",
        applies: |entity| has_any_field(entity, FULL_TITLE_FIELDS),
        extract: |entity| first_text(entity, FULL_TITLE_FIELDS),
    },
    DisplayNameRule {
        label: "title",
        applies: |entity| has_any_field(entity, TITLE_FIELDS),
        extract: |entity| first_text(entity, TITLE_FIELDS),
    },
    DisplayNameRule {
        label: "full_name",
        applies: |entity| has_any_field(entity, FULL_NAME_FIELDS),
        extract: |entity| first_text(entity, FULL_NAME_FIELDS),
    },
    DisplayNameRule {
        label: "first_last",
        applies: |entity| {
            has_any_field(entity, FIRST_NAME_FIELDS) || has_any_field(entity, LAST_NAME_FIELDS)
        },
        extract: join_first_last,
    },
];

/// Accepts boolean `true` and the string `"1"` on the `default` field.
pub fn is_flagged_default(entity: &Map<String, Value>) -> bool {
    match entity.get("default") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => flag == "1",
        _ => false,
    }
}

/// Selects the entity chosen by the first policy row that matches any entry.
pub fn select_entity(relation: &Relation) -> Option<(&'static str, &Map<String, Value>)> {
    ENTITY_SELECTION_POLICY.iter().find_map(|rule| {
        relation
            .values()
            .filter_map(Value::as_object)
            .find(|entity| (rule.matches)(entity))
            .map(|entity| (rule.label, entity))
    })
}

/// Display name of `entity` from the first applicable rule that yields text.
pub fn display_name(entity: &Map<String, Value>) -> Option<String> {
    DISPLAY_NAME_POLICY
        .iter()
        .filter(|rule| (rule.applies)(entity))
        .find_map(|rule| (rule.extract)(entity))
}

/// Selected entity's display name, or `None` when the relation is absent or
/// the selected entity has no usable name.
pub fn select_display_name(relation: Option<&Relation>) -> Option<String> {
    let (_, entity) = select_entity(relation?)?;
    display_name(entity)
}

fn has_any_field(entity: &Map<String, Value>, fields: &[&str]) -> bool {
    fields.iter().any(|field| entity.contains_key(*field))
}

fn first_text(entity: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        entity
            .get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    })
}

fn join_first_last(entity: &Map<String, Value>) -> Option<String> {
    let parts = [
        first_text(entity, FIRST_NAME_FIELDS),
        first_text(entity, LAST_NAME_FIELDS),
    ];
    let joined = parts.into_iter().flatten().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}
