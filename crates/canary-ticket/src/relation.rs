//! Coercion of one-to-many relation payloads into a single keyed shape.
//!
//! The ticket API returns the same relation as a map keyed by id, an array of
//! objects, a lone entity object, or bare text depending on endpoint and
//! account. Every relation is reduced here, once, to a [`Relation`] before any
//! other code looks at it.

use serde_json::{Map, Value};

use crate::selection::DISPLAY_NAME_FIELD_GROUPS;

/// Relation entries keyed by id, in the insertion order of the source container.
pub type Relation = Map<String, Value>;

/// Key used for a lone entity object that carries no id-like field.
pub const SINGLE_ENTITY_FALLBACK_KEY: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq)]
/// Observed shape of a raw relation value.
pub enum RelationShape<'a> {
    Absent,
    Keyed(&'a Map<String, Value>),
    Sequence(&'a [Value]),
    Single(&'a Map<String, Value>),
    Scalar(&'a Value),
}

impl<'a> RelationShape<'a> {
    pub fn classify(value: Option<&'a Value>, relation: &str) -> Self {
        match value {
            None | Some(Value::Null) | Some(Value::Bool(_)) => Self::Absent,
            Some(Value::Array(items)) => Self::Sequence(items),
            Some(Value::Object(map)) => {
                if looks_like_entity(map, relation) {
                    Self::Single(map)
                } else {
                    Self::Keyed(map)
                }
            }
            Some(scalar @ (Value::String(_) | Value::Number(_))) => Self::Scalar(scalar),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Keyed(_) => "keyed",
            Self::Sequence(_) => "sequence",
            Self::Single(_) => "single",
            Self::Scalar(_) => "scalar",
        }
    }
}

/// Id-like keys read from a relation element, in priority order.
pub fn relation_key_fields(relation: &str) -> [String; 3] {
    ["id".to_string(), format!("{relation}_id"), "slug".to_string()]
}

/// Returns the first non-blank id-like key of `entity` for `relation`.
pub fn relation_key(entity: &Map<String, Value>, relation: &str) -> Option<String> {
    relation_key_fields(relation)
        .iter()
        .find_map(|field| scalar_text(entity.get(field)))
}

/// Reduces any relation shape to keyed entries; empty results become `None`.
pub fn coerce_relation(value: Option<&Value>, relation: &str) -> Option<Relation> {
    let mut coerced = Relation::new();
    match RelationShape::classify(value, relation) {
        RelationShape::Absent => {}
        RelationShape::Keyed(map) => {
            for (key, entry) in map {
                match entry {
                    Value::Object(_) => {
                        coerced.insert(key.clone(), entry.clone());
                    }
                    Value::String(_) | Value::Number(_) => {
                        if let Some(title) = scalar_text(Some(entry)) {
                            coerced.insert(key.clone(), text_entity(key, &title));
                        }
                    }
                    _ => {}
                }
            }
        }
        RelationShape::Sequence(items) => {
            for item in items {
                let Value::Object(entity) = item else {
                    continue;
                };
                if let Some(key) = relation_key(entity, relation) {
                    coerced.insert(key, item.clone());
                }
            }
        }
        RelationShape::Single(entity) => {
            let key = relation_key(entity, relation)
                .unwrap_or_else(|| SINGLE_ENTITY_FALLBACK_KEY.to_string());
            coerced.insert(key, Value::Object(entity.clone()));
        }
        RelationShape::Scalar(value) => {
            if let Some(text) = scalar_text(Some(value)) {
                coerced.insert(text.clone(), text_entity(&text, &text));
            }
        }
    }

    if coerced.is_empty() {
        None
    } else {
        Some(coerced)
    }
}

/// Trimmed, non-empty text for string or numeric JSON values.
pub(crate) fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn text_entity(id: &str, title: &str) -> Value {
    let mut entity = Map::new();
    entity.insert("id".to_string(), Value::String(id.to_string()));
    entity.insert("title".to_string(), Value::String(title.to_string()));
    Value::Object(entity)
}

// A keyed container holds entities as values, or bare titles under id-like
// numeric keys. A lone entity carries its own id-like, display-name or other
// scalar fields at the top level.
fn looks_like_entity(map: &Map<String, Value>, relation: &str) -> bool {
    if relation_key(map, relation).is_some() {
        return true;
    }
    let has_display_field = DISPLAY_NAME_FIELD_GROUPS
        .iter()
        .flat_map(|group| group.iter())
        .any(|field| matches!(map.get(*field), Some(Value::String(_))));
    has_display_field
        || map.iter().any(|(key, value)| {
            matches!(value, Value::String(_) | Value::Number(_)) && !is_numeric_key(key)
        })
}

fn is_numeric_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|byte| byte.is_ascii_digit())
}
