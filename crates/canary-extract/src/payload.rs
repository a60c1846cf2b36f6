//! Parsing model output into the canonical summary fields.
//!
//! Models name the same field differently from run to run, so every lookup
//! goes through [`SUMMARY_FIELD_SYNONYMS`] in its fixed priority order.

use jsonschema::validator_for;
use serde_json::{json, Map, Value};

pub const PROBLEM_SUMMARY_FIELD: &str = "problem_summary";
pub const SUGGESTED_SOLUTION_FIELD: &str = "suggested_solution";
pub const ACTION_ITEMS_FIELD: &str = "action_items";

/// Accepted key names per canonical field, highest priority first.
pub const SUMMARY_FIELD_SYNONYMS: &[(&str, &[&str])] = &[
    (
        PROBLEM_SUMMARY_FIELD,
        &["problem_summary", "resumo_problema", "summary", "problem"],
    ),
    (
        SUGGESTED_SOLUTION_FIELD,
        &["suggested_solution", "sugestao_solucao", "solution", "suggestion"],
    ),
    (
        ACTION_ITEMS_FIELD,
        &["action_items", "acoes", "next_steps", "tasks"],
    ),
];

const ACTION_ITEM_TEXT_FIELDS: &[&str] = &["title", "text", "description"];

#[derive(Debug, Clone, PartialEq, Eq)]
/// Summary fields read from a structured model response.
pub struct StructuredSummary {
    pub problem_summary: String,
    pub suggested_solution: String,
    pub action_items: Vec<String>,
}

/// Schema sent to the generator as the strict output contract.
pub fn strict_output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            PROBLEM_SUMMARY_FIELD: {"type": "string"},
            SUGGESTED_SOLUTION_FIELD: {"type": "string"},
            ACTION_ITEMS_FIELD: {"type": "array", "items": {"type": "string"}}
        },
        "required": [PROBLEM_SUMMARY_FIELD, SUGGESTED_SOLUTION_FIELD, ACTION_ITEMS_FIELD],
        "additionalProperties": false
    })
}

// Accepted shape after synonym resolution. Action items are optional and may
// be objects, which free-text responses produce more often than strings.
fn canonical_summary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            PROBLEM_SUMMARY_FIELD: {"type": "string"},
            SUGGESTED_SOLUTION_FIELD: {"type": "string"},
            ACTION_ITEMS_FIELD: {
                "type": "array",
                "items": {"type": ["string", "object"]}
            }
        },
        "required": [PROBLEM_SUMMARY_FIELD, SUGGESTED_SOLUTION_FIELD]
    })
}

/// Parses a bare JSON document or the first fenced ```json block that parses.
pub fn extract_json_payload(text: &str) -> Result<Value, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("model response was empty; expected JSON output".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let mut cursor = 0usize;
    while let Some(open_rel) = text[cursor..].find("```") {
        let open = cursor + open_rel;
        let after_open = &text[open + 3..];
        let header_end_rel = after_open.find('\n').unwrap_or(after_open.len());
        let header = after_open[..header_end_rel].trim();
        let block_start = if header_end_rel < after_open.len() {
            open + 3 + header_end_rel + 1
        } else {
            open + 3 + header_end_rel
        };
        let Some(close_rel) = text[block_start..].find("```") else {
            break;
        };
        let close = block_start + close_rel;
        cursor = close + 3;

        if !(header.is_empty() || header.eq_ignore_ascii_case("json")) {
            continue;
        }

        let block = text[block_start..close].trim();
        if block.is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(block) {
            return Ok(value);
        }
    }

    Err("model response did not contain parseable JSON content".to_string())
}

/// Looks up `canonical` in `object` through its synonym list.
pub fn lookup_summary_field<'a>(object: &'a Map<String, Value>, canonical: &str) -> Option<&'a Value> {
    let (_, synonyms) = SUMMARY_FIELD_SYNONYMS
        .iter()
        .find(|(name, _)| *name == canonical)?;
    synonyms.iter().find_map(|synonym| object.get(*synonym))
}

/// Parses and validates a structured summary from raw model text. Field
/// values and action items are returned exactly as the model wrote them.
pub fn parse_structured_summary(text: &str) -> Result<StructuredSummary, String> {
    let payload = extract_json_payload(text)?;
    let Value::Object(object) = payload else {
        return Err("structured output must be a JSON object".to_string());
    };

    let mut canonical = Map::new();
    for (field, _) in SUMMARY_FIELD_SYNONYMS {
        if let Some(value) = lookup_summary_field(&object, field) {
            canonical.insert((*field).to_string(), value.clone());
        }
    }
    let canonical = Value::Object(canonical);
    validate_json_against_schema(&canonical_summary_schema(), &canonical)?;

    let text_of = |field: &str| {
        canonical
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    };
    let action_items = canonical
        .get(ACTION_ITEMS_FIELD)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(action_item_text).collect())
        .unwrap_or_default();

    Ok(StructuredSummary {
        problem_summary: text_of(PROBLEM_SUMMARY_FIELD),
        suggested_solution: text_of(SUGGESTED_SOLUTION_FIELD),
        action_items,
    })
}

// Objects contribute their first text field; objects without one are skipped.
fn action_item_text(item: &Value) -> Option<String> {
    match item {
        Value::String(text) => Some(text.clone()),
        Value::Object(fields) => ACTION_ITEM_TEXT_FIELDS
            .iter()
            .find_map(|field| fields.get(*field).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

fn validate_json_against_schema(schema: &Value, payload: &Value) -> Result<(), String> {
    let validator = validator_for(schema)
        .map_err(|error| format!("invalid summary schema: {error}"))?;
    let mut errors = validator.iter_errors(payload);
    if let Some(first) = errors.next() {
        return Err(format!("summary schema validation failed: {first}"));
    }
    Ok(())
}
