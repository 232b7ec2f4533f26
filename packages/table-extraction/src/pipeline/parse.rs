//! Parsing untrusted model output into raw row objects.
//!
//! Accepted shapes, in order:
//! 1. The envelope `{"extracted_data": [...], "extraction_notes": ..., ...}`
//! 2. A bare JSON array of row objects
//! 3. A single row object with at least one schema column
//!
//! Any of these may be wrapped in a markdown code fence. When none parses,
//! a salvage pass recovers the first embedded array of objects, or failing
//! that every flat object that carries a schema column.

use serde_json::{Deserializer, Map, Value};

use crate::types::schema::Schema;

/// Rows and metadata read from one response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub rows: Vec<Map<String, Value>>,
    pub total_rows: Option<u64>,
    pub notes: Option<String>,
    pub confidence: Option<String>,

    /// True when rows came from the salvage pass
    pub salvaged: bool,
}

/// Parse a model response. `Err` carries a reason for the degraded record.
pub fn parse_response(raw: &str, schema: &Schema) -> Result<ParsedResponse, String> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        return Err("empty response".to_string());
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value) => from_value(value, schema),
        Err(parse_err) => salvage(text, schema).ok_or_else(|| format!("invalid JSON: {}", parse_err)),
    }
}

/// Remove a surrounding ```` ``` ```` or ```` ```json ```` fence.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    // Drop the info string ("json", "JSON", ...) on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn from_value(value: Value, schema: &Schema) -> Result<ParsedResponse, String> {
    match value {
        Value::Array(items) => Ok(ParsedResponse {
            rows: objects(items),
            ..Default::default()
        }),
        Value::Object(mut map) => {
            let notes = take_string(&mut map, "extraction_notes");
            let confidence = take_string(&mut map, "confidence_level");
            let total_rows = map.get("total_rows").and_then(Value::as_u64);

            let rows = match map.remove("extracted_data") {
                Some(Value::Array(items)) => objects(items),
                Some(Value::Null) => Vec::new(),
                Some(other) => {
                    return Err(format!(
                        "extracted_data is {}, expected an array",
                        type_name(&other)
                    ))
                }
                None if has_schema_column(&map, schema) => vec![map],
                None => match first_object_array(map) {
                    Some(rows) => rows,
                    None => return Err("object has no rows and no schema columns".to_string()),
                },
            };

            Ok(ParsedResponse {
                rows,
                total_rows,
                notes,
                confidence,
                salvaged: false,
            })
        }
        other => Err(format!("expected an object or array, got {}", type_name(&other))),
    }
}

fn salvage(text: &str, schema: &Schema) -> Option<ParsedResponse> {
    // First embedded array that holds at least one object
    for (start, _) in text.match_indices('[') {
        if let Some((Value::Array(items), _)) = parse_prefix(&text[start..]) {
            let rows = objects(items);
            if !rows.is_empty() {
                return Some(salvaged(rows));
            }
        }
    }

    // Otherwise every complete object that looks like a row
    let mut rows = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find('{') {
        let start = cursor + offset;
        match parse_prefix(&text[start..]) {
            Some((Value::Object(map), consumed)) if has_schema_column(&map, schema) => {
                rows.push(map);
                cursor = start + consumed;
            }
            _ => cursor = start + 1,
        }
    }

    (!rows.is_empty()).then(|| salvaged(rows))
}

/// Parse one JSON value from the front of `text`, returning bytes consumed.
fn parse_prefix(text: &str) -> Option<(Value, usize)> {
    let mut stream = Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Some((value, stream.byte_offset())),
        _ => None,
    }
}

fn salvaged(rows: Vec<Map<String, Value>>) -> ParsedResponse {
    ParsedResponse {
        rows,
        salvaged: true,
        ..Default::default()
    }
}

fn objects(items: Vec<Value>) -> Vec<Map<String, Value>> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

fn first_object_array(map: Map<String, Value>) -> Option<Vec<Map<String, Value>>> {
    map.into_iter().find_map(|(_, value)| match value {
        Value::Array(items) if items.iter().any(Value::is_object) => Some(objects(items)),
        _ => None,
    })
}

fn has_schema_column(map: &Map<String, Value>, schema: &Schema) -> bool {
    map.keys().any(|key| {
        let key = key.trim();
        schema
            .extracted_columns()
            .any(|column| column.eq_ignore_ascii_case(key))
    })
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
