//! Prompts for per-unit table extraction.
//!
//! The prompt is tuned for dense, multi-column documents such as species
//! surveys, where one page can hold dozens of rows and entries wrap
//! across lines.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::types::schema::Schema;

/// Template for extracting rows from one unit.
pub const EXTRACT_PROMPT: &str = r#"You are reading a page image from a dense document that contains tabular data.
Extract EVERY data row that matches these columns: {columns}

HOW TO READ THE PAGE:
1. Scan the whole page from top to bottom; data may be laid out in several columns.
2. Entries can wrap onto more than one line; join wrapped text into one value.
3. Ignore running headers, footers, page numbers and section titles.
4. Only extract real data entries, not layout elements.

COLUMNS:
{column_hints}

DATA QUALITY RULES:
1. Prefer completeness: extract every row that contains relevant data.
2. Preserve scientific names, codes and abbreviations exactly as printed.
3. Keep location details as specific as the page gives them.
4. Use "N/A" for fields that are missing on the page.
5. Drop obvious formatting artifacts.

OUTPUT FORMAT:
Return one JSON object and nothing else:
{
  "extracted_data": [
    {{row_template}}
  ],
  "total_rows": <number of rows in extracted_data>,
  "extraction_notes": "<observations about density, legibility or layout>",
  "confidence_level": "high" | "medium" | "low"
}
Use exactly the column names above as keys in every row.

ADDITIONAL CONTEXT:
{instructions}

Dense pages often hold many rows. Do not stop early; if a table is visible, extract all of it."#;

const NO_INSTRUCTIONS: &str = "No additional context provided.";

/// Keyword groups mapped to a reading hint. First match wins.
const COLUMN_HINTS: &[(&[&str], &str)] = &[
    (
        &["common", "vernacular", "english"],
        "common names in plain language (e.g. 'White Oak', 'American Robin')",
    ),
    (
        &["species", "scientific", "name", "binomial", "taxa"],
        "scientific binomial names (e.g. 'Quercus alba'); look for Latin genus + species",
    ),
    (
        &[
            "location", "locality", "place", "county", "state", "where", "found", "range",
        ],
        "geographic information (counties, states, countries, specific localities)",
    ),
    (
        &["date", "year", "time", "collected", "observed", "when"],
        "temporal information (dates, years, periods)",
    ),
    (
        &[
            "status",
            "condition",
            "conservation",
            "threat",
            "endangered",
            "extinct",
        ],
        "conservation or threat status, including short codes such as 'Ex' or 'En'",
    ),
    (
        &["family", "group", "category", "class", "order"],
        "taxonomic classification (family, order or class names)",
    ),
];

const GENERIC_HINT: &str = "the value printed for this field on the page";

/// Generate a hash of the extraction prompt for checkpoint invalidation.
pub fn extract_prompt_hash() -> String {
    let mut hasher = Sha256::new();
    hasher.update(EXTRACT_PROMPT.as_bytes());
    for (keywords, hint) in COLUMN_HINTS {
        hasher.update(keywords.join(",").as_bytes());
        hasher.update(hint.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Pick the reading hint for one column by keyword.
pub fn column_hint(column: &str) -> &'static str {
    let lower = column.to_lowercase();
    COLUMN_HINTS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, hint)| *hint)
        .unwrap_or(GENERIC_HINT)
}

/// Format the extraction prompt for a schema.
pub fn format_extract_prompt(schema: &Schema) -> String {
    let columns: Vec<&str> = schema.extracted_columns().collect();

    let column_list = columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");

    let column_hints = columns
        .iter()
        .map(|c| format!("- {}: {}", c, column_hint(c)))
        .collect::<Vec<_>>()
        .join("\n");

    let row_template = columns
        .iter()
        .map(|c| format!("\"{}\": \"value\"", c))
        .collect::<Vec<_>>()
        .join(", ");

    let instructions = schema
        .instructions()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(NO_INSTRUCTIONS);

    // Instructions go last so caller text cannot collide with placeholders
    EXTRACT_PROMPT
        .replace("{columns}", &column_list)
        .replace("{column_hints}", &column_hints)
        .replace("{row_template}", &row_template)
        .replace("{instructions}", instructions)
}

/// Strict JSON schema for the response envelope.
///
/// Every schema column is a required string, so a backend that supports
/// structured outputs cannot invent or omit keys.
pub fn response_schema(schema: &Schema) -> Value {
    let properties: Map<String, Value> = schema
        .extracted_columns()
        .map(|c| (c.to_string(), json!({"type": "string"})))
        .collect();
    let required: Vec<&str> = schema.extracted_columns().collect();

    json!({
        "type": "object",
        "properties": {
            "extracted_data": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false
                }
            },
            "total_rows": {"type": "integer"},
            "extraction_notes": {"type": "string"},
            "confidence_level": {"type": "string", "enum": ["high", "medium", "low"]}
        },
        "required": ["extracted_data", "total_rows", "extraction_notes", "confidence_level"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::schema::PAGE_NUMBER_COLUMN;

    #[test]
    fn test_prompt_hash_is_consistent() {
        let hash1 = extract_prompt_hash();
        let hash2 = extract_prompt_hash();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA-256 hex
    }

    #[test]
    fn test_column_hints() {
        assert!(column_hint("Scientific Name").starts_with("scientific"));
        assert!(column_hint("Common Name").starts_with("common"));
        assert!(column_hint("County").starts_with("geographic"));
        assert!(column_hint("Year Collected").starts_with("temporal"));
        assert!(column_hint("Status").starts_with("conservation"));
        assert!(column_hint("Family").starts_with("taxonomic"));
        assert_eq!(column_hint("Notes"), GENERIC_HINT);
    }

    #[test]
    fn test_format_prompt_embeds_columns() {
        let schema = Schema::new(["Species", "Location"], Some("Only plants")).unwrap();
        let prompt = format_extract_prompt(&schema);

        assert!(prompt.contains(r#""Species", "Location""#));
        assert!(prompt.contains(r#""Species": "value", "Location": "value""#));
        assert!(prompt.contains("Only plants"));
        assert!(!prompt.contains("{instructions}"));
    }

    #[test]
    fn test_format_prompt_without_instructions() {
        let schema = Schema::new(["Species"], None).unwrap();
        assert!(format_extract_prompt(&schema).contains(NO_INSTRUCTIONS));

        let blank = Schema::new(["Species"], Some("   ")).unwrap();
        assert!(format_extract_prompt(&blank).contains(NO_INSTRUCTIONS));
    }

    #[test]
    fn test_instructions_with_placeholder_text_are_not_expanded() {
        let schema = Schema::new(["Species"], Some("literal {columns} here")).unwrap();
        assert!(format_extract_prompt(&schema).contains("literal {columns} here"));
    }

    #[test]
    fn test_page_number_column_not_requested() {
        let schema = Schema::new(["Species", PAGE_NUMBER_COLUMN], None).unwrap();
        let prompt = format_extract_prompt(&schema);
        assert!(!prompt.contains(PAGE_NUMBER_COLUMN));

        let json = response_schema(&schema);
        let items = &json["properties"]["extracted_data"]["items"];
        assert!(items["properties"].get(PAGE_NUMBER_COLUMN).is_none());
        assert_eq!(items["required"], json!(["Species"]));
    }
}
