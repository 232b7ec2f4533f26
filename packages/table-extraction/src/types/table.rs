//! Rows and the merged table.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::Schema;

/// Literals the model emits for "no value".
const NULL_LITERALS: &[&str] = &["nan", "None", "null"];

/// One table row: schema column to text value, in schema order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(IndexMap<String, String>);

impl Row {
    /// Force an untrusted model object into exact schema conformance.
    ///
    /// Missing columns are filled with an empty value, unknown keys are
    /// dropped. A key matches its column exactly first. Failing that, a key
    /// matches ignoring case and surrounding whitespace, but only when the
    /// column is the sole schema column of that spelling and the key is not
    /// itself a schema column.
    pub fn coerce(raw: &Map<String, Value>, schema: &Schema) -> Self {
        let cells = schema
            .columns()
            .iter()
            .map(|column| {
                let value = lookup(|| raw.iter(), column, schema)
                    .map(normalize_value)
                    .unwrap_or_default();
                (column.clone(), value)
            })
            .collect();
        Row(cells)
    }

    /// Re-apply coercion to an already-typed row.
    ///
    /// Idempotent: `row.conform(s).conform(s) == row.conform(s)`.
    pub fn conform(&self, schema: &Schema) -> Self {
        let cells = schema
            .columns()
            .iter()
            .map(|column| {
                let value = lookup(|| self.0.iter(), column, schema)
                    .map(|value| normalize_text(value))
                    .unwrap_or_default();
                (column.clone(), value)
            })
            .collect();
        Row(cells)
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    pub(crate) fn set(&mut self, column: &str, value: String) {
        if let Some(cell) = self.0.get_mut(column) {
            *cell = value;
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every cell is an empty string.
    pub fn is_blank(&self) -> bool {
        self.0.values().all(String::is_empty)
    }

    /// Compare every cell except `ignore`.
    pub(crate) fn same_values_except(&self, other: &Row, ignore: &str) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .filter(|(key, _)| key.as_str() != ignore)
                .all(|(key, value)| other.0.get(key) == Some(value))
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}

/// Find the value for `column` among `entries`.
fn lookup<'a, V, I>(entries: impl Fn() -> I, column: &str, schema: &Schema) -> Option<&'a V>
where
    V: 'a,
    I: Iterator<Item = (&'a String, &'a V)>,
{
    if let Some((_, value)) = entries().find(|(key, _)| key.as_str() == column) {
        return Some(value);
    }

    let wanted = column.trim();
    let folds_alone = schema
        .columns()
        .iter()
        .filter(|c| c.trim().eq_ignore_ascii_case(wanted))
        .count()
        == 1;
    if !folds_alone {
        return None;
    }

    entries()
        .filter(|(key, _)| !schema.contains(key))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(wanted))
        .map(|(_, value)| value)
}

/// Render a JSON value as cell text.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => normalize_text(s),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Compact JSON keeps nested data readable in one cell
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn normalize_text(text: &str) -> String {
    let trimmed = text.trim();
    if NULL_LITERALS.contains(&trimmed) {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// The final ordered table handed to the artifact builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,

    /// Rows dropped as immediate-neighbor duplicates
    pub duplicates_suppressed: usize,

    /// Rows dropped because every cell was empty
    pub blank_rows_dropped: usize,
}

impl MergedTable {
    pub fn empty(schema: &Schema) -> Self {
        Self {
            columns: schema.columns().to_vec(),
            rows: Vec::new(),
            duplicates_suppressed: 0,
            blank_rows_dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
