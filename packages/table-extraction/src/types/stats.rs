//! Summary statistics computed from a merged table.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::table::MergedTable;
use super::unit::ExtractionMode;

/// Cell values that count as empty in quality metrics.
const EMPTY_PLACEHOLDERS: &[&str] = &["", "N/A", "n/a", "nan"];

/// Whether a cell counts as empty for quality metrics.
pub fn is_empty_cell(value: &str) -> bool {
    EMPTY_PLACEHOLDERS.contains(&value.trim())
}

/// Read-only summary of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    /// Data rows (header excluded)
    pub total_rows: usize,
    pub total_columns: usize,
    pub has_data: bool,

    /// Units that contributed no rows because of a recoverable failure
    pub degraded_units: usize,
    pub units_processed: usize,
    pub duplicates_suppressed: usize,
    pub blank_rows_dropped: usize,

    /// Non-empty data cells over all data cells (0.0 for an empty table)
    pub non_empty_ratio: f64,

    /// Per-column share of non-empty cells, in schema order
    pub column_completeness: IndexMap<String, f64>,

    pub mode: ExtractionMode,
}

impl JobStats {
    /// Compute stats once from the merged table.
    ///
    /// Unit counters start at zero; the orchestrator fills them with
    /// [`JobStats::with_units`].
    pub fn from_table(table: &MergedTable, mode: ExtractionMode) -> Self {
        let total_rows = table.rows.len();
        let total_columns = table.columns.len();

        let mut filled_per_column: IndexMap<String, usize> =
            table.columns.iter().map(|c| (c.clone(), 0)).collect();
        for row in &table.rows {
            for (column, filled) in filled_per_column.iter_mut() {
                if row.get(column).is_some_and(|v| !is_empty_cell(v)) {
                    *filled += 1;
                }
            }
        }

        let ratio = |filled: usize, total: usize| {
            if total == 0 {
                0.0
            } else {
                filled as f64 / total as f64
            }
        };

        let filled_total: usize = filled_per_column.values().sum();
        let column_completeness = filled_per_column
            .into_iter()
            .map(|(column, filled)| (column, ratio(filled, total_rows)))
            .collect();

        Self {
            total_rows,
            total_columns,
            has_data: total_rows > 0,
            degraded_units: 0,
            units_processed: 0,
            duplicates_suppressed: table.duplicates_suppressed,
            blank_rows_dropped: table.blank_rows_dropped,
            non_empty_ratio: ratio(filled_total, total_rows * total_columns),
            column_completeness,
            mode,
        }
    }

    pub fn with_units(mut self, processed: usize, degraded: usize) -> Self {
        self.units_processed = processed;
        self.degraded_units = degraded;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::table::Row;

    fn table(rows: Vec<Row>) -> MergedTable {
        MergedTable {
            columns: vec!["Species".into(), "Location".into()],
            rows,
            duplicates_suppressed: 0,
            blank_rows_dropped: 0,
        }
    }

    #[test]
    fn test_empty_table() {
        let stats = JobStats::from_table(&table(vec![]), ExtractionMode::Full);
        assert_eq!(stats.total_rows, 0);
        assert_eq!(stats.total_columns, 2);
        assert!(!stats.has_data);
        assert_eq!(stats.non_empty_ratio, 0.0);
        assert_eq!(stats.column_completeness["Species"], 0.0);
    }

    #[test]
    fn test_placeholders_count_as_empty() {
        let rows = vec![
            [("Species", "Rana"), ("Location", "N/A")]
                .into_iter()
                .collect(),
            [("Species", "Bufo"), ("Location", "")].into_iter().collect(),
        ];
        let stats = JobStats::from_table(&table(rows), ExtractionMode::Full);

        assert_eq!(stats.total_rows, 2);
        assert!(stats.has_data);
        assert_eq!(stats.non_empty_ratio, 0.5);
        assert_eq!(stats.column_completeness["Species"], 1.0);
        assert_eq!(stats.column_completeness["Location"], 0.0);
    }

    #[test]
    fn test_camel_case_fields() {
        let stats = JobStats::from_table(&table(vec![]), ExtractionMode::Full).with_units(3, 1);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalRows"], 0);
        assert_eq!(json["hasData"], false);
        assert_eq!(json["degradedUnits"], 1);
        assert_eq!(json["unitsProcessed"], 3);
    }
}
