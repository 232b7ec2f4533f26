//! Table merger: fan-in of per-unit rows.

use tracing::debug;

use crate::types::{
    schema::{Schema, PAGE_NUMBER_COLUMN},
    table::MergedTable,
    unit::RawExtractionResult,
};

/// Merge unit results into one table.
///
/// Results are ordered by unit index whatever order they arrive in. Each
/// row is conformed to the schema. A row with no value in any column is
/// dropped, as is a row equal to the row appended just before it. Degraded units add nothing, so suppression
/// still compares across them. The page-number column is filled from the
/// unit and ignored when comparing rows.
///
/// Only immediate neighbors are compared: a genuine repeated entry that
/// straddles a unit boundary is indistinguishable from a double read and
/// will be dropped.
pub fn merge(results: &[RawExtractionResult], schema: &Schema) -> MergedTable {
    let mut ordered: Vec<&RawExtractionResult> = results.iter().collect();
    ordered.sort_by_key(|result| result.unit.index);

    let fill_page = schema.wants_page_number();
    let mut table = MergedTable::empty(schema);

    for result in ordered {
        let page_number = result.unit.first_page_number().to_string();

        for raw in result.rows() {
            let mut row = raw.conform(schema);
            if row.is_blank() {
                table.blank_rows_dropped += 1;
                continue;
            }
            if fill_page {
                row.set(PAGE_NUMBER_COLUMN, page_number.clone());
            }

            let duplicate = table
                .rows
                .last()
                .is_some_and(|previous| previous.same_values_except(&row, PAGE_NUMBER_COLUMN));
            if duplicate {
                table.duplicates_suppressed += 1;
                continue;
            }
            table.rows.push(row);
        }
    }

    debug!(
        rows = table.rows.len(),
        duplicates_suppressed = table.duplicates_suppressed,
        blank_rows_dropped = table.blank_rows_dropped,
        "Merged unit results"
    );
    table
}

/// Rows contributed before suppression, for row-count checks.
pub fn raw_row_count(results: &[RawExtractionResult]) -> usize {
    results.iter().map(|r| r.rows().len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::table::Row;
    use crate::types::unit::{DegradedReason, ExtractionUnit};

    fn schema() -> Schema {
        Schema::new(["Species", "Location"], None).unwrap()
    }

    fn row(species: &str, location: &str) -> Row {
        [("Species", species), ("Location", location)]
            .into_iter()
            .collect()
    }

    fn unit(index: usize, rows: Vec<Row>) -> RawExtractionResult {
        RawExtractionResult::extracted(ExtractionUnit::new(index, index..index + 1), rows)
    }

    fn degraded(index: usize) -> RawExtractionResult {
        RawExtractionResult::degraded(
            ExtractionUnit::new(index, index..index + 1),
            DegradedReason::MalformedResponse {
                detail: "bad".into(),
            },
        )
    }

    #[test]
    fn test_adjacent_boundary_duplicate_suppressed() {
        let results = vec![
            unit(0, vec![row("A", "x"), row("B", "y")]),
            unit(1, vec![row("B", "y"), row("C", "z")]),
        ];
        let table = merge(&results, &schema());

        assert_eq!(table.rows, vec![row("A", "x"), row("B", "y"), row("C", "z")]);
        assert_eq!(table.duplicates_suppressed, 1);
    }

    #[test]
    fn test_non_adjacent_duplicates_kept() {
        let results = vec![
            unit(1, vec![row("A", "x")]),
            unit(2, vec![row("B", "y")]),
            unit(3, vec![row("C", "z")]),
            unit(4, vec![row("D", "w")]),
            unit(5, vec![row("A", "x")]),
        ];
        let table = merge(&results, &schema());
        assert_eq!(table.rows.len(), 5);
        assert_eq!(table.duplicates_suppressed, 0);
    }

    #[test]
    fn test_order_follows_unit_index_not_arrival() {
        let results = vec![
            unit(2, vec![row("C", "")]),
            unit(0, vec![row("A", "")]),
            unit(1, vec![row("B", "")]),
        ];
        let species: Vec<_> = merge(&results, &schema())
            .rows
            .iter()
            .map(|r| r.get("Species").unwrap_or_default().to_string())
            .collect();
        assert_eq!(species, ["A", "B", "C"]);
    }

    #[test]
    fn test_degraded_unit_keeps_predecessor() {
        let results = vec![
            unit(0, vec![row("A", "x")]),
            degraded(1),
            unit(2, vec![row("A", "x"), row("B", "y")]),
        ];
        let table = merge(&results, &schema());
        assert_eq!(table.rows, vec![row("A", "x"), row("B", "y")]);
    }

    #[test]
    fn test_duplicates_within_a_unit_suppressed() {
        let results = vec![unit(0, vec![row("A", "x"), row("A", "x"), row("A", "y")])];
        assert_eq!(merge(&results, &schema()).rows.len(), 2);
    }

    #[test]
    fn test_page_number_filled_and_ignored_for_duplicates() {
        let schema = Schema::new(["Species", PAGE_NUMBER_COLUMN], None).unwrap();
        let results = vec![
            RawExtractionResult::extracted(
                ExtractionUnit::new(0, 0..2),
                vec![[("Species", "A")].into_iter().collect()],
            ),
            RawExtractionResult::extracted(
                ExtractionUnit::new(1, 2..4),
                vec![
                    [("Species", "A")].into_iter().collect(),
                    [("Species", "B")].into_iter().collect(),
                ],
            ),
        ];
        let table = merge(&results, &schema);

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get(PAGE_NUMBER_COLUMN), Some("1"));
        assert_eq!(table.rows[1].get(PAGE_NUMBER_COLUMN), Some("3"));
    }

    #[test]
    fn test_blank_rows_dropped_and_counted() {
        let noise: Row = [("Extra", "model noise")].into_iter().collect();
        let results = vec![
            unit(0, vec![row("A", "x"), row("", "")]),
            unit(1, vec![noise, row("A", "x")]),
        ];
        let table = merge(&results, &schema());

        assert_eq!(table.rows, vec![row("A", "x")]);
        assert_eq!(table.blank_rows_dropped, 2);
        assert_eq!(table.duplicates_suppressed, 1);
    }

    #[test]
    fn test_rows_conform_to_schema() {
        let loose: Row = [("species", "A"), ("Extra", "1")].into_iter().collect();
        let table = merge(&[unit(0, vec![loose])], &schema());
        assert_eq!(table.columns, ["Species", "Location"]);
        assert_eq!(
            table.rows[0].columns().collect::<Vec<_>>(),
            ["Species", "Location"]
        );
        assert_eq!(raw_row_count(&[unit(0, vec![row("A", "")])]), 1);
    }
}
