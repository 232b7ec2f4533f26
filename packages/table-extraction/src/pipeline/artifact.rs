//! Artifact builder: merged table to spreadsheet bytes, plus the
//! read-back used for previews.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Reader, Xlsx};
use rust_xlsxwriter::{Color, DocProperties, Format, FormatAlign, FormatBorder, Workbook};
use serde::Serialize;
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::types::{
    schema::Schema,
    stats::JobStats,
    table::{MergedTable, Row},
    unit::ExtractionMode,
};

/// Name of the single data sheet.
pub const SHEET_NAME: &str = "Extracted_Data";

/// Data rows shown in a preview unless the caller asks otherwise.
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

const HEADER_FILL: u32 = 0x2E7D32;
const MIN_COLUMN_WIDTH: usize = 15;
const MAX_COLUMN_WIDTH: usize = 60;
const COLUMN_PADDING: usize = 3;

/// Excel rejects longer cell strings.
const MAX_CELL_CHARS: usize = 32_767;

/// Finished spreadsheet bytes and the mode that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
    mode: ExtractionMode,
}

impl Artifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read the first rows back from the bytes.
    pub fn preview(&self, rows: usize) -> Result<Preview> {
        read_preview(&self.bytes, rows)
    }
}

/// Header and leading data rows of the first sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Serialize a merged table into a one-sheet workbook and compute stats.
///
/// Row 0 holds the schema columns; every following row is one table row
/// in order. Empty values leave the cell blank. A row with no value in any
/// schema column is not written, and stats count only the rows written.
pub fn build_artifact(
    table: &MergedTable,
    schema: &Schema,
    mode: ExtractionMode,
) -> Result<(Artifact, JobStats)> {
    let written = without_blank_rows(table, schema);
    let table = &written;

    let mut workbook = Workbook::new();

    let keywords = match mode {
        ExtractionMode::Full => "full".to_string(),
        ExtractionMode::Sample { pages, .. } => format!("sample,{}", pages),
    };
    let properties = DocProperties::new()
        .set_title("Extracted table data")
        .set_subject(&format!("extraction mode: {}", mode))
        .set_keywords(&keywords)
        .set_comment(&format!(
            "{} rows across {} columns",
            table.rows.len(),
            schema.len()
        ));
    workbook.set_properties(&properties);

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let mut widths: Vec<usize> = schema.columns().iter().map(|c| c.chars().count()).collect();

    for (col, name) in schema.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, col_index(col)?, name, &header_format)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let row_index = u32::try_from(r + 1)
            .map_err(|_| ExtractionError::Artifact("too many rows for one sheet".into()))?;

        for (col, name) in schema.columns().iter().enumerate() {
            let value = row.get(name).unwrap_or_default();
            if value.is_empty() {
                continue;
            }
            let value = clamp_cell(value);
            widths[col] = widths[col].max(value.chars().count());
            worksheet.write_string(row_index, col_index(col)?, value)?;
        }
    }

    for (col, longest) in widths.iter().enumerate() {
        let width = (longest + COLUMN_PADDING).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH);
        worksheet.set_column_width(col_index(col)?, width as f64)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    let bytes = workbook.save_to_buffer()?;
    let stats = JobStats::from_table(table, mode);

    debug!(
        bytes = bytes.len(),
        rows = stats.total_rows,
        columns = stats.total_columns,
        mode = %mode,
        "Built spreadsheet artifact"
    );

    Ok((Artifact { bytes, mode }, stats))
}

/// Read the first sheet's header and up to `max_rows` data rows.
///
/// Rows are padded to the header width so blank trailing cells read as
/// empty strings.
pub fn read_preview(bytes: &[u8], max_rows: usize) -> Result<Preview> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Artifact(format!("unreadable workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExtractionError::Artifact("workbook has no sheets".into()))?
        .map_err(|e| ExtractionError::Artifact(e.to_string()))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();

    let rows = rows
        .take(max_rows)
        .map(|cells| {
            let mut values: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
            values.resize(header.len().max(values.len()), String::new());
            values
        })
        .collect();

    Ok(Preview { header, rows })
}

/// Copy of the table minus rows whose schema cells are all empty.
fn without_blank_rows(table: &MergedTable, schema: &Schema) -> MergedTable {
    let is_blank = |row: &Row| {
        schema
            .columns()
            .iter()
            .all(|c| row.get(c).unwrap_or_default().is_empty())
    };

    let mut kept = table.clone();
    kept.rows.retain(|row| !is_blank(row));
    kept.blank_rows_dropped += table.rows.len() - kept.rows.len();
    kept
}

fn col_index(col: usize) -> Result<u16> {
    u16::try_from(col).map_err(|_| ExtractionError::Artifact("too many columns for one sheet".into()))
}

fn clamp_cell(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}
