//! The caller's column contract.

use serde::{Deserialize, Serialize};

use crate::error::{ExtractionError, Result};

/// Default cap on free-text instructions, in characters.
pub const DEFAULT_MAX_INSTRUCTIONS: usize = 4000;

/// Reserved column filled with the 1-based source page number.
pub const PAGE_NUMBER_COLUMN: &str = "_page_number";

/// Ordered, de-duplicated column names plus optional instructions.
///
/// Immutable once built; every extraction call receives the same schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<String>,
    instructions: Option<String>,
}

impl Schema {
    /// Validate caller input with the default instruction cap.
    pub fn new<I, S>(columns: I, instructions: Option<&str>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::validate(columns, instructions, DEFAULT_MAX_INSTRUCTIONS)
    }

    /// Validate caller input.
    ///
    /// Columns are trimmed, blanks dropped and exact duplicates collapsed
    /// in first-seen order. Instructions are kept verbatim.
    pub fn validate<I, S>(
        columns: I,
        instructions: Option<&str>,
        max_instructions: usize,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for column in columns {
            let column = column.as_ref().trim();
            if column.is_empty() || normalized.iter().any(|c| c == column) {
                continue;
            }
            normalized.push(column.to_string());
        }

        if normalized.is_empty() {
            return Err(ExtractionError::EmptySchema);
        }

        if let Some(text) = instructions {
            let len = text.chars().count();
            if len > max_instructions {
                return Err(ExtractionError::InstructionsTooLong {
                    len,
                    max: max_instructions,
                });
            }
        }

        Ok(Self {
            columns: normalized,
            instructions: instructions.map(str::to_string),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Columns the model is asked to fill (the page-number column is ours).
    pub fn extracted_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|c| *c != PAGE_NUMBER_COLUMN)
    }

    pub fn wants_page_number(&self) -> bool {
        self.contains(PAGE_NUMBER_COLUMN)
    }
}
