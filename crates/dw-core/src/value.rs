use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const GROUPS_COLUMN: &str = "Groups";

/// One spreadsheet cell after conversion from the workbook reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(value) => value.is_empty(),
            _ => false,
        }
    }

    /// Text rendering of the cell; `None` for blank cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(value) if value.is_empty() => None,
            Self::Text(value) => Some(value.clone()),
            Self::Bool(value) => Some(if *value { "True" } else { "False" }.to_string()),
            Self::Number(value) => Some(format_number(*value)),
            Self::DateTime(value) => Some(value.format("%Y%m%dT%H%M").to_string()),
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::DateTime(_) => "datetime",
            Self::Text(_) => "string",
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// A spreadsheet row: one field, lookup value or collection item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub cells: BTreeMap<String, CellValue>,
    pub groups: Vec<String>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from header/value pairs, deriving the group path from the
    /// `Groups` column when it is present.
    pub fn from_cells(cells: BTreeMap<String, CellValue>) -> Self {
        let groups = cells
            .get(GROUPS_COLUMN)
            .and_then(CellValue::as_text)
            .map(|raw| parse_group_path(&raw))
            .unwrap_or_default();
        Self { cells, groups }
    }

    pub fn with_cell(mut self, column: impl Into<String>, value: CellValue) -> Self {
        let column = column.into();
        if column == GROUPS_COLUMN {
            self.groups = value
                .as_text()
                .map(|raw| parse_group_path(&raw))
                .unwrap_or_default();
        }
        self.cells.insert(column, value);
        self
    }

    pub fn with_text(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_cell(column, CellValue::text(value))
    }

    /// `None` when the column does not exist in the sheet at all.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    /// Text of a present, non-blank cell.
    pub fn text(&self, column: &str) -> Option<String> {
        self.cells.get(column).and_then(CellValue::as_text)
    }

    pub fn group_key(&self) -> String {
        group_key(&self.groups)
    }
}

/// Splits a raw `Groups` cell. Underscore-separated paths win over commas.
pub fn parse_group_path(raw: &str) -> Vec<String> {
    let separator = if raw.contains('_') { '_' } else { ',' };
    raw.split(separator)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn group_key(segments: &[String]) -> String {
    segments.join(",")
}
