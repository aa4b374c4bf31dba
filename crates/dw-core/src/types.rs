use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Row;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    pub fn synthetic() -> Self {
        Self {
            start: SourceLocation { line: 1, column: 1 },
            end: SourceLocation { line: 1, column: 1 },
        }
    }
}

/// High-water marks from the previous wiki export's statistics report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxIdReport {
    pub max_lookup_ids: BTreeMap<String, i64>,
    pub max_record_ids: BTreeMap<String, i64>,
}

impl MaxIdReport {
    /// Largest id seen in either section; `-1` when both are empty.
    pub fn global_max(&self) -> i64 {
        self.max_lookup_ids
            .values()
            .chain(self.max_record_ids.values())
            .copied()
            .max()
            .unwrap_or(-1)
    }
}

/// Rows of one resource sheet, partitioned by their full group key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceSheet {
    pub sheet_name: String,
    pub resource_name: String,
    pub rows_by_group: BTreeMap<String, Vec<Row>>,
}

impl ResourceSheet {
    pub fn new(sheet_name: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            resource_name: resource_name.into(),
            rows_by_group: BTreeMap::new(),
        }
    }

    pub fn push_row(&mut self, row: Row) {
        self.rows_by_group
            .entry(row.group_key())
            .or_default()
            .push(row);
    }

    pub fn from_rows(
        sheet_name: impl Into<String>,
        resource_name: impl Into<String>,
        rows: impl IntoIterator<Item = Row>,
    ) -> Self {
        let mut sheet = Self::new(sheet_name, resource_name);
        for row in rows {
            sheet.push_row(row);
        }
        sheet
    }

    pub fn row_count(&self) -> usize {
        self.rows_by_group.values().map(Vec::len).sum()
    }
}

/// All lookup value rows of one lookup field, in sheet order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LookupFieldRows {
    pub field_name: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportSheets {
    pub resources: Vec<ResourceSheet>,
    pub lookups: Vec<LookupFieldRows>,
}
