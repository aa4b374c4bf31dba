use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::NaiveDateTime;
use dw_compiler::ProgramConfig;
use dw_core::{CellValue, DictWikiError, ImportSheets, LookupFieldRows, ResourceSheet, Row};
use tracing::info;

pub const LOOKUP_FIELD_COLUMN: &str = "LookupField";

/// A sheet as rows of cells; the first row is the header.
pub type SheetGrid = Vec<Vec<CellValue>>;

/// Named grids of cells. Implemented by the xlsx reader and by in-memory
/// workbooks.
pub trait SheetSource {
    fn sheet_names(&self) -> Vec<String>;

    fn sheet_grid(&mut self, name: &str) -> Result<SheetGrid, DictWikiError>;
}

pub struct XlsxWorkbook {
    path: PathBuf,
    inner: Xlsx<BufReader<File>>,
}

impl XlsxWorkbook {
    pub fn open(path: &Path) -> Result<Self, DictWikiError> {
        let inner: Xlsx<_> = open_workbook(path).map_err(|error| {
            DictWikiError::new(
                "WORKBOOK_OPEN",
                format!("Cannot open workbook \"{}\": {}", path.display(), error),
            )
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }
}

impl SheetSource for XlsxWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names().to_vec()
    }

    fn sheet_grid(&mut self, name: &str) -> Result<SheetGrid, DictWikiError> {
        if !self.sheet_names().iter().any(|sheet| sheet == name) {
            return Err(sheet_not_found(name));
        }
        let range = self.inner.worksheet_range(name).map_err(|error| {
            DictWikiError::new(
                "WORKBOOK_READ",
                format!(
                    "Cannot read sheet \"{}\" of \"{}\": {}",
                    name,
                    self.path.display(),
                    error
                ),
            )
        })?;
        Ok(range
            .rows()
            .map(|row| row.iter().map(convert_cell).collect())
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, SheetGrid)>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, name: impl Into<String>, grid: SheetGrid) -> Self {
        self.sheets.push((name.into(), grid));
        self
    }

    /// Sheet built from text cells; empty strings become blank cells.
    pub fn with_text_sheet(self, name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let grid = rows
            .iter()
            .map(|row| row.iter().map(|cell| CellValue::text(*cell)).collect())
            .collect();
        self.with_sheet(name, grid)
    }
}

impl SheetSource for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn sheet_grid(&mut self, name: &str) -> Result<SheetGrid, DictWikiError> {
        self.sheets
            .iter()
            .find(|(sheet, _)| sheet == name)
            .map(|(_, grid)| grid.clone())
            .ok_or_else(|| sheet_not_found(name))
    }
}

fn sheet_not_found(name: &str) -> DictWikiError {
    DictWikiError::new(
        "SHEET_NOT_FOUND",
        format!("Sheet \"{}\" does not exist in the workbook.", name),
    )
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(value) => CellValue::text(value.as_str()),
        Data::Float(value) => CellValue::Number(*value),
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Bool(value) => CellValue::Bool(*value),
        Data::DateTime(value) => value
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(value.as_f64())),
        Data::DateTimeIso(value) => parse_iso_datetime(value)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::text(value.as_str())),
        Data::DurationIso(value) => CellValue::text(value.as_str()),
    }
}

fn parse_iso_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Turns a grid into header-keyed rows. Blank header cells drop their
/// column; with `require_first_cell` rows whose first cell is blank are
/// skipped.
pub fn grid_rows(grid: &[Vec<CellValue>], require_first_cell: bool) -> Vec<Row> {
    let Some((header, body)) = grid.split_first() else {
        return Vec::new();
    };
    let columns = header
        .iter()
        .enumerate()
        .filter_map(|(index, cell)| {
            cell.as_text()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .map(|name| (index, name))
        })
        .collect::<Vec<_>>();

    body.iter()
        .filter(|cells| {
            !require_first_cell || cells.first().is_some_and(|first| !first.is_empty())
        })
        .map(|cells| {
            let values = columns
                .iter()
                .map(|(index, name)| {
                    let value = cells.get(*index).cloned().unwrap_or(CellValue::Empty);
                    (name.clone(), value)
                })
                .collect::<BTreeMap<_, _>>();
            Row::from_cells(values)
        })
        .collect()
}

/// Reads every sheet named in `config.ini`.
pub fn load_import_sheets<S: SheetSource + ?Sized>(
    source: &mut S,
    config: &ProgramConfig,
) -> Result<ImportSheets, DictWikiError> {
    let mut sheets = ImportSheets::default();

    for sheet_config in &config.resource_sheets {
        let grid = source.sheet_grid(&sheet_config.sheet_name)?;
        let sheet = ResourceSheet::from_rows(
            sheet_config.sheet_name.as_str(),
            sheet_config.resource_name.as_str(),
            grid_rows(&grid, true),
        );
        info!(
            "Read {} rows from resource sheet '{}'",
            sheet.row_count(),
            sheet.sheet_name
        );
        sheets.resources.push(sheet);
    }

    if let Some(lookup_sheet) = &config.lookup_sheet {
        let grid = source.sheet_grid(lookup_sheet)?;
        sheets.lookups = group_lookup_rows(lookup_sheet, grid_rows(&grid, false))?;
        if sheets.lookups.is_empty() {
            return Err(DictWikiError::new(
                "LOOKUP_SHEET_EMPTY",
                format!("No lookup fields found in sheet \"{}\".", lookup_sheet),
            ));
        }
    }

    Ok(sheets)
}

fn group_lookup_rows(sheet_name: &str, rows: Vec<Row>) -> Result<Vec<LookupFieldRows>, DictWikiError> {
    let mut fields: Vec<LookupFieldRows> = Vec::new();
    for row in rows {
        if !row.has_column(LOOKUP_FIELD_COLUMN) {
            return Err(DictWikiError::new(
                "SHEET_COLUMN_MISSING",
                format!(
                    "Cannot find column \"{}\" in lookup sheet \"{}\".",
                    LOOKUP_FIELD_COLUMN, sheet_name
                ),
            ));
        }
        let Some(field_name) = row.text(LOOKUP_FIELD_COLUMN) else {
            continue;
        };
        match fields.iter_mut().find(|field| field.field_name == field_name) {
            Some(field) => field.rows.push(row),
            None => fields.push(LookupFieldRows {
                field_name,
                rows: vec![row],
            }),
        }
    }
    Ok(fields)
}
