//! Spreadsheet access.
//!
//! Registrations arrive as spreadsheet documents: the first worksheet holds
//! the form responses, and a `mailing` worksheet is used as the send ledger.
//! The traits here keep the rest of the crate independent of where the cells
//! actually live; production uses a directory of CSV files exported per
//! worksheet, tests use an in-memory document.
//!
//! Cell coordinates are 1-based throughout, matching how spreadsheet UIs
//! number rows and columns.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Name of the ledger worksheet inside a webinar document.
pub const MAILING_SHEET: &str = "mailing";

/// One worksheet of cells.
pub trait Worksheet {
    fn name(&self) -> &str;

    /// All rows, each as a vector of cell strings. Rows may be ragged.
    fn get_all_values(&self) -> Result<Vec<Vec<String>>>;

    /// Overwrite a single cell. `row` and `col` are 1-based.
    fn update_cell(&self, row: usize, col: usize, value: &str) -> Result<()>;

    /// Remove every row from the sheet.
    fn clear(&self) -> Result<()>;

    /// Append rows below the current contents.
    fn append_rows(&self, rows: &[Vec<String>]) -> Result<()>;

    /// Append a single row.
    fn append_row(&self, row: &[String]) -> Result<()> {
        self.append_rows(&[row.to_vec()])
    }
}

/// A document: a titled collection of worksheets.
pub trait SpreadsheetDocument {
    type Sheet: Worksheet;

    /// Document title. This is the webinar title to parse.
    fn title(&self) -> &str;

    /// Look up a worksheet by name.
    fn worksheet(&self, name: &str) -> Result<Self::Sheet>;

    /// The first worksheet, which holds the registration rows.
    fn registrations(&self) -> Result<Self::Sheet>;

    /// Create a new empty worksheet.
    fn add_worksheet(&mut self, name: &str) -> Result<Self::Sheet>;

    /// Delete a worksheet and its contents.
    fn delete_worksheet(&mut self, name: &str) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct WorkbookMeta {
    title: String,
    sheets: Vec<String>,
}

/// Workbook stored as a directory: a `workbook.json` manifest naming the
/// title and worksheet order, plus one `<sheet>.csv` file per worksheet.
pub struct CsvWorkbook {
    dir: PathBuf,
    meta: WorkbookMeta,
}

impl CsvWorkbook {
    /// Open a workbook directory, reading its manifest.
    pub fn open(dir: &Path) -> Result<Self> {
        let manifest = dir.join("workbook.json");
        let raw = fs::read_to_string(&manifest).map_err(map_io)?;
        let meta: WorkbookMeta = serde_json::from_str(&raw)?;
        debug!(title = %meta.title, sheets = meta.sheets.len(), "opened workbook");
        Ok(Self { dir: dir.to_path_buf(), meta })
    }

    fn save_meta(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.meta)?;
        fs::write(self.dir.join("workbook.json"), raw).map_err(map_io)
    }
}

impl SpreadsheetDocument for CsvWorkbook {
    type Sheet = CsvWorksheet;

    fn title(&self) -> &str {
        &self.meta.title
    }

    fn worksheet(&self, name: &str) -> Result<CsvWorksheet> {
        if !self.meta.sheets.iter().any(|sheet| sheet == name) {
            return Err(Error::WorksheetNotFound(name.to_string()));
        }
        Ok(CsvWorksheet {
            path: self.dir.join(format!("{name}.csv")),
            name: name.to_string(),
        })
    }

    fn registrations(&self) -> Result<CsvWorksheet> {
        let first = self
            .meta
            .sheets
            .first()
            .ok_or_else(|| Error::WorksheetNotFound("<first>".to_string()))?;
        self.worksheet(first)
    }

    fn add_worksheet(&mut self, name: &str) -> Result<CsvWorksheet> {
        if !self.meta.sheets.iter().any(|sheet| sheet == name) {
            self.meta.sheets.push(name.to_string());
            self.save_meta()?;
        }
        self.worksheet(name)
    }

    fn delete_worksheet(&mut self, name: &str) -> Result<()> {
        let before = self.meta.sheets.len();
        self.meta.sheets.retain(|sheet| sheet != name);
        if self.meta.sheets.len() == before {
            return Err(Error::WorksheetNotFound(name.to_string()));
        }
        self.save_meta()?;
        let path = self.dir.join(format!("{name}.csv"));
        if path.exists() {
            fs::remove_file(path).map_err(map_io)?;
        }
        Ok(())
    }
}

/// One CSV file acting as a worksheet.
///
/// Every operation reads or rewrites the whole file. Ledger sheets are a
/// few hundred rows at most, so simplicity wins over clever in-place edits.
pub struct CsvWorksheet {
    path: PathBuf,
    name: String,
}

impl CsvWorksheet {
    fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .map_err(map_csv)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(map_csv)?;
            rows.push(record.iter().map(ToString::to_string).collect());
        }
        Ok(rows)
    }

    fn write_rows(&self, rows: &[Vec<String>]) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(map_csv)?;
        for row in rows {
            writer.write_record(row).map_err(map_csv)?;
        }
        writer.flush().map_err(map_io)?;
        Ok(())
    }
}

impl Worksheet for CsvWorksheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_all_values(&self) -> Result<Vec<Vec<String>>> {
        self.read_rows()
    }

    fn update_cell(&self, row: usize, col: usize, value: &str) -> Result<()> {
        let (row_idx, col_idx) = to_zero_based(row, col)?;
        let mut rows = self.read_rows()?;
        if row_idx >= rows.len() {
            rows.resize(row_idx + 1, Vec::new());
        }
        let cells = &mut rows[row_idx];
        if col_idx >= cells.len() {
            cells.resize(col_idx + 1, String::new());
        }
        cells[col_idx] = value.to_string();
        self.write_rows(&rows)
    }

    fn clear(&self) -> Result<()> {
        self.write_rows(&[])
    }

    fn append_rows(&self, new_rows: &[Vec<String>]) -> Result<()> {
        let mut rows = self.read_rows()?;
        rows.extend_from_slice(new_rows);
        self.write_rows(&rows)
    }
}

fn to_zero_based(row: usize, col: usize) -> Result<(usize, usize)> {
    if row == 0 || col == 0 {
        return Err(Error::MalformedRow(format!("cell coordinates are 1-based, got ({row}, {col})")));
    }
    Ok((row - 1, col - 1))
}

fn map_io(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        Error::SheetPermission
    } else {
        Error::Io(err)
    }
}

fn map_csv(err: csv::Error) -> Error {
    if let csv::ErrorKind::Io(io_err) = err.kind() {
        if io_err.kind() == std::io::ErrorKind::PermissionDenied {
            return Error::SheetPermission;
        }
    }
    Error::Csv(err)
}

/// In-memory document for tests and dry runs.
#[derive(Clone)]
pub struct MemoryDocument {
    title: String,
    sheets: Arc<Mutex<HashMap<String, Vec<Vec<String>>>>>,
    order: Vec<String>,
}

impl MemoryDocument {
    #[must_use]
    pub fn new(title: &str, sheet_names: &[&str]) -> Self {
        let mut sheets = HashMap::new();
        for name in sheet_names {
            sheets.insert((*name).to_string(), Vec::new());
        }
        Self {
            title: title.to_string(),
            sheets: Arc::new(Mutex::new(sheets)),
            order: sheet_names.iter().map(ToString::to_string).collect(),
        }
    }
}

impl SpreadsheetDocument for MemoryDocument {
    type Sheet = MemorySheet;

    fn title(&self) -> &str {
        &self.title
    }

    fn worksheet(&self, name: &str) -> Result<MemorySheet> {
        if !self.sheets.lock().expect("sheet store poisoned").contains_key(name) {
            return Err(Error::WorksheetNotFound(name.to_string()));
        }
        Ok(MemorySheet { name: name.to_string(), sheets: Arc::clone(&self.sheets) })
    }

    fn registrations(&self) -> Result<MemorySheet> {
        let first = self
            .order
            .first()
            .ok_or_else(|| Error::WorksheetNotFound("<first>".to_string()))?;
        self.worksheet(first)
    }

    fn add_worksheet(&mut self, name: &str) -> Result<MemorySheet> {
        let mut sheets = self.sheets.lock().expect("sheet store poisoned");
        if !sheets.contains_key(name) {
            sheets.insert(name.to_string(), Vec::new());
            self.order.push(name.to_string());
        }
        drop(sheets);
        self.worksheet(name)
    }

    fn delete_worksheet(&mut self, name: &str) -> Result<()> {
        let removed = self.sheets.lock().expect("sheet store poisoned").remove(name);
        if removed.is_none() {
            return Err(Error::WorksheetNotFound(name.to_string()));
        }
        self.order.retain(|sheet| sheet != name);
        Ok(())
    }
}

/// Handle onto one sheet of a [`MemoryDocument`]. Clones share storage.
#[derive(Clone)]
pub struct MemorySheet {
    name: String,
    sheets: Arc<Mutex<HashMap<String, Vec<Vec<String>>>>>,
}

impl MemorySheet {
    fn with_rows<T>(&self, f: impl FnOnce(&mut Vec<Vec<String>>) -> T) -> T {
        let mut sheets = self.sheets.lock().expect("sheet store poisoned");
        f(sheets.get_mut(&self.name).expect("sheet exists for handle"))
    }
}

impl Worksheet for MemorySheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_all_values(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.with_rows(|rows| rows.clone()))
    }

    fn update_cell(&self, row: usize, col: usize, value: &str) -> Result<()> {
        let (row_idx, col_idx) = to_zero_based(row, col)?;
        self.with_rows(|rows| {
            if row_idx >= rows.len() {
                rows.resize(row_idx + 1, Vec::new());
            }
            let cells = &mut rows[row_idx];
            if col_idx >= cells.len() {
                cells.resize(col_idx + 1, String::new());
            }
            cells[col_idx] = value.to_string();
        });
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.with_rows(Vec::clear);
        Ok(())
    }

    fn append_rows(&self, new_rows: &[Vec<String>]) -> Result<()> {
        self.with_rows(|rows| rows.extend_from_slice(new_rows));
        Ok(())
    }
}
