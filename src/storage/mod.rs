//! Workbook store: an xlsx file holding one append-only sheet per record type.
//!
//! The file is read with `calamine` and rewritten whole with `rust_xlsxwriter`.
//! Every sheet found on disk is carried over on rewrite (values only), so
//! sheets this process does not manage survive an append.

use crate::models::{Cell, SheetRow};
use anyhow::{Context, Result};
use calamine::{Data, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::Format;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ── Sheet ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    /// Row 0 is the header.
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn with_header(name: &str, header: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            rows: vec![header.iter().map(|h| Cell::text(*h)).collect()],
        }
    }

    /// Data rows, header excluded, blank rows skipped.
    pub fn data_rows(&self) -> impl DoubleEndedIterator<Item = &Vec<Cell>> {
        self.rows
            .iter()
            .skip(1)
            .filter(|row| !row.iter().all(Cell::is_empty))
    }

    pub fn last_data_row(&self) -> Option<&Vec<Cell>> {
        self.data_rows().next_back()
    }
}

/// Exact-tuple key of a row; trailing blanks do not count.
pub fn row_key(cells: &[Cell]) -> Vec<String> {
    let mut key: Vec<String> = cells.iter().map(Cell::key).collect();
    while key.last().is_some_and(|k| k.is_empty()) {
        key.pop();
    }
    key
}

// ── Workbook ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Workbook {
    path: PathBuf,
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Read the workbook at `path`, or start an empty one if the file is absent.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("{:?} does not exist yet, starting an empty workbook", path);
            return Ok(Self {
                path: path.to_path_buf(),
                sheets: Vec::new(),
            });
        }

        let mut book: Xlsx<_> = open_workbook(path)
            .with_context(|| format!("Failed to open workbook {:?}", path))?;

        let mut sheets = Vec::new();
        for name in book.sheet_names() {
            let range = book
                .worksheet_range(&name)
                .with_context(|| format!("Failed to read sheet {} in {:?}", name, path))?;

            let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
            let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset as usize];
            for raw in range.rows() {
                let mut row = vec![Cell::Empty; col_offset as usize];
                row.extend(raw.iter().map(from_data));
                rows.push(row);
            }

            sheets.push(Sheet { name, rows });
        }

        Ok(Self {
            path: path.to_path_buf(),
            sheets,
        })
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Get a sheet, creating it with `header` when missing.
    pub fn sheet_or_create(&mut self, name: &str, header: &[&str]) -> &mut Sheet {
        let idx = match self.sheets.iter().position(|s| s.name == name) {
            Some(idx) => {
                let sheet = &mut self.sheets[idx];
                if sheet.rows.iter().all(|row| row.iter().all(Cell::is_empty)) {
                    info!("Writing header into empty sheet {} in {:?}", name, self.path);
                    *sheet = Sheet::with_header(name, header);
                }
                idx
            }
            None => {
                info!("Creating sheet {} in {:?}", name, self.path);
                self.sheets.push(Sheet::with_header(name, header));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[idx]
    }

    /// Write every sheet to a sibling temp file, then move it over the target.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }

        let mut book = rust_xlsxwriter::Workbook::new();
        let bold = Format::new().set_bold();

        for sheet in &self.sheets {
            let ws = book.add_worksheet();
            ws.set_name(&sheet.name)
                .with_context(|| format!("Invalid sheet name {}", sheet.name))?;

            for (r, row) in sheet.rows.iter().enumerate() {
                let r = u32::try_from(r).context("Sheet row index overflow")?;
                for (c, cell) in row.iter().enumerate() {
                    let c = u16::try_from(c).context("Sheet column index overflow")?;
                    match cell {
                        Cell::Text(s) if r == 0 => {
                            ws.write_string_with_format(r, c, s, &bold)?;
                        }
                        Cell::Text(s) => {
                            ws.write_string(r, c, s)?;
                        }
                        Cell::Number(n) => {
                            ws.write_number(r, c, *n)?;
                        }
                        Cell::Empty => {}
                    }
                }
            }
        }

        let tmp = self.path.with_extension("xlsx.tmp");
        book.save(&tmp)
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        Ok(())
    }
}

fn from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        other => Cell::Text(other.to_string()),
    }
}

// ── Store updater ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended(usize),
    UpToDate,
}

/// Append the rows of `rows` not already present in `sheet`.
/// The file is written only when at least one row was added.
pub fn append_rows<R: SheetRow>(path: &Path, sheet: &str, rows: &[R]) -> Result<AppendOutcome> {
    let mut book = Workbook::open(path)?;
    let target = book.sheet_or_create(sheet, R::HEADER);

    let mut existing: HashSet<Vec<String>> =
        target.data_rows().map(|row| row_key(row)).collect();

    let mut appended = 0usize;
    for row in rows {
        let cells = row.to_cells();
        if existing.insert(row_key(&cells)) {
            target.rows.push(cells);
            appended += 1;
        }
    }

    if appended == 0 {
        info!("{:?} [{}] is already up to date", path, sheet);
        return Ok(AppendOutcome::UpToDate);
    }

    book.save()?;
    info!("Appended {} rows to {:?} [{}]", appended, path, sheet);
    Ok(AppendOutcome::Appended(appended))
}

// ── Report reader ─────────────────────────────────────────────────────────────

/// Newest value per key: rows are scanned bottom-up and a row matches a key
/// when its `label_col` cell contains it. Keys never seen are left out.
pub fn latest_values(
    path: &Path,
    sheet: &str,
    keys: &[String],
    label_col: usize,
    value_col: usize,
) -> Result<HashMap<String, Cell>> {
    let mut found = HashMap::new();
    if !path.exists() || keys.is_empty() {
        return Ok(found);
    }

    let book = Workbook::open(path)?;
    let Some(sheet) = book.sheet(sheet) else {
        return Ok(found);
    };

    for row in sheet.data_rows().rev() {
        let Some(label) = row.get(label_col) else { continue };
        let label = label.key();

        for key in keys {
            if found.contains_key(key) || !label.contains(key.as_str()) {
                continue;
            }
            let value = row.get(value_col).cloned().unwrap_or(Cell::Empty);
            found.insert(key.clone(), value);
        }

        if found.len() == keys.len() {
            break;
        }
    }

    Ok(found)
}

/// Column `col` of the last data row in `sheet`.
pub fn last_cell(path: &Path, sheet: &str, col: usize) -> Result<Option<Cell>> {
    if !path.exists() {
        return Ok(None);
    }
    let book = Workbook::open(path)?;
    Ok(book
        .sheet(sheet)
        .and_then(Sheet::last_data_row)
        .and_then(|row| row.get(col))
        .filter(|cell| !cell.is_empty())
        .cloned())
}
