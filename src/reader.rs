use std::path::Path;

use calamine::{Data, DataType, Reader};
use serde::{Deserialize, Serialize};

use crate::error::{FlowbookError, Result};

pub const FILE_MAX_ROWS: usize = 10_000;
pub const CLIPBOARD_MAX_ROWS: usize = 2_000;
pub const MAX_COLUMNS: usize = 50;
pub const MAX_FILE_MB: u64 = 20;
pub const MAX_PASTE_CHARS: usize = 200_000;

pub const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv", "txt", "xlsm"];

/// A single normalized cell. Strings are trimmed on the way in, so a
/// `Text` cell is never blank; blank cells become `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String rendition used for keyword scans and error messages.
    pub fn display(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRow {
    /// 0-based position in the grid after load.
    pub index: usize,
    /// 1-based source line/row number.
    pub original_index: usize,
    /// Trailing Nulls trimmed; interior Nulls kept.
    pub values: Vec<Cell>,
}

#[derive(Debug, Clone)]
pub struct Grid {
    pub rows: Vec<GridRow>,
    pub total_rows: usize,
    pub total_columns: usize,
}

// ---------------------------------------------------------------------------
// File reader
// ---------------------------------------------------------------------------

/// Read the first sheet of an uploaded spreadsheet (or a csv/txt file)
/// into a normalized grid. A workbook that cannot be opened is a fatal
/// error, not a per-row one.
pub fn read_file(path: &Path) -> Result<Grid> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(FlowbookError::UnsupportedFileType(extension));
    }

    let size = std::fs::metadata(path)?.len();
    if size > MAX_FILE_MB * 1024 * 1024 {
        return Err(FlowbookError::FileTooLarge(MAX_FILE_MB));
    }

    match extension.as_str() {
        "csv" | "txt" => read_delimited_file(path, b','),
        _ => read_workbook(path),
    }
}

fn read_workbook(path: &Path) -> Result<Grid> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| FlowbookError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FlowbookError::Spreadsheet("workbook has no sheets".to_string()))?
        .map_err(|e| FlowbookError::Spreadsheet(e.to_string()))?;

    let mut rows = Vec::new();
    let mut max_columns = 0;
    let mut row_count = 0;

    for row in range.rows() {
        if row_count >= FILE_MAX_ROWS {
            break;
        }
        row_count += 1;

        let values: Vec<Cell> = row
            .iter()
            .take(MAX_COLUMNS)
            .map(normalize_workbook_cell)
            .collect();
        let values = trim_trailing_nulls(values);

        max_columns = max_columns.max(values.len());
        rows.push(GridRow {
            index: rows.len(),
            original_index: row_count,
            values,
        });
    }

    Ok(Grid {
        rows,
        total_rows: row_count,
        total_columns: max_columns,
    })
}

fn read_delimited_file(path: &Path, delimiter: u8) -> Result<Grid> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(std::io::BufReader::new(file));

    let mut rows = Vec::new();
    let mut max_columns = 0;
    let mut row_count = 0;

    for result in rdr.records() {
        if row_count >= FILE_MAX_ROWS {
            break;
        }
        let record = result?;
        row_count += 1;

        let values: Vec<Cell> = record
            .iter()
            .take(MAX_COLUMNS)
            .map(normalize_text_cell)
            .collect();
        let values = trim_trailing_nulls(values);

        max_columns = max_columns.max(values.len());
        rows.push(GridRow {
            index: rows.len(),
            original_index: row_count,
            values,
        });
    }

    Ok(Grid {
        rows,
        total_rows: row_count,
        total_columns: max_columns,
    })
}

// ---------------------------------------------------------------------------
// Clipboard reader
// ---------------------------------------------------------------------------

/// Parse pasted clipboard text (tab-separated, any newline convention)
/// into the same grid contract as the file reader. An empty paste yields
/// `total_rows == 0`; the caller decides how to surface that.
pub fn read_clipboard(content: &str) -> Result<Grid> {
    if content.chars().count() > MAX_PASTE_CHARS {
        return Err(FlowbookError::PasteTooLarge(MAX_PASTE_CHARS));
    }

    let normalized = content.trim();
    if normalized.is_empty() {
        return Ok(Grid {
            rows: Vec::new(),
            total_rows: 0,
            total_columns: 0,
        });
    }

    let mut rows = Vec::new();
    let mut max_columns = 0;
    let mut row_count = 0;

    for (line_number, line) in split_lines(normalized).iter().enumerate() {
        if row_count >= CLIPBOARD_MAX_ROWS {
            break;
        }

        let values: Vec<Cell> = split_tab_line(line)
            .iter()
            .take(MAX_COLUMNS)
            .map(|s| normalize_text_cell(s))
            .collect();
        let values = trim_trailing_nulls(values);

        max_columns = max_columns.max(values.len());
        rows.push(GridRow {
            index: row_count,
            original_index: line_number + 1,
            values,
        });
        row_count += 1;
    }

    Ok(Grid {
        rows,
        total_rows: row_count,
        total_columns: max_columns,
    })
}

fn split_lines(content: &str) -> Vec<&str> {
    content
        .split("\r\n")
        .flat_map(|chunk| chunk.split(['\n', '\r']))
        .collect()
}

/// Split one pasted line on tabs, honoring quoted cells the way a
/// spreadsheet copies them.
fn split_tab_line(line: &str) -> Vec<String> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(b'\t')
        .from_reader(line.as_bytes());

    match rdr.records().next() {
        Some(Ok(record)) => record.iter().map(|s| s.to_string()).collect(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Cell normalization
// ---------------------------------------------------------------------------

fn normalize_text_cell(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Cell::Null
    } else {
        Cell::Text(trimmed.to_string())
    }
}

fn normalize_workbook_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Null,
        Data::String(s) => normalize_text_cell(s),
        Data::Float(f) => normalize_number(*f),
        Data::Int(i) => normalize_number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        other => match other.as_string() {
            Some(s) => normalize_text_cell(&s),
            None => Cell::Null,
        },
    }
}

fn normalize_number(value: f64) -> Cell {
    if looks_like_excel_date(value) {
        if let Some(date) = crate::dates::excel_serial_to_date(value) {
            return Cell::Text(date.format("%Y-%m-%d").to_string());
        }
    }
    Cell::Number((value * 10_000.0).round() / 10_000.0)
}

/// Excel date serials for plausible statement dates sit well inside
/// this window (25569 is 1970-01-01).
pub fn looks_like_excel_date(value: f64) -> bool {
    value > 10_000.0 && value < 500_000.0
}

fn trim_trailing_nulls(mut values: Vec<Cell>) -> Vec<Cell> {
    while values.last() == Some(&Cell::Null) {
        values.pop();
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipboard_basic_grid() {
        let grid = read_clipboard("Date\tDescription\tAmount\n01/02/2024\tSalary\t10000").unwrap();
        assert_eq!(grid.total_rows, 2);
        assert_eq!(grid.total_columns, 3);
        assert_eq!(grid.rows[0].index, 0);
        assert_eq!(grid.rows[0].original_index, 1);
        assert_eq!(grid.rows[1].values[1], Cell::Text("Salary".to_string()));
    }

    #[test]
    fn test_clipboard_trims_trailing_empties() {
        let grid = read_clipboard("a\tb\t\t\nc\t\t\t").unwrap();
        assert_eq!(grid.rows[0].values.len(), 2);
        assert_eq!(grid.rows[1].values.len(), 1);
        assert_eq!(grid.total_columns, 2);
    }

    #[test]
    fn test_clipboard_keeps_interior_nulls() {
        let grid = read_clipboard("a\t\tc").unwrap();
        assert_eq!(grid.rows[0].values.len(), 3);
        assert_eq!(grid.rows[0].values[1], Cell::Null);
    }

    #[test]
    fn test_clipboard_quoted_cells() {
        let grid = read_clipboard("\"multi\tword\"\tplain").unwrap();
        assert_eq!(grid.rows[0].values.len(), 2);
        assert_eq!(grid.rows[0].values[0], Cell::Text("multi\tword".to_string()));
    }

    #[test]
    fn test_clipboard_handles_all_newline_conventions() {
        let grid = read_clipboard("a\r\nb\rc\nd").unwrap();
        assert_eq!(grid.total_rows, 4);
        assert_eq!(grid.rows[3].original_index, 4);
    }

    #[test]
    fn test_clipboard_empty_paste() {
        let grid = read_clipboard("   \n  ").unwrap();
        assert_eq!(grid.total_rows, 0);
        assert_eq!(grid.total_columns, 0);
    }

    #[test]
    fn test_clipboard_row_cap() {
        let content = (0..3000).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let grid = read_clipboard(&content).unwrap();
        assert_eq!(grid.total_rows, CLIPBOARD_MAX_ROWS);
    }

    #[test]
    fn test_clipboard_size_cap() {
        let content = "x".repeat(MAX_PASTE_CHARS + 1);
        assert!(matches!(
            read_clipboard(&content),
            Err(FlowbookError::PasteTooLarge(_))
        ));
    }

    #[test]
    fn test_read_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.csv");
        std::fs::write(&path, "Date,Description,Amount\n2024-02-01,Salary,10000\n").unwrap();
        let grid = read_file(&path).unwrap();
        assert_eq!(grid.total_rows, 2);
        assert_eq!(grid.total_columns, 3);
        assert_eq!(grid.rows[1].values[2], Cell::Text("10000".to_string()));
    }

    #[test]
    fn test_read_file_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.pdf");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(
            read_file(&path),
            Err(FlowbookError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_read_file_rejects_corrupt_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statement.xlsx");
        std::fs::write(&path, "this is not a workbook").unwrap();
        assert!(matches!(
            read_file(&path),
            Err(FlowbookError::Spreadsheet(_))
        ));
    }

    #[test]
    fn test_normalize_number_excel_serial() {
        assert_eq!(
            normalize_number(45323.0),
            Cell::Text("2024-02-01".to_string())
        );
        assert_eq!(normalize_number(1234.56789), Cell::Number(1234.5679));
        assert_eq!(normalize_number(500.0), Cell::Number(500.0));
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Number(100.0).display(), "100");
        assert_eq!(Cell::Number(100.5).display(), "100.5");
        assert_eq!(Cell::Text("hi".to_string()).display(), "hi");
        assert_eq!(Cell::Null.display(), "");
    }
}
