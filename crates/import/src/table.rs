use calamine::{Data, Reader, Xlsx};
use std::borrow::Cow;
use std::io::{Cursor, Read};
use thiserror::Error;

use crate::util::decode_text;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] calamine::XlsxError),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Table has no header row")]
    NoHeader,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    fn from_text(s: &str) -> Self {
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    /// Text rendering of the cell. Integral numbers print without a
    /// fractional part so codes stored as numbers keep their digits.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Cell::Empty => Cow::Borrowed(""),
            Cell::Text(s) => Cow::Borrowed(s),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Cow::Owned(format!("{n:.0}")),
            Cell::Number(n) => Cow::Owned(n.to_string()),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::from_text(s),
            other => Cell::from_text(&other.to_string()),
        }
    }
}

/// A table as found in a source file: headers in file order and untyped cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        RawTable { headers, rows }
    }

    /// Missing trailing cells read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        const EMPTY: &Cell = &Cell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(EMPTY)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads a semicolon-delimited file. Lines that fail to parse or carry more
/// fields than the header are skipped.
pub fn read_csv(bytes: &[u8]) -> Result<RawTable, TableError> {
    let text = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(TableError::NoHeader);
    }

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("Skipping malformed line {}: {e}", line + 2);
                continue;
            }
        };
        if record.len() > headers.len() {
            tracing::debug!("Skipping line {} with {} fields", line + 2, record.len());
            continue;
        }
        rows.push(record.iter().map(Cell::from_text).collect());
    }

    Ok(RawTable { headers, rows })
}

/// Reads the first worksheet of an XLSX workbook; its first row is the header.
pub fn read_xlsx(bytes: &[u8]) -> Result<RawTable, TableError> {
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook.worksheet_range_at(0).ok_or(TableError::NoHeader)??;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(TableError::NoHeader)?
        .iter()
        .map(|c| c.to_string())
        .collect();

    let rows = rows.map(|r| r.iter().map(Cell::from).collect()).collect();
    Ok(RawTable { headers, rows })
}

/// Picks a reader by file extension: `.xlsx` as a workbook, anything else
/// as delimited text.
pub fn read_table(name: &str, bytes: &[u8]) -> Result<RawTable, TableError> {
    if name.to_lowercase().ends_with(".xlsx") {
        read_xlsx(bytes)
    } else {
        read_csv(bytes)
    }
}

#[derive(Debug)]
pub struct ArchiveEntry {
    pub name: String,
    pub table: Result<RawTable, TableError>,
}

/// Reads every file inside a ZIP archive. A broken archive is an error; a
/// broken entry is reported on that entry alone.
pub fn read_archive(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, TableError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::new();

    for i in 0..archive.len() {
        let mut file = match archive.by_index(i) {
            Ok(file) => file,
            Err(e) => {
                entries.push(ArchiveEntry {
                    name: format!("#{i}"),
                    table: Err(e.into()),
                });
                continue;
            }
        };
        if !file.is_file() {
            continue;
        }

        let name = file.name().to_string();
        let mut buf = Vec::new();
        let table = match file.read_to_end(&mut buf) {
            Ok(_) => read_table(&name, &buf),
            Err(e) => Err(e.into()),
        };
        entries.push(ArchiveEntry { name, table });
    }

    Ok(entries)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    pub(crate) fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            for (name, content) in files {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(content).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn reads_semicolon_csv() {
        let data = b"DATA;REG_ANS;CD_CONTA_CONTABIL;VL_SALDO_FINAL\n2024-01-01;123456;41111;\"1.234,56\"\n";
        let table = read_csv(data).unwrap();
        assert_eq!(table.headers, vec!["DATA", "REG_ANS", "CD_CONTA_CONTABIL", "VL_SALDO_FINAL"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 3), &Cell::Text("1.234,56".into()));
    }

    #[test]
    fn latin1_csv_is_decoded() {
        let data = b"REGISTRO;CNPJ;RAZ\xC3O_SOCIAL\n1;2;S\xC3O PAULO\n";
        let table = read_csv(data).unwrap();
        assert_eq!(table.headers[2], "RAZÃO_SOCIAL");
        assert_eq!(table.cell(0, 2).text(), "SÃO PAULO");
    }

    #[test]
    fn overlong_lines_are_skipped_and_short_lines_padded() {
        let data = b"A;B\n1;2;3\n4\n5;6\n";
        let table = read_csv(data).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0).text(), "4");
        assert_eq!(table.cell(0, 1), &Cell::Empty);
        assert_eq!(table.cell(1, 1).text(), "6");
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(read_csv(b""), Err(TableError::NoHeader)));
    }

    #[test]
    fn numeric_cells_render_without_fraction() {
        assert_eq!(Cell::Number(41111.0).text(), "41111");
        assert_eq!(Cell::Number(12.5).text(), "12.5");
    }

    #[test]
    fn archive_entries_are_read_individually() {
        let bytes = zip_bytes(&[
            ("a.csv", b"CNPJ;VL_SALDO_FINAL\n1;2\n"),
            ("broken.xlsx", b"not a workbook"),
        ]);
        let entries = read_archive(&bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.csv");
        assert!(entries[0].table.is_ok());
        assert!(entries[1].table.is_err());
    }

    #[test]
    fn garbage_archive_is_an_error() {
        assert!(matches!(read_archive(b"nope"), Err(TableError::Zip(_))));
    }
}
