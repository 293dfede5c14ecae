use regfin_core::{AggregateRow, ExpenseRecord, Identifier, IdentifierKind, Money, Period};
use rust_decimal::Decimal;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

pub const CONSOLIDATED_CSV: &str = "consolidated_expenses.csv";
pub const CONSOLIDATED_ZIP: &str = "consolidated_expenses.zip";
pub const AGGREGATES_CSV: &str = "expense_aggregates.csv";

const CONSOLIDATED_HEADER: [&str; 5] = ["identifier", "identifier_kind", "year", "quarter", "value"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Bad consolidated row {line}: {reason}")]
    BadRow { line: usize, reason: String },
    #[error("Archive has no {0}")]
    MissingEntry(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedExport {
    pub csv_path: PathBuf,
    pub zip_path: PathBuf,
}

fn consolidated_csv(records: &[ExpenseRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CONSOLIDATED_HEADER)?;
    for record in records {
        writer.write_record([
            record.identifier.value().to_string(),
            record.identifier.kind().to_string(),
            record.period.year.to_string(),
            record.period.quarter.number().to_string(),
            record.value.to_string(),
        ])?;
    }
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// Writes the consolidated records as CSV into `dir` and packs a copy into
/// a ZIP next to it.
pub fn write_consolidated(
    dir: &Path,
    records: &[ExpenseRecord],
) -> Result<ConsolidatedExport, ExportError> {
    std::fs::create_dir_all(dir)?;
    let bytes = consolidated_csv(records)?;

    let csv_path = dir.join(CONSOLIDATED_CSV);
    std::fs::write(&csv_path, &bytes)?;

    let zip_path = dir.join(CONSOLIDATED_ZIP);
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&zip_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(CONSOLIDATED_CSV, options)?;
    zip.write_all(&bytes)?;
    zip.finish()?;

    Ok(ConsolidatedExport { csv_path, zip_path })
}

/// Parses a consolidated CSV produced by [`write_consolidated`].
pub fn parse_consolidated(bytes: &[u8]) -> Result<Vec<ExpenseRecord>, ExportError> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut records = Vec::new();

    for (idx, row) in reader.records().enumerate() {
        let row = row?;
        let line = idx + 2;
        let bad = |reason: String| ExportError::BadRow { line, reason };
        let field = |i: usize| row.get(i).ok_or_else(|| bad(format!("missing field {i}")));

        let kind = IdentifierKind::from_str(field(1)?).map_err(bad)?;
        let year: u16 = field(2)?.parse().map_err(|e| bad(format!("year: {e}")))?;
        let quarter: u8 = field(3)?.parse().map_err(|e| bad(format!("quarter: {e}")))?;
        let period = Period::from_parts(year, quarter).map_err(|e| bad(e.to_string()))?;
        let value = Decimal::from_str(field(4)?).map_err(|e| bad(format!("value: {e}")))?;

        records.push(ExpenseRecord::new(
            Identifier::new(kind, field(0)?),
            Money::from_decimal(value),
            period,
        ));
    }

    Ok(records)
}

/// Reads consolidated records back from an export directory, preferring the
/// plain CSV and falling back to the ZIP.
pub fn read_consolidated(dir: &Path) -> Result<Vec<ExpenseRecord>, ExportError> {
    let csv_path = dir.join(CONSOLIDATED_CSV);
    if csv_path.exists() {
        return parse_consolidated(&std::fs::read(csv_path)?);
    }

    let bytes = std::fs::read(dir.join(CONSOLIDATED_ZIP))?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut file = archive
        .by_name(CONSOLIDATED_CSV)
        .map_err(|_| ExportError::MissingEntry(CONSOLIDATED_CSV))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    parse_consolidated(&buf)
}

/// Backup copy of the aggregate table.
pub fn write_aggregates(dir: &Path, rows: &[AggregateRow]) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(AGGREGATES_CSV);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["legal_name", "region", "total", "mean", "stddev"])?;
    for row in rows {
        writer.write_record([
            row.legal_name.clone(),
            row.region.clone().unwrap_or_default(),
            row.total.to_string(),
            row.mean.to_string(),
            row.stddev.map(|m| m.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(path)
}
