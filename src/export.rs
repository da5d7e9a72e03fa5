use std::fs;
use std::path::PathBuf;

use csv::{Terminator, Writer, WriterBuilder};
use tracing::info;

use crate::domain::LexiconError;
use crate::parser::Row;

/// Which rows an export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    View,
    Dataset,
}

impl ExportScope {
    pub fn toggle(self) -> Self {
        match self {
            ExportScope::View => ExportScope::Dataset,
            ExportScope::Dataset => ExportScope::View,
        }
    }
}

fn csv_writer() -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String, LexiconError> {
    let bytes = writer.into_inner().map_err(|e| LexiconError::Io(e.into_error()))?;
    let text = String::from_utf8(bytes).map_err(|e| LexiconError::Config(e.to_string()))?;
    Ok(text.strip_suffix('\n').unwrap_or(&text).to_string())
}

fn record<'a>(row: &'a Row, columns: &'a [String]) -> impl Iterator<Item = &'a str> {
    columns.iter().map(|c| row.get(c).unwrap_or(""))
}

/// One row as a CSV line, used for clipboard copies.
pub fn format_row(row: &Row, columns: &[String]) -> Result<String, LexiconError> {
    let mut writer = csv_writer();
    writer.write_record(record(row, columns))?;
    finish(writer)
}

/// CSV text of `rows` restricted to `columns`, in that order. Lines end in
/// `\n` except the last one.
pub fn export(rows: &[&Row], columns: &[String]) -> Result<String, LexiconError> {
    let mut writer = csv_writer();
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(record(row, columns))?;
    }
    finish(writer)
}

pub fn export_file_name(stem: &str) -> String {
    format!("{stem}_export.csv")
}

pub fn expand_path(path: &str) -> Result<PathBuf, LexiconError> {
    let expanded = shellexpand::full(path)
        .map_err(|e| LexiconError::Config(format!("cannot expand path {path}: {e}")))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

pub fn write_export(path: &str, text: &str) -> Result<PathBuf, LexiconError> {
    let path = expand_path(path)?;
    fs::write(&path, text)?;
    info!("Exported {} bytes to {}", text.len(), path.display());
    Ok(path)
}
