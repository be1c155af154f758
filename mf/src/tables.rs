//! Delimited table I/O
//!
//! Reads the metadata and mapping-rule tables and writes the enriched
//! mapping table. Header names select columns; extra columns are ignored.
//! Only headers and key cells are trimmed; text cells are kept verbatim.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, ReaderBuilder, Trim, WriterBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{EnrichedMapping, MappingRule, MetadataRecord};

/// Output column order
pub const OUTPUT_COLUMNS: [&str; 5] = ["source_table", "source_field", "target_field", "business_rule", "sql_logic"];

/// Extra column written when failure reasons are requested
pub const FAILURE_COLUMN: &str = "synthesis_error";

/// Fatal table errors
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Failed to load {}: {message}", .path.display())]
    InputLoad { path: PathBuf, message: String },

    #[error("Failed to write {}: {message}", .path.display())]
    OutputWrite { path: PathBuf, message: String },
}

impl TableError {
    fn input(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::InputLoad {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    fn output(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::OutputWrite {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Load the metadata table
pub fn load_metadata(path: &Path, delimiter: u8) -> Result<Vec<MetadataRecord>, TableError> {
    debug!(?path, "load_metadata: called");
    let records: Vec<MetadataRecord> = read_records(path, delimiter)?;
    info!(path = %path.display(), rows = records.len(), "loaded metadata table");
    Ok(records)
}

/// Load the mapping rule table
pub fn load_rules(path: &Path, delimiter: u8) -> Result<Vec<MappingRule>, TableError> {
    debug!(?path, "load_rules: called");
    let rules: Vec<MappingRule> = read_records(path, delimiter)?;
    info!(path = %path.display(), rows = rules.len(), "loaded mapping rules table");
    Ok(rules)
}

fn read_records<T: DeserializeOwned>(path: &Path, delimiter: u8) -> Result<Vec<T>, TableError> {
    let file = File::open(path).map_err(|e| TableError::input(path, e))?;
    parse_records(BufReader::new(file), delimiter).map_err(|e| TableError::input(path, e))
}

fn parse_records<T: DeserializeOwned, R: Read>(reader: R, delimiter: u8) -> Result<Vec<T>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(Trim::Headers)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader);

    reader.deserialize().collect()
}

/// Write the enriched mapping table, creating parent directories
pub fn write_mappings(
    path: &Path,
    delimiter: u8,
    rows: &[EnrichedMapping],
    include_failure_reason: bool,
) -> Result<(), TableError> {
    debug!(?path, rows = rows.len(), include_failure_reason, "write_mappings: called");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| TableError::output(path, e))?;
    }

    let file = File::create(path).map_err(|e| TableError::output(path, e))?;
    write_rows(BufWriter::new(file), delimiter, rows, include_failure_reason).map_err(|e| TableError::output(path, e))?;

    info!(path = %path.display(), rows = rows.len(), "wrote mapping table");
    Ok(())
}

fn write_rows<W: Write>(
    writer: W,
    delimiter: u8,
    rows: &[EnrichedMapping],
    include_failure_reason: bool,
) -> Result<(), csv::Error> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(writer);

    let mut header: Vec<&str> = OUTPUT_COLUMNS.to_vec();
    if include_failure_reason {
        header.push(FAILURE_COLUMN);
    }
    writer.write_record(&header)?;

    for row in rows {
        let c = &row.candidate;
        let mut record = vec![
            c.source_table.clone(),
            c.source_field.clone(),
            c.target_field.clone(),
            c.business_rule.clone(),
            row.sql_logic().unwrap_or_default().to_string(),
        ];
        if include_failure_reason {
            record.push(row.failure().map(|f| f.to_string()).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Render the first `limit` rows as a Markdown table
pub fn preview_markdown(rows: &[EnrichedMapping], limit: usize) -> String {
    let escape = |s: &str| s.replace('|', "\\|").replace('\n', " ");
    let mut out = String::new();

    out.push_str(&format!("| {} |\n", OUTPUT_COLUMNS.join(" | ")));
    out.push_str(&format!("|{}\n", "---|".repeat(OUTPUT_COLUMNS.len())));

    for row in rows.iter().take(limit) {
        let c = &row.candidate;
        let cells = [
            escape(&c.source_table),
            escape(&c.source_field),
            escape(&c.target_field),
            escape(&c.business_rule),
            escape(row.sql_logic().unwrap_or_default()),
        ];
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}
