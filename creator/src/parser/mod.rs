//! Delimited-text reader and writer with encoding and delimiter auto-detection.
//!
//! Turns spreadsheet exports into [`Table`]s. No job-specific logic here.

use std::io::Write;

use crate::table::{Cell, Table};

/// Parsing error with line context
#[derive(Debug, Clone)]
pub struct ParseError {
    pub line: u64,
    pub column: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.column {
            Some(col) => write!(f, "Line {}, column '{}': {}", self.line, col, self.message),
            None => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(line: u64, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

/// How a file should be turned into a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// Number of records to skip before the header record.
    pub header_row: usize,
    /// Raw values that become absent cells.
    pub na_values: Vec<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            header_row: 0,
            na_values: vec![String::new()],
        }
    }
}

impl ReadOptions {
    /// Options with a header-row offset and the default NA tokens.
    pub fn with_header_row(header_row: usize) -> Self {
        Self {
            header_row,
            ..Self::default()
        }
    }

    fn to_cell(&self, raw: &str) -> Cell {
        if self.na_values.iter().any(|na| na == raw) {
            None
        } else {
            Some(raw.to_string())
        }
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed table
    pub table: Table,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    match decoded.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the header line, found
/// after skipping `header_row` lines.
///
/// The pipe is never considered: it separates list items inside cells.
pub fn detect_delimiter(content: &str, header_row: usize) -> char {
    let header_line = content.lines().nth(header_row).unwrap_or("");

    let separators = [',', ';', '\t'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = header_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text with an explicit delimiter.
///
/// # Example
/// ```
/// use creator::parser::{parse_delimited, ReadOptions};
///
/// let table = parse_delimited("ad_name,title\nA_1,Hello\nA_2,", ',', &ReadOptions::default()).unwrap();
///
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.value(0, "title"), Some("Hello"));
/// assert_eq!(table.value(1, "title"), None);
/// ```
pub fn parse_delimited(content: &str, delimiter: char, options: &ReadOptions) -> Result<Table, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    for skipped in 0..options.header_row {
        match records.next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(csv_parse_error(&e, skipped as u64 + 1)),
            None => return Err(ParseError::new(skipped as u64 + 1, "Header row is past the end of the file")),
        }
    }

    let header = match records.next() {
        Some(Ok(record)) => record,
        Some(Err(e)) => return Err(csv_parse_error(&e, options.header_row as u64 + 1)),
        None => return Err(ParseError::new(options.header_row as u64 + 1, "Empty file")),
    };

    let columns: Vec<String> = header.iter().map(str::to_string).collect();
    if columns.iter().all(|c| c.trim().is_empty()) {
        return Err(ParseError::new(options.header_row as u64 + 1, "No headers found"));
    }

    let mut table = Table::new(columns);
    let width = table.width();

    for record in records {
        let record = record.map_err(|e| csv_parse_error(&e, 0))?;
        let row: Vec<Cell> = (0..width)
            .map(|i| options.to_cell(record.get(i).unwrap_or("")))
            .collect();
        table
            .push_row(row)
            .map_err(|e| ParseError::new(record.position().map_or(0, |p| p.line()), e.to_string()))?;
    }

    Ok(table)
}

fn csv_parse_error(error: &csv::Error, fallback_line: u64) -> ParseError {
    let line = error.position().map_or(fallback_line, |p| p.line());
    ParseError::new(line, error.to_string())
}

/// Parse bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], options: &ReadOptions) -> Result<ParseResult, ParseError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content, options.header_row);
    let table = parse_delimited(&content, delimiter, options)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
    })
}

/// Write a table as comma-separated UTF-8 with a header record.
///
/// Absent cells are written as empty fields.
pub fn write_delimited<W: Write>(table: &Table, writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }

    writer.flush()?;
    Ok(())
}
