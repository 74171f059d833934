//! Error types for the upload creator.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`TableError`] - Spreadsheet reading/writing and table shape errors
//! - [`ConfigError`] - Malformed job rows, field specs and relation rules
//! - [`CreatorError`] - Top-level run errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

use crate::parser::ParseError;

// =============================================================================
// Table Errors
// =============================================================================

/// Errors while reading, writing or reshaping a table.
#[derive(Debug, Error)]
pub enum TableError {
    /// The file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to read or write a file.
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed delimited text.
    #[error("Parse error in '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// CSV writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is not in the table.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A row or column does not match the table's shape.
    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in declarative configuration (job tables, field specs, rules).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required column is missing from a configuration table.
    #[error("Configuration table is missing column '{0}'")]
    MissingColumn(String),

    /// A job row is missing a required value.
    #[error("Row {row}: missing value for '{field}'")]
    MissingValue { row: usize, field: String },

    /// A compound field spec could not be parsed.
    #[error("Invalid field spec '{spec}': {message}")]
    InvalidFieldSpec { spec: String, message: String },

    /// A row filter could not be parsed.
    #[error("Invalid row filter '{0}': expected 'column::value1|value2'")]
    InvalidRowFilter(String),

    /// A boolean cell could not be interpreted.
    #[error("Invalid boolean '{0}'")]
    InvalidBool(String),

    /// A relation rule position is neither an integer, empty, nor 'Constant'.
    #[error("Invalid position '{value}' for impacted column '{column}'")]
    InvalidPosition { column: String, value: String },

    /// The match-table destination does not name three output files.
    #[error("Invalid match table outputs '{0}': expected 'creator|filter[::idx,...]|relation'")]
    InvalidOutputs(String),
}

// =============================================================================
// Creator Errors (top-level)
// =============================================================================

/// Top-level errors returned by the job runner and components.
#[derive(Debug, Error)]
pub enum CreatorError {
    /// Table error.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem error outside table IO (report directories, creative listing).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for configuration parsing.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for component and runner operations.
pub type CreatorResult<T> = Result<T, CreatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // TableError -> CreatorError
        let table_err = TableError::MissingColumn("ad_name".into());
        let err: CreatorError = table_err.into();
        assert!(err.to_string().contains("ad_name"));

        // ConfigError -> CreatorError
        let config_err = ConfigError::InvalidRowFilter("campaign".into());
        let err: CreatorError = config_err.into();
        assert!(err.to_string().contains("campaign"));
    }

    #[test]
    fn test_position_error_format() {
        let err = ConfigError::InvalidPosition {
            column: "adset_key".into(),
            value: "first".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("adset_key"));
        assert!(msg.contains("first"));
    }

    #[test]
    fn test_not_found_shows_path() {
        let err = TableError::NotFound(PathBuf::from("config/missing.csv"));
        assert!(err.to_string().contains("config/missing.csv"));
    }
}
