//! # Creator - spreadsheet-driven upload file generation
//!
//! Creator builds and mutates ad-platform upload spreadsheets from a table of
//! declarative jobs: composite names are generated, templates duplicated,
//! columns derived from other columns through relation rules, and wide match
//! tables turned into relation files.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────────┐     ┌─────────────┐
//! │  Job table  │────▶│  JobRunner  │────▶│    Components    │────▶│ Upload CSVs │
//! │   (CSV)     │     │ (one by one)│     │ relate/duplicate │     │ + reports   │
//! └─────────────┘     └─────────────┘     │ create/match/plan│     └─────────────┘
//!                                         └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use creator::{CsvStore, JobConfig, JobRunner, Paths};
//!
//! let paths = Paths::from_env();
//! let store = CsvStore::new();
//! let config = JobConfig::load(&store, &paths, "create/creator_config.csv".as_ref())?;
//! let report = JobRunner::new(&store, &paths).run_all(&config)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Jobs, field specs and relation rules
//! - [`table`] - In-memory labeled table
//! - [`parser`] - Delimited text with encoding and delimiter detection
//! - [`store`] - Table persistence
//! - [`config`] - Filesystem layout
//! - [`logs`] - Operator-facing progress logs
//! - [`transform`] - The job components
//! - [`runner`] - Job loading and execution

// Core modules
pub mod error;
pub mod models;
pub mod table;

// Input / output
pub mod config;
pub mod parser;
pub mod store;

pub mod logs;

// Components
pub mod runner;
pub mod transform;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ConfigError, ConfigResult, CreatorError, CreatorResult, TableError, TableResult};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{FieldSpec, Job, JobKind, MatchOutputs, PositionSpec, RelationGroup, RowFilter, UndefinedValueReport};

// =============================================================================
// Re-exports - Tables and storage
// =============================================================================

pub use config::Paths;
pub use parser::{ParseError, ReadOptions};
pub use store::{CsvStore, TabularStore};
pub use table::{Cell, Table};

// =============================================================================
// Re-exports - Components
// =============================================================================

pub use transform::{
    ColumnCounts, CombinationGenerator, Context, DuplicationExpander, MatchTableTranspiler, MediaPlan,
    PlanNameExtractor, RelationResolver,
};

// =============================================================================
// Re-exports - Runner
// =============================================================================

pub use runner::{JobConfig, JobFailure, JobRunner, RunReport, DEFAULT_JOB_TABLE};
